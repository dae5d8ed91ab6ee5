pub mod command;
pub mod event;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::chain::ChainGraph;
use crate::preset::{MAX_PRESET_ID, Preset, PresetLibrary};

pub use command::{Command, LooperCommand, Target};
pub use event::{ControlEvent, EventError, Payload};

/// Highest stomp id on the pedal (ids are 1-based).
pub const MAX_STOMP_ID: u32 = 9;

/// Tap values below this are pulses; at or above it they are a BPM.
pub const TAP_BPM_THRESHOLD: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Preset,
    Stomp,
    Looper,
    Tuner,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Preset => "preset",
            Mode::Stomp => "stomp",
            Mode::Looper => "looper",
            Mode::Tuner => "tuner",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preset" => Ok(Mode::Preset),
            "stomp" => Ok(Mode::Stomp),
            "looper" => Ok(Mode::Looper),
            "tuner" => Ok(Mode::Tuner),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating state of the pedal. Read-only outside the state machine.
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    mode: Mode,
    selected_unit: u32,
    last_tap: Option<Instant>,
    tap_tempo: f64,
}

impl ControlState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 0 selects the global parameters, 1..=9 a stompbox (1-based, see
    /// [`unit_index_for`]).
    pub fn selected_unit(&self) -> u32 {
        self.selected_unit
    }

    #[allow(dead_code)]
    pub fn last_tap(&self) -> Option<Instant> {
        self.last_tap
    }

    /// Beats per minute, 0 when no tempo has been established.
    pub fn tap_tempo(&self) -> f64 {
        self.tap_tempo
    }
}

/// Map a 1-based stomp selection onto a 0-based chain index. `0` means "global
/// parameters" and has no unit.
pub fn unit_index_for(selected_unit: u32) -> Option<usize> {
    (selected_unit as usize).checked_sub(1)
}

/// Interprets control events against the preset library and produces commands
/// for the audio engine and the looper.
///
/// All mutation goes through `&mut self`, so the owner decides how exclusion is
/// provided (the dispatcher owns the only instance).
#[derive(Debug, Default)]
pub struct ControlStateMachine {
    state: ControlState,
    library: PresetLibrary,
    /// Working copy of the preset the engine was last told to load. Bypass and
    /// slider changes land here and are discarded on the next preset switch.
    active: Option<Preset>,
}

impl ControlStateMachine {
    pub fn new(library: PresetLibrary) -> Self {
        ControlStateMachine {
            state: ControlState::default(),
            library,
            active: None,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn active_preset(&self) -> Option<&Preset> {
        self.active.as_ref()
    }

    #[allow(dead_code)]
    pub fn active_chain(&self) -> Option<&ChainGraph> {
        self.active_preset().map(|p| &p.chain)
    }

    /// Parse and handle an inbound address.
    pub fn handle(
        &mut self,
        address: &str,
        payload: Option<&Payload>,
    ) -> Result<Vec<Command>, EventError> {
        let event = ControlEvent::parse(address, payload)?;
        self.handle_event(event)
    }

    pub fn handle_event(&mut self, event: ControlEvent) -> Result<Vec<Command>, EventError> {
        self.handle_event_at(event, Instant::now())
    }

    /// Handle an event with an explicit monotonic timestamp for tap timing.
    ///
    /// On error nothing in the state has changed.
    pub fn handle_event_at(
        &mut self,
        event: ControlEvent,
        now: Instant,
    ) -> Result<Vec<Command>, EventError> {
        match event {
            ControlEvent::Mode(mode) => {
                log::info!("Mode {}", mode);
                self.state.mode = mode;
                Ok(Vec::new())
            }
            ControlEvent::Preset(id) => {
                let id = check_id(&event, id, MAX_PRESET_ID)?;
                Ok(self.select_preset(id))
            }
            ControlEvent::StompEnable(id) => {
                let id = check_id(&event, id, MAX_STOMP_ID)?;
                log::info!("Stomp {id} toggle bypass");
                self.mirror_bypass(id);
                Ok(vec![Command::ToggleBypass(id)])
            }
            ControlEvent::StompSelect(id) => {
                let id = check_id(&event, id, MAX_STOMP_ID)?;
                log::info!("Stomp {id} selected");
                self.state.selected_unit = id;
                Ok(Vec::new())
            }
            ControlEvent::Looper(cmd) => {
                log::info!("Looper {cmd}");
                Ok(vec![Command::LooperHit(cmd)])
            }
            ControlEvent::Tap(value) => {
                self.tap(value, now);
                Ok(Vec::new())
            }
            ControlEvent::Slider { id, value } => {
                log::info!("Slider {id} = {value}");
                self.mirror_slider(id, value);
                Ok(vec![Command::SetParameter { id, value }])
            }
        }
    }

    fn select_preset(&mut self, id: u32) -> Vec<Command> {
        let mut commands = vec![Command::LoadPreset(id)];
        match self.library.get(id) {
            Some(preset) => {
                log::info!("Preset {id}: '{}'", preset.settings.name);
                if preset.settings.looper {
                    commands.push(Command::StartLooper);
                }
                self.active = Some(preset.clone());
            }
            None => {
                log::warn!("Preset {id} is not in the library; no local chain for it");
                self.active = None;
            }
        }
        commands
    }

    fn tap(&mut self, value: i64, now: Instant) {
        log::debug!("Tap value {value}");
        if value < TAP_BPM_THRESHOLD {
            self.state.tap_tempo = match self.state.last_tap {
                None => 0.0,
                Some(last) => {
                    let interval = now.saturating_duration_since(last).as_secs_f64();
                    if interval > 0.0 { 60.0 / interval } else { 0.0 }
                }
            };
            self.state.last_tap = Some(now);
            if self.state.tap_tempo > 0.0 {
                log::info!("Tap tempo {:.0} BPM", self.state.tap_tempo);
            }
        } else {
            self.state.tap_tempo = value as f64;
            log::info!("Tempo set to {value} BPM");
        }
    }

    // The engine owns the real bypass state; this keeps the local chain in step.
    fn mirror_bypass(&mut self, stomp_id: u32) {
        let Some(index) = unit_index_for(stomp_id) else {
            return;
        };
        if let Some(unit) = self
            .active
            .as_mut()
            .and_then(|p| p.chain.unit_at_mut(index))
        {
            let bypassed = unit.toggle_bypass();
            log::debug!("{unit} bypass {bypassed}");
        }
    }

    fn mirror_slider(&mut self, id: i64, value: f32) {
        let symbol = format!("slider{id}");
        let selected = unit_index_for(self.state.selected_unit);
        let Some(preset) = self.active.as_mut() else {
            return;
        };
        match selected {
            None => {
                preset.settings.global_parameters.insert(symbol, value);
            }
            Some(index) => match preset.chain.unit_at_mut(index) {
                Some(unit) => unit.set_parameter(symbol, value),
                None => log::debug!("Selected stomp {} has no unit in this preset", index + 1),
            },
        }
    }
}

/// Check `0 < id <= max`.
fn check_id(event: &ControlEvent, id: i64, max: u32) -> Result<u32, EventError> {
    u32::try_from(id)
        .ok()
        .filter(|&id| id > 0 && id <= max)
        .ok_or_else(|| EventError::validation(event, format!("id must be within 1..={max}")))
}
