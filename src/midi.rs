use std::collections::HashSet;

use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection};

use crate::control::{LooperCommand, Mode};
use crate::dispatch::Inbound;

const STOMP_ENABLE_CC: u8 = 16;
const STOMP_SELECT_CC: u8 = 32;
const TAP_PULSE_CC: u8 = 64;
const TAP_BPM_CC: u8 = 65;
const MODE_CC: u8 = 80;
const LOOPER_CC: u8 = 96;
const SLIDER_CC: u8 = 112;

const MODES: [Mode; 4] = [Mode::Preset, Mode::Stomp, Mode::Looper, Mode::Tuner];
const LOOPER_COMMANDS: [LooperCommand; 3] = [
    LooperCommand::Undo,
    LooperCommand::Record,
    LooperCommand::Overdub,
];

/// Translate a foot-controller MIDI message into a control address.
///
/// Buttons send a CC with a non-zero value on press; releases (value 0) are
/// ignored. The MIDI channel is ignored.
pub fn translate(bytes: &[u8]) -> Option<Inbound> {
    let status = *bytes.first()? & 0xF0;
    let address = match (status, bytes.get(1).copied(), bytes.get(2).copied()) {
        (0xC0, Some(program), _) => format!("/preset/{}", u32::from(program) + 1),
        (0xB0, Some(cc), Some(value)) => match cc {
            SLIDER_CC..=119 => format!(
                "/slider/{}/{}",
                cc - SLIDER_CC + 1,
                f32::from(value) / 127.0
            ),
            _ if value == 0 => return None,
            TAP_BPM_CC => format!("/tap/{value}"),
            STOMP_ENABLE_CC..=24 => format!("/stomp/{}/enable", cc - STOMP_ENABLE_CC + 1),
            STOMP_SELECT_CC..=40 => format!("/stomp/{}/select", cc - STOMP_SELECT_CC + 1),
            TAP_PULSE_CC => "/tap/1".to_string(),
            MODE_CC..=83 => format!("/mode/{}", MODES[usize::from(cc - MODE_CC)]),
            LOOPER_CC..=98 => format!("/looper/{}", LOOPER_COMMANDS[usize::from(cc - LOOPER_CC)]),
            _ => return None,
        },
        _ => return None,
    };
    Some(Inbound::new(address, None))
}

/// Input callback that translates each message and queues it for dispatch.
fn forward_to(sender: Sender<Inbound>, port: String) -> impl FnMut(u64, &[u8], &mut ()) + Send {
    move |_timestamp_us, bytes, _| {
        log::debug!("MIDI in  [{port}] data={bytes:02x?}");
        let Some(inbound) = translate(bytes) else {
            return;
        };
        if let Err(e) = sender.try_send(inbound) {
            log::warn!(
                "Event queue full, dropping {} from {port}",
                e.into_inner().address
            );
        }
    }
}

/// Opens MIDI inputs and feeds translated control events into the dispatcher
/// queue.
pub struct MidiBridge {
    sender: Sender<Inbound>,
    device_filter: Option<String>,
    connections: Vec<MidiInputConnection<()>>,
    connected_names: HashSet<String>,
}

impl MidiBridge {
    pub fn new(sender: Sender<Inbound>, device_filter: Option<String>) -> Self {
        MidiBridge {
            sender,
            device_filter,
            connections: Vec::new(),
            connected_names: HashSet::new(),
        }
    }

    fn wants(&self, name: &str) -> bool {
        !self.connected_names.contains(name)
            && self
                .device_filter
                .as_deref()
                .is_none_or(|filter| name.contains(filter))
    }

    /// Open all available MIDI input ports (or those matching the filter).
    /// Returns the number of newly opened connections.
    pub fn open_ports(&mut self) -> anyhow::Result<usize> {
        let midi_in = MidiInput::new("stomp")?;
        let mut opened = 0;

        for port in midi_in.ports() {
            let Ok(name) = midi_in.port_name(&port) else {
                continue;
            };
            if !self.wants(&name) {
                continue;
            }
            // `connect` consumes its MidiInput
            let input = MidiInput::new("stomp")?;
            let callback = forward_to(self.sender.clone(), name.clone());
            match input.connect(&port, &name, callback, ()) {
                Ok(conn) => {
                    log::info!("Opened MIDI input: {name}");
                    self.connected_names.insert(name);
                    self.connections.push(conn);
                    opened += 1;
                }
                Err(e) => log::warn!("Failed to open MIDI input {name}: {e}"),
            }
        }
        Ok(opened)
    }

    /// Pick up controllers plugged in after start-up. Call periodically.
    pub fn poll_new_devices(&mut self) {
        match self.open_ports() {
            Ok(0) => {}
            Ok(n) => log::info!("Opened {n} new MIDI device(s)"),
            Err(e) => log::warn!("MIDI poll error: {e}"),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
