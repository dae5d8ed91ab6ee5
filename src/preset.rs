use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::chain::{ChainGraph, EffectUnit, GraphError};

/// Highest preset id addressable from the pedal.
pub const MAX_PRESET_ID: u32 = 99;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read preset '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse preset: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("preset id {0} outside 1..=99")]
    PresetId(u32),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Everything in a preset file that is not part of the chain topology.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetSettings {
    pub name: String,
    pub author: String,
    pub global_parameters: BTreeMap<String, f32>,
    /// The preset declares a `[preset.looper]` section.
    pub looper: bool,
}

#[derive(Debug, Clone)]
pub struct Preset {
    pub settings: PresetSettings,
    pub chain: ChainGraph,
}

// Raw file layout. Every field is optional here so that absent keys surface as
// `ConfigError::MissingField` with the dotted key name.
#[derive(Deserialize)]
struct PresetFile {
    preset: Option<RawPreset>,
}

#[derive(Deserialize)]
struct RawPreset {
    name: Option<String>,
    author: Option<String>,
    global_parameters: Option<BTreeMap<String, f32>>,
    stompboxes: Option<Vec<RawStompbox>>,
    looper: Option<toml::Table>,
}

#[derive(Deserialize)]
struct RawStompbox {
    #[serde(alias = "lv2")]
    identity: Option<String>,
    connections: Option<Vec<i64>>,
}

/// Parse a preset document and build its chain.
///
/// ```toml
/// [preset]
/// name = "Crunch"
/// author = "me"
///
/// [preset.global_parameters]
/// volume = 0.8
///
/// [[preset.stompboxes]]
/// identity = "http://guitarix.sourceforge.net/plugins/gx_ts9_#_ts9_"
/// connections = [1]
///
/// [[preset.stompboxes]]
/// identity = "http://calf.sourceforge.net/plugins/Reverb"
/// ```
pub fn load(source: &str) -> Result<Preset, ConfigError> {
    let file: PresetFile = toml::from_str(source)?;
    let raw = file.preset.ok_or(ConfigError::MissingField("preset"))?;

    let settings = PresetSettings {
        name: raw.name.ok_or(ConfigError::MissingField("preset.name"))?,
        author: raw.author.ok_or(ConfigError::MissingField("preset.author"))?,
        global_parameters: raw
            .global_parameters
            .ok_or(ConfigError::MissingField("preset.global_parameters"))?,
        looper: raw.looper.is_some(),
    };
    let stompboxes = raw
        .stompboxes
        .ok_or(ConfigError::MissingField("preset.stompboxes"))?;

    let mut units = Vec::with_capacity(stompboxes.len());
    let mut connections = Vec::with_capacity(stompboxes.len());
    for sb in stompboxes {
        let identity = sb
            .identity
            .ok_or(ConfigError::MissingField("preset.stompboxes.identity"))?;
        units.push(EffectUnit::new(identity));
        connections.push(sb.connections.unwrap_or_default());
    }

    let len = units.len();
    let mut chain = ChainGraph::new(units);
    for (i, targets) in connections.into_iter().enumerate() {
        let targets = targets
            .into_iter()
            .map(|t| usize::try_from(t).map_err(|_| GraphError::OutOfRange { index: t, len }))
            .collect::<Result<Vec<_>, _>>()?;
        chain.set_outgoing_edges(i, targets)?;
    }

    log::debug!(
        "Loaded preset '{}' by {} ({} units)",
        settings.name,
        settings.author,
        chain.len()
    );
    Ok(Preset { settings, chain })
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Preset, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load(&content)
}

/// Presets addressable by the pedal's preset-select buttons.
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    presets: BTreeMap<u32, Preset>,
}

impl PresetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load preset files, numbering them 1, 2, ... in the given order.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut library = Self::new();
        for (i, path) in paths.iter().enumerate() {
            let id = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let preset = load_file(path)?;
            log::info!(
                "Preset {id}: '{}' from {}",
                preset.settings.name,
                path.as_ref().display()
            );
            library.insert(id, preset)?;
        }
        Ok(library)
    }

    pub fn insert(&mut self, id: u32, preset: Preset) -> Result<(), ConfigError> {
        if id == 0 || id > MAX_PRESET_ID {
            return Err(ConfigError::PresetId(id));
        }
        self.presets.insert(id, preset);
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&Preset> {
        self.presets.get(&id)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.presets.keys().copied()
    }
}
