use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub osc: OscConfig,
    pub engine: EngineConfig,
    pub looper: LooperConfig,
    pub midi: MidiConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// UDP address the control-event listener binds to.
    pub listen: String,
}

impl Default for OscConfig {
    fn default() -> Self {
        OscConfig {
            listen: "0.0.0.0:9000".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// TCP address of the plugin host. Commands are only logged when unset.
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    /// OSC address of the looper.
    pub address: String,
    pub loop_index: u32,
    /// Command line used to launch the looper when a preset asks for it.
    pub launch: Vec<String>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        LooperConfig {
            address: "127.0.0.1:9951".into(),
            loop_index: 0,
            launch: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub enabled: bool,
    /// Only open inputs whose name contains this string.
    pub device: Option<String>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        MidiConfig {
            enabled: true,
            device: None,
        }
    }
}

/// Load the application config. A missing path yields the defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(Config::default()),
    }
}
