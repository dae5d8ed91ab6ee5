use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stomp", about = "Foot pedal control plane for an effects chain")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load presets and handle pedal events until interrupted
    Run(RunArgs),
    /// Print a preset's settings and signal chain
    Show {
        /// Path to preset file (.toml)
        preset: PathBuf,
    },
    /// List MIDI inputs or presets
    #[command(subcommand)]
    Enumerate(EnumerateTarget),
}

#[derive(Subcommand)]
pub enum EnumerateTarget {
    /// List available MIDI input devices
    Midi,
    /// List preset files with their pedal ids
    Presets {
        /// Preset files, numbered from 1 in this order
        #[arg(required = true)]
        presets: Vec<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Preset files (.toml), numbered from 1 in this order
    #[arg(required = true)]
    pub presets: Vec<PathBuf>,

    /// Application config file (.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// UDP address for OSC control events (overrides config)
    #[arg(long)]
    pub listen: Option<String>,

    /// TCP address of the plugin host (overrides config)
    #[arg(long)]
    pub engine: Option<String>,

    /// MIDI input device name filter (overrides config)
    #[arg(long)]
    pub midi_device: Option<String>,

    /// Do not open MIDI inputs
    #[arg(long)]
    pub no_midi: bool,
}
