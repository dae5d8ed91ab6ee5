use std::path::PathBuf;

use crate::preset::PresetLibrary;

pub fn midi() -> anyhow::Result<()> {
    println!("=== MIDI Input Devices ===");
    let midi_in = midir::MidiInput::new("stomp-enumerate")?;
    let ports = midi_in.ports();
    if ports.is_empty() {
        println!("  (none found)");
    }
    for port in &ports {
        let name = midi_in.port_name(port).unwrap_or_else(|_| "Unknown".into());
        println!("  {name}");
    }
    Ok(())
}

/// List preset files with the ids the pedal would address them by.
pub fn presets(paths: &[PathBuf]) -> anyhow::Result<()> {
    println!("=== Presets ===");
    let library = PresetLibrary::load_files(paths)?;
    if library.is_empty() {
        println!("  (none)");
    }
    for id in library.ids() {
        let Some(preset) = library.get(id) else {
            continue;
        };
        let settings = &preset.settings;
        let looper = if settings.looper { "  [looper]" } else { "" };
        println!("  {id:2} {}{looper}", settings.name);
        println!("          Author:  {}", settings.author);
        println!("          Units:   {}", preset.chain.len());
        println!("          Globals: {}", settings.global_parameters.len());
    }
    Ok(())
}
