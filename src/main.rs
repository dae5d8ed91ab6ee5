#![allow(clippy::collapsible_if)]

mod chain;
mod cli;
mod config;
mod control;
mod dispatch;
mod engine;
mod enumerate;
mod midi;
mod osc;
mod preset;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Command, EnumerateTarget, RunArgs};
use control::ControlStateMachine;
use dispatch::{Dispatcher, Inbound};
use preset::PresetLibrary;

/// Capacity of the queue shared by the OSC and MIDI producers.
const EVENT_QUEUE: usize = 256;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Show { preset } => show(&preset),
        Command::Enumerate(EnumerateTarget::Midi) => enumerate::midi(),
        Command::Enumerate(EnumerateTarget::Presets { presets }) => enumerate::presets(&presets),
    }
}

fn show(path: &Path) -> anyhow::Result<()> {
    let preset = preset::load_file(path)?;
    let settings = &preset.settings;
    let chain = &preset.chain;

    println!("{}", settings.name);
    println!("  Author:  {}", settings.author);
    println!("  Looper:  {}", if settings.looper { "yes" } else { "no" });
    println!("  Inputs:  {:?}", chain.inputs());
    println!("  Outputs: {:?}", chain.outputs());
    if settings.global_parameters.is_empty() {
        println!("  Global parameters: (none)");
    } else {
        println!("  Global parameters:");
        for (name, value) in &settings.global_parameters {
            println!("    {name} = {value}");
        }
    }

    println!();
    for line in chain.render() {
        println!("  {line}");
    }
    println!();
    println!("{chain}");
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.osc.listen = listen;
    }
    if args.engine.is_some() {
        config.engine.address = args.engine;
    }
    if args.midi_device.is_some() {
        config.midi.device = args.midi_device;
    }
    if args.no_midi {
        config.midi.enabled = false;
    }

    // Any bad preset aborts here, before a transport is opened
    let library = PresetLibrary::load_files(&args.presets)?;
    for id in library.ids() {
        if let Some(preset) = library.get(id) {
            for line in preset.chain.render() {
                log::debug!("preset {id}: {line}");
            }
        }
    }

    let (event_tx, event_rx) = crossbeam_channel::bounded::<Inbound>(EVENT_QUEUE);
    osc::spawn_listener(&config.osc.listen, event_tx.clone())?;

    let mut midi_bridge = if config.midi.enabled {
        let mut bridge = midi::MidiBridge::new(event_tx.clone(), config.midi.device.clone());
        match bridge.open_ports() {
            Ok(_) => log::info!("MIDI inputs connected: {}", bridge.connection_count()),
            Err(e) => log::warn!("MIDI unavailable: {e}"),
        }
        Some(bridge)
    } else {
        None
    };
    drop(event_tx);

    let engine = engine::from_config(&config.engine)?;
    let looper = osc::LooperProxy::new(&config.looper)?;

    let first = library.ids().next();
    let mut dispatcher = Dispatcher::new(
        ControlStateMachine::new(library),
        engine,
        Box::new(looper),
    );
    if let Some(id) = first {
        dispatcher.dispatch(&Inbound::new(format!("/preset/{id}"), None));
    }

    log::info!("Ready. Ctrl+C to quit.");
    dispatcher.run(&event_rx, || {
        if let Some(bridge) = midi_bridge.as_mut() {
            bridge.poll_new_devices();
        }
    });
    Ok(())
}
