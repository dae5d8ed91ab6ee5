use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::control::{Command, ControlStateMachine, EventError, Payload, Target};

/// How often the idle hook runs while no events arrive.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// A raw control event as delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub address: String,
    pub payload: Option<Payload>,
}

impl Inbound {
    pub fn new(address: impl Into<String>, payload: Option<Payload>) -> Self {
        Inbound {
            address: address.into(),
            payload,
        }
    }
}

/// Receiver of outbound commands (audio engine or looper).
pub trait CommandSink: Send {
    fn send(&mut self, command: &Command) -> anyhow::Result<()>;
}

/// Single consumer of the inbound event queue. Owning the state machine here
/// serialises every handler no matter how many producers feed the queue.
pub struct Dispatcher {
    machine: ControlStateMachine,
    engine: Box<dyn CommandSink>,
    looper: Box<dyn CommandSink>,
}

impl Dispatcher {
    pub fn new(
        machine: ControlStateMachine,
        engine: Box<dyn CommandSink>,
        looper: Box<dyn CommandSink>,
    ) -> Self {
        Dispatcher {
            machine,
            engine,
            looper,
        }
    }

    #[allow(dead_code)]
    pub fn machine(&self) -> &ControlStateMachine {
        &self.machine
    }

    /// Handle one event and forward its commands. Returns the number of
    /// commands delivered; rejected events are logged and yield 0.
    pub fn dispatch(&mut self, inbound: &Inbound) -> usize {
        let commands = match self
            .machine
            .handle(&inbound.address, inbound.payload.as_ref())
        {
            Ok(commands) => commands,
            Err(e @ EventError::UnsupportedCommand(_)) => {
                log::warn!("Dropping {}: {e}", inbound.address);
                return 0;
            }
            Err(e) => {
                log::warn!("{e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for command in &commands {
            let sink = match command.target() {
                Target::Engine => &mut self.engine,
                Target::Looper => &mut self.looper,
            };
            match sink.send(command) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Failed to send '{command}': {e}"),
            }
        }
        delivered
    }

    /// Drain `events` until every sender is gone, calling `idle` whenever the
    /// queue has been quiet for [`IDLE_INTERVAL`].
    pub fn run(&mut self, events: &Receiver<Inbound>, mut idle: impl FnMut()) {
        loop {
            match events.recv_timeout(IDLE_INTERVAL) {
                Ok(inbound) => {
                    self.dispatch(&inbound);
                }
                Err(RecvTimeoutError::Timeout) => idle(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!("Event queue closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::control::LooperCommand;
    use crate::preset::{self, PresetLibrary};

    /// Sink that records what it was sent.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Command>>>);

    impl Recorder {
        fn sent(&self) -> Vec<Command> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CommandSink for Recorder {
        fn send(&mut self, command: &Command) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    struct Broken;

    impl CommandSink for Broken {
        fn send(&mut self, _: &Command) -> anyhow::Result<()> {
            anyhow::bail!("engine offline")
        }
    }

    fn library() -> PresetLibrary {
        let mut library = PresetLibrary::new();
        let preset = preset::load(
            r#"
            [preset]
            name = "Loop"
            author = "a"
            global_parameters = {}
            stompboxes = [{ identity = "urn:a" }]
            [preset.looper]
            "#,
        )
        .unwrap();
        library.insert(1, preset).unwrap();
        library
    }

    fn dispatcher() -> (Dispatcher, Recorder, Recorder) {
        let engine = Recorder::default();
        let looper = Recorder::default();
        let d = Dispatcher::new(
            ControlStateMachine::new(library()),
            Box::new(engine.clone()),
            Box::new(looper.clone()),
        );
        (d, engine, looper)
    }

    #[test]
    fn commands_are_routed_by_target() {
        let (mut d, engine, looper) = dispatcher();
        assert_eq!(d.dispatch(&Inbound::new("/preset/1", None)), 2);
        assert_eq!(d.dispatch(&Inbound::new("/looper/undo", None)), 1);
        assert_eq!(d.dispatch(&Inbound::new("/stomp/1/enable", None)), 1);

        assert_eq!(
            engine.sent(),
            vec![Command::LoadPreset(1), Command::ToggleBypass(1)]
        );
        assert_eq!(
            looper.sent(),
            vec![
                Command::StartLooper,
                Command::LooperHit(LooperCommand::Undo)
            ]
        );
    }

    #[test]
    fn bad_events_are_dropped_and_dispatch_continues() {
        let (mut d, engine, looper) = dispatcher();
        assert_eq!(d.dispatch(&Inbound::new("/looper/jump", None)), 0);
        assert_eq!(d.dispatch(&Inbound::new("/stomp/10/select", None)), 0);
        assert_eq!(d.dispatch(&Inbound::new("/garbage", None)), 0);
        assert!(engine.sent().is_empty());
        assert!(looper.sent().is_empty());

        assert_eq!(d.dispatch(&Inbound::new("/stomp/2/select", None)), 0);
        assert_eq!(d.machine().state().selected_unit(), 2);
    }

    #[test]
    fn sink_failure_is_not_counted() {
        let looper = Recorder::default();
        let mut d = Dispatcher::new(
            ControlStateMachine::new(library()),
            Box::new(Broken),
            Box::new(looper.clone()),
        );
        assert_eq!(d.dispatch(&Inbound::new("/preset/1", None)), 1);
        assert_eq!(looper.sent(), vec![Command::StartLooper]);
    }

    #[test]
    fn run_drains_queue_from_several_producers() {
        let (mut d, engine, _) = dispatcher();
        let (tx, rx) = crossbeam_channel::bounded(16);

        let producers: Vec<_> = (1..=3)
            .map(|id| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    tx.send(Inbound::new(format!("/stomp/{id}/enable"), None))
                        .unwrap();
                })
            })
            .collect();
        drop(tx);
        for p in producers {
            p.join().unwrap();
        }

        d.run(&rx, || {});
        let mut sent = engine.sent();
        sent.sort_by_key(|c| c.to_string());
        assert_eq!(
            sent,
            vec![
                Command::ToggleBypass(1),
                Command::ToggleBypass(2),
                Command::ToggleBypass(3)
            ]
        );
    }
}
