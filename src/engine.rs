use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::EngineConfig;
use crate::control::Command;
use crate::dispatch::CommandSink;

const ENGINE_QUEUE: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
/// Minimum gap between connection attempts while the engine is unreachable.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Engine stand-in used when no plugin host is configured.
pub struct LogEngine;

impl CommandSink for LogEngine {
    fn send(&mut self, command: &Command) -> anyhow::Result<()> {
        log::info!("engine <- {command}");
        Ok(())
    }
}

/// Sends each command as one text line over TCP.
///
/// The socket lives on a writer thread fed through a bounded queue, so `send`
/// never waits on the network. Lines that arrive while the engine is
/// unreachable are dropped.
pub struct TcpEngine {
    lines: Sender<String>,
}

impl TcpEngine {
    pub fn spawn(address: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid engine address '{address}': {e}"))?;
        let (tx, rx) = crossbeam_channel::bounded(ENGINE_QUEUE);
        thread::Builder::new()
            .name("engine-writer".into())
            .spawn(move || write_lines(addr, &rx))?;
        Ok(TcpEngine { lines: tx })
    }
}

impl CommandSink for TcpEngine {
    fn send(&mut self, command: &Command) -> anyhow::Result<()> {
        match self.lines.try_send(command.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => anyhow::bail!("engine queue full"),
            Err(TrySendError::Disconnected(_)) => anyhow::bail!("engine writer has stopped"),
        }
    }
}

fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok(stream)
}

fn write_lines(addr: SocketAddr, lines: &Receiver<String>) {
    let mut stream: Option<TcpStream> = None;
    let mut last_attempt: Option<Instant> = None;

    for line in lines.iter() {
        if stream.is_none() {
            if last_attempt.is_some_and(|t| t.elapsed() < RETRY_INTERVAL) {
                log::debug!("Engine offline, dropping '{line}'");
                continue;
            }
            last_attempt = Some(Instant::now());
            match connect(addr) {
                Ok(s) => {
                    log::info!("Connected to engine at {addr}");
                    stream = Some(s);
                }
                Err(e) => {
                    log::warn!("Failed to connect to engine at {addr}: {e}");
                    continue;
                }
            }
        }
        if let Some(s) = stream.as_mut() {
            match writeln!(s, "{line}") {
                Ok(()) => log::debug!("engine <- {line}"),
                Err(e) => {
                    log::warn!("Engine write failed, dropping connection: {e}");
                    stream = None;
                }
            }
        }
    }
    log::debug!("Engine writer stopped");
}

pub fn from_config(config: &EngineConfig) -> anyhow::Result<Box<dyn CommandSink>> {
    match &config.address {
        Some(address) => Ok(Box::new(TcpEngine::spawn(address)?)),
        None => {
            log::warn!("No engine address configured; engine commands will only be logged");
            Ok(Box::new(LogEngine))
        }
    }
}
