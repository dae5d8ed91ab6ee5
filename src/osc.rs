use std::net::{SocketAddr, UdpSocket};
use std::process::Child;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use rosc::{OscMessage, OscPacket, OscType};

use crate::config::LooperConfig;
use crate::control::{Command, Payload};
use crate::dispatch::{CommandSink, Inbound};

const MAX_PACKET: usize = 1536;

/// Flatten an OSC packet (bundles included) into inbound events. Only the
/// first argument of a message is used as payload.
pub fn inbound_from_packet(packet: OscPacket, out: &mut Vec<Inbound>) {
    match packet {
        OscPacket::Message(msg) => {
            let payload = msg.args.into_iter().next().and_then(payload_from);
            out.push(Inbound::new(msg.addr, payload));
        }
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                inbound_from_packet(packet, out);
            }
        }
    }
}

fn payload_from(arg: OscType) -> Option<Payload> {
    match arg {
        OscType::Int(v) => Some(Payload::Int(v.into())),
        OscType::Long(v) => Some(Payload::Int(v)),
        OscType::Float(v) => Some(Payload::Float(v.into())),
        OscType::Double(v) => Some(Payload::Float(v)),
        OscType::String(s) => Some(Payload::Text(s)),
        OscType::Bool(b) => Some(Payload::Int(b.into())),
        _ => None,
    }
}

/// Listen for OSC control messages on `listen` and push them onto `events`.
pub fn spawn_listener(listen: &str, events: Sender<Inbound>) -> anyhow::Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(listen)?;
    log::info!("Listening for OSC control events on {}", socket.local_addr()?);

    let handle = thread::Builder::new()
        .name("osc-listener".into())
        .spawn(move || {
            let mut buf = [0u8; MAX_PACKET];
            let mut batch = Vec::new();
            loop {
                let (size, from) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) => {
                        log::error!("OSC receive failed: {e}");
                        break;
                    }
                };
                let packet = match rosc::decoder::decode_udp(&buf[..size]) {
                    Ok((_, packet)) => packet,
                    Err(e) => {
                        log::warn!("Undecodable OSC packet from {from}: {e:?}");
                        continue;
                    }
                };
                inbound_from_packet(packet, &mut batch);
                for inbound in batch.drain(..) {
                    log::debug!("OSC in  [{from}] {}", inbound.address);
                    if let Err(e) = events.try_send(inbound) {
                        log::warn!(
                            "Event queue full or closed, dropping {}",
                            e.into_inner().address
                        );
                    }
                }
            }
        })?;
    Ok(handle)
}

/// Forwards looper commands as `/sl/<loop>/hit s:<command>` and launches the
/// looper process on request.
pub struct LooperProxy {
    socket: UdpSocket,
    target: SocketAddr,
    loop_index: u32,
    launch: Vec<String>,
    child: Option<Child>,
}

impl LooperProxy {
    pub fn new(config: &LooperConfig) -> anyhow::Result<Self> {
        let target: SocketAddr = config
            .address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid looper address '{}': {e}", config.address))?;
        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        Ok(LooperProxy {
            socket: UdpSocket::bind(bind)?,
            target,
            loop_index: config.loop_index,
            launch: config.launch.clone(),
            child: None,
        })
    }

    fn hit(&self, command: &str) -> anyhow::Result<()> {
        let packet = OscPacket::Message(OscMessage {
            addr: format!("/sl/{}/hit", self.loop_index),
            args: vec![OscType::String(command.to_string())],
        });
        let bytes = rosc::encoder::encode(&packet)
            .map_err(|e| anyhow::anyhow!("failed to encode OSC message: {e:?}"))?;
        self.socket.send_to(&bytes, self.target)?;
        log::info!("Sent /sl/{}/hit s:{command} to looper", self.loop_index);
        Ok(())
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if let Some(child) = self.child.as_mut() {
            if child.try_wait()?.is_none() {
                log::debug!("Looper already running (pid {})", child.id());
                return Ok(());
            }
        }
        let Some((program, args)) = self.launch.split_first() else {
            log::info!("No looper launch command configured; assuming it is running");
            return Ok(());
        };
        let child = std::process::Command::new(program).args(args).spawn()?;
        log::info!("Started looper '{program}' (pid {})", child.id());
        self.child = Some(child);
        Ok(())
    }
}

impl CommandSink for LooperProxy {
    fn send(&mut self, command: &Command) -> anyhow::Result<()> {
        match command {
            Command::LooperHit(cmd) => self.hit(cmd.as_str()),
            Command::StartLooper => self.start(),
            other => anyhow::bail!("'{other}' is not a looper command"),
        }
    }
}
