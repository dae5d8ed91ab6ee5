use std::fmt;
use std::str::FromStr;

/// Transport commands the looper accepts as `hit` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooperCommand {
    Undo,
    Record,
    Overdub,
}

impl LooperCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            LooperCommand::Undo => "undo",
            LooperCommand::Record => "record",
            LooperCommand::Overdub => "overdub",
        }
    }
}

impl FromStr for LooperCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undo" => Ok(LooperCommand::Undo),
            "record" => Ok(LooperCommand::Record),
            "overdub" => Ok(LooperCommand::Overdub),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for LooperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which collaborator a [`Command`] is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Engine,
    Looper,
}

/// Outbound command produced by the control state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadPreset(u32),
    /// Stomp id as pressed on the pedal (1-based).
    ToggleBypass(u32),
    SetParameter { id: i64, value: f32 },
    StartLooper,
    LooperHit(LooperCommand),
}

impl Command {
    pub fn target(&self) -> Target {
        match self {
            Command::LoadPreset(_) | Command::ToggleBypass(_) | Command::SetParameter { .. } => {
                Target::Engine
            }
            Command::StartLooper | Command::LooperHit(_) => Target::Looper,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::LoadPreset(id) => write!(f, "load preset {id}"),
            Command::ToggleBypass(id) => write!(f, "toggle bypass {id}"),
            Command::SetParameter { id, value } => write!(f, "set parameter {id} = {value}"),
            Command::StartLooper => write!(f, "start looper"),
            Command::LooperHit(cmd) => write!(f, "hit {cmd}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looper_command_names() {
        for cmd in [LooperCommand::Undo, LooperCommand::Record, LooperCommand::Overdub] {
            assert_eq!(cmd.as_str().parse::<LooperCommand>(), Ok(cmd));
        }
        assert_eq!("jump".parse::<LooperCommand>(), Err("jump".to_string()));
        assert_eq!("Record".parse::<LooperCommand>(), Err("Record".to_string()));
    }

    #[test]
    fn command_text_and_target() {
        let cases = [
            (Command::LoadPreset(3), "load preset 3", Target::Engine),
            (Command::ToggleBypass(2), "toggle bypass 2", Target::Engine),
            (
                Command::SetParameter { id: 4, value: 0.5 },
                "set parameter 4 = 0.5",
                Target::Engine,
            ),
            (Command::StartLooper, "start looper", Target::Looper),
            (
                Command::LooperHit(LooperCommand::Record),
                "hit record",
                Target::Looper,
            ),
        ];
        for (cmd, text, target) in cases {
            assert_eq!(cmd.to_string(), text);
            assert_eq!(cmd.target(), target);
        }
    }
}
