use std::fmt;

use thiserror::Error;

use super::Mode;
use super::command::LooperCommand;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("rejected '{event}': {reason}")]
    Validation { event: String, reason: String },

    #[error("unsupported looper command '{0}'")]
    UnsupportedCommand(String),
}

impl EventError {
    pub fn validation(event: impl fmt::Display, reason: impl Into<String>) -> Self {
        EventError::Validation {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

/// Optional value carried next to an event address (an OSC argument).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Payload {
    fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(v) => Some(*v),
            Payload::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Payload::Float(_) => None,
            Payload::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Finite values only; NaN and out-of-range floats give `None`.
    fn as_float(&self) -> Option<f32> {
        let value = match self {
            Payload::Int(v) => *v as f32,
            Payload::Float(v) => *v as f32,
            Payload::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Int(v) => write!(f, "{v}"),
            Payload::Float(v) => write!(f, "{v}"),
            Payload::Text(s) => f.write_str(s),
        }
    }
}

/// A control event after address parsing. Ranges are not checked here; the
/// state machine validates ids against the pedal layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Mode(Mode),
    Preset(i64),
    StompEnable(i64),
    StompSelect(i64),
    Looper(LooperCommand),
    Tap(i64),
    Slider { id: i64, value: f32 },
}

impl ControlEvent {
    /// Parse a slash-delimited address such as `/stomp/3/enable`.
    ///
    /// For `tap` and `slider` the value may come from `payload` instead of the
    /// last path segment; a payload takes precedence when both are present.
    pub fn parse(address: &str, payload: Option<&Payload>) -> Result<Self, EventError> {
        let described = || match payload {
            Some(p) => format!("{address} {p}"),
            None => address.to_string(),
        };
        let invalid = |reason: String| EventError::Validation {
            event: described(),
            reason,
        };
        let int = |segment: &str| {
            segment
                .parse::<i64>()
                .map_err(|_| invalid(format!("'{segment}' is not an integer")))
        };
        let float = |segment: &str| {
            segment
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(format!("'{segment}' is not a finite number")))
        };

        let segments: Vec<&str> = address.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["mode", name] => name
                .parse()
                .map(ControlEvent::Mode)
                .map_err(|_| invalid(format!("unknown mode '{name}'"))),
            ["preset", id] => Ok(ControlEvent::Preset(int(*id)?)),
            ["stomp", id, "enable"] => Ok(ControlEvent::StompEnable(int(*id)?)),
            ["stomp", id, "select"] => Ok(ControlEvent::StompSelect(int(*id)?)),
            ["looper", command] => command
                .parse()
                .map(ControlEvent::Looper)
                .map_err(EventError::UnsupportedCommand),
            ["tap", rest @ ..] if rest.len() <= 1 => {
                let value = match (payload, rest.first()) {
                    (Some(p), _) => p
                        .as_int()
                        .ok_or_else(|| invalid(format!("payload '{p}' is not an integer")))?,
                    (None, Some(segment)) => int(*segment)?,
                    (None, None) => return Err(invalid("missing tap value".into())),
                };
                Ok(ControlEvent::Tap(value))
            }
            ["slider", id, rest @ ..] if rest.len() <= 1 => {
                let id = int(*id)?;
                let value = match (payload, rest.first()) {
                    (Some(p), _) => p
                        .as_float()
                        .ok_or_else(|| invalid(format!("payload '{p}' is not a number")))?,
                    (None, Some(segment)) => float(*segment)?,
                    (None, None) => return Err(invalid("missing slider value".into())),
                };
                Ok(ControlEvent::Slider { id, value })
            }
            _ => Err(invalid("unknown address".into())),
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::Mode(mode) => write!(f, "mode/{mode}"),
            ControlEvent::Preset(id) => write!(f, "preset/{id}"),
            ControlEvent::StompEnable(id) => write!(f, "stomp/{id}/enable"),
            ControlEvent::StompSelect(id) => write!(f, "stomp/{id}/select"),
            ControlEvent::Looper(cmd) => write!(f, "looper/{cmd}"),
            ControlEvent::Tap(v) => write!(f, "tap/{v}"),
            ControlEvent::Slider { id, value } => write!(f, "slider/{id}/{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(address: &str) -> Result<ControlEvent, EventError> {
        ControlEvent::parse(address, None)
    }

    #[test]
    fn parses_every_address_kind() {
        assert_eq!(parse("/mode/looper"), Ok(ControlEvent::Mode(Mode::Looper)));
        assert_eq!(parse("preset/12"), Ok(ControlEvent::Preset(12)));
        assert_eq!(parse("/stomp/3/enable"), Ok(ControlEvent::StompEnable(3)));
        assert_eq!(parse("/stomp/3/select"), Ok(ControlEvent::StompSelect(3)));
        assert_eq!(
            parse("/looper/overdub"),
            Ok(ControlEvent::Looper(LooperCommand::Overdub))
        );
        assert_eq!(parse("/tap/5"), Ok(ControlEvent::Tap(5)));
        assert_eq!(
            parse("/slider/2/0.25"),
            Ok(ControlEvent::Slider { id: 2, value: 0.25 })
        );
    }

    #[test]
    fn payload_overrides_tap_segment() {
        let event = ControlEvent::parse("/tap/1", Some(&Payload::Int(120)));
        assert_eq!(event, Ok(ControlEvent::Tap(120)));
        let event = ControlEvent::parse("/tap", Some(&Payload::Float(97.8)));
        assert_eq!(event, Ok(ControlEvent::Tap(97)));
        let event = ControlEvent::parse("/tap", Some(&Payload::Text("7".into())));
        assert_eq!(event, Ok(ControlEvent::Tap(7)));
    }

    #[test]
    fn slider_value_from_payload() {
        let event = ControlEvent::parse("/slider/4", Some(&Payload::Float(0.5)));
        assert_eq!(event, Ok(ControlEvent::Slider { id: 4, value: 0.5 }));
    }

    #[test]
    fn non_integer_operands_are_validation_errors() {
        for address in ["/preset/x", "/stomp/one/enable", "/tap/fast", "/slider/a/0.5"] {
            assert!(
                matches!(parse(address), Err(EventError::Validation { .. })),
                "{address}"
            );
        }
        assert!(matches!(
            ControlEvent::parse("/tap", Some(&Payload::Text("soon".into()))),
            Err(EventError::Validation { .. })
        ));
        assert!(matches!(
            parse("/slider/1/loud"),
            Err(EventError::Validation { .. })
        ));
    }

    #[test]
    fn non_finite_slider_values_are_rejected() {
        for address in ["/slider/1/NaN", "/slider/1/inf", "/slider/1/-inf", "/slider/1/1e40"] {
            assert!(
                matches!(parse(address), Err(EventError::Validation { .. })),
                "{address}"
            );
        }
        for payload in [
            Payload::Float(f64::NAN),
            Payload::Float(1e300),
            Payload::Text("NaN".into()),
        ] {
            assert!(matches!(
                ControlEvent::parse("/slider/1", Some(&payload)),
                Err(EventError::Validation { .. })
            ));
        }
    }

    #[test]
    fn unknown_mode_is_validation_error() {
        match parse("/mode/foo") {
            Err(EventError::Validation { event, reason }) => {
                assert_eq!(event, "/mode/foo");
                assert!(reason.contains("foo"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_looper_command_is_unsupported() {
        assert_eq!(
            parse("/looper/jump"),
            Err(EventError::UnsupportedCommand("jump".into()))
        );
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        for address in ["", "/", "/volume/3", "/stomp/3", "/stomp/3/press", "/tap", "/slider/1"] {
            assert!(
                matches!(parse(address), Err(EventError::Validation { .. })),
                "{address:?}"
            );
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let event = ControlEvent::StompSelect(4);
        assert_eq!(event.to_string(), "stomp/4/select");
        assert_eq!(parse(&event.to_string()), Ok(event));
    }
}
