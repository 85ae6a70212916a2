//! Inbound remote commands.
//!
//! The command topic carries a JSON object.  Two keys are understood:
//!
//! | Key       | Action                                           |
//! |-----------|--------------------------------------------------|
//! | `reset`   | restore factory defaults, persist, restart       |
//! | `restart` | restart                                          |
//!
//! A key triggers its command whatever its value, except an explicit
//! `false`.  When both are present `reset` wins (it restarts anyway).

use serde_json::Value;

use crate::error::CommandError;

/// Commands the remote side can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    Reset,
    Restart,
}

impl NodeCommand {
    /// Parse a command-topic payload.
    ///
    /// A key counts as requested whatever its value, except an explicit
    /// `false`, which reads as absent rather than as plain key presence.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(payload) else {
            return Err(CommandError::Malformed);
        };
        let requested = |key: &str| map.get(key).is_some_and(|v| *v != Value::Bool(false));

        if requested("reset") {
            Ok(Self::Reset)
        } else if requested("restart") {
            Ok(Self::Restart)
        } else {
            Err(CommandError::Unrecognised)
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::Restart => "Restart",
        }
    }
}
