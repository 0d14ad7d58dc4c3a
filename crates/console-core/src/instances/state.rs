//! Instance lifecycle state machine.
//!
//! ```text
//! Stopped --start--> Running
//! Running --stop---> Stopped
//! Running --restart-> Running
//! ```
//!
//! `Disabled` accepts no action. The backend's `running` flag wins over
//! `enabled`: a disabled instance that is still alive reads as `Running`.

use secretary_client::BotInstance;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Disabled,
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceAction {
    Start,
    Stop,
    Restart,
}

impl InstanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceAction::Start => "start",
            InstanceAction::Stop => "stop",
            InstanceAction::Restart => "restart",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(InstanceAction::Start),
            "stop" => Ok(InstanceAction::Stop),
            "restart" => Ok(InstanceAction::Restart),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// An action the current state does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: InstanceState,
    pub action: InstanceAction,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            InstanceState::Disabled => write!(f, "instance is disabled"),
            InstanceState::Stopped => write!(f, "instance is not running"),
            InstanceState::Running => write!(f, "instance is already running"),
        }
    }
}

impl InstanceState {
    pub fn of(instance: &BotInstance) -> Self {
        Self::from_flags(&instance.id, instance.enabled, instance.running)
    }

    pub fn from_flags(id: &str, enabled: bool, running: bool) -> Self {
        match (enabled, running) {
            (true, true) => InstanceState::Running,
            (false, true) => {
                warn!(instance = id, "Instance is disabled but still running");
                InstanceState::Running
            }
            (true, false) => InstanceState::Stopped,
            (false, false) => InstanceState::Disabled,
        }
    }

    /// State the backend should report after `action` succeeds.
    pub fn after(self, action: InstanceAction) -> Result<InstanceState, TransitionError> {
        match (self, action) {
            (InstanceState::Stopped, InstanceAction::Start) => Ok(InstanceState::Running),
            (InstanceState::Running, InstanceAction::Stop) => Ok(InstanceState::Stopped),
            (InstanceState::Running, InstanceAction::Restart) => Ok(InstanceState::Running),
            (from, action) => Err(TransitionError { from, action }),
        }
    }

    /// Actions offered in this state.
    pub fn actions(self) -> &'static [InstanceAction] {
        match self {
            InstanceState::Disabled => &[],
            InstanceState::Stopped => &[InstanceAction::Start],
            InstanceState::Running => &[InstanceAction::Stop, InstanceAction::Restart],
        }
    }

    pub fn badge(self) -> StatusBadge {
        match self {
            InstanceState::Running => StatusBadge {
                state: self,
                color: BadgeColor::Green,
                pulsing: true,
                muted: false,
            },
            InstanceState::Stopped => StatusBadge {
                state: self,
                color: BadgeColor::Gray,
                pulsing: false,
                muted: false,
            },
            InstanceState::Disabled => StatusBadge {
                state: self,
                color: BadgeColor::Gray,
                pulsing: false,
                muted: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Green,
    Gray,
}

/// How the state indicator is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub state: InstanceState,
    pub color: BadgeColor,
    pub pulsing: bool,
    pub muted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_to_state() {
        assert_eq!(InstanceState::from_flags("a", true, true), InstanceState::Running);
        assert_eq!(InstanceState::from_flags("a", true, false), InstanceState::Stopped);
        assert_eq!(InstanceState::from_flags("a", false, false), InstanceState::Disabled);
        assert_eq!(InstanceState::from_flags("a", false, true), InstanceState::Running);
    }

    #[test]
    fn test_transitions() {
        use InstanceAction::*;
        use InstanceState::*;

        assert_eq!(Stopped.after(Start), Ok(Running));
        assert_eq!(Running.after(Stop), Ok(Stopped));
        assert_eq!(Running.after(Restart), Ok(Running));

        let err = Disabled.after(Start).unwrap_err();
        assert_eq!(err.to_string(), "instance is disabled");
        assert!(Stopped.after(Stop).is_err());
        assert!(Stopped.after(Restart).is_err());
        assert!(Running.after(Start).is_err());
    }

    #[test]
    fn test_badges() {
        let running = InstanceState::Running.badge();
        assert_eq!(running.color, BadgeColor::Green);
        assert!(running.pulsing);

        let stopped = InstanceState::Stopped.badge();
        assert_eq!(stopped.color, BadgeColor::Gray);
        assert!(!stopped.pulsing && !stopped.muted);

        assert!(InstanceState::Disabled.badge().muted);
    }
}
