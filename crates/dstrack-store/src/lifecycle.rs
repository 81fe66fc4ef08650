//! Run status state machine.

use std::fmt;
use std::str::FromStr;

use dstrack_core::errors::{ErrorInfo, TrackError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Running,
        RunStatus::Scheduled,
        RunStatus::Finished,
        RunStatus::Failed,
        RunStatus::Killed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }

    /// Finished, failed and killed runs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Failed | RunStatus::Killed
        )
    }

    /// Only running runs accept tags, inputs and artifacts.
    pub fn accepts_writes(&self) -> bool {
        matches!(self, RunStatus::Running)
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Scheduled, RunStatus::Running) => true,
            (RunStatus::Running | RunStatus::Scheduled, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Returns `next` if the transition is allowed, else a lifecycle error.
    pub fn transition(&self, next: RunStatus) -> Result<RunStatus, TrackError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TrackError::Lifecycle(
                ErrorInfo::new(
                    "store.run_transition",
                    format!("cannot move run from {self} to {next}"),
                )
                .with_context("from", self.as_str())
                .with_context("to", next.as_str()),
            ))
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                TrackError::Store(
                    ErrorInfo::new("store.run_status", "unknown run status")
                        .with_context("status", s)
                        .with_hint("one of RUNNING, SCHEDULED, FINISHED, FAILED, KILLED"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for from in [RunStatus::Finished, RunStatus::Failed, RunStatus::Killed] {
            for to in RunStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn running_ends_in_any_terminal_state() {
        assert!(RunStatus::Running.can_transition_to(RunStatus::Finished));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Killed));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Scheduled));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Scheduled.can_transition_to(RunStatus::Running));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("finished".parse::<RunStatus>().unwrap(), RunStatus::Finished);
        assert_eq!(" Killed ".parse::<RunStatus>().unwrap(), RunStatus::Killed);
        assert_eq!("done".parse::<RunStatus>().unwrap_err().code(), "store.run_status");
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = RunStatus::Failed.transition(RunStatus::Finished).unwrap_err();
        assert_eq!(err.code(), "store.run_transition");
        assert_eq!(err.info().context["from"], "FAILED");
        assert_eq!(err.info().context["to"], "FINISHED");
    }
}
