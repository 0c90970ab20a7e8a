//! The poll loop as a pure state machine.
//!
//! [`transition`] only decides. Logging in, fetching and sleeping happen in
//! [`super::Poller`], which turns their outcome into a [`PollEvent`].

use crate::error::FailureKind;
use std::time::Duration;

/// Where a sleep leads once it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Scrape again with the held session, if there still is one
    Reuse,
    /// Log in again
    Relogin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    NeedLogin,
    AuthenticatedIdle { fresh: bool },
    Scraping { fresh: bool },
    ValidatingResponse { fresh: bool },
    Updating,
    Sleeping { duration: Duration, then: Wake },
    /// Terminal
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    LoggedIn,
    Begin { session_valid: bool },
    Fetched,
    LoginPageDetected,
    PagesValid,
    Updated,
    Woke { session_valid: bool },
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub poll_interval: Duration,
    pub relogin_interval: Duration,
}

pub fn transition(state: &PollState, event: &PollEvent, timing: &PollTiming) -> PollState {
    use PollEvent::*;
    use PollState::*;

    let poll = Sleeping {
        duration: timing.poll_interval,
        then: Wake::Reuse,
    };

    match (state, event) {
        (Stopped, _) => Stopped,

        (_, Failed(FailureKind::Authentication)) => Stopped,
        (_, Failed(FailureKind::SessionExpired)) => NeedLogin,
        (NeedLogin | Scraping { .. }, Failed(FailureKind::DeviceUnavailable)) => poll,

        (NeedLogin, LoggedIn) => AuthenticatedIdle { fresh: true },

        (AuthenticatedIdle { fresh }, Begin { session_valid: true }) => Scraping { fresh: *fresh },
        (AuthenticatedIdle { .. }, Begin { session_valid: false }) => NeedLogin,

        (Scraping { fresh }, Fetched) => ValidatingResponse { fresh: *fresh },

        (ValidatingResponse { fresh: true }, LoginPageDetected) => Sleeping {
            duration: timing.relogin_interval,
            then: Wake::Relogin,
        },
        (ValidatingResponse { fresh: false }, LoginPageDetected) => NeedLogin,
        (ValidatingResponse { .. }, PagesValid) => Updating,

        (Updating, Updated) => poll,

        (Sleeping { then: Wake::Reuse, .. }, Woke { session_valid: true }) => {
            AuthenticatedIdle { fresh: false }
        }
        (Sleeping { then: Wake::Reuse, .. }, Woke { session_valid: false }) => NeedLogin,
        (Sleeping { then: Wake::Relogin, .. }, Woke { .. }) => NeedLogin,

        // back to idle after a short pause, so a repeating failure can't spin
        (_, Failed(FailureKind::Unclassified)) => Sleeping {
            duration: timing.relogin_interval,
            then: Wake::Reuse,
        },

        // anything out of order
        _ => AuthenticatedIdle { fresh: false },
    }
}
