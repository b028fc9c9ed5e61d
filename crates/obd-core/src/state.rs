//! Link state model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the adapter link currently is in its lifecycle
///
/// Owned by the reconnect supervisor. Everything else only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No transport; waiting out the retry delay
    #[default]
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Transport up, AT init sequence running
    Handshaking,
    /// At least one batch sent on this connection
    Polling,
    /// Last attempt failed; about to drop back to Disconnected
    Faulted,
}

impl LinkState {
    pub fn is_polling(self) -> bool {
        self == LinkState::Polling
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Handshaking => "handshaking",
            LinkState::Polling => "polling",
            LinkState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
