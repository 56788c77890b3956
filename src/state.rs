//! Connection lifecycle state.
//!
//! `Connecting --(open)--> Connected --(close/error)--> Closed`. `Closed` is
//! terminal; a new router must be constructed to connect again.

use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport requested, not yet open. Initial state.
    #[default]
    Connecting,
    /// Transport open; sends are accepted.
    Connected,
    /// Transport closed or failed. Terminal.
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }

    /// State after the transport reports open. Ignored once closed.
    #[must_use]
    pub fn opened(self) -> Self {
        match self {
            Self::Connecting | Self::Connected => Self::Connected,
            Self::Closed => Self::Closed,
        }
    }

    /// State after the transport reports close or error.
    #[must_use]
    pub fn closed(self) -> Self {
        Self::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
