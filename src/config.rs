//! Deployment profiles and client configuration.
//!
//! Two deployments of the same server exist. One authenticates each socket
//! with an `auth.hello` handshake and sends `pager.message` as
//! `(username, text)`; the other skips the handshake and sends `(text)`.
//! Both axes are exposed so either can be set on its own.

use clap::ValueEnum;

/// Endpoint used when none is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Cookie entry that carries the session id.
pub const DEFAULT_CREDENTIAL_NAME: &str = "sid";

/// Named deployment variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Deployment {
    /// Handshake enabled, two-argument `pager.message`.
    #[default]
    Hello,
    /// No handshake, one-argument `pager.message`.
    Anonymous,
}

/// Number of positional arguments the server sends with `pager.message`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PagerArity {
    /// `(text)`
    #[value(name = "1")]
    One,
    /// `(username, text)`
    #[value(name = "2")]
    Two,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Profile {
    /// Send `auth.hello` with the session credential on open.
    pub handshake: bool,
    pub pager_arity: PagerArity,
}

impl Profile {
    pub const HELLO: Self = Self {
        handshake: true,
        pager_arity: PagerArity::Two,
    };

    pub const ANONYMOUS: Self = Self {
        handshake: false,
        pager_arity: PagerArity::One,
    };

    #[must_use]
    pub fn with_handshake(self, handshake: bool) -> Self {
        Self { handshake, ..self }
    }

    #[must_use]
    pub fn with_pager_arity(self, pager_arity: PagerArity) -> Self {
        Self {
            pager_arity,
            ..self
        }
    }
}

impl From<Deployment> for Profile {
    fn from(deployment: Deployment) -> Self {
        match deployment {
            Deployment::Hello => Self::HELLO,
            Deployment::Anonymous => Self::ANONYMOUS,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Deployment::default().into()
    }
}

/// Everything needed to open a pager session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Websocket endpoint, e.g. `ws://localhost:8000/ws`.
    pub url: String,
    pub profile: Profile,
    /// Cookie entry read for the handshake credential.
    pub credential_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            profile: Profile::default(),
            credential_name: DEFAULT_CREDENTIAL_NAME.to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
