//! Pager: broadcast one-line messages to every connected user.
//!
//! Outbound `pager.send({}, text)` asks the server to publish; the server
//! fans it out as `pager.message`, whose shape depends on the deployment
//! (see [`PagerArity`]).

use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{ClientConfig, PagerArity};
use crate::credentials::CredentialSource;
use crate::router::{Handshake, Outbox, Router, RouterError};
use crate::transport::Events;
use crate::view::View;

pub const PAGER_MESSAGE: &str = "pager.message";
pub const PAGER_SEND: &str = "pager.send";

/// Connect to the configured endpoint with the pager handler installed.
///
/// When the profile enables the handshake and no credential source is
/// given, the hello frame carries `null`.
#[must_use]
pub fn connect(
    config: &ClientConfig,
    view: Rc<dyn View>,
    credentials: Option<Box<dyn CredentialSource>>,
) -> (Router, Events) {
    let handshake = config.profile.handshake.then(|| {
        let handshake = match credentials {
            Some(credentials) => Handshake::from_boxed(credentials),
            None => Handshake::new(|_: &str| None::<String>),
        };
        handshake.with_credential_name(config.credential_name.clone())
    });

    let (mut router, events) = Router::connect(&config.url, Rc::clone(&view), handshake);
    install(&mut router, config.profile.pager_arity, view);
    (router, events)
}

/// Register the `pager.message` handler on `router`.
pub fn install(router: &mut Router, arity: PagerArity, view: Rc<dyn View>) {
    router.on(PAGER_MESSAGE, move |args: &[Value], _: &mut Outbox<'_>| {
        view.set_pager_text(&render_message(arity, args));
    });
}

/// Text shown for a `pager.message` payload.
///
/// Never fails: missing arguments render as empty text, and a two-argument
/// deployment that sends a single argument shows that argument alone.
#[must_use]
pub fn render_message(arity: PagerArity, args: &[Value]) -> String {
    match (arity, args) {
        (PagerArity::Two, [username, text, ..]) => {
            format!("{}: {}", display_text(username), display_text(text))
        }
        (PagerArity::Two, [text]) => {
            warn!("pager.message arrived without a username");
            display_text(text)
        }
        (PagerArity::One, [text, ..]) => display_text(text),
        (_, []) => String::new(),
    }
}

/// Ask `prompt` for a message and publish it.
///
/// Returns `Ok(false)` when the prompt yields nothing or an empty string.
///
/// # Errors
///
/// Propagates [`RouterError`] from [`Router::send`].
pub fn send_prompted<F>(router: &mut Router, prompt: F) -> Result<bool, RouterError>
where
    F: FnOnce() -> Option<String>,
{
    let Some(text) = prompt().filter(|text| !text.is_empty()) else {
        return Ok(false);
    };
    router.send(PAGER_SEND, &[Value::Object(Map::new()), Value::String(text)])?;
    Ok(true)
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "pager_test.rs"]
mod tests;
