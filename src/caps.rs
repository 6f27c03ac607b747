//! IRCv3 capability negotiation handlers.
//!
//! A [`CapHandler`] is offered every step of the `CAP` sub-negotiation
//! (and every other line received before registration completes) until it
//! reports that it is done. Once all handlers are done the registration
//! state machine sends `CAP END`.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use crate::command::Command;
use crate::error::RegistrationError;
use crate::line::Line;

/// What a handler may look at and do while it is consulted.
#[derive(Debug)]
pub struct CapContext<'a> {
    enabled: &'a [String],
    outgoing: Vec<Command>,
}

impl<'a> CapContext<'a> {
    pub(crate) fn new(enabled: &'a [String]) -> Self {
        Self {
            enabled,
            outgoing: Vec::new(),
        }
    }

    /// Queue a command to go out immediately, ahead of the paced queue.
    pub fn send(&mut self, command: Command) {
        self.outgoing.push(command);
    }

    /// Capabilities acknowledged so far.
    pub fn enabled(&self) -> &[String] {
        self.enabled
    }

    pub(crate) fn into_outgoing(self) -> Vec<Command> {
        self.outgoing
    }
}

/// A participant in capability negotiation.
///
/// Every method returns `Ok(true)` once the handler has nothing left to do.
/// An error aborts registration.
pub trait CapHandler: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// The full `CAP LS` list arrived.
    fn handle_ls(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError>;

    /// The server acknowledged `caps`.
    fn handle_ack(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError>;

    /// The server refused `caps`.
    fn handle_nak(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError>;

    /// Any other line received while registration is in progress.
    fn handle_unknown(
        &mut self,
        ctx: &mut CapContext<'_>,
        line: &Line,
    ) -> Result<bool, RegistrationError>;
}

/// Name part of a `CAP LS` entry (`sasl=PLAIN,EXTERNAL` → `sasl`).
pub fn cap_name(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(name, _)| name)
}

/// Value part of a `CAP LS` entry, if any.
pub fn cap_value(entry: &str) -> Option<&str> {
    entry.split_once('=').map(|(_, value)| value)
}

/// Whether `caps` lists `name`, ignoring values and `-` removal markers.
pub fn has_cap(caps: &[String], name: &str) -> bool {
    caps.iter()
        .any(|entry| cap_name(entry.trim_start_matches('-')).eq_ignore_ascii_case(name))
}

pub(crate) fn handler_error(handler: &str, reason: impl Into<String>) -> RegistrationError {
    RegistrationError::Capability {
        handler: handler.to_string(),
        reason: reason.into(),
    }
}

/// Requests one capability if the server offers it.
#[derive(Clone, Debug)]
pub struct EnableCapHandler {
    cap: String,
    ignore_fail: bool,
}

impl EnableCapHandler {
    /// Missing or refused capabilities are tolerated.
    pub fn new(cap: &str) -> Self {
        Self {
            cap: cap.to_string(),
            ignore_fail: true,
        }
    }

    /// Missing or refused capabilities abort registration.
    pub fn required(cap: &str) -> Self {
        Self {
            cap: cap.to_string(),
            ignore_fail: false,
        }
    }

    fn give_up(&self, reason: &str) -> Result<bool, RegistrationError> {
        if self.ignore_fail {
            Ok(true)
        } else {
            Err(handler_error(&self.cap, reason))
        }
    }
}

impl CapHandler for EnableCapHandler {
    fn name(&self) -> &str {
        &self.cap
    }

    fn handle_ls(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, &self.cap) {
            ctx.send(Command::CapReq(vec![self.cap.clone()]));
            Ok(false)
        } else {
            self.give_up("not offered by server")
        }
    }

    fn handle_ack(
        &mut self,
        _ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(has_cap(caps, &self.cap))
    }

    fn handle_nak(
        &mut self,
        _ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, &self.cap) {
            self.give_up("refused by server")
        } else {
            Ok(false)
        }
    }

    fn handle_unknown(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _line: &Line,
    ) -> Result<bool, RegistrationError> {
        Ok(false)
    }
}

/// Upgrades the connection with `STARTTLS` when the server offers `tls`.
///
/// The upgrade itself happens in the I/O shell on `670`; this handler only
/// asks for it and waits for the confirmation.
#[derive(Clone, Debug, Default)]
pub struct TlsCapHandler {
    ignore_fail: bool,
    requested: bool,
}

impl TlsCapHandler {
    pub fn new() -> Self {
        Self {
            ignore_fail: true,
            requested: false,
        }
    }

    /// Registration fails if the server cannot upgrade.
    pub fn required() -> Self {
        Self {
            ignore_fail: false,
            requested: false,
        }
    }
}

impl CapHandler for TlsCapHandler {
    fn name(&self) -> &str {
        "tls"
    }

    fn handle_ls(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, "tls") {
            ctx.send(Command::StartTls);
            self.requested = true;
            Ok(false)
        } else if self.ignore_fail {
            Ok(true)
        } else {
            Err(handler_error("tls", "not offered by server"))
        }
    }

    fn handle_ack(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(false)
    }

    fn handle_nak(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(false)
    }

    fn handle_unknown(
        &mut self,
        _ctx: &mut CapContext<'_>,
        line: &Line,
    ) -> Result<bool, RegistrationError> {
        if !self.requested {
            return Ok(false);
        }
        match line.numeric() {
            // RPL_STARTTLS: the shell has already upgraded the socket.
            Some(670) => Ok(true),
            // ERR_STARTTLS
            Some(691) if self.ignore_fail => Ok(true),
            Some(691) => Err(handler_error("tls", line.last_param().unwrap_or("STARTTLS failed"))),
            _ => Ok(false),
        }
    }
}
