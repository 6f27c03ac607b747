//! SASL authentication during capability negotiation.
//!
//! Only the PLAIN mechanism is driven by the client; the encoding helpers
//! follow RFC 4616 and the IRCv3 chunking rules.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>
//!
//! # Example
//!
//! ```
//! use slirc_client::sasl::{chunk_response, encode_plain};
//!
//! let encoded = encode_plain("myuser", "mypassword");
//! let chunks: Vec<&str> = chunk_response(&encoded).collect();
//! assert_eq!(chunks, vec![encoded.as_str()]);
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, warn};

use crate::caps::{has_cap, handler_error, CapContext, CapHandler};
use crate::command::Command;
use crate::error::RegistrationError;
use crate::line::Line;

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// SASL responses that exceed this length must be split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Encode credentials for the PLAIN mechanism.
///
/// The PLAIN mechanism encodes: `authzid NUL authcid NUL password`.
/// For IRC, the authorization identity repeats the account name.
pub fn encode_plain(username: &str, password: &str) -> String {
    let payload = format!("{}\0{}\0{}", username, username, password);
    BASE64.encode(payload.as_bytes())
}

/// Split an encoded response into `AUTHENTICATE` payloads.
///
/// A response whose length is a multiple of the chunk size is followed by
/// a lone `+` so the server knows it ended.
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    // base64 output is ASCII, so every byte offset is a char boundary
    let chunks = (0..encoded.len())
        .step_by(SASL_CHUNK_SIZE)
        .map(move |start| &encoded[start..(start + SASL_CHUNK_SIZE).min(encoded.len())]);
    let terminator = (encoded.len() % SASL_CHUNK_SIZE == 0).then_some("+");
    chunks.chain(terminator)
}

/// Decode a base64-encoded SASL challenge. `+` is the empty challenge.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(encoded)
}

/// SASL authentication state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SaslState {
    /// Initial state, not yet started.
    Initial,
    /// Sent `CAP REQ :sasl`.
    Requested,
    /// Sent `AUTHENTICATE PLAIN`, waiting for the empty challenge.
    MechanismSent,
    /// Sent credentials, waiting for the result.
    CredentialsSent,
    /// Authentication succeeded.
    Success,
    /// Authentication failed.
    Failed(String),
}

impl SaslState {
    /// Check if authentication is complete (success or failure).
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Success | Self::Failed(_))
    }

    /// Check if authentication succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Logs in with `SASL PLAIN` before registration completes.
#[derive(Clone, Debug)]
pub struct SaslCapHandler {
    account: String,
    password: String,
    ignore_fail: bool,
    state: SaslState,
}

impl SaslCapHandler {
    /// Authentication failures abort registration.
    pub fn new(account: &str, password: &str) -> Self {
        Self {
            account: account.to_string(),
            password: password.to_string(),
            ignore_fail: false,
            state: SaslState::Initial,
        }
    }

    /// Carry on unauthenticated if SASL is unavailable or fails.
    pub fn ignore_fail(mut self) -> Self {
        self.ignore_fail = true;
        self
    }

    pub fn state(&self) -> &SaslState {
        &self.state
    }

    fn fail(&mut self, reason: &str) -> Result<bool, RegistrationError> {
        self.state = SaslState::Failed(reason.to_string());
        if self.ignore_fail {
            warn!(reason, "SASL failed, continuing without it");
            Ok(true)
        } else {
            Err(handler_error("sasl", reason))
        }
    }
}

impl CapHandler for SaslCapHandler {
    fn name(&self) -> &str {
        "sasl"
    }

    fn handle_ls(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, "sasl") {
            ctx.send(Command::CapReq(vec!["sasl".to_string()]));
            self.state = SaslState::Requested;
            Ok(false)
        } else {
            self.fail("sasl not offered by server")
        }
    }

    fn handle_ack(
        &mut self,
        ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, "sasl") && self.state == SaslState::Requested {
            ctx.send(Command::Authenticate("PLAIN".to_string()));
            self.state = SaslState::MechanismSent;
        }
        Ok(false)
    }

    fn handle_nak(
        &mut self,
        _ctx: &mut CapContext<'_>,
        caps: &[String],
    ) -> Result<bool, RegistrationError> {
        if has_cap(caps, "sasl") {
            return self.fail("sasl refused by server");
        }
        Ok(false)
    }

    fn handle_unknown(
        &mut self,
        ctx: &mut CapContext<'_>,
        line: &Line,
    ) -> Result<bool, RegistrationError> {
        if line.command == "AUTHENTICATE" {
            if self.state == SaslState::MechanismSent && line.param(0) == Some("+") {
                let encoded = encode_plain(&self.account, &self.password);
                for chunk in chunk_response(&encoded) {
                    ctx.send(Command::Authenticate(chunk.to_string()));
                }
                self.state = SaslState::CredentialsSent;
            }
            return Ok(false);
        }

        match line.numeric() {
            // RPL_SASLSUCCESS
            Some(903) => {
                debug!(account = %self.account, "SASL authentication succeeded");
                self.state = SaslState::Success;
                Ok(true)
            }
            // RPL_LOGGEDIN arrives before 903; nothing to do yet.
            Some(900) => Ok(false),
            // ERR_NICKLOCKED, ERR_SASLFAIL, ERR_SASLTOOLONG, ERR_SASLABORTED, ERR_SASLALREADY
            Some(code @ (902 | 904 | 905 | 906 | 907)) => {
                let reason = line
                    .last_param()
                    .map_or_else(|| format!("numeric {}", code), str::to_string);
                self.fail(&reason)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain() {
        let encoded = encode_plain("jilles", "sesame");
        assert_eq!(decode_base64(&encoded).unwrap(), b"jilles\0jilles\0sesame");
    }

    #[test]
    fn test_chunking() {
        let short = "abcd";
        assert_eq!(chunk_response(short).collect::<Vec<_>>(), vec!["abcd"]);

        let exact = "a".repeat(SASL_CHUNK_SIZE);
        let chunks: Vec<_> = chunk_response(&exact).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "+");

        let long = "b".repeat(SASL_CHUNK_SIZE + 10);
        let chunks: Vec<_> = chunk_response(&long).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 10);
    }

    #[test]
    fn test_handler_full_exchange() {
        let enabled = Vec::new();
        let mut handler = SaslCapHandler::new("bot", "pw");

        let mut ctx = CapContext::new(&enabled);
        assert_eq!(handler.handle_ls(&mut ctx, &["sasl=PLAIN".to_string()]), Ok(false));
        assert_eq!(
            ctx.into_outgoing(),
            vec![Command::CapReq(vec!["sasl".to_string()])]
        );

        let mut ctx = CapContext::new(&enabled);
        assert_eq!(handler.handle_ack(&mut ctx, &["sasl".to_string()]), Ok(false));
        assert_eq!(
            ctx.into_outgoing(),
            vec![Command::Authenticate("PLAIN".to_string())]
        );

        let mut ctx = CapContext::new(&enabled);
        let challenge = Line::parse("AUTHENTICATE +").unwrap();
        assert_eq!(handler.handle_unknown(&mut ctx, &challenge), Ok(false));
        assert_eq!(
            ctx.into_outgoing(),
            vec![Command::Authenticate(encode_plain("bot", "pw"))]
        );

        let mut ctx = CapContext::new(&enabled);
        let success = Line::parse(":irc.example.net 903 bot :SASL authentication successful")
            .unwrap();
        assert_eq!(handler.handle_unknown(&mut ctx, &success), Ok(true));
        assert!(handler.state().is_success());
    }

    #[test]
    fn test_handler_failure() {
        let enabled = Vec::new();
        let failure = Line::parse(":irc.example.net 904 bot :SASL authentication failed").unwrap();

        let mut strict = SaslCapHandler::new("bot", "bad");
        let mut ctx = CapContext::new(&enabled);
        assert!(strict.handle_unknown(&mut ctx, &failure).is_err());

        let mut lenient = SaslCapHandler::new("bot", "bad").ignore_fail();
        assert_eq!(lenient.handle_unknown(&mut ctx, &failure), Ok(true));
        assert!(lenient.state().is_complete());
    }
}
