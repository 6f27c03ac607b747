//! Session configuration.

use std::time::Duration;

#[cfg(feature = "runtime")]
use std::sync::Arc;

use crate::caps::{CapHandler, EnableCapHandler, TlsCapHandler};
use crate::command::LineFormatter;
use crate::sasl::SaslCapHandler;
use crate::state::RegistrationConfig;

/// WEBIRC gateway credentials, sent before anything else.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebIrcConfig {
    pub password: String,
    /// Gateway name.
    pub user: String,
    /// Real client hostname.
    pub host: String,
    /// Real client address.
    pub ip: String,
}

/// A capability to negotiate during registration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CapRequest {
    /// Request the capability if offered; carry on if not.
    Enable(String),
    /// Upgrade with `STARTTLS` if the server offers `tls`.
    Tls,
    /// Log in with `SASL PLAIN`. Failure aborts registration.
    Sasl { account: String, password: String },
}

impl CapRequest {
    fn handler(&self) -> Box<dyn CapHandler> {
        match self {
            CapRequest::Enable(cap) => Box::new(EnableCapHandler::new(cap)),
            CapRequest::Tls => Box::new(TlsCapHandler::new()),
            CapRequest::Sasl { account, password } => {
                Box::new(SaslCapHandler::new(account, password))
            }
        }
    }
}

/// A channel to join once registered.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AutoJoin {
    pub name: String,
    pub key: Option<String>,
}

impl AutoJoin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: None,
        }
    }
}

/// Everything a session needs to connect and run.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Connect over TLS from the start.
    pub tls: bool,
    /// Custom TLS settings; webpki roots are used when absent.
    #[cfg(feature = "runtime")]
    #[cfg_attr(feature = "serde", serde(skip))]
    pub tls_config: Option<Arc<tokio_rustls::rustls::ClientConfig>>,

    pub nickname: String,
    /// Username (ident).
    pub username: String,
    pub realname: String,
    /// Server password.
    pub password: Option<String>,
    pub webirc: Option<WebIrcConfig>,
    /// Retry with `nick1`, `nick2`, ... when the nick is taken.
    pub auto_nick_change: bool,
    pub cap_enabled: bool,
    pub capabilities: Vec<CapRequest>,
    /// Sent to NickServ as `IDENTIFY` after registration.
    pub nickserv_password: Option<String>,
    pub auto_join: Vec<AutoJoin>,

    /// Pause after each queued line.
    pub message_delay: Duration,
    /// Idle time after which a liveness `PING` is sent.
    pub socket_timeout: Duration,
    /// Maximum line length including CRLF.
    pub max_line_length: usize,
    pub auto_split_message: bool,
    pub split_suffix: String,

    /// CTCP `VERSION` reply.
    pub version: String,
    /// CTCP `FINGER` reply.
    pub finger: String,
    /// Used until the server's `CHANTYPES` arrives.
    pub channel_prefixes: String,
    /// WHATWG label of the wire encoding.
    pub encoding: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 6667,
            tls: false,
            #[cfg(feature = "runtime")]
            tls_config: None,
            nickname: String::new(),
            username: String::new(),
            realname: String::new(),
            password: None,
            webirc: None,
            auto_nick_change: false,
            cap_enabled: true,
            capabilities: Vec::new(),
            nickserv_password: None,
            auto_join: Vec::new(),
            message_delay: Duration::from_secs(1),
            socket_timeout: Duration::from_secs(5 * 60),
            max_line_length: 512,
            auto_split_message: true,
            split_suffix: String::new(),
            version: concat!("slirc-client ", env!("CARGO_PKG_VERSION")).to_string(),
            finger: "slirc-client".to_string(),
            channel_prefixes: "#&".to_string(),
            encoding: "utf-8".to_string(),
        }
    }
}

impl ClientConfig {
    /// A config with the usual identity, everything else default.
    pub fn new(host: &str, port: u16, nickname: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            nickname: nickname.to_string(),
            username: nickname.to_string(),
            realname: nickname.to_string(),
            ..Self::default()
        }
    }

    /// Fresh handlers for one registration attempt.
    pub fn cap_handlers(&self) -> Vec<Box<dyn CapHandler>> {
        self.capabilities.iter().map(CapRequest::handler).collect()
    }

    pub fn registration(&self) -> RegistrationConfig {
        RegistrationConfig {
            nickname: self.nickname.clone(),
            username: self.username.clone(),
            realname: self.realname.clone(),
            password: self.password.clone(),
            webirc: self.webirc.clone(),
            auto_nick_change: self.auto_nick_change,
            cap_enabled: self.cap_enabled,
        }
    }

    pub fn line_formatter(&self) -> LineFormatter {
        LineFormatter {
            max_line_length: self.max_line_length,
            auto_split: self.auto_split_message,
            split_suffix: self.split_suffix.clone(),
        }
    }
}
