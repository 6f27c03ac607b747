//! Sans-IO registration state machine.
//!
//! [`Registration`] drives everything between opening the socket and the
//! server's welcome: the initial `NICK`/`USER` burst, capability
//! negotiation through the configured [`CapHandler`]s, nick collisions and
//! the in-place TLS upgrade. It performs no I/O; it consumes parsed lines
//! and produces [`RegistrationAction`]s for the caller to carry out.
//!
//! # Example
//!
//! ```
//! use slirc_client::line::Line;
//! use slirc_client::state::{Registration, RegistrationAction, RegistrationConfig};
//!
//! let config = RegistrationConfig {
//!     nickname: "testbot".to_string(),
//!     username: "bot".to_string(),
//!     realname: "Test Bot".to_string(),
//!     ..RegistrationConfig::default()
//! };
//! let mut machine = Registration::new(config, Vec::new());
//!
//! // CAP LS, NICK and USER go out before anything is read.
//! let actions = machine.start();
//! assert_eq!(actions.len(), 3);
//!
//! let welcome = Line::parse(":irc.example.net 001 testbot :Welcome").unwrap();
//! let actions = machine.feed(&welcome);
//! assert!(actions
//!     .iter()
//!     .any(|a| matches!(a, RegistrationAction::Complete { nick } if nick == "testbot")));
//! ```

use tracing::{debug, warn};

use crate::caps::{CapContext, CapHandler};
use crate::command::Command;
use crate::config::WebIrcConfig;
use crate::error::RegistrationError;
use crate::event::Event;
use crate::line::Line;

/// Numerics that prove the server accepted us.
const CONNECT_CODES: [u16; 12] = [1, 2, 3, 4, 5, 251, 252, 253, 254, 255, 375, 376];

fn is_connect_code(code: u16) -> bool {
    CONNECT_CODES.contains(&code)
}

/// Current phase of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegistrationState {
    /// Not started.
    #[default]
    Disconnected,
    /// Registration lines sent, waiting for the welcome.
    PreAuth,
    /// The server welcomed us.
    Authenticated,
}

/// Identity and negotiation settings for registration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationConfig {
    /// Desired nickname.
    pub nickname: String,
    /// Username (ident).
    pub username: String,
    /// Real name / GECOS.
    pub realname: String,
    /// Server password, if required.
    pub password: Option<String>,
    /// WEBIRC gateway block, sent first when present.
    pub webirc: Option<WebIrcConfig>,
    /// Retry with a numeric suffix on 433 instead of failing.
    pub auto_nick_change: bool,
    /// Send `CAP LS` and, once handlers finish, `CAP END`.
    pub cap_enabled: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            username: String::new(),
            realname: String::new(),
            password: None,
            webirc: None,
            auto_nick_change: false,
            cap_enabled: true,
        }
    }
}

/// What the caller should do next.
#[derive(Debug)]
pub enum RegistrationAction {
    /// Send immediately, bypassing the paced queue.
    SendNow(Command),
    /// Upgrade the socket to TLS in place before reading further.
    UpgradeTls,
    /// Deliver an event.
    Emit(Event),
    /// The server welcomed us under `nick`.
    Complete { nick: String },
    /// Registration cannot continue.
    Fail(RegistrationError),
}

struct ActiveHandler {
    handler: Box<dyn CapHandler>,
    finished: bool,
}

/// The registration state machine.
pub struct Registration {
    config: RegistrationConfig,
    state: RegistrationState,
    nick: String,
    nick_suffix: u32,
    handlers: Vec<ActiveHandler>,
    enabled_caps: Vec<String>,
    ls_buffer: Vec<String>,
    cap_end_sent: bool,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("state", &self.state)
            .field("nick", &self.nick)
            .field("enabled_caps", &self.enabled_caps)
            .field("cap_end_sent", &self.cap_end_sent)
            .finish_non_exhaustive()
    }
}

impl Registration {
    #[must_use]
    pub fn new(config: RegistrationConfig, handlers: Vec<Box<dyn CapHandler>>) -> Self {
        let nick = config.nickname.clone();
        Self {
            config,
            state: RegistrationState::Disconnected,
            nick,
            nick_suffix: 0,
            handlers: handlers
                .into_iter()
                .map(|handler| ActiveHandler {
                    handler,
                    finished: false,
                })
                .collect(),
            enabled_caps: Vec::new(),
            ls_buffer: Vec::new(),
            cap_end_sent: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// The nick we are currently registering (or registered) with.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Capabilities acknowledged by the server. Frozen once `CAP END` is sent.
    pub fn enabled_caps(&self) -> &[String] {
        &self.enabled_caps
    }

    pub fn cap_end_sent(&self) -> bool {
        self.cap_end_sent
    }

    /// The lines to send as soon as the socket is open.
    #[must_use]
    pub fn start(&mut self) -> Vec<RegistrationAction> {
        self.state = RegistrationState::PreAuth;
        let mut actions = Vec::new();
        let mut send = |command| actions.push(RegistrationAction::SendNow(command));

        if self.config.cap_enabled {
            send(Command::CapLs);
        }
        if let Some(webirc) = &self.config.webirc {
            send(Command::WebIrc(
                webirc.password.clone(),
                webirc.user.clone(),
                webirc.host.clone(),
                webirc.ip.clone(),
            ));
        }
        if let Some(password) = &self.config.password {
            send(Command::Pass(password.clone()));
        }
        send(Command::Nick(self.nick.clone()));
        send(Command::User(
            self.config.username.clone(),
            self.config.realname.clone(),
        ));

        actions
    }

    /// Feed one line received before the welcome.
    ///
    /// Lines arriving after registration completed produce nothing.
    #[must_use]
    pub fn feed(&mut self, line: &Line) -> Vec<RegistrationAction> {
        if self.state != RegistrationState::PreAuth {
            return Vec::new();
        }
        let mut actions = Vec::new();
        let code = line.numeric();

        match code {
            Some(code) if is_connect_code(code) => {
                let nick = line.param(0).unwrap_or(&self.nick).to_string();
                debug!(%nick, code, "registration complete");
                self.nick = nick.clone();
                self.state = RegistrationState::Authenticated;
                actions.push(RegistrationAction::Complete { nick });
                return actions;
            }
            Some(433) => {
                self.nick_in_use(line, &mut actions);
                return actions;
            }
            Some(439) => {
                warn!(line = %line.raw, "server asked us to slow down");
            }
            Some(421) if self.config.cap_enabled && line.param(1) == Some("CAP") => {
                warn!("server does not support CAP");
            }
            Some(451)
                if self.config.cap_enabled && line.params.iter().take(2).any(|p| p == "CAP") =>
            {
                warn!("server does not support CAP");
            }
            Some(code) if (400..600).contains(&code) => {
                actions.push(RegistrationAction::Fail(RegistrationError::Rejected {
                    code,
                    line: line.raw.clone(),
                }));
                return actions;
            }
            Some(670) => {
                actions.push(RegistrationAction::UpgradeTls);
                self.offer_unknown(line, &mut actions);
            }
            _ if line.command == "CAP" => self.handle_cap(line, &mut actions),
            _ => self.offer_unknown(line, &mut actions),
        }

        self.maybe_end_caps(&mut actions);
        actions
    }

    fn nick_in_use(&mut self, line: &Line, actions: &mut Vec<RegistrationAction>) {
        let used_nick = line.param(1).unwrap_or(&self.nick).to_string();
        if self.config.auto_nick_change {
            self.nick_suffix += 1;
            let new_nick = format!("{}{}", self.config.nickname, self.nick_suffix);
            debug!(%used_nick, %new_nick, "nick in use, retrying");
            self.nick = new_nick.clone();
            actions.push(RegistrationAction::SendNow(Command::Nick(new_nick.clone())));
            actions.push(RegistrationAction::Emit(Event::NickAlreadyInUse {
                used_nick,
                auto_new_nick: Some(new_nick),
            }));
        } else {
            actions.push(RegistrationAction::Emit(Event::NickAlreadyInUse {
                used_nick: used_nick.clone(),
                auto_new_nick: None,
            }));
            actions.push(RegistrationAction::Fail(RegistrationError::NicknameInUse {
                nick: used_nick,
            }));
        }
    }

    fn handle_cap(&mut self, line: &Line, actions: &mut Vec<RegistrationAction>) {
        let verb = line.param(1).unwrap_or_default().to_ascii_uppercase();
        // `CAP * LS * :caps` marks a continuation line.
        let (more, list) = match (line.param(2), line.param(3)) {
            (Some("*"), Some(list)) => (true, list),
            (Some(list), _) => (false, list),
            (None, _) => (false, ""),
        };
        let caps: Vec<String> = list.split_whitespace().map(str::to_string).collect();

        match verb.as_str() {
            "LS" => {
                self.ls_buffer.extend(caps);
                if more {
                    return;
                }
                let all = std::mem::take(&mut self.ls_buffer);
                debug!(caps = ?all, "server capabilities");
                self.offer(actions, |handler, ctx| handler.handle_ls(ctx, &all));
            }
            "ACK" => {
                if !self.cap_end_sent {
                    self.enabled_caps.extend(
                        caps.iter()
                            .filter(|cap| !cap.starts_with('-'))
                            .cloned(),
                    );
                }
                self.offer(actions, |handler, ctx| handler.handle_ack(ctx, &caps));
            }
            "NAK" => self.offer(actions, |handler, ctx| handler.handle_nak(ctx, &caps)),
            _ => self.offer_unknown(line, actions),
        }
    }

    fn offer_unknown(&mut self, line: &Line, actions: &mut Vec<RegistrationAction>) {
        self.offer(actions, |handler, ctx| handler.handle_unknown(ctx, line));
    }

    /// Consult every unfinished handler in order.
    fn offer<F>(&mut self, actions: &mut Vec<RegistrationAction>, mut step: F)
    where
        F: FnMut(&mut dyn CapHandler, &mut CapContext<'_>) -> Result<bool, RegistrationError>,
    {
        for active in self.handlers.iter_mut().filter(|h| !h.finished) {
            let mut ctx = CapContext::new(&self.enabled_caps);
            let outcome = step(active.handler.as_mut(), &mut ctx);
            actions.extend(
                ctx.into_outgoing()
                    .into_iter()
                    .map(RegistrationAction::SendNow),
            );
            match outcome {
                Ok(done) => {
                    if done {
                        debug!(handler = active.handler.name(), "capability handler finished");
                    }
                    active.finished = done;
                }
                Err(err) => {
                    actions.push(RegistrationAction::Fail(err));
                    return;
                }
            }
        }
    }

    fn maybe_end_caps(&mut self, actions: &mut Vec<RegistrationAction>) {
        let failed = actions
            .iter()
            .any(|a| matches!(a, RegistrationAction::Fail(_)));
        if failed
            || self.cap_end_sent
            || !self.config.cap_enabled
            || self.handlers.iter().any(|h| !h.finished)
        {
            return;
        }
        self.cap_end_sent = true;
        debug!(enabled = ?self.enabled_caps, "capability negotiation finished");
        actions.push(RegistrationAction::SendNow(Command::CapEnd));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::EnableCapHandler;

    fn config() -> RegistrationConfig {
        RegistrationConfig {
            nickname: "bot".to_string(),
            username: "bot".to_string(),
            realname: "Test Bot".to_string(),
            ..RegistrationConfig::default()
        }
    }

    fn sent(actions: &[RegistrationAction]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                RegistrationAction::SendNow(cmd) => Some(cmd.to_string()),
                _ => None,
            })
            .collect()
    }

    fn line(raw: &str) -> Line {
        Line::parse(raw).unwrap()
    }

    #[test]
    fn test_start_order() {
        let mut cfg = config();
        cfg.password = Some("secret".to_string());
        cfg.webirc = Some(WebIrcConfig {
            password: "gwpass".to_string(),
            user: "gateway".to_string(),
            host: "client.example".to_string(),
            ip: "192.0.2.1".to_string(),
        });
        let mut machine = Registration::new(cfg, Vec::new());
        assert_eq!(
            sent(&machine.start()),
            vec![
                "CAP LS 302",
                "WEBIRC gwpass gateway client.example 192.0.2.1",
                "PASS secret",
                "NICK bot",
                "USER bot 0 * :Test Bot",
            ]
        );
        assert_eq!(machine.state(), RegistrationState::PreAuth);
    }

    #[test]
    fn test_no_cap_when_disabled() {
        let mut cfg = config();
        cfg.cap_enabled = false;
        let mut machine = Registration::new(cfg, Vec::new());
        assert_eq!(sent(&machine.start()), vec!["NICK bot", "USER bot 0 * :Test Bot"]);

        let actions = machine.feed(&line(":irc.example.net NOTICE * :hello"));
        assert!(sent(&actions).is_empty());
    }

    #[test]
    fn test_connect_codes_complete() {
        for code in ["001", "004", "251", "255", "375", "376"] {
            let mut machine = Registration::new(config(), Vec::new());
            let _ = machine.start();
            let actions = machine.feed(&line(&format!(":irc.example.net {} bot :hi", code)));
            assert!(
                matches!(&actions[..], [RegistrationAction::Complete { nick }] if nick == "bot"),
                "code {}",
                code
            );
            assert_eq!(machine.state(), RegistrationState::Authenticated);
        }
    }

    #[test]
    fn test_nick_in_use_retries_with_suffix() {
        let mut cfg = config();
        cfg.auto_nick_change = true;
        let mut machine = Registration::new(cfg, Vec::new());
        let _ = machine.start();

        let actions = machine.feed(&line(":irc.example.net 433 * bot :Nickname is already in use"));
        assert_eq!(sent(&actions), vec!["NICK bot1"]);
        let actions = machine.feed(&line(":irc.example.net 433 * bot1 :Nickname is already in use"));
        assert_eq!(sent(&actions), vec!["NICK bot2"]);
        assert_eq!(machine.nick(), "bot2");
    }

    #[test]
    fn test_nick_in_use_is_fatal_without_auto_change() {
        let mut machine = Registration::new(config(), Vec::new());
        let _ = machine.start();
        let actions = machine.feed(&line(":irc.example.net 433 * bot :Nickname is already in use"));
        assert!(actions.iter().any(|a| matches!(
            a,
            RegistrationAction::Fail(RegistrationError::NicknameInUse { nick }) if nick == "bot"
        )));
    }

    #[test]
    fn test_error_numeric_is_fatal() {
        let mut machine = Registration::new(config(), Vec::new());
        let _ = machine.start();
        let actions = machine.feed(&line(":irc.example.net 465 bot :You are banned"));
        assert!(matches!(
            &actions[..],
            [RegistrationAction::Fail(RegistrationError::Rejected { code: 465, .. })]
        ));
    }

    #[test]
    fn test_439_and_421_cap_are_ignored() {
        let handlers: Vec<Box<dyn CapHandler>> = vec![Box::new(EnableCapHandler::new("multi-prefix"))];
        let mut machine = Registration::new(config(), handlers);
        let _ = machine.start();
        assert!(machine
            .feed(&line(":irc.example.net 439 * :Please wait"))
            .is_empty());
        assert!(machine
            .feed(&line(":irc.example.net 421 bot CAP :Unknown command"))
            .is_empty());
        assert_eq!(machine.state(), RegistrationState::PreAuth);
    }

    #[test]
    fn test_451_cap_is_ignored() {
        let handlers: Vec<Box<dyn CapHandler>> = vec![Box::new(EnableCapHandler::new("multi-prefix"))];
        let mut machine = Registration::new(config(), handlers);
        let _ = machine.start();
        assert!(machine
            .feed(&line(":irc.old.net 451 * CAP :You have not registered"))
            .is_empty());
        assert_eq!(machine.state(), RegistrationState::PreAuth);

        let actions = machine.feed(&line(":irc.old.net 451 * :You have not registered"));
        assert!(matches!(
            actions.as_slice(),
            [RegistrationAction::Fail(RegistrationError::Rejected { code: 451, .. })]
        ));
    }

    #[test]
    fn test_multiline_ls_and_ack() {
        let handlers: Vec<Box<dyn CapHandler>> = vec![
            Box::new(EnableCapHandler::new("multi-prefix")),
            Box::new(EnableCapHandler::new("away-notify")),
        ];
        let mut machine = Registration::new(config(), handlers);
        let _ = machine.start();

        let actions = machine.feed(&line(":irc.example.net CAP * LS * :multi-prefix sasl"));
        assert!(sent(&actions).is_empty());
        let actions = machine.feed(&line(":irc.example.net CAP * LS :away-notify"));
        assert_eq!(
            sent(&actions),
            vec!["CAP REQ :multi-prefix", "CAP REQ :away-notify"]
        );

        let actions = machine.feed(&line(":irc.example.net CAP bot ACK :multi-prefix"));
        assert!(sent(&actions).is_empty());
        let actions = machine.feed(&line(":irc.example.net CAP bot ACK :away-notify"));
        assert_eq!(sent(&actions), vec!["CAP END"]);
        assert_eq!(machine.enabled_caps(), ["multi-prefix", "away-notify"]);
    }

    #[test]
    fn test_670_requests_upgrade() {
        let handlers: Vec<Box<dyn CapHandler>> = vec![Box::new(crate::caps::TlsCapHandler::new())];
        let mut machine = Registration::new(config(), handlers);
        let _ = machine.start();

        let actions = machine.feed(&line(":irc.example.net CAP * LS :tls"));
        assert_eq!(sent(&actions), vec!["STARTTLS"]);

        let actions = machine.feed(&line(":irc.example.net 670 bot :STARTTLS successful"));
        assert!(matches!(actions[0], RegistrationAction::UpgradeTls));
        assert_eq!(sent(&actions), vec!["CAP END"]);
    }
}
