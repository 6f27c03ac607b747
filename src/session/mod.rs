//! Sans-IO session: registration plus the command dispatcher.
//!
//! A [`Session`] owns everything that happens to one connection between
//! reading a line and acting on it. [`Session::handle_line`] applies a
//! single inbound line to the shared store and returns the [`Action`]s the
//! I/O shell must perform, in order. Nothing here blocks or touches a
//! socket, so the whole protocol can be driven from tests.
//!
//! # Example
//!
//! ```
//! use slirc_client::config::ClientConfig;
//! use slirc_client::dao::DaoHandle;
//! use slirc_client::session::{Action, Session};
//!
//! let mut config = ClientConfig::new("irc.example.net", 6667, "bot");
//! config.cap_enabled = false;
//! let dao = DaoHandle::default();
//! let mut session = Session::new(&config, dao.clone());
//!
//! let _ = session.start();
//! let _ = session.handle_line(":irc.example.net 001 bot :Welcome");
//! let _ = session.handle_line(":bot!b@host JOIN #rust");
//! assert!(dao.lock().contains_channel("#rust"));
//!
//! let actions = session.handle_line("PING :12345");
//! assert!(matches!(&actions[0], Action::SendNow(line) if line == "PONG 12345"));
//! ```

mod dispatch;
mod numeric;
mod whois;

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::command::{Command, LineFormatter};
use crate::config::{AutoJoin, ClientConfig};
use crate::dao::{DaoHandle, UserChannelDao, UserView};
use crate::error::{ClientError, LineParseError};
use crate::event::{ChannelListEntry, Event, WhoisReply};
use crate::hostmask::UserHostmask;
use crate::isupport::ServerInfo;
use crate::line::Line;
use crate::state::{Registration, RegistrationAction, RegistrationState};

/// Something the I/O shell must do for the session.
#[derive(Debug)]
pub enum Action {
    /// Queue a formatted line behind the message delay.
    Send(String),
    /// Write a formatted line immediately.
    SendNow(String),
    /// Upgrade the transport to TLS before reading the next line.
    StartTls,
    /// Deliver an event to the application.
    Emit(Event),
    /// The session cannot continue.
    Fail(ClientError),
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct Session {
    dao: DaoHandle,
    registration: Registration,
    formatter: LineFormatter,
    nick: String,
    server_info: ServerInfo,
    nickserv_password: Option<String>,
    auto_join: Vec<AutoJoin>,
    version: String,
    finger: String,
    motd: Vec<String>,
    channel_list: Vec<ChannelListEntry>,
    whois: HashMap<String, WhoisReply>,
    disconnected: bool,
}

impl Session {
    /// A session for `config` that keeps its entities in `dao`.
    pub fn new(config: &ClientConfig, dao: DaoHandle) -> Self {
        dao.lock().set_channel_prefixes(&config.channel_prefixes);
        Self {
            dao,
            registration: Registration::new(config.registration(), config.cap_handlers()),
            formatter: config.line_formatter(),
            nick: config.nickname.clone(),
            server_info: ServerInfo::default(),
            nickserv_password: config.nickserv_password.clone(),
            auto_join: config.auto_join.clone(),
            version: config.version.clone(),
            finger: config.finger.clone(),
            motd: Vec::new(),
            channel_list: Vec::new(),
            whois: HashMap::new(),
            disconnected: false,
        }
    }

    pub fn dao(&self) -> &DaoHandle {
        &self.dao
    }

    /// Our current nick.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registration.state() == RegistrationState::Authenticated
    }

    pub fn enabled_caps(&self) -> &[String] {
        self.registration.enabled_caps()
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn formatter(&self) -> &LineFormatter {
        &self.formatter
    }

    /// Lines to write as soon as the socket is open.
    pub fn start(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        for action in self.registration.start() {
            self.registration_action(action, &mut out);
        }
        out
    }

    /// Apply one inbound line (terminator optional).
    pub fn handle_line(&mut self, raw: &str) -> Vec<Action> {
        trace!(line = raw, "<<");
        let mut out = Vec::new();

        let line = match Line::parse(raw) {
            Ok(line) => line,
            Err(LineParseError::Empty) => return out,
            Err(err) => {
                warn!(%err, line = raw, "unparseable line");
                out.push(Action::Emit(Event::Unknown {
                    raw: raw.to_string(),
                }));
                return out;
            }
        };

        if line.command == "PING" {
            let token = line.last_param().unwrap_or_default().to_string();
            self.send_now(&mut out, Command::Pong(token.clone()));
            out.push(Action::Emit(Event::ServerPing { token }));
            return out;
        }

        if self.registration.state() == RegistrationState::PreAuth {
            let mut completed = None;
            for action in self.registration.feed(&line) {
                match action {
                    RegistrationAction::Complete { nick } => completed = Some(nick),
                    other => self.registration_action(other, &mut out),
                }
            }
            if out.iter().any(|a| matches!(a, Action::Fail(_))) {
                return out;
            }
            if let Some(nick) = completed {
                self.on_connect(nick, &mut out);
            }
        }

        self.dispatch(&line, &mut out);
        out
    }

    /// Tear down after the connection ended.
    ///
    /// Clears the store and returns the `Disconnect` event the first time
    /// only.
    pub fn disconnect(&mut self, error: Option<String>) -> Option<Event> {
        if self.disconnected {
            return None;
        }
        self.disconnected = true;
        self.dao.lock().clear();
        self.whois.clear();
        debug!(?error, "session disconnected");
        Some(Event::Disconnect { error })
    }

    /// Format `command` for the paced queue.
    pub fn format(&self, command: &Command) -> Vec<String> {
        self.formatter.format(command)
    }

    fn send(&self, out: &mut Vec<Action>, command: Command) {
        out.extend(self.formatter.format(&command).into_iter().map(Action::Send));
    }

    fn send_now(&self, out: &mut Vec<Action>, command: Command) {
        out.extend(
            self.formatter
                .format(&command)
                .into_iter()
                .map(Action::SendNow),
        );
    }

    fn registration_action(&mut self, action: RegistrationAction, out: &mut Vec<Action>) {
        match action {
            RegistrationAction::SendNow(command) => self.send_now(out, command),
            RegistrationAction::UpgradeTls => out.push(Action::StartTls),
            RegistrationAction::Emit(event) => out.push(Action::Emit(event)),
            RegistrationAction::Complete { nick } => self.on_connect(nick, out),
            RegistrationAction::Fail(err) => {
                warn!(%err, "registration failed");
                out.push(Action::Fail(err.into()));
            }
        }
    }

    fn on_connect(&mut self, nick: String, out: &mut Vec<Action>) {
        debug!(%nick, "connected");
        {
            let mut dao = self.dao.lock();
            let id = dao.get_or_create_user(&UserHostmask::from_nick(&nick));
            dao.set_self(id);
        }
        self.nick = nick;

        if let Some(password) = self.nickserv_password.clone() {
            self.send(out, Command::privmsg("NickServ", &format!("IDENTIFY {}", password)));
        }
        for channel in self.auto_join.clone() {
            self.send(out, Command::Join(channel.name, channel.key));
        }
        out.push(Action::Emit(Event::Connect));
    }

    fn is_self_nick(&self, dao: &UserChannelDao, nick: &str) -> bool {
        dao.case_mapping().eq(nick, &self.nick)
            || dao.self_user().map_or(false, |me| dao.case_mapping().eq(me.nick(), nick))
    }
}
