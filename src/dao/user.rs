//! Live users and their immutable snapshots.

use std::fmt;

use crate::hostmask::UserHostmask;

/// Stable identity of a user inside one session.
///
/// Ids survive nick changes and are never reused while the session lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct UserState {
    hostmask: UserHostmask,
    away_message: Option<String>,
    irc_op: bool,
    server: Option<String>,
    hops: Option<u32>,
    real_name: Option<String>,
    identified: bool,
}

impl UserState {
    fn new(hostmask: UserHostmask) -> Self {
        Self {
            hostmask,
            away_message: None,
            irc_op: false,
            server: None,
            hops: None,
            real_name: None,
            identified: false,
        }
    }
}

/// Read access shared by [`User`] and [`UserSnapshot`].
pub trait UserView {
    fn hostmask(&self) -> &UserHostmask;

    fn nick(&self) -> &str {
        self.hostmask().nick()
    }

    fn login(&self) -> Option<&str> {
        self.hostmask().login()
    }

    fn hostname(&self) -> Option<&str> {
        self.hostmask().hostname()
    }

    /// Last known away message. `Some("")` means the user came back.
    fn away_message(&self) -> Option<&str>;

    /// Away iff an away message is known and non-empty.
    fn is_away(&self) -> bool {
        self.away_message().map_or(false, |msg| !msg.is_empty())
    }

    fn is_irc_op(&self) -> bool;

    fn server(&self) -> Option<&str>;

    fn hops(&self) -> Option<u32>;

    fn real_name(&self) -> Option<&str>;

    /// Whether WHOIS reported the user as logged in to services.
    fn is_identified(&self) -> bool;
}

macro_rules! impl_user_view {
    ($ty:ty) => {
        impl UserView for $ty {
            fn hostmask(&self) -> &UserHostmask {
                &self.state.hostmask
            }

            fn away_message(&self) -> Option<&str> {
                self.state.away_message.as_deref()
            }

            fn is_irc_op(&self) -> bool {
                self.state.irc_op
            }

            fn server(&self) -> Option<&str> {
                self.state.server.as_deref()
            }

            fn hops(&self) -> Option<u32> {
                self.state.hops
            }

            fn real_name(&self) -> Option<&str> {
                self.state.real_name.as_deref()
            }

            fn is_identified(&self) -> bool {
                self.state.identified
            }
        }
    };
}

/// A user tracked by the store. Mutated only by the session.
#[derive(Clone, Debug)]
pub struct User {
    id: UserId,
    state: UserState,
}

impl_user_view!(User);

impl User {
    pub(crate) fn new(id: UserId, hostmask: UserHostmask) -> Self {
        Self {
            id,
            state: UserState::new(hostmask),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    /// Freeze the current state.
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: Some(self.id),
            state: self.state.clone(),
        }
    }

    /// Fill in login and hostname when the new hostmask knows them.
    pub(crate) fn absorb_hostmask(&mut self, seen: &UserHostmask) {
        let current = &self.state.hostmask;
        let login = seen.login().or(current.login());
        let hostname = seen.hostname().or(current.hostname());
        if login != current.login() || hostname != current.hostname() {
            self.state.hostmask = UserHostmask::new(current.nick(), login, hostname);
        }
    }

    pub(crate) fn set_nick(&mut self, nick: &str) {
        self.state.hostmask = self.state.hostmask.with_nick(nick);
    }

    pub(crate) fn set_login(&mut self, login: &str) {
        let current = &self.state.hostmask;
        self.state.hostmask = UserHostmask::new(current.nick(), Some(login), current.hostname());
    }

    pub(crate) fn set_hostname(&mut self, hostname: &str) {
        let current = &self.state.hostmask;
        self.state.hostmask = UserHostmask::new(current.nick(), current.login(), Some(hostname));
    }

    pub(crate) fn set_away_message(&mut self, message: Option<String>) {
        self.state.away_message = message;
    }

    pub(crate) fn set_irc_op(&mut self, irc_op: bool) {
        self.state.irc_op = irc_op;
    }

    pub(crate) fn set_server(&mut self, server: &str) {
        self.state.server = Some(server.to_string());
    }

    pub(crate) fn set_hops(&mut self, hops: u32) {
        self.state.hops = Some(hops);
    }

    pub(crate) fn set_real_name(&mut self, real_name: &str) {
        self.state.real_name = Some(real_name.to_string());
    }

    pub(crate) fn set_identified(&mut self, identified: bool) {
        self.state.identified = identified;
    }
}

/// A frozen copy of a [`User`].
///
/// Snapshots taken from the store carry the live user's id; detached
/// snapshots describe sources the store never tracked (servers, or users
/// seen only in passing).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSnapshot {
    id: Option<UserId>,
    state: UserState,
}

impl_user_view!(UserSnapshot);

impl UserSnapshot {
    /// A snapshot of something not tracked by the store.
    pub fn detached(hostmask: UserHostmask) -> Self {
        Self {
            id: None,
            state: UserState::new(hostmask),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.id
    }
}
