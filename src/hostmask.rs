//! Wire identities (`nick!login@hostname`).

use std::fmt;
use std::hash::{Hash, Hasher};

/// An identity as seen on the wire.
///
/// Login and hostname are absent when the server sends a bare nick
/// (or when the source is a server name). Equality and hashing only look
/// at nick, login and hostname; the raw text is kept for display.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserHostmask {
    raw: String,
    nick: String,
    login: Option<String>,
    hostname: Option<String>,
}

impl UserHostmask {
    /// Split a raw `nick!login@hostname` source.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix(':').unwrap_or(raw);
        let (rest, hostname) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (raw, None),
        };
        let (nick, login) = match rest.split_once('!') {
            Some((nick, login)) => (nick, Some(login.to_string())),
            None => (rest, None),
        };
        Self {
            raw: raw.to_string(),
            nick: nick.to_string(),
            login,
            hostname,
        }
    }

    /// Build a hostmask from its parts.
    pub fn new(nick: &str, login: Option<&str>, hostname: Option<&str>) -> Self {
        let mut raw = nick.to_string();
        if let Some(login) = login {
            raw.push('!');
            raw.push_str(login);
        }
        if let Some(hostname) = hostname {
            raw.push('@');
            raw.push_str(hostname);
        }
        Self {
            raw,
            nick: nick.to_string(),
            login: login.map(str::to_string),
            hostname: hostname.map(str::to_string),
        }
    }

    /// A hostmask known only by nick.
    pub fn from_nick(nick: &str) -> Self {
        Self::new(nick, None, None)
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// The source exactly as it appeared on the wire.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether this looks like a server name rather than a user.
    pub fn is_server(&self) -> bool {
        self.login.is_none() && self.hostname.is_none() && self.nick.contains('.')
    }

    /// Same identity under a different nick, keeping login and hostname.
    pub(crate) fn with_nick(&self, nick: &str) -> Self {
        Self::new(nick, self.login(), self.hostname())
    }
}

impl PartialEq for UserHostmask {
    fn eq(&self, other: &Self) -> bool {
        self.nick == other.nick && self.login == other.login && self.hostname == other.hostname
    }
}

impl Eq for UserHostmask {}

impl Hash for UserHostmask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nick.hash(state);
        self.login.hash(state);
        self.hostname.hash(state);
    }
}

impl fmt::Display for UserHostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for UserHostmask {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_hostmask() {
        let mask = UserHostmask::parse("nick!user@host.example.com");
        assert_eq!(mask.nick(), "nick");
        assert_eq!(mask.login(), Some("user"));
        assert_eq!(mask.hostname(), Some("host.example.com"));
        assert!(!mask.is_server());
    }

    #[test]
    fn test_parse_bare_nick() {
        let mask = UserHostmask::parse("nick");
        assert_eq!(mask.nick(), "nick");
        assert_eq!(mask.login(), None);
        assert_eq!(mask.hostname(), None);
    }

    #[test]
    fn test_parse_nick_at_host() {
        let mask = UserHostmask::parse("nick@host");
        assert_eq!(mask.login(), None);
        assert_eq!(mask.hostname(), Some("host"));
    }

    #[test]
    fn test_server_source() {
        assert!(UserHostmask::parse(":irc.example.com").is_server());
    }

    #[test]
    fn test_equality_ignores_raw_colon() {
        assert_eq!(
            UserHostmask::parse(":a!b@c"),
            UserHostmask::new("a", Some("b"), Some("c"))
        );
        assert_ne!(UserHostmask::parse("a!b@c"), UserHostmask::parse("a!x@c"));
    }
}
