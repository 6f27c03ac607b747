//! Client-to-client protocol payloads carried in PRIVMSG and NOTICE.

use std::fmt;

/// Byte that opens and closes a CTCP payload.
pub const CTCP_DELIMITER: char = '\u{1}';

/// A decoded CTCP payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ctcp {
    Version(Option<String>),
    Action(String),
    Ping(String),
    Time(Option<String>),
    Finger(Option<String>),
    /// Everything after `DCC `.
    Dcc(String),
    Other { verb: String, args: String },
}

impl Ctcp {
    /// Decode `text` if it is wrapped in the delimiter on both ends.
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text
            .strip_prefix(CTCP_DELIMITER)?
            .strip_suffix(CTCP_DELIMITER)?;
        let (verb, args) = match inner.split_once(' ') {
            Some((verb, args)) => (verb, Some(args)),
            None => (inner, None),
        };
        if verb.is_empty() {
            return None;
        }
        let owned = |args: Option<&str>| args.map(str::to_string);

        Some(match verb.to_ascii_uppercase().as_str() {
            "VERSION" => Ctcp::Version(owned(args)),
            "ACTION" => Ctcp::Action(args.unwrap_or_default().to_string()),
            "PING" => Ctcp::Ping(args.unwrap_or_default().to_string()),
            "TIME" => Ctcp::Time(owned(args)),
            "FINGER" => Ctcp::Finger(owned(args)),
            "DCC" => Ctcp::Dcc(args.unwrap_or_default().to_string()),
            _ => Ctcp::Other {
                verb: verb.to_string(),
                args: args.unwrap_or_default().to_string(),
            },
        })
    }

    pub fn verb(&self) -> &str {
        match self {
            Ctcp::Version(_) => "VERSION",
            Ctcp::Action(_) => "ACTION",
            Ctcp::Ping(_) => "PING",
            Ctcp::Time(_) => "TIME",
            Ctcp::Finger(_) => "FINGER",
            Ctcp::Dcc(_) => "DCC",
            Ctcp::Other { verb, .. } => verb,
        }
    }

    /// Text after the verb; empty when there is none.
    pub fn args(&self) -> &str {
        match self {
            Ctcp::Version(args) | Ctcp::Time(args) | Ctcp::Finger(args) => {
                args.as_deref().unwrap_or_default()
            }
            Ctcp::Action(args) | Ctcp::Ping(args) | Ctcp::Dcc(args) => args,
            Ctcp::Other { args, .. } => args,
        }
    }
}

impl fmt::Display for Ctcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CTCP_DELIMITER, self.verb())?;
        let args = self.args();
        if !args.is_empty() || matches!(self, Ctcp::Action(_)) {
            write!(f, " {}", args)?;
        }
        write!(f, "{}", CTCP_DELIMITER)
    }
}

/// Wrap `verb` and `args` in delimiters.
pub fn encode(verb: &str, args: Option<&str>) -> String {
    match args {
        Some(args) => format!("{d}{verb} {args}{d}", d = CTCP_DELIMITER),
        None => format!("{d}{verb}{d}", d = CTCP_DELIMITER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_verbs() {
        assert_eq!(
            Ctcp::parse("\u{1}ACTION waves\u{1}"),
            Some(Ctcp::Action("waves".to_string()))
        );
        assert_eq!(Ctcp::parse("\u{1}VERSION\u{1}"), Some(Ctcp::Version(None)));
        assert_eq!(
            Ctcp::parse("\u{1}PING 12345\u{1}"),
            Some(Ctcp::Ping("12345".to_string()))
        );
        assert_eq!(
            Ctcp::parse("\u{1}DCC SEND file 3232235777 5000 1024\u{1}"),
            Some(Ctcp::Dcc("SEND file 3232235777 5000 1024".to_string()))
        );
        assert_eq!(
            Ctcp::parse("\u{1}CLIENTINFO\u{1}"),
            Some(Ctcp::Other {
                verb: "CLIENTINFO".to_string(),
                args: String::new()
            })
        );
    }

    #[test]
    fn test_requires_both_delimiters() {
        assert_eq!(Ctcp::parse("\u{1}VERSION"), None);
        assert_eq!(Ctcp::parse("VERSION\u{1}"), None);
        assert_eq!(Ctcp::parse("hello"), None);
        assert_eq!(Ctcp::parse("\u{1}\u{1}"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ctcp::Ping("42".to_string()).to_string(), "\u{1}PING 42\u{1}");
        assert_eq!(Ctcp::Version(None).to_string(), "\u{1}VERSION\u{1}");
        assert_eq!(encode("TIME", None), "\u{1}TIME\u{1}");
        assert_eq!(encode("VERSION", Some("slirc 0.1")), "\u{1}VERSION slirc 0.1\u{1}");
    }
}
