//! Raw protocol lines.
//!
//! [`tokenize`] implements the plain trailing-parameter split used by the
//! rest of the crate's helpers, while [`Line::parse`] produces the full
//! `[@tags] [:source] <command> [params...]` structure consumed by the
//! session.

mod nom_parser;
pub mod tags;

use crate::error::LineParseError;
use crate::hostmask::UserHostmask;

/// Split a line into whitespace-separated tokens.
///
/// Once a token after the first begins with `:`, that token and all the
/// remaining raw text (colon stripped) become one final token. A leading
/// `:` on the first token is kept so callers can recognise and strip the
/// source prefix themselves.
///
/// ```
/// use slirc_client::line::tokenize;
///
/// assert_eq!(
///     tokenize("PRIVMSG #x :hello world"),
///     vec!["PRIVMSG", "#x", "hello world"]
/// );
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim();
    let mut first = true;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if !first {
            if let Some(trailing) = rest.strip_prefix(':') {
                tokens.push(trailing.to_string());
                break;
            }
        }
        first = false;

        match rest.find(' ') {
            Some(end) => {
                tokens.push(rest[..end].to_string());
                rest = &rest[end..];
            }
            None => {
                tokens.push(rest.to_string());
                break;
            }
        }
    }

    tokens
}

/// A parsed server line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// The line as received, without its terminator.
    pub raw: String,
    /// IRCv3 message tags, values unescaped.
    pub tags: Vec<(String, Option<String>)>,
    /// Source prefix, if any.
    pub source: Option<UserHostmask>,
    /// Command name or three-digit numeric, upper-cased.
    pub command: String,
    /// Parameters, the trailing one included.
    pub params: Vec<String>,
}

impl Line {
    /// Parse one line (terminator optional).
    pub fn parse(raw: &str) -> Result<Self, LineParseError> {
        let trimmed = raw.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            return Err(LineParseError::Empty);
        }

        let parsed = nom_parser::ParsedLine::parse(trimmed)?;
        Ok(Line {
            raw: trimmed.to_string(),
            tags: parsed.tags.map(tags::parse_tags).unwrap_or_default(),
            source: parsed.source.map(UserHostmask::parse),
            command: parsed.command.to_ascii_uppercase(),
            params: parsed.params.into_iter().map(str::to_string).collect(),
        })
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter, usually the free-form text.
    pub fn last_param(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Numeric code when the command is a three-digit reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Value of an IRCv3 tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Nick of the source, when present.
    pub fn source_nick(&self) -> Option<&str> {
        self.source.as_ref().map(UserHostmask::nick)
    }
}
