//! Applying the server's line-length limit to outbound commands.

use super::types::Command;

/// Formats commands into wire lines that respect `max_line_length`.
///
/// The limit includes the CRLF terminator. `PRIVMSG` and `NOTICE` lines
/// that are too long are split into several lines with the same command
/// and target when `auto_split` is on, each part ending in `split_suffix`.
/// Anything else that is too long is truncated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineFormatter {
    pub max_line_length: usize,
    pub auto_split: bool,
    pub split_suffix: String,
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self {
            max_line_length: 512,
            auto_split: true,
            split_suffix: String::new(),
        }
    }
}

impl LineFormatter {
    /// Longest line body allowed, terminator excluded.
    fn body_limit(&self) -> usize {
        self.max_line_length.saturating_sub(2)
    }

    /// Render `command` into one or more lines without terminators.
    pub fn format(&self, command: &Command) -> Vec<String> {
        match command {
            Command::Privmsg(target, text) if self.auto_split => {
                self.split(&format!("PRIVMSG {} :", target), text)
            }
            Command::Notice(target, text) if self.auto_split => {
                self.split(&format!("NOTICE {} :", target), text)
            }
            other => vec![self.truncate(&sanitize(&other.to_string()))],
        }
    }

    /// Cut a line down to the limit on a character boundary.
    pub fn truncate(&self, line: &str) -> String {
        line[..floor_char_boundary(line, self.body_limit())].to_string()
    }

    /// Split `message` so that every `prefix + part + suffix` fits.
    ///
    /// A message that already fits is sent whole, without the suffix.
    pub fn split(&self, prefix: &str, message: &str) -> Vec<String> {
        let message = sanitize(message);
        let limit = self.body_limit();
        if prefix.len() + message.len() <= limit {
            return vec![format!("{}{}", prefix, message)];
        }

        let room = limit.saturating_sub(prefix.len() + self.split_suffix.len());
        if room == 0 {
            return vec![self.truncate(&format!("{}{}", prefix, message))];
        }

        let mut lines = Vec::new();
        let mut rest = message.as_str();
        while !rest.is_empty() {
            let mut end = floor_char_boundary(rest, room);
            if end == 0 {
                // A single character wider than the room left.
                end = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            let (part, tail) = rest.split_at(end);
            lines.push(format!("{}{}{}", prefix, part, self.split_suffix));
            rest = tail;
        }
        lines
    }
}

/// Line breaks inside a command would start a new command on the wire.
fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(max: usize, suffix: &str) -> LineFormatter {
        LineFormatter {
            max_line_length: max,
            auto_split: true,
            split_suffix: suffix.to_string(),
        }
    }

    #[test]
    fn test_short_line_untouched() {
        let lines = LineFormatter::default().format(&Command::privmsg("#c", "hello"));
        assert_eq!(lines, vec!["PRIVMSG #c :hello"]);
    }

    #[test]
    fn test_long_privmsg_is_split() {
        // body limit 28, prefix "PRIVMSG #c :" is 12 bytes, suffix 1
        let f = formatter(30, "~");
        let lines = f.format(&Command::privmsg("#c", "abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(
            lines,
            vec![
                "PRIVMSG #c :abcdefghijklmno~",
                "PRIVMSG #c :pqrstuvwxyz~",
            ]
        );
        assert!(lines.iter().all(|l| l.len() <= 28));
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let f = formatter(20, "");
        let lines = f.split("NOTICE x :", "ééééééé");
        assert!(lines.iter().all(|l| l.len() <= 18));
        let joined: String = lines.iter().map(|l| &l["NOTICE x :".len()..]).collect();
        assert_eq!(joined, "ééééééé");
    }

    #[test]
    fn test_other_commands_truncate() {
        let f = formatter(12, "");
        assert_eq!(f.format(&Command::Who("#averylongchannel".into())), vec!["WHO #avery"]);
    }

    #[test]
    fn test_no_split_when_disabled() {
        let mut f = formatter(20, "");
        f.auto_split = false;
        let lines = f.format(&Command::privmsg("#c", "this is much too long"));
        assert_eq!(lines, vec!["PRIVMSG #c :this i"]);
    }

    #[test]
    fn test_line_breaks_are_flattened() {
        let lines = LineFormatter::default().format(&Command::privmsg("#c", "a\r\nQUIT"));
        assert_eq!(lines, vec!["PRIVMSG #c :a  QUIT"]);
    }
}
