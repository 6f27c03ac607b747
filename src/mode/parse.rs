//! Pairing mode letters with their arguments.

use super::{handler, ModeHandler};

/// One letter of a mode string with the argument it consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeChange<'a> {
    pub adding: bool,
    pub handler: &'static ModeHandler,
    pub arg: Option<&'a str>,
}

/// Walk `modes` left to right, handing arguments out in order.
///
/// Signs persist until the next sign; a string without a leading sign
/// adds. Unknown letters are skipped without consuming an argument. A
/// letter whose argument is missing is reported with `arg: None`.
pub fn parse_channel_modes<'a, S>(modes: &str, args: &'a [S]) -> Vec<ModeChange<'a>>
where
    S: AsRef<str>,
{
    let mut changes = Vec::new();
    let mut args = args.iter().map(AsRef::as_ref);
    let mut adding = true;

    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            letter => {
                let Some(handler) = handler(letter) else {
                    continue;
                };
                let takes_arg = if adding {
                    handler.arg_on_add
                } else {
                    handler.arg_on_remove
                };
                let arg = if takes_arg { args.next() } else { None };
                changes.push(ModeChange {
                    adding,
                    handler,
                    arg,
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(changes: &[ModeChange<'_>]) -> Vec<(bool, char, Option<String>)> {
        changes
            .iter()
            .map(|c| (c.adding, c.handler.letter, c.arg.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_polarity_persists() {
        let args = ["alice", "bob"];
        let changes = parse_channel_modes("+ov-t", &args);
        assert_eq!(
            letters(&changes),
            vec![
                (true, 'o', Some("alice".to_string())),
                (true, 'v', Some("bob".to_string())),
                (false, 't', None),
            ]
        );
    }

    #[test]
    fn test_key_and_limit_only_consume_when_adding() {
        let args = ["secret", "bob"];
        let changes = parse_channel_modes("-l+k-kv", &args);
        assert_eq!(
            letters(&changes),
            vec![
                (false, 'l', None),
                (true, 'k', Some("secret".to_string())),
                (false, 'k', None),
                (false, 'v', Some("bob".to_string())),
            ]
        );
    }

    #[test]
    fn test_unknown_letters_consume_nothing() {
        let args = ["*!*@spam"];
        let changes = parse_channel_modes("+Cb", &args);
        assert_eq!(letters(&changes), vec![(true, 'b', Some("*!*@spam".to_string()))]);
    }

    #[test]
    fn test_missing_argument() {
        let args: [&str; 0] = [];
        let changes = parse_channel_modes("+o", &args);
        assert_eq!(letters(&changes), vec![(true, 'o', None)]);
    }
}
