//! IRCv3 message tag handling.

/// Unescape a tag value from wire format.
///
/// `\:` → `;`, `\s` → space, `\\` → `\`, `\r` and `\n` → CR and LF.
/// Unknown escapes drop the backslash; a trailing backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Split a raw tag section (without `@`) into key/value pairs.
pub(crate) fn parse_tags(raw: &str) -> Vec<(String, Option<String>)> {
    raw.split(';')
        .filter(|t| !t.is_empty())
        .map(|t| match t.split_once('=') {
            Some((k, v)) if !v.is_empty() => (k.to_string(), Some(unescape_tag_value(v))),
            Some((k, _)) => (k.to_string(), None),
            None => (t.to_string(), None),
        })
        .collect()
}
