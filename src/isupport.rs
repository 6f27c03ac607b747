//! Server information from `RPL_MYINFO` (004) and `RPL_ISUPPORT` (005).

use crate::casemap::CaseMapping;
use crate::dao::PrivilegeLevel;

/// One `KEY[=VALUE]` token of an ISUPPORT line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsupportEntry<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// The tokens of a single 005 line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Isupport<'a> {
    entries: Vec<IsupportEntry<'a>>,
}

impl<'a> Isupport<'a> {
    /// Parse bare tokens.
    pub fn parse_params(params: &[&'a str]) -> Self {
        let mut entries = Vec::with_capacity(params.len());
        for &p in params {
            if p.is_empty() {
                continue;
            }
            let (key, value) = match p.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (p, None),
            };
            entries.push(IsupportEntry { key, value });
        }
        Isupport { entries }
    }

    /// Parse the parameters of a 005 reply: the target nick comes first and
    /// the human-readable trailer ("are supported by this server") last.
    pub fn from_response_args(args: &'a [String]) -> Option<Self> {
        let (_, mut tokens) = args.split_first()?;
        if let Some(last) = tokens.last() {
            if last.contains(' ') {
                tokens = &tokens[..tokens.len() - 1];
            }
        }
        let borrowed: Vec<&'a str> = tokens.iter().map(String::as_str).collect();
        Some(Self::parse_params(&borrowed))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IsupportEntry<'a>> {
        self.entries.iter()
    }

    /// `Some(None)` for a bare key, `Some(Some(v))` for `KEY=v`.
    pub fn get(&self, key: &str) -> Option<Option<&'a str>> {
        self.entries
            .iter()
            .rfind(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value)
    }

    pub fn casemapping(&self) -> Option<&'a str> {
        self.get("CASEMAPPING").flatten()
    }

    pub fn chantypes(&self) -> Option<&'a str> {
        self.get("CHANTYPES").flatten()
    }

    pub fn network(&self) -> Option<&'a str> {
        self.get("NETWORK").flatten()
    }

    pub fn statusmsg(&self) -> Option<&'a str> {
        self.get("STATUSMSG").flatten()
    }

    pub fn nicklen(&self) -> Option<usize> {
        self.get("NICKLEN").flatten().and_then(|n| n.parse().ok())
    }

    pub fn prefix(&self) -> Option<PrefixSpec<'a>> {
        self.get("PREFIX").flatten().and_then(PrefixSpec::parse)
    }
}

/// `PREFIX=(modes)symbols`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    pub modes: &'a str,
    pub prefixes: &'a str,
}

impl<'a> PrefixSpec<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        let rest = s.strip_prefix('(')?;
        let (modes, prefixes) = rest.split_once(')')?;
        if modes.is_empty() || modes.chars().count() != prefixes.chars().count() {
            return None;
        }
        Some(PrefixSpec { modes, prefixes })
    }

    /// Symbols paired with the privilege level their mode letter grants.
    ///
    /// Letters outside `o v h a q` keep their symbol but map to no level.
    pub fn pairs(&self) -> impl Iterator<Item = (char, Option<PrivilegeLevel>)> + 'a {
        self.prefixes
            .chars()
            .zip(self.modes.chars())
            .map(|(symbol, letter)| (symbol, PrivilegeLevel::from_mode_letter(letter)))
    }
}

/// What the server told us about itself.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerInfo {
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub user_modes: Option<String>,
    pub channel_modes: Option<String>,
    pub network: Option<String>,
    pub nick_length: Option<usize>,
    pub case_mapping: CaseMapping,
    pub channel_types: Option<String>,
    pub status_message: Option<String>,
    /// Status symbols in NAMES/WHO, highest first, with their levels.
    pub prefixes: Vec<(char, Option<PrivilegeLevel>)>,
    /// Every ISUPPORT token seen, in arrival order.
    pub isupport: Vec<(String, Option<String>)>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            server_name: None,
            server_version: None,
            user_modes: None,
            channel_modes: None,
            network: None,
            nick_length: None,
            case_mapping: CaseMapping::default(),
            channel_types: None,
            status_message: None,
            prefixes: PrivilegeLevel::ALL
                .into_iter()
                .rev()
                .map(|level| (level.default_symbol(), Some(level)))
                .collect(),
            isupport: Vec::new(),
        }
    }
}

impl ServerInfo {
    /// Record a 004 reply: `<me> <server> <version> <usermodes> <chanmodes>`.
    pub(crate) fn apply_my_info(&mut self, params: &[String]) {
        let mut fields = params.iter().skip(1).cloned();
        self.server_name = fields.next();
        self.server_version = fields.next();
        self.user_modes = fields.next();
        self.channel_modes = fields.next();
    }

    /// Record the tokens of one 005 line.
    pub(crate) fn apply_isupport(&mut self, isupport: &Isupport<'_>) {
        for entry in isupport.iter() {
            self.isupport
                .push((entry.key.to_string(), entry.value.map(str::to_string)));
        }
        if let Some(mapping) = isupport.casemapping().and_then(CaseMapping::from_isupport) {
            self.case_mapping = mapping;
        }
        if let Some(types) = isupport.chantypes() {
            self.channel_types = Some(types.to_string());
        }
        if let Some(network) = isupport.network() {
            self.network = Some(network.to_string());
        }
        if let Some(statusmsg) = isupport.statusmsg() {
            self.status_message = Some(statusmsg.to_string());
        }
        if let Some(len) = isupport.nicklen() {
            self.nick_length = Some(len);
        }
        if let Some(prefix) = isupport.prefix() {
            self.prefixes = prefix.pairs().collect();
        }
    }

    /// Whether `c` is a NAMES/WHO status symbol.
    pub fn is_status_symbol(&self, c: char) -> bool {
        self.prefixes.iter().any(|(symbol, _)| *symbol == c)
    }

    /// Split leading status symbols off a nick (multi-prefix aware).
    pub fn strip_status<'n>(&self, nick: &'n str) -> (Vec<PrivilegeLevel>, &'n str) {
        let mut levels = Vec::new();
        let mut rest = nick;
        while let Some(c) = rest.chars().next() {
            let Some((_, level)) = self.prefixes.iter().find(|(symbol, _)| *symbol == c) else {
                break;
            };
            levels.extend(*level);
            rest = &rest[c.len_utf8()..];
        }
        (levels, rest)
    }

    /// Prefixes that may precede a channel name in a message target.
    pub fn status_message_prefixes(&self) -> String {
        match &self.status_message {
            Some(statusmsg) => statusmsg.clone(),
            None => self.prefixes.iter().map(|(symbol, _)| *symbol).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &[&str]) -> Vec<String> {
        line.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_isupport_tokens() {
        let params = args(&[
            "me",
            "CHANTYPES=#",
            "EXCEPTS",
            "PREFIX=(ov)@+",
            "NETWORK=Libera.Chat",
            "are supported by this server",
        ]);
        let isupport = Isupport::from_response_args(&params).unwrap();
        assert_eq!(isupport.chantypes(), Some("#"));
        assert_eq!(isupport.network(), Some("Libera.Chat"));
        assert_eq!(isupport.get("EXCEPTS"), Some(None));
        assert_eq!(isupport.get("INVEX"), None);
        assert_eq!(isupport.iter().count(), 4);
    }

    #[test]
    fn test_prefix_spec() {
        let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
        let pairs: Vec<_> = spec.pairs().collect();
        assert_eq!(pairs[0], ('~', Some(PrivilegeLevel::Owner)));
        assert_eq!(pairs[4], ('+', Some(PrivilegeLevel::Voice)));

        assert!(PrefixSpec::parse("(ov)@").is_none());
        assert!(PrefixSpec::parse("@+").is_none());
    }

    #[test]
    fn test_apply_isupport_updates_info() {
        let mut info = ServerInfo::default();
        let params = args(&[
            "me",
            "CASEMAPPING=ascii",
            "PREFIX=(Yov)!@+",
            "STATUSMSG=@+",
            "NICKLEN=30",
            "are supported by this server",
        ]);
        info.apply_isupport(&Isupport::from_response_args(&params).unwrap());

        assert_eq!(info.case_mapping, CaseMapping::Ascii);
        assert_eq!(info.nick_length, Some(30));
        assert_eq!(info.status_message_prefixes(), "@+");

        let (levels, nick) = info.strip_status("!@alice");
        assert_eq!(levels, vec![PrivilegeLevel::Op]);
        assert_eq!(nick, "alice");
    }

    #[test]
    fn test_strip_status_defaults() {
        let info = ServerInfo::default();
        let (levels, nick) = info.strip_status("@+bob");
        assert_eq!(levels, vec![PrivilegeLevel::Op, PrivilegeLevel::Voice]);
        assert_eq!(nick, "bob");

        let (levels, nick) = info.strip_status("carol");
        assert!(levels.is_empty());
        assert_eq!(nick, "carol");
    }

    #[test]
    fn test_my_info() {
        let mut info = ServerInfo::default();
        info.apply_my_info(&args(&["me", "irc.example.net", "ircd-9.1", "iow", "bklmnopstv"]));
        assert_eq!(info.server_name.as_deref(), Some("irc.example.net"));
        assert_eq!(info.channel_modes.as_deref(), Some("bklmnopstv"));
    }
}
