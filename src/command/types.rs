//! Commands the client sends.

/// A command the client can send, with its parameters.
///
/// `Display` renders the line without its terminator. Use
/// [`LineFormatter`](super::LineFormatter) to apply the line-length limit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    // === Registration ===
    /// `PASS password`
    Pass(String),
    /// `NICK nickname`
    Nick(String),
    /// `USER username 0 * :realname`
    User(String, String),
    /// `WEBIRC password user host ip`
    WebIrc(String, String, String, String),
    /// `CAP LS 302`
    CapLs,
    /// `CAP REQ :caps...`
    CapReq(Vec<String>),
    /// `CAP END`
    CapEnd,
    /// `AUTHENTICATE payload`
    Authenticate(String),
    /// `STARTTLS`
    StartTls,
    /// `QUIT [:reason]`
    Quit(Option<String>),

    // === Channels ===
    /// `JOIN channel [key]`
    Join(String, Option<String>),
    /// `PART channel [:reason]`
    Part(String, Option<String>),
    /// `MODE target [modes and args]`
    Mode(String, Option<String>),
    /// `KICK channel nick [:reason]`
    Kick(String, String, Option<String>),
    /// `TOPIC channel [:topic]`
    Topic(String, Option<String>),
    /// `INVITE nick channel`
    Invite(String, String),

    // === Messages ===
    /// `PRIVMSG target :text`
    Privmsg(String, String),
    /// `NOTICE target :text`
    Notice(String, String),
    /// A CTCP request: `PRIVMSG target :\x01VERB [args]\x01`
    Ctcp(String, String, Option<String>),
    /// A CTCP reply: `NOTICE target :\x01VERB [args]\x01`
    CtcpReply(String, String, Option<String>),
    /// `PRIVMSG target :\x01ACTION text\x01`
    Action(String, String),

    // === Queries ===
    /// `WHO mask`
    Who(String),
    /// `WHOIS nick`
    Whois(String),
    /// `LIST [channels]`
    List(Option<String>),
    /// `AWAY [:message]`
    Away(Option<String>),
    /// `PING token`
    Ping(String),
    /// `PONG token`
    Pong(String),

    /// A pre-formatted line, sent as is.
    Raw(String),
}

impl Command {
    /// Convenience for `PRIVMSG`.
    pub fn privmsg(target: &str, text: &str) -> Self {
        Command::Privmsg(target.to_string(), text.to_string())
    }

    /// Convenience for `NOTICE`.
    pub fn notice(target: &str, text: &str) -> Self {
        Command::Notice(target.to_string(), text.to_string())
    }

    /// Convenience for `JOIN` without a key.
    pub fn join(channel: &str) -> Self {
        Command::Join(channel.to_string(), None)
    }
}
