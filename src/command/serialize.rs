use std::fmt::{self, Write};

use super::types::Command;
use crate::ctcp;

/// Write a command with arguments directly to a formatter.
/// The last argument is treated as trailing and gets a `:` prefix if needed.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    let Some((trailing, middle)) = args.split_last() else {
        return f.write_str(cmd);
    };

    f.write_str(cmd)?;
    for param in middle {
        f.write_char(' ')?;
        f.write_str(param)?;
    }
    f.write_char(' ')?;

    if trailing.is_empty() || trailing.contains(' ') || trailing.starts_with(':') {
        f.write_char(':')?;
    }
    f.write_str(trailing)
}

/// Write a command with a freeform (always colon-prefixed) trailing argument.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    match args.split_last() {
        Some((suffix, middle)) => {
            f.write_str(cmd)?;
            for arg in middle {
                f.write_char(' ')?;
                f.write_str(arg)?;
            }
            f.write_str(" :")?;
            f.write_str(suffix)
        }
        None => f.write_str(cmd),
    }
}

/// `cmd middle... [:trailing]`, the trailing part only when present.
fn write_cmd_optional(
    f: &mut fmt::Formatter<'_>,
    cmd: &str,
    middle: &[&str],
    trailing: Option<&str>,
) -> fmt::Result {
    match trailing {
        Some(trailing) => {
            let mut args = middle.to_vec();
            args.push(trailing);
            write_cmd_freeform(f, cmd, &args)
        }
        None => write_cmd(f, cmd, middle),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(p) => write_cmd(f, "PASS", &[p]),
            Command::Nick(n) => write_cmd(f, "NICK", &[n]),
            Command::User(u, r) => write_cmd_freeform(f, "USER", &[u, "0", "*", r]),
            Command::WebIrc(pass, user, host, ip) => write_cmd(f, "WEBIRC", &[pass, user, host, ip]),
            Command::CapLs => f.write_str("CAP LS 302"),
            Command::CapReq(caps) => write_cmd_freeform(f, "CAP", &["REQ", &caps.join(" ")]),
            Command::CapEnd => f.write_str("CAP END"),
            Command::Authenticate(payload) => write_cmd(f, "AUTHENTICATE", &[payload]),
            Command::StartTls => f.write_str("STARTTLS"),
            Command::Quit(reason) => write_cmd_optional(f, "QUIT", &[], reason.as_deref()),

            Command::Join(c, None) => write_cmd(f, "JOIN", &[c]),
            Command::Join(c, Some(k)) => write_cmd(f, "JOIN", &[c, k]),
            Command::Part(c, reason) => write_cmd_optional(f, "PART", &[c], reason.as_deref()),
            // Mode arguments never form a trailing parameter.
            Command::Mode(t, None) => write!(f, "MODE {}", t),
            Command::Mode(t, Some(m)) => write!(f, "MODE {} {}", t, m),
            Command::Kick(c, n, reason) => {
                write_cmd_optional(f, "KICK", &[c, n], reason.as_deref())
            }
            Command::Topic(c, topic) => write_cmd_optional(f, "TOPIC", &[c], topic.as_deref()),
            Command::Invite(n, c) => write_cmd(f, "INVITE", &[n, c]),

            Command::Privmsg(t, m) => write_cmd_freeform(f, "PRIVMSG", &[t, m]),
            Command::Notice(t, m) => write_cmd_freeform(f, "NOTICE", &[t, m]),
            Command::Ctcp(t, verb, args) => {
                write_cmd_freeform(f, "PRIVMSG", &[t, &ctcp::encode(verb, args.as_deref())])
            }
            Command::CtcpReply(t, verb, args) => {
                write_cmd_freeform(f, "NOTICE", &[t, &ctcp::encode(verb, args.as_deref())])
            }
            Command::Action(t, a) => {
                write_cmd_freeform(f, "PRIVMSG", &[t, &ctcp::encode("ACTION", Some(a))])
            }

            Command::Who(mask) => write_cmd(f, "WHO", &[mask]),
            Command::Whois(nick) => write_cmd(f, "WHOIS", &[nick]),
            Command::List(None) => f.write_str("LIST"),
            Command::List(Some(c)) => write_cmd(f, "LIST", &[c]),
            Command::Away(message) => write_cmd_optional(f, "AWAY", &[], message.as_deref()),
            Command::Ping(token) => write_cmd(f, "PING", &[token]),
            Command::Pong(token) => write_cmd(f, "PONG", &[token]),

            Command::Raw(line) => f.write_str(line),
        }
    }
}
