//! Numeric replies that update the store or session state.

use chrono::{TimeZone, Utc};
use tracing::{debug, warn};

use super::dispatch::channel_snapshot;
use super::{Action, Session};
use crate::dao::{ChannelId, ChannelView, User, UserChannelDao, UserView};
use crate::event::{ChannelListEntry, Event};
use crate::hostmask::UserHostmask;
use crate::isupport::Isupport;
use crate::line::Line;

/// Away message recorded when WHO says `G` but the text is unknown.
const UNKNOWN_AWAY_MESSAGE: &str = "away";

impl Session {
    /// Handle a numeric, then emit it as a `ServerResponse`.
    pub(super) fn on_numeric(
        &mut self,
        dao: &mut UserChannelDao,
        code: u16,
        line: &Line,
        out: &mut Vec<Action>,
    ) {
        self.numeric_effect(dao, code, line, out);
        out.push(Action::Emit(Event::ServerResponse {
            code,
            params: line.params.clone(),
            raw: line.raw.clone(),
        }));
    }

    fn numeric_effect(
        &mut self,
        dao: &mut UserChannelDao,
        code: u16,
        line: &Line,
        out: &mut Vec<Action>,
    ) {
        match code {
            // RPL_MYINFO
            4 => {
                self.server_info.apply_my_info(&line.params);
                out.push(Action::Emit(Event::ServerInfo(self.server_info.clone())));
            }
            // RPL_ISUPPORT
            5 => self.on_isupport(dao, line, out),

            // RPL_LISTSTART, RPL_LIST, RPL_LISTEND
            321 => self.channel_list.clear(),
            322 => {
                if let Some(name) = line.param(1) {
                    self.channel_list.push(ChannelListEntry {
                        name: name.to_string(),
                        users: line.param(2).and_then(|n| n.parse().ok()).unwrap_or(0),
                        topic: line.param(3).unwrap_or_default().to_string(),
                    });
                }
            }
            323 => {
                let entries = std::mem::take(&mut self.channel_list);
                out.push(Action::Emit(Event::ChannelList { entries }));
            }

            // RPL_CHANNELMODEIS
            324 => {
                let (Some(channel), Some(args)) = (tracked(dao, line, 1), line.params.get(2..)) else {
                    return;
                };
                let mode = args.join(" ");
                if let Some(live) = dao.channel_mut(channel) {
                    live.set_mode(&mode);
                }
                if let Some(channel) = channel_snapshot(dao, channel) {
                    out.push(Action::Emit(Event::ChannelMode { channel, mode }));
                }
            }
            // RPL_CREATIONTIME
            329 => {
                let (Some(channel), Some(created_at)) = (
                    tracked(dao, line, 1),
                    line.param(2).and_then(parse_timestamp),
                ) else {
                    return;
                };
                if let Some(live) = dao.channel_mut(channel) {
                    live.set_created_at(created_at);
                }
                if let Some(channel) = channel_snapshot(dao, channel) {
                    out.push(Action::Emit(Event::ChannelCreated {
                        channel,
                        created_at,
                    }));
                }
            }
            // RPL_TOPIC: stored now, announced with RPL_TOPICWHOTIME.
            332 => {
                let (Some(channel), Some(topic)) = (tracked(dao, line, 1), line.param(2)) else {
                    return;
                };
                if let Some(live) = dao.channel_mut(channel) {
                    live.set_topic(topic);
                }
            }
            333 => {
                let (Some(channel), Some(setter), Some(timestamp)) = (
                    tracked(dao, line, 1),
                    line.param(2),
                    line.param(3).and_then(parse_timestamp),
                ) else {
                    return;
                };
                let setter = UserHostmask::parse(setter);
                if let Some(live) = dao.channel_mut(channel) {
                    live.set_topic_info(setter.clone(), timestamp);
                }
                if let Some(channel) = channel_snapshot(dao, channel) {
                    let topic = channel.topic().unwrap_or_default().to_string();
                    out.push(Action::Emit(Event::Topic {
                        channel,
                        old_topic: None,
                        topic,
                        setter,
                        timestamp,
                        changed: false,
                    }));
                }
            }

            // RPL_WHOREPLY, RPL_ENDOFWHO
            352 => self.on_who_reply(dao, line),
            315 => {
                if let Some(channel) = tracked(dao, line, 1) {
                    user_list(dao, channel, true, out);
                }
            }

            // RPL_NAMREPLY, RPL_ENDOFNAMES
            353 => self.on_names(dao, line),
            366 => {
                if let Some(channel) = tracked(dao, line, 1) {
                    user_list(dao, channel, false, out);
                }
            }

            // RPL_MOTDSTART, RPL_MOTD, RPL_ENDOFMOTD
            375 => self.motd.clear(),
            372 => {
                let text = line.last_param().unwrap_or_default();
                self.motd
                    .push(text.strip_prefix("- ").unwrap_or(text).to_string());
            }
            376 => {
                let motd = std::mem::take(&mut self.motd).join("\n");
                out.push(Action::Emit(Event::Motd { motd }));
            }

            301 | 307 | 311 | 312 | 317 | 318 | 319 | 330 => self.on_whois(dao, code, line, out),
            _ => {}
        }
    }

    fn on_isupport(&mut self, dao: &mut UserChannelDao, line: &Line, out: &mut Vec<Action>) {
        let Some(isupport) = Isupport::from_response_args(&line.params) else {
            return;
        };
        self.server_info.apply_isupport(&isupport);

        if isupport.casemapping().is_some() {
            dao.set_case_mapping(self.server_info.case_mapping);
        }
        if let Some(types) = isupport.chantypes() {
            dao.set_channel_prefixes(types);
        }
        if isupport.prefix().is_some() || isupport.statusmsg().is_some() {
            dao.set_status_prefixes(&self.server_info.status_message_prefixes());
        }
        debug!(
            case_mapping = ?self.server_info.case_mapping,
            channel_prefixes = dao.channel_prefixes(),
            "applied ISUPPORT"
        );
        out.push(Action::Emit(Event::ServerInfo(self.server_info.clone())));
    }

    /// `352 <me> <channel> <login> <host> <server> <nick> <flags> :<hops> <realname>`
    fn on_who_reply(&mut self, dao: &mut UserChannelDao, line: &Line) {
        let (Some(login), Some(host), Some(server), Some(nick), Some(flags), Some(rest)) = (
            line.param(2),
            line.param(3),
            line.param(4),
            line.param(5),
            line.param(6),
            line.param(7),
        ) else {
            warn!(line = %line.raw, "short WHO reply");
            return;
        };
        let channel = tracked(dao, line, 1);
        let id = match (channel, dao.user_id(nick)) {
            (_, Some(id)) => id,
            (Some(_), None) => dao.get_or_create_user(&UserHostmask::new(nick, Some(login), Some(host))),
            (None, None) => return,
        };

        let (hops, real_name) = rest.split_once(' ').unwrap_or((rest, ""));
        if let Some(user) = dao.user_mut(id) {
            user.set_login(login);
            user.set_hostname(host);
            user.set_server(server);
            if let Ok(hops) = hops.parse() {
                user.set_hops(hops);
            }
            user.set_real_name(real_name);
            user.set_irc_op(flags.contains('*'));
            let away = if flags.starts_with('G') {
                match user.away_message() {
                    Some(message) if !message.is_empty() => message.to_string(),
                    _ => UNKNOWN_AWAY_MESSAGE.to_string(),
                }
            } else {
                String::new()
            };
            user.set_away_message(Some(away));
        }

        if let Some(channel) = channel {
            dao.add_user_to_channel(id, channel);
            let levels = flags
                .chars()
                .filter_map(|c| self.server_info.prefixes.iter().find(|(s, _)| *s == c))
                .filter_map(|(_, level)| *level);
            for level in levels {
                dao.add_privilege(level, id, channel);
            }
        }
    }

    /// `353 <me> <symbol> <channel> :<names>`
    fn on_names(&mut self, dao: &mut UserChannelDao, line: &Line) {
        let (Some(channel), Some(names)) = (tracked(dao, line, 2), line.param(3)) else {
            return;
        };
        for entry in names.split_whitespace() {
            let (levels, name) = self.server_info.strip_status(entry);
            if name.is_empty() {
                continue;
            }
            // userhost-in-names sends full hostmasks
            let hostmask = if name.contains('!') {
                UserHostmask::parse(name)
            } else {
                UserHostmask::from_nick(name)
            };
            let id = dao.get_or_create_user(&hostmask);
            dao.add_user_to_channel(id, channel);
            for level in levels {
                dao.add_privilege(level, id, channel);
            }
        }
    }
}

/// The tracked channel named by parameter `index`.
fn tracked(dao: &UserChannelDao, line: &Line, index: usize) -> Option<ChannelId> {
    line.param(index).and_then(|name| dao.channel_id(name))
}

fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<Utc>> {
    let secs = raw.parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn user_list(dao: &UserChannelDao, channel: ChannelId, complete: bool, out: &mut Vec<Action>) {
    let Some(snapshot) = channel_snapshot(dao, channel) else {
        return;
    };
    let users = dao
        .users_of(channel)
        .into_iter()
        .map(User::snapshot)
        .collect();
    out.push(Action::Emit(Event::UserList {
        channel: snapshot,
        users,
        complete,
    }));
}

#[cfg(test)]
mod tests {
    use super::super::tests::{events, session};
    use super::*;
    use crate::casemap::CaseMapping;
    use crate::dao::PrivilegeLevel;

    #[test]
    fn test_every_numeric_is_a_server_response() {
        let (mut session, _) = session();
        let events = events(session.handle_line(":irc.example.net 251 bot :There are 3 users"));
        assert!(matches!(&events[..], [Event::ServerResponse { code: 251, .. }]));
    }

    #[test]
    fn test_names_populates_membership() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        let _ = session.handle_line(":irc.example.net 353 bot = #rust :bot @alice +carol");
        let events = events(session.handle_line(":irc.example.net 366 bot #rust :End of /NAMES list."));
        let Event::UserList { users, complete, .. } = &events[0] else {
            panic!("expected user list, got {:?}", events);
        };
        assert!(!complete);
        assert_eq!(users.len(), 3);

        let dao = dao.lock();
        let channel = dao.channel_id("#rust").unwrap();
        let alice = dao.user_id("alice").unwrap();
        let carol = dao.user_id("carol").unwrap();
        assert!(dao.has_privilege(PrivilegeLevel::Op, alice, channel));
        assert!(dao.has_privilege(PrivilegeLevel::Voice, carol, channel));
        assert!(!dao.has_privilege(PrivilegeLevel::Op, carol, channel));
    }

    #[test]
    fn test_names_for_untracked_channel_is_ignored() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":irc.example.net 353 bot = #other :alice");
        let events = events(session.handle_line(":irc.example.net 366 bot #other :End"));
        assert!(matches!(&events[..], [Event::ServerResponse { code: 366, .. }]));
        assert!(!dao.lock().contains_user("alice"));
    }

    #[test]
    fn test_who_reply_fills_user() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        let _ = session.handle_line(
            ":irc.example.net 352 bot #rust ali host.example irc.example.net alice G*@ :2 Alice L",
        );
        let events = events(session.handle_line(":irc.example.net 315 bot #rust :End of WHO"));
        assert!(matches!(&events[0], Event::UserList { complete: true, .. }));

        let dao = dao.lock();
        let alice = dao.user("alice").unwrap();
        assert_eq!(alice.login(), Some("ali"));
        assert_eq!(alice.hostname(), Some("host.example"));
        assert_eq!(alice.server(), Some("irc.example.net"));
        assert_eq!(alice.hops(), Some(2));
        assert_eq!(alice.real_name(), Some("Alice L"));
        assert!(alice.is_irc_op());
        assert!(alice.is_away());
        let channel = dao.channel_id("#rust").unwrap();
        assert!(dao.has_privilege(PrivilegeLevel::Op, alice.id(), channel));
    }

    #[test]
    fn test_channel_mode_reply_is_authoritative() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        assert!(dao.lock().channel("#rust").unwrap().is_mode_stale());

        let events = events(session.handle_line(":irc.example.net 324 bot #rust +ntk secret"));
        assert!(matches!(&events[0], Event::ChannelMode { mode, .. } if mode == "+ntk secret"));
        let dao = dao.lock();
        let channel = dao.channel("#rust").unwrap();
        assert!(!channel.is_mode_stale());
        assert_eq!(channel.channel_key(), Some("secret"));
    }

    #[test]
    fn test_topic_replies() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        let events_332 = events(session.handle_line(":irc.example.net 332 bot #rust :Rust talk"));
        assert!(matches!(&events_332[..], [Event::ServerResponse { code: 332, .. }]));

        let events_333 = events(
            session.handle_line(":irc.example.net 333 bot #rust alice!a@h 1700000000"),
        );
        assert!(matches!(
            &events_333[0],
            Event::Topic { topic, changed: false, setter, .. }
                if topic == "Rust talk" && setter.nick() == "alice"
        ));
        let dao = dao.lock();
        let channel = dao.channel("#rust").unwrap();
        assert_eq!(channel.topic_timestamp().map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_topic_without_333_is_stored_silently() {
        let (mut session, dao) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        let events = events(session.handle_line(":irc.example.net 332 bot #rust :Rust talk"));
        assert!(!events.iter().any(|e| matches!(e, Event::Topic { .. })));
        assert_eq!(dao.lock().channel("#rust").unwrap().topic(), Some("Rust talk"));
    }

    #[test]
    fn test_creation_time() {
        let (mut session, _) = session();
        let _ = session.handle_line(":bot!b@h JOIN #rust");
        let events = events(session.handle_line(":irc.example.net 329 bot #rust 1600000000"));
        assert!(matches!(
            &events[0],
            Event::ChannelCreated { created_at, .. } if created_at.timestamp() == 1_600_000_000
        ));
    }

    #[test]
    fn test_motd_accumulates() {
        let (mut session, _) = session();
        let _ = session.handle_line(":irc.example.net 375 bot :- irc.example.net Message of the day -");
        let _ = session.handle_line(":irc.example.net 372 bot :- line one");
        let _ = session.handle_line(":irc.example.net 372 bot :- line two");
        let events = events(session.handle_line(":irc.example.net 376 bot :End of /MOTD"));
        assert!(matches!(&events[0], Event::Motd { motd } if motd == "line one\nline two"));
    }

    #[test]
    fn test_channel_list() {
        let (mut session, _) = session();
        let _ = session.handle_line(":irc.example.net 321 bot Channel :Users Name");
        let _ = session.handle_line(":irc.example.net 322 bot #rust 42 :Rust talk");
        let _ = session.handle_line(":irc.example.net 322 bot #go 7 :");
        let events = events(session.handle_line(":irc.example.net 323 bot :End of LIST"));
        let Event::ChannelList { entries } = &events[0] else {
            panic!("expected channel list");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].users, 42);
        assert_eq!(entries[1].topic, "");
    }

    #[test]
    fn test_isupport_reconfigures_store() {
        let (mut session, dao) = session();
        let events = events(session.handle_line(
            ":irc.example.net 005 bot CASEMAPPING=ascii CHANTYPES=# PREFIX=(qov)~@+ :are supported by this server",
        ));
        assert!(matches!(&events[0], Event::ServerInfo(info) if info.case_mapping == CaseMapping::Ascii));
        let dao = dao.lock();
        assert_eq!(dao.case_mapping(), CaseMapping::Ascii);
        assert!(!dao.is_channel_name("&local"));
        assert!(dao.is_channel_name("@#rust"));
    }

    #[test]
    fn test_my_info() {
        let (mut session, _) = session();
        let _ = session.handle_line(":irc.example.net 004 bot irc.example.net ircd-1.0 iow biklmnopstv");
        let info = session.server_info();
        assert_eq!(info.server_name.as_deref(), Some("irc.example.net"));
        assert_eq!(info.server_version.as_deref(), Some("ircd-1.0"));
        assert_eq!(info.channel_modes.as_deref(), Some("biklmnopstv"));
    }
}
