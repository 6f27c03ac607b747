//! WHOIS replies, collected per nick until `RPL_ENDOFWHOIS`.

use chrono::{TimeZone, Utc};

use super::{Action, Session};
use crate::dao::UserChannelDao;
use crate::event::{Event, WhoisReply};
use crate::line::Line;

impl Session {
    pub(super) fn on_whois(
        &mut self,
        dao: &mut UserChannelDao,
        code: u16,
        line: &Line,
        out: &mut Vec<Action>,
    ) {
        let Some(nick) = line.param(1) else {
            return;
        };
        let key = dao.case_mapping().normalize(nick);

        // RPL_ENDOFWHOIS
        if code == 318 {
            let reply = self.whois.remove(&key).unwrap_or_else(|| WhoisReply {
                nick: nick.to_string(),
                ..WhoisReply::default()
            });
            out.push(Action::Emit(Event::Whois(reply)));
            return;
        }

        // RPL_AWAY also answers messages to away users; only record it mid-WHOIS.
        if code == 301 {
            if let Some(reply) = self.whois.get_mut(&key) {
                reply.away_message = line.param(2).map(str::to_string);
            }
            return;
        }

        let reply = self.whois.entry(key).or_insert_with(|| WhoisReply {
            nick: nick.to_string(),
            ..WhoisReply::default()
        });
        let live = dao.user_id(nick).and_then(|id| dao.user_mut(id));

        match code {
            // RPL_WHOISUSER: <me> <nick> <login> <host> * :<realname>
            311 => {
                reply.exists = true;
                reply.login = line.param(2).map(str::to_string);
                reply.hostname = line.param(3).map(str::to_string);
                reply.real_name = line.param(5).map(str::to_string);
                if let Some(user) = live {
                    if let Some(login) = line.param(2) {
                        user.set_login(login);
                    }
                    if let Some(host) = line.param(3) {
                        user.set_hostname(host);
                    }
                    if let Some(real_name) = line.param(5) {
                        user.set_real_name(real_name);
                    }
                }
            }
            // RPL_WHOISCHANNELS: <me> <nick> :<channels>
            319 => {
                let channels = line.param(2).unwrap_or_default();
                reply.channels.extend(
                    channels
                        .split_whitespace()
                        .map(|entry| self.server_info.strip_status(entry).1.to_string()),
                );
            }
            // RPL_WHOISSERVER: <me> <nick> <server> :<info>
            312 => {
                reply.server = line.param(2).map(str::to_string);
                reply.server_info = line.param(3).map(str::to_string);
                if let (Some(user), Some(server)) = (live, line.param(2)) {
                    user.set_server(server);
                }
            }
            // RPL_WHOISIDLE: <me> <nick> <idle> <signon> :<text>
            317 => {
                reply.idle_seconds = line.param(2).and_then(|s| s.parse().ok());
                reply.sign_on_time = line
                    .param(3)
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
            }
            // RPL_WHOISACCOUNT: <me> <nick> <account> :is logged in as
            330 => {
                reply.registered_as = line.param(2).map(str::to_string);
                if let Some(user) = live {
                    user.set_identified(true);
                }
            }
            // RPL_WHOISREGNICK
            307 => {
                reply.registered_nick = true;
                if let Some(user) = live {
                    user.set_identified(true);
                }
            }
            _ => {}
        }
    }
}
