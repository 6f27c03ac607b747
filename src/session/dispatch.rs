//! Per-command handling of inbound lines.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{error, warn};

use super::{Action, Session};
use crate::command::Command;
use crate::ctcp::Ctcp;
use crate::dao::{
    Channel, ChannelId, ChannelSnapshot, ChannelView, User, UserChannelDao, UserId, UserSnapshot,
};
use crate::error::ConsistencyError;
use crate::event::Event;
use crate::hostmask::UserHostmask;
use crate::line::Line;
use crate::mode::apply_channel_mode;

type Handled = Result<(), ConsistencyError>;

pub(super) fn unknown(line: &Line, out: &mut Vec<Action>) {
    out.push(Action::Emit(Event::Unknown {
        raw: line.raw.clone(),
    }));
}

pub(super) fn channel_snapshot(dao: &UserChannelDao, id: ChannelId) -> Option<ChannelSnapshot> {
    dao.channel_by_id(id).map(Channel::snapshot)
}

pub(super) fn user_snapshot(dao: &UserChannelDao, id: UserId) -> Option<UserSnapshot> {
    dao.user_by_id(id).map(User::snapshot)
}

/// The tracked user behind `source`, refreshed with its login and host.
fn observe(dao: &mut UserChannelDao, source: &UserHostmask) -> Option<UserId> {
    let id = dao.user_id(source.nick())?;
    if let Some(user) = dao.user_mut(id) {
        user.absorb_hostmask(source);
    }
    Some(id)
}

/// Snapshot of the tracked user behind `source`, or a detached one.
fn source_snapshot(dao: &mut UserChannelDao, source: &UserHostmask) -> UserSnapshot {
    observe(dao, source)
        .and_then(|id| user_snapshot(dao, id))
        .unwrap_or_else(|| UserSnapshot::detached(source.clone()))
}

/// `server-time` tag if present, otherwise now.
pub(super) fn line_time(line: &Line) -> DateTime<Utc> {
    line.tag("time")
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc))
}

impl Session {
    /// Apply `line` to the store and emit its events.
    pub(super) fn dispatch(&mut self, line: &Line, out: &mut Vec<Action>) {
        let handle = self.dao.clone();
        let mut dao = handle.lock();

        if let Some(code) = line.numeric() {
            self.on_numeric(&mut dao, code, line, out);
            return;
        }

        match line.command.as_str() {
            "ERROR" => {
                let message = line.last_param().unwrap_or_default().to_string();
                warn!(%message, "server error");
                out.push(Action::Emit(Event::ServerError { message }));
                return;
            }
            // Replies to our liveness PING, and negotiation already seen by registration.
            "PONG" | "CAP" | "AUTHENTICATE" => return,
            _ => {}
        }

        let Some(source) = line.source.as_ref() else {
            unknown(line, out);
            return;
        };

        let result = match line.command.as_str() {
            "PRIVMSG" | "NOTICE" => self.on_message(&mut dao, source, line, out),
            "JOIN" => self.on_join(&mut dao, source, line, out),
            "PART" => self.on_part(&mut dao, source, line, out),
            "QUIT" => self.on_quit(&mut dao, source, line, out),
            "KICK" => self.on_kick(&mut dao, source, line, out),
            "NICK" => self.on_nick(&mut dao, source, line, out),
            "MODE" => self.on_mode(&mut dao, source, line, out),
            "TOPIC" => self.on_topic(&mut dao, source, line, out),
            "INVITE" => self.on_invite(&mut dao, source, line, out),
            "AWAY" => {
                on_away(&mut dao, source, line);
                Ok(())
            }
            _ => {
                unknown(line, out);
                Ok(())
            }
        };

        if let Err(err) = result {
            error!(%err, line = %line.raw, "store consistency fault");
            unknown(line, out);
        }
    }

    fn on_message(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let (Some(target), Some(text)) = (line.param(0), line.param(1)) else {
            unknown(line, out);
            return Ok(());
        };
        let notice = line.command == "NOTICE";
        let channel = if dao.is_channel_name(target) {
            dao.channel_id(target)
        } else {
            None
        };

        let user = match channel {
            Some(_) => source_snapshot(dao, source),
            None if source.is_server() => UserSnapshot::detached(source.clone()),
            None => {
                let id = dao.get_or_create_user(source);
                dao.add_private_user(id);
                user_snapshot(dao, id).unwrap_or_else(|| UserSnapshot::detached(source.clone()))
            }
        };
        let channel = channel.and_then(|id| channel_snapshot(dao, id));
        let sender = source.nick();

        let event = match Ctcp::parse(text) {
            Some(ctcp) if notice => Event::CtcpReply {
                user,
                verb: ctcp.verb().to_string(),
                args: ctcp.args().to_string(),
            },
            Some(Ctcp::Action(action)) => Event::Action {
                channel,
                user,
                action,
            },
            Some(Ctcp::Version(_)) => {
                self.ctcp_reply(out, sender, "VERSION", Some(self.version.clone()));
                Event::Version { channel, user }
            }
            Some(Ctcp::Ping(value)) => {
                let echo = (!value.is_empty()).then(|| value.clone());
                self.ctcp_reply(out, sender, "PING", echo);
                Event::Ping {
                    channel,
                    user,
                    value,
                }
            }
            Some(Ctcp::Time(_)) => {
                self.ctcp_reply(out, sender, "TIME", Some(Local::now().to_rfc2822()));
                Event::Time { channel, user }
            }
            Some(Ctcp::Finger(_)) => {
                self.ctcp_reply(out, sender, "FINGER", Some(self.finger.clone()));
                Event::Finger { channel, user }
            }
            Some(Ctcp::Dcc(request)) => Event::IncomingDcc { user, request },
            Some(Ctcp::Other { verb, args }) => Event::CtcpRequest {
                channel,
                user,
                verb,
                args,
            },
            None if notice => Event::Notice {
                channel,
                user,
                notice: text.to_string(),
            },
            None => match channel {
                Some(channel) => Event::Message {
                    channel,
                    user,
                    message: text.to_string(),
                },
                None => Event::PrivateMessage {
                    user,
                    message: text.to_string(),
                },
            },
        };
        out.push(Action::Emit(event));
        Ok(())
    }

    fn ctcp_reply(&self, out: &mut Vec<Action>, nick: &str, verb: &str, args: Option<String>) {
        self.send(
            out,
            Command::CtcpReply(nick.to_string(), verb.to_string(), args),
        );
    }

    fn on_join(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let Some(name) = line.param(0) else {
            unknown(line, out);
            return Ok(());
        };

        let channel = if self.is_self_nick(dao, source.nick()) {
            let id = dao.create_channel(name);
            self.send(out, Command::Who(name.to_string()));
            self.send(out, Command::Mode(name.to_string(), None));
            id
        } else if let Some(id) = dao.channel_id(name) {
            id
        } else {
            warn!(channel = name, "join to an untracked channel");
            unknown(line, out);
            return Ok(());
        };

        let user = dao.get_or_create_user(source);
        // extended-join: JOIN <channel> <account> :<realname>
        if let (Some(account), Some(real_name)) = (line.param(1), line.param(2)) {
            if let Some(live) = dao.user_mut(user) {
                live.set_real_name(real_name);
                live.set_identified(account != "*");
            }
        }
        dao.add_user_to_channel(user, channel);

        if let (Some(channel), Some(user)) = (channel_snapshot(dao, channel), user_snapshot(dao, user)) {
            out.push(Action::Emit(Event::Join { channel, user }));
        }
        Ok(())
    }

    fn on_part(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let (Some(channel), Some(user)) = (
            line.param(0).and_then(|name| dao.channel_id(name)),
            dao.user_id(source.nick()),
        ) else {
            unknown(line, out);
            return Ok(());
        };

        let snapshot = Arc::new(dao.snapshot());
        let (Some(channel_snap), Some(user_snap)) = (
            snapshot.channel_by_id(channel).cloned(),
            snapshot.user_by_id(user).cloned(),
        ) else {
            unknown(line, out);
            return Ok(());
        };

        if dao.is_self(user) {
            dao.remove_channel(channel)?;
        } else {
            dao.remove_user_from_channel(user, channel)?;
        }

        out.push(Action::Emit(Event::Part {
            snapshot,
            channel: channel_snap,
            user: user_snap,
            reason: line.param(1).unwrap_or_default().to_string(),
        }));
        Ok(())
    }

    fn on_quit(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let snapshot = Arc::new(dao.snapshot());
        let user = match dao.user_id(source.nick()) {
            Some(id) => {
                let user = snapshot.user_by_id(id).cloned();
                if !dao.is_self(id) {
                    dao.remove_user(id)?;
                }
                user
            }
            None => None,
        }
        .unwrap_or_else(|| UserSnapshot::detached(source.clone()));

        out.push(Action::Emit(Event::Quit {
            snapshot,
            user,
            reason: line.param(0).unwrap_or_default().to_string(),
        }));
        Ok(())
    }

    fn on_kick(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let (Some(channel), Some(recipient_nick)) = (
            line.param(0).and_then(|name| dao.channel_id(name)),
            line.param(1),
        ) else {
            unknown(line, out);
            return Ok(());
        };

        let user = source_snapshot(dao, source);
        let snapshot = Arc::new(dao.snapshot());
        let Some(channel_snap) = snapshot.channel_by_id(channel).cloned() else {
            unknown(line, out);
            return Ok(());
        };
        let recipient_id = dao.user_id(recipient_nick);
        let recipient = recipient_id
            .and_then(|id| snapshot.user_by_id(id).cloned())
            .unwrap_or_else(|| UserSnapshot::detached(UserHostmask::from_nick(recipient_nick)));

        match recipient_id {
            Some(id) if dao.is_self(id) => dao.remove_channel(channel)?,
            Some(id) => dao.remove_user_from_channel(id, channel)?,
            None => warn!(nick = recipient_nick, "kick of an untracked user"),
        }

        out.push(Action::Emit(Event::Kick {
            snapshot,
            channel: channel_snap,
            user,
            recipient,
            reason: line.param(2).unwrap_or_default().to_string(),
        }));
        Ok(())
    }

    fn on_nick(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let Some(new_nick) = line.param(0) else {
            unknown(line, out);
            return Ok(());
        };
        let old_nick = source.nick().to_string();

        let user = match dao.user_id(&old_nick) {
            Some(id) => {
                dao.rename_user(id, new_nick)?;
                user_snapshot(dao, id)
            }
            None => None,
        }
        .unwrap_or_else(|| UserSnapshot::detached(source.with_nick(new_nick)));

        if dao.case_mapping().eq(&old_nick, &self.nick) {
            self.nick = new_nick.to_string();
        }

        out.push(Action::Emit(Event::NickChange {
            old_nick,
            new_nick: new_nick.to_string(),
            user,
        }));
        Ok(())
    }

    fn on_mode(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let (Some(target), Some(modes)) = (line.param(0), line.param(1)) else {
            unknown(line, out);
            return Ok(());
        };
        let mode = line.params[1..].join(" ");
        let user = source_snapshot(dao, source);

        if !dao.is_channel_name(target) {
            out.push(Action::Emit(Event::UserMode {
                target: target.to_string(),
                user,
                mode,
            }));
            return Ok(());
        }

        let Some(channel) = dao.channel_id(target) else {
            warn!(channel = target, "mode for an untracked channel");
            unknown(line, out);
            return Ok(());
        };
        let events = apply_channel_mode(dao, channel, &user, modes, &line.params[2..])?;
        out.extend(events.into_iter().map(Action::Emit));
        if let Some(channel) = channel_snapshot(dao, channel) {
            out.push(Action::Emit(Event::Mode {
                channel,
                user,
                mode,
            }));
        }
        Ok(())
    }

    fn on_topic(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let (Some(channel), Some(topic)) = (
            line.param(0).and_then(|name| dao.channel_id(name)),
            line.param(1),
        ) else {
            unknown(line, out);
            return Ok(());
        };

        let timestamp = line_time(line);
        let mut old_topic = None;
        if let Some(live) = dao.channel_mut(channel) {
            old_topic = live.topic().map(str::to_string);
            live.set_topic(topic);
            live.set_topic_info(source.clone(), timestamp);
        }

        if let Some(channel) = channel_snapshot(dao, channel) {
            out.push(Action::Emit(Event::Topic {
                channel,
                old_topic,
                topic: topic.to_string(),
                setter: source.clone(),
                timestamp,
                changed: true,
            }));
        }
        Ok(())
    }

    fn on_invite(
        &mut self,
        dao: &mut UserChannelDao,
        source: &UserHostmask,
        line: &Line,
        out: &mut Vec<Action>,
    ) -> Handled {
        let Some(channel) = line.param(1) else {
            unknown(line, out);
            return Ok(());
        };

        let id = dao.get_or_create_user(source);
        let user = user_snapshot(dao, id).unwrap_or_else(|| UserSnapshot::detached(source.clone()));
        out.push(Action::Emit(Event::Invite {
            user,
            channel: channel.to_string(),
        }));

        if !dao.is_self(id) && dao.channels_of(id).is_empty() {
            dao.remove_user(id)?;
        }
        Ok(())
    }
}

/// `away-notify`: an empty message means the user is back.
fn on_away(dao: &mut UserChannelDao, source: &UserHostmask, line: &Line) {
    let message = line.param(0).unwrap_or_default().to_string();
    if let Some(user) = observe(dao, source).and_then(|id| dao.user_mut(id)) {
        user.set_away_message(Some(message));
    }
}
