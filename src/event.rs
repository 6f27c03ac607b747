//! Events emitted by a session.
//!
//! Every payload is immutable: entities are carried as snapshots taken when
//! the event was produced, and removal events additionally carry a
//! [`DaoSnapshot`] of the whole store as it was just before the removal.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dao::{ChannelFlag, ChannelSnapshot, DaoSnapshot, PrivilegeLevel, UserSnapshot};
use crate::hostmask::UserHostmask;
use crate::isupport::ServerInfo;

/// A privilege was granted or revoked.
#[derive(Clone, Debug)]
pub struct PrivilegeChange {
    pub channel: ChannelSnapshot,
    /// Who set the mode.
    pub source: UserSnapshot,
    /// Who gained or lost the privilege.
    pub recipient: UserSnapshot,
    pub level: PrivilegeLevel,
    pub granted: bool,
}

/// One row of a `LIST` reply.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelListEntry {
    pub name: String,
    pub users: u32,
    pub topic: String,
}

/// Everything learned from one WHOIS exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoisReply {
    pub nick: String,
    pub login: Option<String>,
    pub hostname: Option<String>,
    pub real_name: Option<String>,
    /// Channel names with status prefixes removed.
    pub channels: Vec<String>,
    pub server: Option<String>,
    pub server_info: Option<String>,
    pub idle_seconds: Option<u64>,
    pub sign_on_time: Option<DateTime<Utc>>,
    /// Services account, from 330.
    pub registered_as: Option<String>,
    /// Set by 307.
    pub registered_nick: bool,
    pub away_message: Option<String>,
    /// False when the server only answered "end of WHOIS".
    pub exists: bool,
}

/// Events produced by the session, in the order their lines were read.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// Registration finished and post-connect work has been queued.
    Connect,
    /// The connection is gone. Emitted exactly once per session.
    Disconnect { error: Option<String> },
    /// Server sent `PING`; the `PONG` has already been sent.
    ServerPing { token: String },
    /// Server sent `ERROR`.
    ServerError { message: String },
    /// Any numeric reply, after its specific event (if any).
    ServerResponse {
        code: u16,
        params: Vec<String>,
        raw: String,
    },
    /// 433 during registration.
    NickAlreadyInUse {
        used_nick: String,
        /// The nick retried with, when automatic nick change is on.
        auto_new_nick: Option<String>,
    },
    /// A line nothing else handled, or one that could not be applied.
    Unknown { raw: String },

    Message {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        message: String,
    },
    PrivateMessage {
        user: UserSnapshot,
        message: String,
    },
    Notice {
        /// `None` for a notice sent to us directly (or from a server).
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
        notice: String,
    },
    /// CTCP `ACTION` (`/me`).
    Action {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
        action: String,
    },
    /// CTCP `VERSION` request.
    Version {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
    },
    /// CTCP `PING` request.
    Ping {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
        value: String,
    },
    /// CTCP `TIME` request.
    Time {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
    },
    /// CTCP `FINGER` request.
    Finger {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
    },
    /// CTCP `DCC` request. Transfers themselves are not handled.
    IncomingDcc { user: UserSnapshot, request: String },
    /// Any other CTCP request.
    CtcpRequest {
        channel: Option<ChannelSnapshot>,
        user: UserSnapshot,
        verb: String,
        args: String,
    },
    /// A CTCP reply (carried in a NOTICE).
    CtcpReply {
        user: UserSnapshot,
        verb: String,
        args: String,
    },

    Join {
        channel: ChannelSnapshot,
        user: UserSnapshot,
    },
    Part {
        snapshot: Arc<DaoSnapshot>,
        channel: ChannelSnapshot,
        user: UserSnapshot,
        reason: String,
    },
    Quit {
        snapshot: Arc<DaoSnapshot>,
        user: UserSnapshot,
        reason: String,
    },
    Kick {
        snapshot: Arc<DaoSnapshot>,
        channel: ChannelSnapshot,
        user: UserSnapshot,
        recipient: UserSnapshot,
        reason: String,
    },
    NickChange {
        old_nick: String,
        new_nick: String,
        user: UserSnapshot,
    },
    /// A live TOPIC change, or the topic on join. On join it is announced at
    /// `333` (setter and time); a server that sends `332` alone updates the
    /// stored topic without this event.
    Topic {
        channel: ChannelSnapshot,
        old_topic: Option<String>,
        topic: String,
        setter: UserHostmask,
        timestamp: DateTime<Utc>,
        /// True for a live TOPIC change, false for the join-time replies.
        changed: bool,
    },
    Invite {
        user: UserSnapshot,
        channel: String,
    },
    /// A channel MODE line, after its per-letter events.
    Mode {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        mode: String,
    },
    /// A MODE aimed at a user. The store is not touched.
    UserMode {
        target: String,
        user: UserSnapshot,
        mode: String,
    },
    /// `RPL_CHANNELMODEIS` (324): the authoritative mode string arrived.
    ChannelMode {
        channel: ChannelSnapshot,
        mode: String,
    },
    /// `RPL_CREATIONTIME` (329).
    ChannelCreated {
        channel: ChannelSnapshot,
        created_at: DateTime<Utc>,
    },

    Op(PrivilegeChange),
    Voice(PrivilegeChange),
    HalfOp(PrivilegeChange),
    SuperOp(PrivilegeChange),
    Owner(PrivilegeChange),
    SetChannelKey {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        key: String,
    },
    RemoveChannelKey {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        key: Option<String>,
    },
    SetChannelLimit {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        limit: u32,
    },
    RemoveChannelLimit {
        channel: ChannelSnapshot,
        user: UserSnapshot,
    },
    SetChannelBan {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        hostmask: UserHostmask,
    },
    RemoveChannelBan {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        hostmask: UserHostmask,
    },
    /// One of `+t +n +i +m +p +s`.
    SetChannelFlag {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        flag: ChannelFlag,
    },
    /// One of `-t -n -i -m -p -s`.
    RemoveChannelFlag {
        channel: ChannelSnapshot,
        user: UserSnapshot,
        flag: ChannelFlag,
    },

    /// Membership of a channel was (re)populated.
    ///
    /// `complete` is false after NAMES (nicks only) and true after WHO.
    UserList {
        channel: ChannelSnapshot,
        users: Vec<UserSnapshot>,
        complete: bool,
    },
    Motd { motd: String },
    ChannelList { entries: Vec<ChannelListEntry> },
    ServerInfo(ServerInfo),
    Whois(WhoisReply),
}

impl Event {
    /// Build the per-level event for a privilege change.
    pub(crate) fn privilege(change: PrivilegeChange) -> Self {
        match change.level {
            PrivilegeLevel::Voice => Event::Voice(change),
            PrivilegeLevel::HalfOp => Event::HalfOp(change),
            PrivilegeLevel::Op => Event::Op(change),
            PrivilegeLevel::SuperOp => Event::SuperOp(change),
            PrivilegeLevel::Owner => Event::Owner(change),
        }
    }
}
