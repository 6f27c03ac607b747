//! Point-in-time copies of the whole store.

use std::collections::{HashMap, HashSet};

use super::channel::{ChannelId, ChannelSnapshot};
use super::relation::Relation;
use super::user::{UserId, UserSnapshot};
use super::{resolve_channel, PrivilegeLevel};
use crate::casemap::CaseMapping;

/// An immutable, detached copy of every user, channel and relation.
///
/// Built by [`UserChannelDao::snapshot`](super::UserChannelDao::snapshot).
/// Nothing in a snapshot aliases live state, so it can be handed to other
/// tasks and read at leisure while the session keeps mutating the store.
#[derive(Clone, Debug)]
pub struct DaoSnapshot {
    pub(super) case_mapping: CaseMapping,
    pub(super) status_prefixes: String,
    pub(super) users: HashMap<UserId, UserSnapshot>,
    pub(super) nick_index: HashMap<String, UserId>,
    pub(super) channels: HashMap<ChannelId, ChannelSnapshot>,
    pub(super) channel_index: HashMap<String, ChannelId>,
    pub(super) members: Relation,
    pub(super) levels: [Relation; 5],
    pub(super) private_users: HashSet<UserId>,
    pub(super) self_user: Option<UserId>,
}

impl DaoSnapshot {
    fn user_id(&self, nick: &str) -> Option<UserId> {
        self.nick_index
            .get(&self.case_mapping.normalize(nick))
            .copied()
    }

    fn channel_id(&self, name: &str) -> Option<ChannelId> {
        resolve_channel(
            &self.channel_index,
            self.case_mapping,
            &self.status_prefixes,
            name,
        )
    }

    pub fn user(&self, nick: &str) -> Option<&UserSnapshot> {
        self.user_id(nick).and_then(|id| self.users.get(&id))
    }

    pub fn user_by_id(&self, id: UserId) -> Option<&UserSnapshot> {
        self.users.get(&id)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelSnapshot> {
        self.channel_id(name).and_then(|id| self.channels.get(&id))
    }

    pub fn channel_by_id(&self, id: ChannelId) -> Option<&ChannelSnapshot> {
        self.channels.get(&id)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserSnapshot> {
        self.users.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelSnapshot> {
        self.channels.values()
    }

    /// The session's own user, if registration completed.
    pub fn self_user(&self) -> Option<&UserSnapshot> {
        self.self_user.and_then(|id| self.users.get(&id))
    }

    /// Members of `channel`, in the order they became known.
    pub fn users_of(&self, channel: &str) -> Vec<&UserSnapshot> {
        let Some(channel) = self.channel_id(channel) else {
            return Vec::new();
        };
        self.members
            .users_of(channel)
            .filter_map(|id| self.users.get(&id))
            .collect()
    }

    pub fn channels_of(&self, nick: &str) -> Vec<&ChannelSnapshot> {
        let Some(user) = self.user_id(nick) else {
            return Vec::new();
        };
        self.members
            .channels_of(user)
            .filter_map(|id| self.channels.get(&id))
            .collect()
    }

    pub fn is_member(&self, nick: &str, channel: &str) -> bool {
        match (self.user_id(nick), self.channel_id(channel)) {
            (Some(user), Some(channel)) => self.members.contains(user, channel),
            _ => false,
        }
    }

    pub fn has_privilege(&self, level: PrivilegeLevel, nick: &str, channel: &str) -> bool {
        match (self.user_id(nick), self.channel_id(channel)) {
            (Some(user), Some(channel)) => self.levels[level.index()].contains(user, channel),
            _ => false,
        }
    }

    pub fn privileges_of(&self, nick: &str, channel: &str) -> Vec<PrivilegeLevel> {
        PrivilegeLevel::ALL
            .into_iter()
            .filter(|level| self.has_privilege(*level, nick, channel))
            .collect()
    }

    pub fn users_with_privilege(&self, level: PrivilegeLevel, channel: &str) -> Vec<&UserSnapshot> {
        let Some(channel) = self.channel_id(channel) else {
            return Vec::new();
        };
        self.levels[level.index()]
            .users_of(channel)
            .filter_map(|id| self.users.get(&id))
            .collect()
    }

    /// Whether `nick` was only known as a private-message contact.
    pub fn is_private_contact(&self, nick: &str) -> bool {
        self.user_id(nick)
            .map_or(false, |id| self.private_users.contains(&id))
    }
}
