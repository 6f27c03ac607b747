//! The user/channel relational store.
//!
//! Users and channels are owned by [`UserChannelDao`] and addressed by
//! stable ids. Membership and the five privilege levels are independent
//! bidirectional relations between those ids. All mutation happens on the
//! session's reader task; other tasks read through [`DaoHandle`], which
//! puts the whole store behind a single `parking_lot` mutex.
//!
//! Rules the store upholds after every public mutation:
//!
//! - both directions of every relation hold the same pairs;
//! - holding a privilege on a channel implies membership of it;
//! - a user with no membership, no privilege and no private-message record
//!   is dropped from the store, unless it is the session's own user.

mod channel;
mod relation;
mod snapshot;
mod user;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

pub use self::channel::{
    Channel, ChannelFlag, ChannelFlags, ChannelId, ChannelSnapshot, ChannelView,
};
pub use self::snapshot::DaoSnapshot;
pub use self::user::{User, UserId, UserSnapshot, UserView};

use self::relation::{Disagreement, Relation};
use crate::casemap::CaseMapping;
use crate::error::ConsistencyError;
use crate::hostmask::UserHostmask;

/// Channel privilege levels, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrivilegeLevel {
    Voice,
    HalfOp,
    Op,
    SuperOp,
    Owner,
}

impl PrivilegeLevel {
    pub const ALL: [PrivilegeLevel; 5] = [
        PrivilegeLevel::Voice,
        PrivilegeLevel::HalfOp,
        PrivilegeLevel::Op,
        PrivilegeLevel::SuperOp,
        PrivilegeLevel::Owner,
    ];

    /// Channel mode letter granting this level.
    pub fn mode_letter(self) -> char {
        match self {
            PrivilegeLevel::Voice => 'v',
            PrivilegeLevel::HalfOp => 'h',
            PrivilegeLevel::Op => 'o',
            PrivilegeLevel::SuperOp => 'a',
            PrivilegeLevel::Owner => 'q',
        }
    }

    pub fn from_mode_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.mode_letter() == letter)
    }

    /// Status symbol used in NAMES and WHO replies when PREFIX is not advertised.
    pub fn default_symbol(self) -> char {
        match self {
            PrivilegeLevel::Voice => '+',
            PrivilegeLevel::HalfOp => '%',
            PrivilegeLevel::Op => '@',
            PrivilegeLevel::SuperOp => '&',
            PrivilegeLevel::Owner => '~',
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn relation_name(self) -> &'static str {
        match self {
            PrivilegeLevel::Voice => "voice",
            PrivilegeLevel::HalfOp => "half-op",
            PrivilegeLevel::Op => "op",
            PrivilegeLevel::SuperOp => "super-op",
            PrivilegeLevel::Owner => "owner",
        }
    }
}

/// Answer to a channel mode lookup.
#[derive(Debug)]
pub enum ModeQuery {
    /// The stored mode string is authoritative.
    Known(String),
    /// A query is outstanding; the receiver yields `Some` once it is answered.
    Stale(watch::Receiver<Option<String>>),
}

const MEMBERSHIP: &str = "membership";
const DEFAULT_CHANNEL_PREFIXES: &str = "#&";
const DEFAULT_STATUS_PREFIXES: &str = "~&@%+";

/// Look `name` up, stripping status prefixes until a channel matches.
pub(crate) fn resolve_channel(
    index: &HashMap<String, ChannelId>,
    case_mapping: CaseMapping,
    status_prefixes: &str,
    name: &str,
) -> Option<ChannelId> {
    let mut candidate = name;
    loop {
        if let Some(id) = index.get(&case_mapping.normalize(candidate)) {
            return Some(*id);
        }
        let mut chars = candidate.chars();
        match chars.next() {
            Some(c) if status_prefixes.contains(c) => candidate = chars.as_str(),
            _ => return None,
        }
    }
}

/// Users, channels and the relations between them.
#[derive(Debug)]
pub struct UserChannelDao {
    case_mapping: CaseMapping,
    channel_prefixes: String,
    status_prefixes: String,
    next_id: u64,
    users: HashMap<UserId, User>,
    nick_index: HashMap<String, UserId>,
    channels: HashMap<ChannelId, Channel>,
    channel_index: HashMap<String, ChannelId>,
    members: Relation,
    levels: [Relation; 5],
    private_users: HashSet<UserId>,
    self_user: Option<UserId>,
}

impl Default for UserChannelDao {
    fn default() -> Self {
        Self::new()
    }
}

impl UserChannelDao {
    pub fn new() -> Self {
        Self {
            case_mapping: CaseMapping::default(),
            channel_prefixes: DEFAULT_CHANNEL_PREFIXES.to_string(),
            status_prefixes: DEFAULT_STATUS_PREFIXES.to_string(),
            next_id: 1,
            users: HashMap::new(),
            nick_index: HashMap::new(),
            channels: HashMap::new(),
            channel_index: HashMap::new(),
            members: Relation::default(),
            levels: Default::default(),
            private_users: HashSet::new(),
            self_user: None,
        }
    }

    pub fn case_mapping(&self) -> CaseMapping {
        self.case_mapping
    }

    /// Switch case mapping and rebuild both lookup indexes.
    pub fn set_case_mapping(&mut self, case_mapping: CaseMapping) {
        if self.case_mapping == case_mapping {
            return;
        }
        self.case_mapping = case_mapping;
        self.nick_index = self
            .users
            .values()
            .map(|u| (case_mapping.normalize(u.nick()), u.id()))
            .collect();
        self.channel_index = self
            .channels
            .values()
            .map(|c| (case_mapping.normalize(c.name()), c.id()))
            .collect();
    }

    pub fn channel_prefixes(&self) -> &str {
        &self.channel_prefixes
    }

    pub fn set_channel_prefixes(&mut self, prefixes: &str) {
        self.channel_prefixes = prefixes.to_string();
    }

    pub fn status_prefixes(&self) -> &str {
        &self.status_prefixes
    }

    pub fn set_status_prefixes(&mut self, prefixes: &str) {
        self.status_prefixes = prefixes.to_string();
    }

    /// Whether `target` names a channel, ignoring status prefixes.
    pub fn is_channel_name(&self, target: &str) -> bool {
        let mut rest = target;
        loop {
            match rest.chars().next() {
                Some(c) if self.channel_prefixes.contains(c) => return true,
                Some(c) if self.status_prefixes.contains(c) => rest = &rest[c.len_utf8()..],
                _ => return false,
            }
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fault(&self, relation: &'static str, d: Disagreement) -> ConsistencyError {
        ConsistencyError {
            relation,
            user: self
                .users
                .get(&d.user)
                .map_or_else(|| d.user.to_string(), |u| u.nick().to_string()),
            channel: self
                .channels
                .get(&d.channel)
                .map_or_else(|| d.channel.to_string(), |c| c.name().to_string()),
        }
    }

    // ---- users ----

    pub fn user_id(&self, nick: &str) -> Option<UserId> {
        self.nick_index
            .get(&self.case_mapping.normalize(nick))
            .copied()
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.user_id(nick).and_then(|id| self.users.get(&id))
    }

    pub fn user_by_id(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub(crate) fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn contains_user(&self, nick: &str) -> bool {
        self.user_id(nick).is_some()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Find the user for `hostmask` by nick, creating it if unknown.
    ///
    /// Login and hostname from the hostmask are recorded when present.
    pub fn get_or_create_user(&mut self, hostmask: &UserHostmask) -> UserId {
        if let Some(id) = self.user_id(hostmask.nick()) {
            if let Some(user) = self.users.get_mut(&id) {
                user.absorb_hostmask(hostmask);
            }
            return id;
        }
        let id = UserId(self.allocate_id());
        self.nick_index
            .insert(self.case_mapping.normalize(hostmask.nick()), id);
        self.users.insert(id, User::new(id, hostmask.clone()));
        debug!(nick = hostmask.nick(), %id, "tracking user");
        id
    }

    /// Rename a user in place. Its id and relations are unchanged.
    ///
    /// A different user still holding `new_nick` is stale and is evicted.
    pub fn rename_user(&mut self, id: UserId, new_nick: &str) -> Result<(), ConsistencyError> {
        let Some(old_nick) = self.users.get(&id).map(|u| u.nick().to_string()) else {
            return Ok(());
        };
        if let Some(holder) = self.user_id(new_nick) {
            if holder != id {
                debug!(nick = new_nick, "evicting stale holder of nick");
                self.remove_user(holder)?;
            }
        }
        let old_key = self.case_mapping.normalize(&old_nick);
        if self.nick_index.get(&old_key) == Some(&id) {
            self.nick_index.remove(&old_key);
        }
        self.nick_index
            .insert(self.case_mapping.normalize(new_nick), id);
        if let Some(user) = self.users.get_mut(&id) {
            user.set_nick(new_nick);
        }
        Ok(())
    }

    /// Drop a user from every relation and from lookup.
    pub fn remove_user(&mut self, id: UserId) -> Result<(), ConsistencyError> {
        self.members
            .remove_user(id)
            .map_err(|d| self.fault(MEMBERSHIP, d))?;
        for level in PrivilegeLevel::ALL {
            self.levels[level.index()]
                .remove_user(id)
                .map_err(|d| self.fault(level.relation_name(), d))?;
        }
        self.private_users.remove(&id);
        if self.self_user == Some(id) {
            self.self_user = None;
        }
        self.forget_user(id);
        Ok(())
    }

    fn forget_user(&mut self, id: UserId) {
        if let Some(user) = self.users.remove(&id) {
            let key = self.case_mapping.normalize(user.nick());
            if self.nick_index.get(&key) == Some(&id) {
                self.nick_index.remove(&key);
            }
            debug!(nick = user.nick(), "forgot user");
        }
    }

    /// Remove `id` if nothing references it any more.
    fn collect_if_orphaned(&mut self, id: UserId) {
        if self.self_user == Some(id)
            || self.members.has_user(id)
            || self.levels.iter().any(|rel| rel.has_user(id))
            || self.private_users.contains(&id)
        {
            return;
        }
        self.forget_user(id);
    }

    /// Remember `id` as a private-message contact, keeping it alive.
    pub fn add_private_user(&mut self, id: UserId) {
        self.private_users.insert(id);
    }

    pub fn is_private_user(&self, id: UserId) -> bool {
        self.private_users.contains(&id)
    }

    /// Forget a private-message contact; the user goes if nothing else holds it.
    pub fn remove_private_user(&mut self, id: UserId) {
        self.private_users.remove(&id);
        self.collect_if_orphaned(id);
    }

    /// Mark `id` as the session's own user. It is never garbage collected.
    pub fn set_self(&mut self, id: UserId) {
        self.self_user = Some(id);
    }

    pub fn self_id(&self) -> Option<UserId> {
        self.self_user
    }

    pub fn self_user(&self) -> Option<&User> {
        self.self_user.and_then(|id| self.users.get(&id))
    }

    pub fn is_self(&self, id: UserId) -> bool {
        self.self_user == Some(id)
    }

    // ---- channels ----

    pub fn channel_id(&self, name: &str) -> Option<ChannelId> {
        resolve_channel(
            &self.channel_index,
            self.case_mapping,
            &self.status_prefixes,
            name,
        )
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channel_id(name).and_then(|id| self.channels.get(&id))
    }

    pub fn channel_by_id(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub(crate) fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn contains_channel(&self, name: &str) -> bool {
        self.channel_id(name).is_some()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Create a channel, or return the existing one with that name.
    pub fn create_channel(&mut self, name: &str) -> ChannelId {
        let key = self.case_mapping.normalize(name);
        if let Some(id) = self.channel_index.get(&key) {
            return *id;
        }
        let id = ChannelId(self.allocate_id());
        self.channel_index.insert(key, id);
        self.channels.insert(id, Channel::new(id, name));
        debug!(channel = name, %id, "tracking channel");
        id
    }

    /// Drop a channel from every relation, then collect orphaned users.
    pub fn remove_channel(&mut self, id: ChannelId) -> Result<(), ConsistencyError> {
        let users = self
            .members
            .remove_channel(id)
            .map_err(|d| self.fault(MEMBERSHIP, d))?;
        for level in PrivilegeLevel::ALL {
            self.levels[level.index()]
                .remove_channel(id)
                .map_err(|d| self.fault(level.relation_name(), d))?;
        }
        if let Some(channel) = self.channels.remove(&id) {
            let key = self.case_mapping.normalize(channel.name());
            self.channel_index.remove(&key);
            debug!(channel = channel.name(), "forgot channel");
        }
        for user in users {
            self.collect_if_orphaned(user);
        }
        Ok(())
    }

    /// The channel's mode, or a receiver to wait on while it is stale.
    pub fn channel_mode(&self, name: &str) -> Option<ModeQuery> {
        let channel = self.channel(name)?;
        Some(if channel.is_mode_stale() {
            ModeQuery::Stale(channel.subscribe_mode())
        } else {
            ModeQuery::Known(channel.mode().to_string())
        })
    }

    // ---- relations ----

    pub fn add_user_to_channel(&mut self, user: UserId, channel: ChannelId) {
        self.members.insert(user, channel);
    }

    /// Remove one membership together with every privilege on that pair.
    pub fn remove_user_from_channel(
        &mut self,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), ConsistencyError> {
        for level in PrivilegeLevel::ALL {
            self.levels[level.index()]
                .remove(user, channel)
                .map_err(|d| self.fault(level.relation_name(), d))?;
        }
        self.members
            .remove(user, channel)
            .map_err(|d| self.fault(MEMBERSHIP, d))?;
        self.collect_if_orphaned(user);
        Ok(())
    }

    pub fn is_member(&self, user: UserId, channel: ChannelId) -> bool {
        self.members.contains(user, channel)
    }

    /// Members of a channel, oldest first.
    pub fn users_of(&self, channel: ChannelId) -> Vec<&User> {
        self.members
            .users_of(channel)
            .filter_map(|id| self.users.get(&id))
            .collect()
    }

    pub fn channels_of(&self, user: UserId) -> Vec<&Channel> {
        self.members
            .channels_of(user)
            .filter_map(|id| self.channels.get(&id))
            .collect()
    }

    /// Grant a privilege. Membership is added too if missing.
    pub fn add_privilege(&mut self, level: PrivilegeLevel, user: UserId, channel: ChannelId) {
        self.members.insert(user, channel);
        self.levels[level.index()].insert(user, channel);
    }

    /// Revoke a privilege. Membership is left alone.
    pub fn remove_privilege(
        &mut self,
        level: PrivilegeLevel,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), ConsistencyError> {
        self.levels[level.index()]
            .remove(user, channel)
            .map(|_| ())
            .map_err(|d| self.fault(level.relation_name(), d))
    }

    pub fn has_privilege(&self, level: PrivilegeLevel, user: UserId, channel: ChannelId) -> bool {
        self.levels[level.index()].contains(user, channel)
    }

    pub fn privileges_of(&self, user: UserId, channel: ChannelId) -> Vec<PrivilegeLevel> {
        PrivilegeLevel::ALL
            .into_iter()
            .filter(|level| self.has_privilege(*level, user, channel))
            .collect()
    }

    pub fn users_with_privilege(&self, level: PrivilegeLevel, channel: ChannelId) -> Vec<&User> {
        self.levels[level.index()]
            .users_of(channel)
            .filter_map(|id| self.users.get(&id))
            .collect()
    }

    // ---- whole store ----

    /// Deep-copy every entity and relation.
    pub fn snapshot(&self) -> DaoSnapshot {
        DaoSnapshot {
            case_mapping: self.case_mapping,
            status_prefixes: self.status_prefixes.clone(),
            users: self
                .users
                .iter()
                .map(|(id, user)| (*id, user.snapshot()))
                .collect(),
            nick_index: self.nick_index.clone(),
            channels: self
                .channels
                .iter()
                .map(|(id, channel)| (*id, channel.snapshot()))
                .collect(),
            channel_index: self.channel_index.clone(),
            members: self.members.clone(),
            levels: self.levels.clone(),
            private_users: self.private_users.clone(),
            self_user: self.self_user,
        }
    }

    /// Check every relation for agreement and privilege-implies-membership.
    pub fn verify(&self) -> Result<(), ConsistencyError> {
        self.members
            .verify()
            .map_err(|d| self.fault(MEMBERSHIP, d))?;
        for level in PrivilegeLevel::ALL {
            let relation = &self.levels[level.index()];
            relation
                .verify()
                .map_err(|d| self.fault(level.relation_name(), d))?;
            if let Some((user, channel)) = relation
                .pairs()
                .find(|(user, channel)| !self.members.contains(*user, *channel))
            {
                return Err(self.fault(MEMBERSHIP, Disagreement { user, channel }));
            }
        }
        Ok(())
    }

    /// Forget everything. Ids keep counting up.
    ///
    /// Dropping the channels drops their mode senders, which releases any
    /// task still waiting on a stale mode.
    pub fn clear(&mut self) {
        self.users.clear();
        self.nick_index.clear();
        self.channels.clear();
        self.channel_index.clear();
        self.members.clear();
        for relation in &mut self.levels {
            relation.clear();
        }
        self.private_users.clear();
        self.self_user = None;
    }
}

/// Shared handle to a [`UserChannelDao`].
///
/// Hold the guard only briefly: the session's reader task needs the same
/// lock for every line it processes.
#[derive(Clone, Debug, Default)]
pub struct DaoHandle(Arc<Mutex<UserChannelDao>>);

impl DaoHandle {
    pub fn new(dao: UserChannelDao) -> Self {
        Self(Arc::new(Mutex::new(dao)))
    }

    pub fn lock(&self) -> MutexGuard<'_, UserChannelDao> {
        self.0.lock()
    }

    pub fn snapshot(&self) -> DaoSnapshot {
        self.0.lock().snapshot()
    }
}
