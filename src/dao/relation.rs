//! Bidirectional many-to-many relation between users and channels.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use super::{ChannelId, UserId};

/// A pair that was present in one direction of a relation but not the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Disagreement {
    pub user: UserId,
    pub channel: ChannelId,
}

/// Both directions of a user↔channel relation.
///
/// Every mutation touches both maps; empty sets are dropped so that
/// "has no entry" and "has an empty entry" never need to be told apart.
#[derive(Clone, Debug, Default)]
pub(crate) struct Relation {
    by_user: HashMap<UserId, BTreeSet<ChannelId>>,
    by_channel: HashMap<ChannelId, BTreeSet<UserId>>,
}

impl Relation {
    pub fn insert(&mut self, user: UserId, channel: ChannelId) -> bool {
        let added = self.by_user.entry(user).or_default().insert(channel);
        self.by_channel.entry(channel).or_default().insert(user);
        added
    }

    pub fn contains(&self, user: UserId, channel: ChannelId) -> bool {
        self.by_user
            .get(&user)
            .map_or(false, |channels| channels.contains(&channel))
    }

    /// Remove one pair. Returns whether it was present.
    pub fn remove(&mut self, user: UserId, channel: ChannelId) -> Result<bool, Disagreement> {
        let forward = remove_pair(&mut self.by_user, user, channel);
        let backward = remove_pair(&mut self.by_channel, channel, user);
        if forward != backward {
            return Err(Disagreement { user, channel });
        }
        Ok(forward)
    }

    pub fn channels_of(&self, user: UserId) -> impl Iterator<Item = ChannelId> + '_ {
        self.by_user.get(&user).into_iter().flatten().copied()
    }

    pub fn users_of(&self, channel: ChannelId) -> impl Iterator<Item = UserId> + '_ {
        self.by_channel.get(&channel).into_iter().flatten().copied()
    }

    pub fn has_user(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    /// Drop every pair involving `user`, returning the channels it was in.
    pub fn remove_user(&mut self, user: UserId) -> Result<Vec<ChannelId>, Disagreement> {
        let channels = self.by_user.remove(&user).unwrap_or_default();
        for &channel in &channels {
            if !remove_pair(&mut self.by_channel, channel, user) {
                return Err(Disagreement { user, channel });
            }
        }
        Ok(channels.into_iter().collect())
    }

    /// Drop every pair involving `channel`, returning its users.
    pub fn remove_channel(&mut self, channel: ChannelId) -> Result<Vec<UserId>, Disagreement> {
        let users = self.by_channel.remove(&channel).unwrap_or_default();
        for &user in &users {
            if !remove_pair(&mut self.by_user, user, channel) {
                return Err(Disagreement { user, channel });
            }
        }
        Ok(users.into_iter().collect())
    }

    /// Check that both directions hold exactly the same pairs.
    pub fn verify(&self) -> Result<(), Disagreement> {
        for (&user, channels) in &self.by_user {
            for &channel in channels {
                let mirrored = self
                    .by_channel
                    .get(&channel)
                    .map_or(false, |users| users.contains(&user));
                if !mirrored {
                    return Err(Disagreement { user, channel });
                }
            }
        }
        for (&channel, users) in &self.by_channel {
            for &user in users {
                if !self.contains(user, channel) {
                    return Err(Disagreement { user, channel });
                }
            }
        }
        Ok(())
    }

    /// All pairs, user-major.
    pub fn pairs(&self) -> impl Iterator<Item = (UserId, ChannelId)> + '_ {
        self.by_user
            .iter()
            .flat_map(|(&user, channels)| channels.iter().map(move |&channel| (user, channel)))
    }

    pub fn clear(&mut self) {
        self.by_user.clear();
        self.by_channel.clear();
    }
}

fn remove_pair<K, V>(map: &mut HashMap<K, BTreeSet<V>>, key: K, value: V) -> bool
where
    K: Hash + Eq,
    V: Ord,
{
    let Some(set) = map.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(&value);
    if set.is_empty() {
        map.remove(&key);
    }
    removed
}
