//! Live channels and their immutable snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::hostmask::UserHostmask;

/// Stable identity of a channel inside one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// Argument-less channel modes tracked as booleans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelFlag {
    /// `+t`
    TopicProtection,
    /// `+n`
    NoExternalMessages,
    /// `+i`
    InviteOnly,
    /// `+m`
    Moderated,
    /// `+p`
    Private,
    /// `+s`
    Secret,
}

impl ChannelFlag {
    pub const ALL: [ChannelFlag; 6] = [
        ChannelFlag::TopicProtection,
        ChannelFlag::NoExternalMessages,
        ChannelFlag::InviteOnly,
        ChannelFlag::Moderated,
        ChannelFlag::Private,
        ChannelFlag::Secret,
    ];

    pub fn mode_letter(self) -> char {
        match self {
            ChannelFlag::TopicProtection => 't',
            ChannelFlag::NoExternalMessages => 'n',
            ChannelFlag::InviteOnly => 'i',
            ChannelFlag::Moderated => 'm',
            ChannelFlag::Private => 'p',
            ChannelFlag::Secret => 's',
        }
    }

    pub fn from_mode_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.mode_letter() == letter)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of [`ChannelFlag`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelFlags(u8);

impl ChannelFlags {
    pub fn contains(self, flag: ChannelFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn set(&mut self, flag: ChannelFlag, on: bool) {
        if on {
            self.0 |= flag.bit();
        } else {
            self.0 &= !flag.bit();
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ChannelFlag> {
        ChannelFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ChannelState {
    name: String,
    mode: String,
    mode_stale: bool,
    topic: Option<String>,
    topic_setter: Option<UserHostmask>,
    topic_timestamp: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    key: Option<String>,
    limit: Option<u32>,
    flags: ChannelFlags,
}

/// Read access shared by [`Channel`] and [`ChannelSnapshot`].
pub trait ChannelView {
    fn name(&self) -> &str;

    /// The mode string as last known. Meaningless while [`is_mode_stale`].
    ///
    /// [`is_mode_stale`]: ChannelView::is_mode_stale
    fn mode(&self) -> &str;

    fn is_mode_stale(&self) -> bool;

    fn topic(&self) -> Option<&str>;

    fn topic_setter(&self) -> Option<&UserHostmask>;

    fn topic_timestamp(&self) -> Option<DateTime<Utc>>;

    fn created_at(&self) -> Option<DateTime<Utc>>;

    fn channel_key(&self) -> Option<&str>;

    fn user_limit(&self) -> Option<u32>;

    fn flags(&self) -> ChannelFlags;

    fn has_flag(&self, flag: ChannelFlag) -> bool {
        self.flags().contains(flag)
    }
}

macro_rules! impl_channel_view {
    ($ty:ty) => {
        impl ChannelView for $ty {
            fn name(&self) -> &str {
                &self.state.name
            }

            fn mode(&self) -> &str {
                &self.state.mode
            }

            fn is_mode_stale(&self) -> bool {
                self.state.mode_stale
            }

            fn topic(&self) -> Option<&str> {
                self.state.topic.as_deref()
            }

            fn topic_setter(&self) -> Option<&UserHostmask> {
                self.state.topic_setter.as_ref()
            }

            fn topic_timestamp(&self) -> Option<DateTime<Utc>> {
                self.state.topic_timestamp
            }

            fn created_at(&self) -> Option<DateTime<Utc>> {
                self.state.created_at
            }

            fn channel_key(&self) -> Option<&str> {
                self.state.key.as_deref()
            }

            fn user_limit(&self) -> Option<u32> {
                self.state.limit
            }

            fn flags(&self) -> ChannelFlags {
                self.state.flags
            }
        }
    };
}

/// A channel tracked by the store.
///
/// The mode string starts out stale: it only becomes trustworthy once the
/// server answers a `MODE` query (324). Waiters subscribe to `mode_watch`,
/// which holds `None` while the mode is stale.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    state: ChannelState,
    mode_watch: watch::Sender<Option<String>>,
}

impl_channel_view!(Channel);

impl Channel {
    pub(crate) fn new(id: ChannelId, name: &str) -> Self {
        let (mode_watch, _) = watch::channel(None);
        Self {
            id,
            state: ChannelState {
                name: name.to_string(),
                mode: String::new(),
                mode_stale: true,
                topic: None,
                topic_setter: None,
                topic_timestamp: None,
                created_at: None,
                key: None,
                limit: None,
                flags: ChannelFlags::default(),
            },
            mode_watch,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            id: self.id,
            state: self.state.clone(),
        }
    }

    /// Watch the mode string; `None` while it is stale.
    pub fn subscribe_mode(&self) -> watch::Receiver<Option<String>> {
        self.mode_watch.subscribe()
    }

    /// Store an authoritative mode string (a 324 reply) and release waiters.
    pub(crate) fn set_mode(&mut self, mode: &str) {
        self.state.mode = mode.to_string();
        self.state.mode_stale = false;
        self.absorb_mode();
        self.mode_watch.send_replace(Some(self.state.mode.clone()));
    }

    /// Fold a live `MODE` change into the stored mode string.
    ///
    /// Changes carrying arguments cannot be merged without knowing every
    /// server mode's arity, so they mark the mode stale instead.
    pub(crate) fn apply_mode_change(&mut self, change: &str) {
        if self.state.mode_stale {
            return;
        }
        let touches_args = change.contains(' ')
            || (self.state.mode.contains(' ') && change.contains(['k', 'l']));
        if touches_args {
            self.mark_mode_stale();
            return;
        }
        self.state.mode = merge_mode_letters(&self.state.mode, change);
        self.mode_watch.send_replace(Some(self.state.mode.clone()));
    }

    pub(crate) fn mark_mode_stale(&mut self) {
        self.state.mode_stale = true;
        self.mode_watch.send_replace(None);
    }

    pub(crate) fn set_flag(&mut self, flag: ChannelFlag, on: bool) {
        self.state.flags.set(flag, on);
    }

    pub(crate) fn set_key(&mut self, key: Option<String>) {
        self.state.key = key;
    }

    pub(crate) fn set_limit(&mut self, limit: Option<u32>) {
        self.state.limit = limit;
    }

    pub(crate) fn set_topic(&mut self, topic: &str) {
        self.state.topic = Some(topic.to_string());
    }

    pub(crate) fn set_topic_info(&mut self, setter: UserHostmask, timestamp: DateTime<Utc>) {
        self.state.topic_setter = Some(setter);
        self.state.topic_timestamp = Some(timestamp);
    }

    pub(crate) fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.state.created_at = Some(created_at);
    }

    /// Re-derive flags, key and limit from the authoritative mode string.
    ///
    /// Letters outside the tracked set are assumed to take no argument.
    fn absorb_mode(&mut self) {
        let mut parts = self.state.mode.split(' ').filter(|p| !p.is_empty());
        let letters = parts.next().unwrap_or_default();
        let mut flags = ChannelFlags::default();
        let mut key = None;
        let mut limit = None;

        for letter in letters.chars() {
            match letter {
                '+' => {}
                'k' => key = parts.next().map(str::to_string),
                'l' => limit = parts.next().and_then(|l| l.parse().ok()),
                other => {
                    if let Some(flag) = ChannelFlag::from_mode_letter(other) {
                        flags.set(flag, true);
                    }
                }
            }
        }

        self.state.flags = flags;
        self.state.key = key;
        self.state.limit = limit;
    }
}

/// Add and remove letters of an argument-free change.
fn merge_mode_letters(mode: &str, change: &str) -> String {
    let (letters, args) = match mode.split_once(' ') {
        Some((letters, args)) => (letters, Some(args)),
        None => (mode, None),
    };
    let mut letters: Vec<char> = letters.chars().filter(|c| *c != '+').collect();
    let mut adding = true;

    for c in change.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            c if adding => {
                if !letters.contains(&c) {
                    letters.push(c);
                }
            }
            c => letters.retain(|l| *l != c),
        }
    }

    let mut merged = String::new();
    if !letters.is_empty() {
        merged.push('+');
        merged.extend(letters);
    }
    if let Some(args) = args {
        merged.push(' ');
        merged.push_str(args);
    }
    merged
}

/// A frozen copy of a [`Channel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    id: ChannelId,
    state: ChannelState,
}

impl_channel_view!(ChannelSnapshot);

impl ChannelSnapshot {
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_channel_is_stale() {
        let channel = Channel::new(ChannelId(1), "#rust");
        assert!(channel.is_mode_stale());
        assert_eq!(*channel.subscribe_mode().borrow(), None);
    }

    #[test]
    fn test_set_mode_parses_key_and_limit() {
        let mut channel = Channel::new(ChannelId(1), "#rust");
        channel.set_mode("+ntkl secret 25");

        assert!(!channel.is_mode_stale());
        assert!(channel.has_flag(ChannelFlag::TopicProtection));
        assert!(channel.has_flag(ChannelFlag::NoExternalMessages));
        assert!(!channel.has_flag(ChannelFlag::Secret));
        assert_eq!(channel.channel_key(), Some("secret"));
        assert_eq!(channel.user_limit(), Some(25));
        assert_eq!(
            channel.subscribe_mode().borrow().as_deref(),
            Some("+ntkl secret 25")
        );
    }

    #[test]
    fn test_letter_changes_merge() {
        let mut channel = Channel::new(ChannelId(1), "#rust");
        channel.set_mode("+nt");
        channel.apply_mode_change("+s-t");
        assert_eq!(channel.mode(), "+ns");
        assert!(!channel.is_mode_stale());

        channel.apply_mode_change("-ns");
        assert_eq!(channel.mode(), "");
    }

    #[test]
    fn test_change_with_arguments_marks_stale() {
        let mut channel = Channel::new(ChannelId(1), "#rust");
        channel.set_mode("+nt");
        channel.apply_mode_change("+o alice");
        assert!(channel.is_mode_stale());
        assert_eq!(*channel.subscribe_mode().borrow(), None);

        channel.set_mode("+nt");
        assert!(!channel.is_mode_stale());
    }

    #[test]
    fn test_flags_set_and_clear() {
        let mut flags = ChannelFlags::default();
        flags.set(ChannelFlag::Moderated, true);
        flags.set(ChannelFlag::Secret, true);
        flags.set(ChannelFlag::Moderated, false);
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec![ChannelFlag::Secret]);
    }
}
