//! End-to-end dispatch: raw lines in, store state and events out.

use slirc_client::{
    Action, ChannelView, ClientConfig, DaoHandle, Event, PrivilegeLevel, Session, UserView,
};

fn session() -> (Session, DaoHandle) {
    let mut config = ClientConfig::new("irc.example.net", 6667, "bot");
    config.cap_enabled = false;
    let dao = DaoHandle::default();
    let mut session = Session::new(&config, dao.clone());
    let _ = session.start();
    let _ = session.handle_line(":irc.example.net 001 bot :Welcome to IRC");
    (session, dao)
}

fn events(actions: Vec<Action>) -> Vec<Event> {
    actions
        .into_iter()
        .filter_map(|a| match a {
            Action::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn feed(session: &mut Session, lines: &[&str]) -> Vec<Event> {
    lines
        .iter()
        .flat_map(|line| events(session.handle_line(line)))
        .collect()
}

#[test]
fn test_join_names_yields_one_user_list() {
    let (mut session, dao) = session();
    let events = feed(
        &mut session,
        &[
            ":bot!b@host JOIN #rust",
            ":irc.example.net 353 bot = #rust :@alice +bob bot",
            ":irc.example.net 366 bot #rust :End of /NAMES list.",
        ],
    );

    let lists: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::UserList {
                channel,
                users,
                complete,
            } => Some((channel, users, complete)),
            _ => None,
        })
        .collect();
    assert_eq!(lists.len(), 1);
    let (channel, users, complete) = lists[0];
    assert_eq!(channel.name(), "#rust");
    assert!(!complete);

    let mut nicks: Vec<&str> = users.iter().map(|u| u.nick()).collect();
    nicks.sort_unstable();
    assert_eq!(nicks, vec!["alice", "bob", "bot"]);

    let dao = dao.lock();
    let rust = dao.channel_id("#rust").unwrap();
    let mut members: Vec<&str> = dao.users_of(rust).iter().map(|u| u.nick()).collect();
    members.sort_unstable();
    assert_eq!(members, nicks);

    let alice = dao.user_id("alice").unwrap();
    let bob = dao.user_id("bob").unwrap();
    assert!(dao.has_privilege(PrivilegeLevel::Op, alice, rust));
    assert!(dao.has_privilege(PrivilegeLevel::Voice, bob, rust));
    assert!(!dao.has_privilege(PrivilegeLevel::Op, bob, rust));
    assert!(dao.verify().is_ok());
}

#[test]
fn test_part_snapshot_survives_later_mutation() {
    let (mut session, dao) = session();
    let _ = feed(
        &mut session,
        &[
            ":bot!b@host JOIN #rust",
            ":irc.example.net 353 bot = #rust :@alice bot",
            ":irc.example.net 366 bot #rust :End",
        ],
    );

    let events = feed(&mut session, &[":alice!a@host PART #rust :later"]);
    let Some(Event::Part {
        snapshot,
        channel,
        user,
        reason,
    }) = events.into_iter().next()
    else {
        panic!("expected a part event");
    };
    assert_eq!(reason, "later");
    assert_eq!(user.nick(), "alice");
    assert_eq!(channel.name(), "#rust");

    // The live store has already forgotten alice.
    assert!(!dao.lock().contains_user("alice"));

    // More mutation does not reach the snapshot.
    let _ = feed(
        &mut session,
        &[":carol!c@host JOIN #rust", ":bot!b@host PART #rust"],
    );
    assert!(snapshot.is_member("alice", "#rust"));
    assert!(snapshot.has_privilege(PrivilegeLevel::Op, "alice", "#rust"));
    assert!(snapshot.user("carol").is_none());
    assert!(snapshot.channel("#rust").is_some());
    assert!(!dao.lock().contains_channel("#rust"));
}

#[test]
fn test_kick_captures_snapshot_first() {
    let (mut session, dao) = session();
    let _ = feed(
        &mut session,
        &[
            ":bot!b@host JOIN #rust",
            ":irc.example.net 353 bot = #rust :@bot mallory",
            ":irc.example.net 366 bot #rust :End",
        ],
    );

    let events = feed(&mut session, &[":bot!b@host KICK #rust mallory :spam"]);
    let Some(Event::Kick {
        snapshot,
        user,
        recipient,
        reason,
        ..
    }) = events.into_iter().next()
    else {
        panic!("expected a kick event");
    };
    assert_eq!(user.nick(), "bot");
    assert_eq!(recipient.nick(), "mallory");
    assert_eq!(reason, "spam");
    assert!(snapshot.is_member("mallory", "#rust"));
    assert!(!dao.lock().contains_user("mallory"));
}

#[test]
fn test_quit_removes_user_from_every_channel() {
    let (mut session, dao) = session();
    let _ = feed(
        &mut session,
        &[
            ":bot!b@host JOIN #a",
            ":bot!b@host JOIN #b",
            ":alice!a@host JOIN #a",
            ":alice!a@host JOIN #b",
            ":irc.example.net MODE #a +o alice",
        ],
    );

    let events = feed(&mut session, &[":alice!a@host QUIT :Ping timeout"]);
    let Some(Event::Quit {
        snapshot, reason, ..
    }) = events.into_iter().next()
    else {
        panic!("expected a quit event");
    };
    assert_eq!(reason, "Ping timeout");
    assert_eq!(snapshot.channels_of("alice").len(), 2);
    assert!(snapshot.has_privilege(PrivilegeLevel::Op, "alice", "#a"));

    let dao = dao.lock();
    assert!(!dao.contains_user("alice"));
    assert!(dao.verify().is_ok());
}

#[test]
fn test_nick_change_keeps_identity() {
    let (mut session, dao) = session();
    let _ = feed(
        &mut session,
        &[":bot!b@host JOIN #rust", ":alice!a@host JOIN #rust"],
    );
    let before = dao.lock().user_id("alice").unwrap();

    let events = feed(&mut session, &[":alice!a@host NICK alicia"]);
    assert!(matches!(
        &events[..],
        [Event::NickChange { old_nick, new_nick, .. }] if old_nick == "alice" && new_nick == "alicia"
    ));

    let dao = dao.lock();
    assert_eq!(dao.user_id("alicia"), Some(before));
    assert!(dao.user_id("alice").is_none());
    let rust = dao.channel_id("#rust").unwrap();
    assert!(dao.is_member(before, rust));
}

#[test]
fn test_own_nick_change_updates_session() {
    let (mut session, _) = session();
    let _ = feed(&mut session, &[":bot!b@host NICK newbot"]);
    assert_eq!(session.nick(), "newbot");
}

#[test]
fn test_mode_with_unknown_argument_marks_stale() {
    let (mut session, dao) = session();
    let _ = feed(
        &mut session,
        &[
            ":bot!b@host JOIN #rust",
            ":irc.example.net 324 bot #rust +nt",
        ],
    );
    assert_eq!(dao.lock().channel("#rust").unwrap().mode(), "+nt");

    let _ = feed(&mut session, &[":op!o@host MODE #rust +k secret"]);
    let dao = dao.lock();
    let rust = dao.channel("#rust").unwrap();
    assert!(rust.is_mode_stale());
    assert_eq!(rust.channel_key(), Some("secret"));
}

#[test]
fn test_topic_updates_channel() {
    let (mut session, dao) = session();
    let _ = feed(&mut session, &[":bot!b@host JOIN #rust"]);
    let events = feed(&mut session, &[":alice!a@host TOPIC #rust :Rust 2021"]);
    assert!(matches!(
        &events[..],
        [Event::Topic { topic, changed: true, .. }] if topic == "Rust 2021"
    ));
    assert_eq!(
        dao.lock().channel("#rust").unwrap().topic(),
        Some("Rust 2021")
    );
}

#[test]
fn test_private_message_tracks_contact() {
    let (mut session, dao) = session();
    let events = feed(&mut session, &[":dave!d@host PRIVMSG bot :hello there"]);
    assert!(matches!(
        &events[..],
        [Event::PrivateMessage { user, message }] if user.nick() == "dave" && message == "hello there"
    ));
    let dao = dao.lock();
    let dave = dao.user_id("dave").unwrap();
    assert!(dao.is_private_user(dave));
}
