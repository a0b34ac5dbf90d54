//! Integration tests for the chat room facade.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use live_mirror::{
    ChatMessage, ChatRoom, ChatUser, FetchError, InMemoryPlatform, SubmitError, SyncConfig,
};
use support::recorder::Recorder;
use support::{init_logging, message};

fn config(name: &str) -> SyncConfig {
    SyncConfig::new(name).with_poll_interval(Duration::from_millis(5))
}

fn alice() -> ChatUser {
    ChatUser::new("alice", Some("alice@example.com".to_string()))
}

fn bob() -> ChatUser {
    ChatUser::new("bob", None)
}

#[test]
fn room_shows_history_then_live_messages() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());
    platform.seed(vec![message("old-2", 20), message("old-1", 10)]);

    let view = Recorder::new();
    let room = ChatRoom::open(Arc::clone(&platform), alice(), config("alice"), view.observer())
        .unwrap();
    assert_eq!(
        room.messages().iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        vec!["old-1", "old-2"]
    );

    room.send("Is the 3pm slot free?").unwrap();

    let messages = view.wait_for(|records| records.len() == 3);
    let latest = messages.last().unwrap();
    assert_eq!(latest.content, "Is the 3pm slot free?");
    assert_eq!(latest.author_label(), "alice@example.com");
    assert!(room.is_own(latest));
    assert!(!room.is_own(&messages[0]));
}

#[test]
fn two_rooms_see_each_other() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());

    let alice_view = Recorder::new();
    let alice_room = ChatRoom::open(
        Arc::clone(&platform),
        alice(),
        config("alice"),
        alice_view.observer(),
    )
    .unwrap();

    let bob_view = Recorder::new();
    let bob_room =
        ChatRoom::open(Arc::clone(&platform), bob(), config("bob"), bob_view.observer()).unwrap();

    alice_room.send("hi").unwrap();
    bob_view.wait_for(|records| records.len() == 1);

    bob_room.send("hello").unwrap();
    let seen = alice_view.wait_for(|records| records.len() == 2);

    assert_eq!(seen[0].content, "hi");
    assert_eq!(seen[1].content, "hello");
    assert_eq!(seen[1].author_label(), "User");
    assert!(!alice_room.is_own(&seen[1]));
}

#[test]
fn blank_messages_never_reach_the_platform() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());
    let room = ChatRoom::open(
        Arc::clone(&platform),
        alice(),
        config("blank"),
        Recorder::new().observer(),
    )
    .unwrap();

    assert!(matches!(room.send("   "), Err(SubmitError::Invalid(_))));
    assert!(platform.is_empty());
    assert!(platform.feed().is_empty());
}

#[test]
fn rejected_send_is_reported() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());
    let room = ChatRoom::open(
        Arc::clone(&platform),
        alice(),
        config("rejected"),
        Recorder::new().observer(),
    )
    .unwrap();

    platform.fail_next_submit(SubmitError::Unauthorized("row level security".into()));
    assert_eq!(
        room.send("hello"),
        Err(SubmitError::Unauthorized("row level security".into()))
    );
    assert!(room.messages().is_empty());
}

#[test]
fn open_fails_when_history_cannot_be_loaded() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());
    platform.fail_next_fetch(FetchError::Unavailable("dns".into()));

    let result = ChatRoom::open(
        Arc::clone(&platform),
        alice(),
        config("offline"),
        Recorder::new().observer(),
    );

    assert!(matches!(result, Err(FetchError::Unavailable(_))));
}

#[test]
fn closed_room_stops_updating() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());

    let view = Recorder::new();
    let mut room =
        ChatRoom::open(Arc::clone(&platform), alice(), config("close"), view.observer()).unwrap();
    assert!(room.is_open());

    room.send("first").unwrap();
    view.wait_for(|records| records.len() == 1);

    let stats = room.close();
    assert!(!room.is_open());
    assert_eq!(stats.events_applied, 1);
    assert_eq!(room.close(), Default::default());

    let calls = view.calls();
    room.send("second").unwrap();
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(view.calls(), calls);
    assert_eq!(room.messages().len(), 1);
    assert_eq!(platform.len(), 2);
}

#[test]
fn dropping_the_room_releases_the_subscription() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());

    let view = Recorder::new();
    let room =
        ChatRoom::open(Arc::clone(&platform), alice(), config("drop"), view.observer()).unwrap();
    drop(room);

    let calls = view.calls();
    let other = ChatRoom::open(
        Arc::clone(&platform),
        bob(),
        config("other"),
        Recorder::new().observer(),
    )
    .unwrap();
    other.send("anyone there?").unwrap();
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(view.calls(), calls);
}
