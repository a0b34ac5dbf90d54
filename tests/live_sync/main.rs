//! Integration tests for LiveCollectionSync against the in-memory platform.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use live_mirror::{
    ChangeEnvelope, ChatMessage, CollectionSource, FetchError, InMemoryPlatform,
    LiveCollectionSync, SubmitError, SyncConfig,
};
use support::recorder::{ids, Recorder};
use support::{draft, init_logging, message};

fn sync_with(recorder: &Recorder<ChatMessage>, name: &str) -> LiveCollectionSync<ChatMessage> {
    LiveCollectionSync::with_config(
        SyncConfig::new(name).with_poll_interval(Duration::from_millis(5)),
        recorder.observer(),
    )
}

#[test]
fn initial_fetch_is_sorted_by_created_at() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();
    platform.seed(vec![message("1", 10), message("2", 5)]);

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "initial");
    sync.initialize_from(&platform).unwrap();

    assert_eq!(recorder.last_ids(), Some(vec!["2".to_string(), "1".to_string()]));
}

#[test]
fn fetch_failure_surfaces_and_caller_may_retry() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();
    platform.seed(vec![message("1", 1)]);
    platform.fail_next_fetch(FetchError::Unauthorized("expired session".into()));

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "retry");

    let err = sync.initialize_from(&platform).unwrap_err();
    assert_eq!(err, FetchError::Unauthorized("expired session".into()));
    assert!(sync.is_empty());
    assert_eq!(recorder.calls(), 0);

    sync.initialize_from(&platform).unwrap();
    assert_eq!(ids(&sync.snapshot()), vec!["1"]);
}

#[test]
fn live_insert_lands_before_older_records() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();
    platform.seed(vec![message("1", 5)]);

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "ordered-insert");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);

    platform.push_raw(ChangeEnvelope::inserted("evt-late", &message("2", 3)).unwrap());

    recorder.wait_for_ids(&["2", "1"]);
    handle.cancel();
}

#[test]
fn removal_is_idempotent_end_to_end() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();
    platform.seed(vec![message("1", 1), message("2", 2)]);

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "remove");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);

    assert!(platform.delete("1").unwrap());
    recorder.wait_for_ids(&["2"]);
    let calls = recorder.calls();

    // The same DELETE delivered again.
    assert!(platform.redeliver_last());
    recorder.wait_for_calls(calls + 1);
    assert_eq!(recorder.last_ids(), Some(vec!["2".to_string()]));

    let stats = handle.stop();
    assert_eq!(stats.events_applied, 2);
}

#[test]
fn duplicate_insert_delivery_keeps_one_copy() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "dup-insert");
    sync.initialize_from(platform.as_ref()).unwrap();
    let handle = sync.subscribe_to(&platform);

    sync.publish_to(&platform, draft("alice", "hello")).unwrap();
    platform.redeliver_last();
    platform.redeliver_last();

    recorder.wait_for_calls(4);
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].content, "hello");

    handle.cancel();
}

#[test]
fn update_for_unknown_record_self_heals() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "self-heal");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);

    // The INSERT for "9" never reached us; only its UPDATE does.
    platform.push_raw(ChangeEnvelope::updated("evt-u", &message("9", 9)).unwrap());

    recorder.wait_for_ids(&["9"]);
    handle.cancel();
}

#[test]
fn platform_edits_flow_into_every_mirror() {
    init_logging();
    let platform = Arc::new(InMemoryPlatform::<ChatMessage>::new());

    let alice_view = Recorder::new();
    let alice = sync_with(&alice_view, "alice");
    alice.initialize_from(platform.as_ref()).unwrap();
    let alice_sub = alice.subscribe_to(&platform);

    let bob_view = Recorder::new();
    let bob = sync_with(&bob_view, "bob");
    bob.initialize_from(platform.as_ref()).unwrap();
    let bob_sub = bob.subscribe_to(&platform);

    // Alice writes; both mirrors learn about it only from the platform.
    alice.publish_to(&platform, draft("alice", "hi bob")).unwrap();
    let seen_by_bob = bob_view.wait_for(|records| records.len() == 1);
    alice_view.wait_for(|records| records.len() == 1);

    let id = seen_by_bob[0].id.clone();
    platform
        .update(&id, |m| m.content = "hi bob!".to_string())
        .unwrap();
    alice_view.wait_for(|records| records.first().map(|m| m.content.as_str()) == Some("hi bob!"));
    bob_view.wait_for(|records| records.first().map(|m| m.content.as_str()) == Some("hi bob!"));

    bob.cancel(&bob_sub);
    platform.delete(&id).unwrap();
    alice_view.wait_for(|records| records.is_empty());
    assert_eq!(bob.len(), 1);

    alice.cancel(&alice_sub);
}

#[test]
fn failed_publish_synthesizes_nothing() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "failed-publish");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);
    let calls = recorder.calls();

    platform.fail_next_submit(SubmitError::Platform("503".into()));
    let err = sync
        .publish(|d| platform.submit(d), draft("alice", "lost"))
        .unwrap_err();
    assert_eq!(err, SubmitError::Platform("503".into()));

    std::thread::sleep(Duration::from_millis(50));
    assert!(sync.is_empty());
    assert_eq!(recorder.calls(), calls);
    assert!(platform.feed().is_empty());

    handle.cancel();
}

#[test]
fn cancelled_subscription_stays_silent() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "silent");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);

    sync.publish_to(&platform, draft("alice", "one")).unwrap();
    recorder.wait_for(|records| records.len() == 1);

    sync.cancel(&handle);
    let calls = recorder.calls();

    for i in 0..5 {
        sync.publish_to(&platform, draft("alice", &format!("after {}", i)))
            .unwrap();
    }
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(recorder.calls(), calls);
    assert_eq!(sync.len(), 1);
    assert_eq!(platform.len(), 6);
}

#[test]
fn garbage_in_the_stream_is_skipped() {
    init_logging();
    let platform = InMemoryPlatform::<ChatMessage>::new();

    let recorder = Recorder::new();
    let sync = sync_with(&recorder, "garbage");
    sync.initialize_from(&platform).unwrap();
    let handle = sync.subscribe_to(&platform);

    platform.push_raw(ChangeEnvelope::new("evt-x", "PRESENCE", b"{}".to_vec()));
    platform.push_raw(ChangeEnvelope::new("evt-y", "UPDATE", br#"{"new":42}"#.to_vec()));
    sync.publish_to(&platform, draft("alice", "still alive")).unwrap();

    recorder.wait_for(|records| records.len() == 1);
    let stats = handle.stop();
    assert_eq!(stats.events_ignored, 2);
    assert_eq!(stats.events_applied, 1);
}
