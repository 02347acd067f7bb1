// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::CommandStore;
use drover_core::ControlCommand;

fn initial() -> CommandRecord {
    CommandRecord::initial(Utc::now())
}

#[tokio::test]
async fn read_before_create_is_none() {
    let store = MemoryCommandStore::replicated();
    assert!(store.read().await.unwrap().is_none());
}

#[tokio::test]
async fn create_if_absent_is_idempotent() {
    let store = MemoryCommandStore::replicated();
    let first = store.create_if_absent(initial()).await.unwrap();

    let mut second_seed = initial();
    second_seed.reason = "should not replace".to_string();
    let second = store.create_if_absent(second_seed).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.read().await.unwrap().unwrap().reason, first.reason);
}

#[tokio::test]
async fn versions_strictly_increase_across_writes() {
    let store = MemoryCommandStore::replicated();
    store.create_if_absent(initial()).await.unwrap();

    let mut last = 1;
    for i in 0..5 {
        let record = store
            .increment_and_set(ControlCommand::Pause, &format!("write {i}"), "test")
            .await
            .unwrap();
        assert_eq!(record.version, last + 1);
        last = record.version;
    }
    assert_eq!(last, 6);
}

#[tokio::test]
async fn increment_and_set_round_trips_fields() {
    let store = MemoryCommandStore::replicated();
    store.create_if_absent(initial()).await.unwrap();

    let written = store
        .increment_and_set(ControlCommand::Shutdown, "r", "u")
        .await
        .unwrap();
    let read = store.read().await.unwrap().unwrap();

    assert_eq!(read.command, ControlCommand::Shutdown);
    assert_eq!(read.reason, "r");
    assert_eq!(read.updated_by, "u");
    assert_eq!(read.version, written.version);
    assert_eq!(read.version, 2);
}

#[tokio::test]
async fn increment_without_create_is_not_initialized() {
    let store = MemoryCommandStore::replicated();
    let err = store
        .increment_and_set(ControlCommand::Pause, "", "test")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotInitialized));
}

#[tokio::test]
async fn single_node_store_rejects_subscribe() {
    let store = MemoryCommandStore::single_node();
    let err = store.subscribe().await.unwrap_err();
    assert!(matches!(err, StoreError::PushUnsupported));
}

#[tokio::test]
async fn feed_delivers_writes_in_order() {
    let store = MemoryCommandStore::replicated();
    store.create_if_absent(initial()).await.unwrap();
    let mut feed = store.subscribe().await.unwrap();

    store.increment_and_set(ControlCommand::Pause, "", "a").await.unwrap();
    store.increment_and_set(ControlCommand::Running, "", "b").await.unwrap();

    assert_eq!(feed.next().await.unwrap().version, 2);
    assert_eq!(feed.next().await.unwrap().version, 3);
}

#[tokio::test]
async fn injected_fault_makes_operations_unavailable() {
    let store = MemoryCommandStore::replicated();
    store.create_if_absent(initial()).await.unwrap();

    store.set_unavailable(true);
    assert!(matches!(store.read().await.unwrap_err(), StoreError::Unavailable(_)));
    assert!(matches!(store.subscribe().await.unwrap_err(), StoreError::Unavailable(_)));

    store.set_unavailable(false);
    assert!(store.read().await.unwrap().is_some());
}
