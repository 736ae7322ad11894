//! Integration tests for action broadcasting and state publication order.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use sessionflow_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use sessionflow_runtime::{Store, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum RelayAction {
    /// Start a chain of `hops` fed-back steps
    Start { hops: u32 },
    /// One step of the chain
    Hop { remaining: u32 },
    /// Plain synchronous bump
    Bump,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RelayState {
    counter: u32,
    hops_seen: Vec<u32>,
}

#[derive(Clone)]
struct RelayReducer;

impl Reducer for RelayReducer {
    type State = RelayState;
    type Action = RelayAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RelayAction::Start { hops } => {
                state.hops_seen.clear();
                smallvec![Effect::Future(Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(RelayAction::Hop { remaining: hops })
                }))]
            },
            RelayAction::Hop { remaining } => {
                state.hops_seen.push(remaining);
                if remaining > 1 {
                    smallvec![Effect::Future(Box::pin(async move {
                        Some(RelayAction::Hop { remaining: remaining - 1 })
                    }))]
                } else {
                    smallvec![Effect::None]
                }
            },
            RelayAction::Bump => {
                state.counter += 1;
                smallvec![Effect::None]
            },
        }
    }
}

fn relay_store() -> Store<RelayState, RelayAction, (), RelayReducer> {
    Store::new(RelayState::default(), RelayReducer, ())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn effect_actions_are_broadcast() {
    let store = relay_store();
    let mut actions = store.subscribe_actions();

    let _ = store.send(RelayAction::Start { hops: 3 }).await.unwrap();

    let mut observed = Vec::new();
    while observed.len() < 3 {
        let action = tokio::time::timeout(Duration::from_secs(1), actions.recv())
            .await
            .expect("timed out waiting for broadcast")
            .unwrap();
        observed.push(action);
    }

    assert_eq!(
        observed,
        vec![
            RelayAction::Hop { remaining: 3 },
            RelayAction::Hop { remaining: 2 },
            RelayAction::Hop { remaining: 1 },
        ]
    );
}

#[tokio::test]
async fn directly_sent_actions_are_not_broadcast() {
    let store = relay_store();
    let mut actions = store.subscribe_actions();

    let _ = store.send(RelayAction::Bump).await.unwrap();

    assert!(matches!(
        actions.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn state_subscribers_see_every_change_in_order() {
    let store = relay_store();
    let mut rx = store.subscribe_state();

    let watcher = tokio::spawn(async move {
        let mut counters = Vec::new();
        while counters.len() < 5 {
            if rx.changed().await.is_err() {
                break;
            }
            counters.push(rx.borrow_and_update().counter);
        }
        counters
    });

    for _ in 0..5 {
        let _ = store.send(RelayAction::Bump).await.unwrap();
        // Let the watcher observe before the next change overwrites it.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let counters = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counters, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn wait_for_observes_chain_completion() {
    let store = relay_store();

    let _ = store.send(RelayAction::Start { hops: 4 }).await.unwrap();

    let state = store
        .wait_for(|s| s.hops_seen.len() == 4, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(state.hops_seen, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn shutdown_waits_for_chain_then_rejects() {
    let store = relay_store();

    let _ = store.send(RelayAction::Start { hops: 2 }).await.unwrap();
    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert!(matches!(
        store.send(RelayAction::Bump).await,
        Err(StoreError::ShutdownInProgress)
    ));
}
