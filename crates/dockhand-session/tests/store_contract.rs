//! Contract tests for the session store: TTL expiry, listing, and atomic
//! per-key updates under concurrency.

use std::sync::Arc;

use chrono::Duration;
use dockhand_session::{
    NewSession, SessionError, SessionFilter, SessionStatus, SessionStore, SessionStoreConfig,
    SessionUpdate,
};
use serde_json::json;

/// Test: a 1ms TTL session is gone on the next read and absent from list
#[tokio::test]
async fn test_ttl_expired_session_is_absent() {
    let store = SessionStore::default();
    store
        .create_with(NewSession::with_id("ephemeral").ttl(Duration::milliseconds(1)))
        .expect("create");
    store.create(Some("durable")).expect("create");

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert!(store.get("ephemeral").is_none(), "expired session must read as absent");
    let ids: Vec<String> = store
        .list(&SessionFilter::default())
        .iter()
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(ids, vec!["durable".to_string()]);
}

/// Test: updating an expired session reports not-found
#[tokio::test]
async fn test_update_after_expiry_is_not_found() {
    let store = SessionStore::default();
    store
        .create_with(NewSession::with_id("s").ttl(Duration::milliseconds(1)))
        .expect("create");
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let err = store
        .update("s", SessionUpdate::new().status(SessionStatus::Completed))
        .unwrap_err();
    assert_eq!(err, SessionError::NotFound("s".to_string()));
}

/// Test: list filters by status and label
#[test]
fn test_list_filters() {
    let store = SessionStore::default();
    store
        .create_with(NewSession::with_id("a").label("repo", "flask"))
        .expect("a");
    store
        .create_with(NewSession::with_id("b").label("repo", "node"))
        .expect("b");
    store
        .update("b", SessionUpdate::new().status(SessionStatus::Failed))
        .expect("update b");

    let failed = store.list(&SessionFilter {
        status: Some(SessionStatus::Failed),
        ..Default::default()
    });
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "b");

    let flask = store.list(&SessionFilter {
        label: Some(("repo".to_string(), "flask".to_string())),
        ..Default::default()
    });
    assert_eq!(flask.len(), 1);
    assert_eq!(flask[0].id, "a");
}

/// Test: concurrent updates on one id never lose a write
#[test]
fn test_concurrent_updates_are_not_lost() {
    let store = Arc::new(SessionStore::default());
    store.create(Some("shared")).expect("create");

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .update(
                            "shared",
                            SessionUpdate::new().state(format!("t{t}_{i}"), json!(i)),
                        )
                        .expect("update");
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().expect("thread panicked");
    }

    let session = store.get("shared").expect("session");
    assert_eq!(session.version, 200);
    assert_eq!(session.workflow_state.len(), 200);
}

/// Test: version is strictly increasing across updates
#[test]
fn test_versions_strictly_increase() {
    let store = SessionStore::new(SessionStoreConfig::default());
    store.create(Some("v")).expect("create");

    let mut last = 0;
    for stage in ["analyze-repository", "generate-dockerfile", "build-image"] {
        let session = store
            .update("v", SessionUpdate::new().stage(stage))
            .expect("update");
        assert!(session.version > last);
        last = session.version;
    }
    assert_eq!(last, 3);
}
