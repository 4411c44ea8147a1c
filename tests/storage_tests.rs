mod common;

use calpush::db::WatchChannel;
use calpush::error::CalpushError;
use calpush::google_oauth::RefreshedToken;
use calpush::service::CredentialRotator;
use chrono::{Duration, Utc};
use common::{credential, temp_db};

fn channel() -> WatchChannel {
    WatchChannel {
        channel_id: "u1-cal-1".into(),
        principal_id: "u1".into(),
        verification_token: "token-1".into(),
        resource_id: "res-1".into(),
        calendar_id: "cal-1".into(),
        sync_cursor: "sync-A".into(),
    }
}

#[tokio::test]
async fn credential_upsert_keeps_refresh_token_when_absent() {
    let db = temp_db("credential-upsert").await;
    let cred = credential("u1");
    db.storage.upsert_credential(&cred).await.expect("insert");
    db.storage.upsert_credential(&cred).await.expect("repeat");

    let mut reauth = cred.clone();
    reauth.access_token = "access-2".into();
    reauth.refresh_token = String::new();
    db.storage.upsert_credential(&reauth).await.expect("reauth");

    let stored = db
        .storage
        .get_credential("u1")
        .await
        .expect("lookup failed")
        .expect("credential missing");
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-1");

    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db.path.display()))
        .await
        .expect("second connection");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
        .fetch_one(&pool)
        .await
        .expect("count failed");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn updating_unknown_principal_is_not_found() {
    let db = temp_db("credential-unknown").await;
    let err = db
        .storage
        .update_credential(&credential("ghost"))
        .await
        .expect_err("update should fail");
    assert!(matches!(err, CalpushError::UserNotFound(ref id) if id == "ghost"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn channel_upsert_is_idempotent_and_refreshes_fields() {
    let db = temp_db("channel-upsert").await;
    db.storage.upsert_channel(&channel()).await.expect("insert");
    db.storage.upsert_channel(&channel()).await.expect("repeat");

    let renewed = WatchChannel {
        verification_token: "token-2".into(),
        resource_id: "res-2".into(),
        sync_cursor: "sync-B".into(),
        ..channel()
    };
    db.storage.upsert_channel(&renewed).await.expect("renew");

    let stored = db
        .storage
        .get_channel("u1-cal-1")
        .await
        .expect("lookup failed")
        .expect("channel missing");
    assert_eq!(stored, renewed);
}

#[tokio::test]
async fn channel_lookup_requires_whole_triple() {
    let db = temp_db("channel-triple").await;
    db.storage.upsert_channel(&channel()).await.expect("insert");

    let found = db
        .storage
        .find_channel("u1-cal-1", "token-1", "res-1")
        .await
        .expect("lookup failed");
    assert_eq!(found, Some(channel()));

    for (id, token, resource) in [
        ("u1-cal-1", "token-1", "res-x"),
        ("u1-cal-1", "token-x", "res-1"),
        ("u1-cal-x", "token-1", "res-1"),
        ("u1-cal-1", "", ""),
    ] {
        let found = db
            .storage
            .find_channel(id, token, resource)
            .await
            .expect("lookup failed");
        assert_eq!(found, None, "({id}, {token}, {resource}) should not match");
    }
}

#[tokio::test]
async fn cursor_update_on_unknown_channel_is_not_found() {
    let db = temp_db("cursor-unknown").await;
    let err = db
        .storage
        .update_sync_cursor("missing", "sync-B")
        .await
        .expect_err("update should fail");
    assert!(matches!(err, CalpushError::ChannelNotFound));
}

#[tokio::test]
async fn rotator_writes_only_on_rotation() {
    let db = temp_db("rotator").await;
    let cred = credential("u1");
    db.storage.upsert_credential(&cred).await.expect("insert");
    let rotator = CredentialRotator::new(db.storage.clone());

    let unchanged = RefreshedToken::unchanged(&cred);
    assert!(!rotator.reconcile(&cred, &unchanged).await.expect("reconcile"));

    let rotated = RefreshedToken {
        access_token: "access-2".into(),
        refresh_token: None,
        expires_at: Utc::now() + Duration::hours(1),
    };
    assert!(rotator.reconcile(&cred, &rotated).await.expect("reconcile"));

    let stored = db
        .storage
        .get_credential("u1")
        .await
        .expect("lookup failed")
        .expect("credential missing");
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-1");

    let blank_refresh = RefreshedToken {
        access_token: "access-3".into(),
        refresh_token: Some(String::new()),
        expires_at: Utc::now() + Duration::hours(1),
    };
    assert!(rotator.reconcile(&stored, &blank_refresh).await.expect("reconcile"));
    let stored = db
        .storage
        .get_credential("u1")
        .await
        .expect("lookup failed")
        .expect("credential missing");
    assert_eq!(stored.access_token, "access-3");
    assert_eq!(stored.refresh_token, "refresh-1");

    let fresh_refresh = RefreshedToken {
        refresh_token: Some("refresh-2".into()),
        ..rotated
    };
    assert!(rotator.reconcile(&stored, &fresh_refresh).await.expect("reconcile"));
    let stored = db
        .storage
        .get_credential("u1")
        .await
        .expect("lookup failed")
        .expect("credential missing");
    assert_eq!(stored.refresh_token, "refresh-2");
}
