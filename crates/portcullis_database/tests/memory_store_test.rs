//! Behavioural tests for the in-memory gateway store.

use chrono::{Duration, TimeZone, Utc};
use portcullis_core::{Entrant, GuildId, MessageId, SystemConfig, UserId};
use portcullis_database::MemoryGatewayStore;
use portcullis_interface::{GatewayStore, ReconciliationBatch};

const GUILD: GuildId = GuildId(10);
const OTHER: GuildId = GuildId(20);

fn entrant(guild: GuildId, user: u64, secs: i64) -> Entrant {
    Entrant {
        guild_id: guild,
        user_id: UserId(user),
        timeout_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

#[tokio::test]
async fn ensure_guild_creates_inactive_defaults_once() {
    let store = MemoryGatewayStore::new();
    store.ensure_guild(GUILD).await.unwrap();

    let mut config = store.gateway_config(GUILD).await.unwrap().unwrap();
    assert!(!config.active);
    assert_eq!(config.timeout_seconds, 300);

    config.timeout_seconds = 600;
    store.save_config(&config).await.unwrap();
    store.ensure_guild(GUILD).await.unwrap();

    let again = store.gateway_config(GUILD).await.unwrap().unwrap();
    assert_eq!(again.timeout_seconds, 600);
}

#[tokio::test]
async fn sync_guilds_removes_departed_guild_state() {
    let store = MemoryGatewayStore::new();
    store.ensure_guild(GUILD).await.unwrap();
    store.ensure_guild(OTHER).await.unwrap();
    store.insert_entrant(&entrant(OTHER, 1, 0)).await.unwrap();
    store.accept(OTHER, UserId(2)).await.unwrap();

    store.sync_guilds(&[GUILD, GuildId(30)]).await.unwrap();

    assert!(store.gateway_config(OTHER).await.unwrap().is_none());
    assert!(store.entrants(OTHER).await.unwrap().is_empty());
    assert!(store.accepted_users(OTHER).await.unwrap().is_empty());
    assert!(store.gateway_config(GuildId(30)).await.unwrap().is_some());
}

#[tokio::test]
async fn accept_moves_entrant_and_is_idempotent() {
    let store = MemoryGatewayStore::new();
    store.insert_entrant(&entrant(GUILD, 1, 0)).await.unwrap();

    assert!(store.accept(GUILD, UserId(1)).await.unwrap());
    assert!(!store.accept(GUILD, UserId(1)).await.unwrap());

    assert!(store.entrant(GUILD, UserId(1)).await.unwrap().is_none());
    assert_eq!(store.accepted_users(GUILD).await.unwrap(), vec![UserId(1)]);
}

#[tokio::test]
async fn trip_reset_clears_only_that_guild() {
    let store = MemoryGatewayStore::new();
    store.ensure_guild(GUILD).await.unwrap();
    store
        .set_activation(GUILD, Some(MessageId(99)))
        .await
        .unwrap();
    store.insert_entrant(&entrant(GUILD, 1, 0)).await.unwrap();
    store.insert_entrant(&entrant(GUILD, 2, 0)).await.unwrap();
    store.insert_entrant(&entrant(OTHER, 3, 0)).await.unwrap();

    let cleared = store.trip_reset(GUILD).await.unwrap();

    assert_eq!(cleared, 2);
    let config = store.gateway_config(GUILD).await.unwrap().unwrap();
    assert!(!config.active);
    assert_eq!(config.gate_message_id, None);
    assert_eq!(store.entrants(OTHER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn overdue_entrants_are_strictly_past_deadline() {
    let store = MemoryGatewayStore::new();
    store.insert_entrant(&entrant(GUILD, 1, 0)).await.unwrap();
    store.insert_entrant(&entrant(GUILD, 2, 100)).await.unwrap();

    let now = Utc.timestamp_opt(1_700_000_000 + 50, 0).unwrap();
    let overdue = store.overdue_entrants(now).await.unwrap();

    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].user_id, UserId(1));
}

#[tokio::test]
async fn reset_entrant_timeouts_moves_every_deadline() {
    let store = MemoryGatewayStore::new();
    store.insert_entrant(&entrant(GUILD, 1, 0)).await.unwrap();
    store.insert_entrant(&entrant(GUILD, 2, 10)).await.unwrap();

    let at = Utc::now() + Duration::seconds(300);
    let touched = store.reset_entrant_timeouts(GUILD, at).await.unwrap();

    assert_eq!(touched, 2);
    for e in store.entrants(GUILD).await.unwrap() {
        assert_eq!(e.timeout_at, at);
    }
}

#[tokio::test]
async fn apply_reconciliation_applies_whole_batch() {
    let store = MemoryGatewayStore::new();
    store.insert_entrant(&entrant(GUILD, 1, 0)).await.unwrap();
    store.insert_entrant(&entrant(GUILD, 2, 0)).await.unwrap();
    store.accept(GUILD, UserId(3)).await.unwrap();

    let batch = ReconciliationBatch {
        delete_entrants: vec![UserId(1), UserId(2)],
        delete_accepted: vec![UserId(3)],
        insert_accepted: vec![UserId(1)],
    };
    store.apply_reconciliation(GUILD, &batch).await.unwrap();

    assert!(store.entrants(GUILD).await.unwrap().is_empty());
    assert_eq!(store.accepted_users(GUILD).await.unwrap(), vec![UserId(1)]);
}

#[tokio::test]
async fn reset_accepted_counts_removed_rows() {
    let store = MemoryGatewayStore::new();
    store.accept(GUILD, UserId(1)).await.unwrap();
    store.accept(GUILD, UserId(2)).await.unwrap();
    store.accept(OTHER, UserId(1)).await.unwrap();

    assert_eq!(store.reset_accepted(GUILD).await.unwrap(), 2);
    assert!(store.is_accepted(OTHER, UserId(1)).await.unwrap());
}

#[tokio::test]
async fn system_config_defaults_until_saved() {
    let store = MemoryGatewayStore::new();
    assert_eq!(
        store.system_config(GUILD).await.unwrap(),
        SystemConfig::default()
    );

    let system = SystemConfig {
        prefix: Some("?".into()),
        log_channel_id: None,
    };
    store.save_system(GUILD, &system).await.unwrap();
    assert_eq!(store.system_config(GUILD).await.unwrap(), system);
}

#[tokio::test]
async fn watermark_round_trip() {
    let store = MemoryGatewayStore::new();
    assert!(store.last_commit().await.unwrap().is_none());

    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    store.record_commit(at).await.unwrap();
    assert_eq!(store.last_commit().await.unwrap(), Some(at));
}
