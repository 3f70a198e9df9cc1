//! Guard violations and the resulting shutdown.

mod gateway_test_helpers;

use gateway_test_helpers::*;
use portcullis_core::{GateEmoji, UserId};
use portcullis_gateway::{Guard, GuildEvent, handle_event, trip};
use portcullis_interface::GatewayStore;

async fn with_entrants(fx: &Fixture, ids: &[u64]) {
    for id in ids {
        let member = human(*id, 0);
        fx.platform.add_member(member.clone());
        handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(member))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn deleted_blocking_role_trips_on_next_check() {
    let (fx, gate) = Fixture::active().await;
    with_entrants(&fx, &[1, 2]).await;
    assert_eq!(fx.store.entrants(GUILD).await.unwrap().len(), 2);

    fx.platform.state().roles.remove(&BLOCKING);
    let late = human(3, 10);
    fx.platform.add_member(late.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(late))
        .await
        .unwrap();

    let config = fx.config().await;
    assert!(!config.active);
    assert_eq!(config.gate_message_id, None);
    assert!(fx.store.entrants(GUILD).await.unwrap().is_empty());
    assert!(!fx.platform.state().messages.contains(&(RULES, gate)));
    assert!(fx.notifier.mentions("The gate message was deleted."));
    assert!(fx.notifier.mentions(
        "The gateway module tripped because the blocking role no longer exists"
    ));
}

#[tokio::test]
async fn vanished_gate_message_trips_without_delete_notice() {
    let (fx, gate) = Fixture::active().await;
    with_entrants(&fx, &[1]).await;

    fx.platform.state().messages.remove(&(RULES, gate));
    handle_event(
        &fx.ctx,
        GUILD,
        GuildEvent::ReactionAdded {
            channel_id: RULES,
            message_id: gate,
            user_id: UserId(1),
            emoji: GateEmoji::Accept,
        },
    )
    .await
    .unwrap();

    assert!(!fx.config().await.active);
    assert!(fx.notifier.mentions("the gate message no longer exists"));
    assert!(!fx.notifier.mentions("The gate message was deleted."));
    assert!(fx.platform.holds(UserId(1), BLOCKING));
}

#[tokio::test]
async fn lost_kick_permission_trips() {
    let (fx, _) = Fixture::active().await;
    fx.platform.state().bot.kick_members = false;

    let guard = Guard::new(&fx.ctx, GUILD);
    assert!(guard.permissions().await.unwrap().is_none());

    assert!(!fx.config().await.active);
    assert!(fx.notifier.mentions("Kick Members"));
}

#[tokio::test]
async fn member_role_above_bot_trips_gate_check() {
    let (fx, _) = Fixture::active().await;
    fx.platform
        .state()
        .roles
        .insert(MEMBER_ROLE, portcullis_core::RoleInfo::new(MEMBER_ROLE, "Member", 20));

    let config = fx.config().await;
    assert!(Guard::new(&fx.ctx, GUILD).gate(&config).await.unwrap().is_none());
    assert!(fx.notifier.mentions("member roles are equal to or higher"));
}

#[tokio::test]
async fn unsendable_welcome_channel_trips() {
    let (fx, _) = Fixture::active().await;
    fx.platform
        .state()
        .channels
        .get_mut(&WELCOME)
        .unwrap()
        .can_send = false;

    let guard = Guard::new(&fx.ctx, GUILD);
    assert_eq!(guard.welcome_channel(Some(WELCOME)).await.unwrap(), None);
    assert!(!fx.config().await.active);

    assert_eq!(guard.goodbye_channel(None).await.unwrap(), Some(None));
}

#[tokio::test]
async fn trip_is_safe_to_repeat() {
    let (fx, _) = Fixture::active().await;
    trip(&fx.ctx, GUILD, "a test asked for it").await.unwrap();
    trip(&fx.ctx, GUILD, "a test asked for it").await.unwrap();

    assert!(!fx.config().await.active);
    let deleted = fx
        .notifier
        .notices()
        .iter()
        .filter(|n| *n == "The gate message was deleted.")
        .count();
    assert_eq!(deleted, 1);
}
