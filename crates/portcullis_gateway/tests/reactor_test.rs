//! Live event transitions.

mod gateway_test_helpers;

use gateway_test_helpers::*;
use portcullis_core::{GateEmoji, UserId};
use portcullis_interface::GatewayStore;
use portcullis_gateway::{GuildEvent, handle_event};

fn reaction(message: portcullis_core::MessageId, user: UserId, emoji: GateEmoji) -> GuildEvent {
    GuildEvent::ReactionAdded {
        channel_id: RULES,
        message_id: message,
        user_id: user,
        emoji,
    }
}

#[tokio::test]
async fn join_gates_member_and_schedules_timeout() {
    let (fx, _) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());

    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    assert!(fx.platform.holds(UserId(1), BLOCKING));
    let entrant = fx.store.entrant(GUILD, UserId(1)).await.unwrap().unwrap();
    assert_eq!(entrant.timeout_at, t(300));
    fx.assert_settled().await;
}

#[tokio::test]
async fn bot_join_bypasses_gate_and_is_announced() {
    let (fx, _) = Fixture::active().await;
    let helper = bot(50, 0);
    fx.platform.add_member(helper.clone());

    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(helper))
        .await
        .unwrap();

    assert!(!fx.platform.holds(UserId(50), BLOCKING));
    assert!(!fx.is_entrant(UserId(50)).await);
    let sent = fx.platform.sent_to(WELCOME);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("The bot <@50> was added to the server."));
}

#[tokio::test]
async fn inactive_gate_ignores_joins() {
    let fx = Fixture::configured().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());

    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    assert!(!fx.platform.holds(UserId(1), BLOCKING));
    assert!(!fx.is_entrant(UserId(1)).await);
}

#[tokio::test]
async fn accepting_twice_grants_roles_and_records_once() {
    let (fx, gate) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    for _ in 0..2 {
        handle_event(&fx.ctx, GUILD, reaction(gate, UserId(1), GateEmoji::Accept))
            .await
            .unwrap();
    }

    assert!(fx.platform.holds(UserId(1), MEMBER_ROLE));
    assert!(!fx.platform.holds(UserId(1), BLOCKING));
    assert_eq!(fx.platform.grants_of(UserId(1), MEMBER_ROLE), 1);
    assert_eq!(fx.store.accepted_users(GUILD).await.unwrap(), vec![UserId(1)]);
    assert!(!fx.is_entrant(UserId(1)).await);

    let welcomes = fx.platform.sent_to(WELCOME);
    assert_eq!(welcomes.len(), 1);
    assert!(welcomes[0].contains("<@1> joined the server and accepted the rules."));
    fx.assert_settled().await;
}

#[tokio::test]
async fn reactions_on_other_messages_are_ignored() {
    let (fx, gate) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    let elsewhere = portcullis_core::MessageId(gate.get() + 1000);
    handle_event(&fx.ctx, GUILD, reaction(elsewhere, UserId(1), GateEmoji::Accept))
        .await
        .unwrap();

    assert!(fx.platform.holds(UserId(1), BLOCKING));
    assert!(fx.is_entrant(UserId(1)).await);
}

#[tokio::test]
async fn decline_kicks_gated_member_and_leave_clears_entrant() {
    let (fx, gate) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada.clone()))
        .await
        .unwrap();

    handle_event(&fx.ctx, GUILD, reaction(gate, UserId(1), GateEmoji::Decline))
        .await
        .unwrap();
    assert_eq!(fx.platform.state().kicked, vec![UserId(1)]);
    assert!(fx.is_entrant(UserId(1)).await);

    handle_event(&fx.ctx, GUILD, GuildEvent::MemberLeft(ada))
        .await
        .unwrap();
    assert!(!fx.is_entrant(UserId(1)).await);
    assert!(fx.platform.sent_to(GOODBYE).is_empty());
}

#[tokio::test]
async fn decline_from_accepted_member_does_not_kick() {
    let (fx, gate) = Fixture::active().await;
    let mut ada = human(1, 0);
    ada.roles = vec![MEMBER_ROLE];
    fx.platform.add_member(ada);
    fx.store.accept(GUILD, UserId(1)).await.unwrap();

    handle_event(&fx.ctx, GUILD, reaction(gate, UserId(1), GateEmoji::Decline))
        .await
        .unwrap();

    assert!(fx.platform.state().kicked.is_empty());
}

#[tokio::test]
async fn accepted_member_leaving_gets_goodbye_and_loses_rows() {
    let (fx, gate) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    fx.store.accept(GUILD, UserId(1)).await.unwrap();
    fx.platform.react(gate, UserId(1), GateEmoji::Accept);
    fx.platform.state().members.remove(&UserId(1));

    handle_event(&fx.ctx, GUILD, GuildEvent::MemberLeft(ada))
        .await
        .unwrap();

    assert!(!fx.is_accepted(UserId(1)).await);
    let goodbyes = fx.platform.sent_to(GOODBYE);
    assert_eq!(goodbyes.len(), 1);
    assert!(goodbyes[0].contains("User 1 is no longer in the server."));
    assert!(!fx.platform.reactors(gate, GateEmoji::Accept).contains(&UserId(1)));
}

#[tokio::test]
async fn exception_role_lets_gated_member_through() {
    let (fx, _) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    fx.platform.give_role(UserId(1), EXCEPTION);
    let updated = fx.platform.member_snapshot(UserId(1)).unwrap();
    handle_event(
        &fx.ctx,
        GUILD,
        GuildEvent::RolesAdded {
            member: updated,
            added: vec![EXCEPTION],
        },
    )
    .await
    .unwrap();

    assert!(!fx.platform.holds(UserId(1), BLOCKING));
    assert!(fx.platform.holds(UserId(1), MEMBER_ROLE));
    assert!(!fx.is_entrant(UserId(1)).await);
    assert!(!fx.is_accepted(UserId(1)).await);
    fx.assert_settled().await;
}

#[tokio::test]
async fn guild_lifecycle_creates_and_removes_rows() {
    let fx = Fixture::new().await;
    let other = portcullis_core::GuildId(77);

    handle_event(&fx.ctx, other, GuildEvent::GuildJoined)
        .await
        .unwrap();
    assert!(fx.store.gateway_config(other).await.unwrap().is_some());

    handle_event(&fx.ctx, other, GuildEvent::GuildLeft)
        .await
        .unwrap();
    assert!(fx.store.gateway_config(other).await.unwrap().is_none());
}

#[tokio::test]
async fn repeated_accept_with_stale_member_welcomes_once() {
    let (fx, gate) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();
    // The cache keeps serving the gated member until the role update lands.
    let gated = fx.platform.member_snapshot(UserId(1)).unwrap();
    fx.platform.state().stale.insert(UserId(1), gated);

    for _ in 0..2 {
        handle_event(&fx.ctx, GUILD, reaction(gate, UserId(1), GateEmoji::Accept))
            .await
            .unwrap();
    }

    assert_eq!(fx.platform.grants_of(UserId(1), MEMBER_ROLE), 1);
    assert_eq!(fx.platform.sent_to(WELCOME).len(), 1);
    assert!(fx.is_accepted(UserId(1)).await);
    assert!(!fx.is_entrant(UserId(1)).await);
}

#[tokio::test]
async fn failed_exception_pass_keeps_entrant() {
    let (fx, _) = Fixture::active().await;
    let ada = human(1, 0);
    fx.platform.add_member(ada.clone());
    handle_event(&fx.ctx, GUILD, GuildEvent::MemberJoined(ada))
        .await
        .unwrap();

    fx.platform.give_role(UserId(1), EXCEPTION);
    fx.platform.state().fail_role_edits = true;
    let updated = fx.platform.member_snapshot(UserId(1)).unwrap();
    handle_event(
        &fx.ctx,
        GUILD,
        GuildEvent::RolesAdded {
            member: updated,
            added: vec![EXCEPTION],
        },
    )
    .await
    .unwrap();

    assert!(fx.platform.holds(UserId(1), BLOCKING));
    assert!(fx.is_entrant(UserId(1)).await);
    fx.assert_settled().await;
}
