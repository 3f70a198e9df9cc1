//! Settings registry validation against live guild state.

mod gateway_test_helpers;

use gateway_test_helpers::*;
use portcullis_core::{ChannelId, RoleId, RoleInfo};
use portcullis_error::{PortcullisError, SettingErrorKind};
use portcullis_gateway::{GatewayAttribute, Setting, SystemAttribute, apply_setting};
use portcullis_interface::GatewayStore;

fn gateway(attribute: GatewayAttribute) -> Setting {
    Setting::Gateway(attribute)
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn rejection(err: &PortcullisError) -> &SettingErrorKind {
    &err.as_setting().expect("a settings rejection").kind
}

#[tokio::test]
async fn gate_identity_is_frozen_while_active() {
    let (fx, _) = Fixture::active().await;

    let err = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::RulesChannel),
        &args(&["<#102>"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(rejection(&err), SettingErrorKind::ModuleActive(_)));

    let err = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::BlockingRole),
        &args(&["<@&11>"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(rejection(&err), SettingErrorKind::ModuleActive(_)));
}

#[tokio::test]
async fn member_roles_need_a_blocking_role_first() {
    let fx = Fixture::new().await;

    let err = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::MemberRoles),
        &args(&["<@&11>"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        rejection(&err),
        SettingErrorKind::MissingPrerequisite { .. }
    ));

    apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::BlockingRole),
        &args(&["<@&10>"]),
    )
    .await
    .unwrap();
    let confirmation = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::MemberRoles),
        &args(&["<@&11>", "12"]),
    )
    .await
    .unwrap();

    assert_eq!(
        confirmation,
        "The member roles have been set to <@&11>, <@&12>."
    );
    assert_eq!(fx.config().await.member_role_ids, vec![MEMBER_ROLE, EXCEPTION]);
    assert!(fx.notifier.mentions("The member roles have been set"));
}

#[tokio::test]
async fn role_hierarchy_and_blocking_overlap_are_checked() {
    let fx = Fixture::configured().await;
    fx.platform
        .state()
        .roles
        .insert(RoleId(20), RoleInfo::new(RoleId(20), "Admin", 15));

    let err = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::MemberRoles),
        &args(&["<@&20>"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(rejection(&err), SettingErrorKind::InvalidValue { .. }));

    // Exception roles are not assigned by the bot, so rank does not matter.
    apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::ExceptionRoles),
        &args(&["<@&20>"]),
    )
    .await
    .unwrap();

    let err = apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::ExceptionRoles),
        &args(&["<@&10>"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(rejection(&err), SettingErrorKind::InvalidValue { .. }));
}

#[tokio::test]
async fn timeout_is_set_in_minutes_and_resets() {
    let fx = Fixture::new().await;
    let setting = gateway(GatewayAttribute::Timeout);

    apply_setting(&fx.ctx, GUILD, setting, &args(&["10"]))
        .await
        .unwrap();
    assert_eq!(fx.config().await.timeout_seconds, 600);

    assert!(
        apply_setting(&fx.ctx, GUILD, setting, &args(&["90"]))
            .await
            .is_err()
    );

    apply_setting(&fx.ctx, GUILD, setting, &[]).await.unwrap();
    assert_eq!(fx.config().await.timeout_seconds, 300);
}

#[tokio::test]
async fn notice_channels_must_differ_from_rules() {
    let fx = Fixture::new().await;
    let welcome = gateway(GatewayAttribute::WelcomeChannel);

    let err = apply_setting(&fx.ctx, GUILD, welcome, &args(&["<#101>"]))
        .await
        .unwrap_err();
    assert!(matches!(
        rejection(&err),
        SettingErrorKind::MissingPrerequisite { .. }
    ));

    apply_setting(
        &fx.ctx,
        GUILD,
        gateway(GatewayAttribute::RulesChannel),
        &args(&["<#100>"]),
    )
    .await
    .unwrap();
    assert!(
        apply_setting(&fx.ctx, GUILD, welcome, &args(&["<#100>"]))
            .await
            .is_err()
    );
    assert!(
        apply_setting(&fx.ctx, GUILD, welcome, &args(&["<#555>"]))
            .await
            .is_err()
    );

    apply_setting(&fx.ctx, GUILD, welcome, &args(&["<#101>"]))
        .await
        .unwrap();
    assert_eq!(fx.config().await.welcome_channel_id, Some(ChannelId(101)));

    apply_setting(&fx.ctx, GUILD, welcome, &[]).await.unwrap();
    assert_eq!(fx.config().await.welcome_channel_id, None);
}

#[tokio::test]
async fn system_settings_are_stored_separately() {
    let fx = Fixture::new().await;
    let prefix = Setting::System(SystemAttribute::Prefix);

    assert!(
        apply_setting(&fx.ctx, GUILD, prefix, &args(&["toolong"]))
            .await
            .is_err()
    );
    apply_setting(&fx.ctx, GUILD, prefix, &args(&["!"]))
        .await
        .unwrap();
    apply_setting(
        &fx.ctx,
        GUILD,
        Setting::System(SystemAttribute::LogChannel),
        &args(&["<#101>"]),
    )
    .await
    .unwrap();

    let system = fx.store.system_config(GUILD).await.unwrap();
    assert_eq!(system.prefix.as_deref(), Some("!"));
    assert_eq!(system.log_channel_id, Some(ChannelId(101)));
}

#[tokio::test]
async fn notice_texts_are_checked_for_placeholders() {
    let fx = Fixture::new().await;
    let welcome = gateway(GatewayAttribute::WelcomeText);

    assert!(
        apply_setting(&fx.ctx, GUILD, welcome, &args(&["Hi", "{nobody}"]))
            .await
            .is_err()
    );
    apply_setting(
        &fx.ctx,
        GUILD,
        welcome,
        &args(&["Welcome", "{membermention}!"]),
    )
    .await
    .unwrap();
    assert_eq!(
        fx.config().await.welcome_text.as_deref(),
        Some("Welcome {membermention}!")
    );
}
