//! Conversions between serenity models and gateway snapshots.

use chrono::{DateTime, Utc};
use portcullis_core::{GateEmoji, MemberInfo, RoleId, UserId};
use portcullis_error::{PlatformError, PlatformErrorKind};
use portcullis_gateway::{EmojiSpec, GateEmojis};
use portcullis_interface::PlatformResult;
use serenity::model::channel::ReactionType;
use serenity::model::guild::Member;
use serenity::model::id::EmojiId;
use serenity::model::user::User;
use std::num::NonZeroU64;

/// Convert a raw id into a serenity id.
///
/// Zero never names a Discord object, so it is reported as not found.
#[track_caller]
pub fn snowflake<T: From<NonZeroU64>>(raw: u64, what: &str) -> PlatformResult<T> {
    NonZeroU64::new(raw)
        .map(T::from)
        .ok_or_else(|| PlatformError::new(PlatformErrorKind::NotFound(format!("{what} 0"))))
}

/// Classify a serenity failure by HTTP status.
#[track_caller]
pub fn platform_error(action: &str, err: serenity::Error) -> PlatformError {
    let status = match &err {
        serenity::Error::Http(http) => http.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    let detail = format!("{action}: {err}");
    let kind = match status {
        Some(404) => PlatformErrorKind::NotFound(detail),
        Some(403) => PlatformErrorKind::Forbidden(detail),
        _ => PlatformErrorKind::Request(detail),
    };
    PlatformError::new(kind)
}

/// Turn a not-found failure into `None`.
pub fn found<T>(result: PlatformResult<T>) -> PlatformResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn timestamp(ts: serenity::model::Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0)
}

/// Snapshot a guild member.
pub fn member_info(member: &Member) -> MemberInfo {
    MemberInfo {
        user_id: UserId(member.user.id.get()),
        name: member.user.name.clone(),
        display_name: member.display_name().to_string(),
        bot: member.user.bot,
        joined_at: member.joined_at.and_then(timestamp),
        roles: member.roles.iter().map(|r| RoleId(r.get())).collect(),
    }
}

/// Snapshot a user who has already left, when the cache lost the member.
pub fn departed_member(user: &User) -> MemberInfo {
    MemberInfo {
        user_id: UserId(user.id.get()),
        name: user.name.clone(),
        display_name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        bot: user.bot,
        joined_at: None,
        roles: Vec::new(),
    }
}

/// Reaction payload for a configured emoji.
pub fn reaction_type(spec: &EmojiSpec) -> PlatformResult<ReactionType> {
    Ok(match spec {
        EmojiSpec::Unicode(s) => ReactionType::Unicode(s.clone()),
        EmojiSpec::Custom { name, id, animated } => ReactionType::Custom {
            animated: *animated,
            id: snowflake::<EmojiId>(*id, "emoji")?,
            name: Some(name.clone()),
        },
    })
}

fn matches(spec: &EmojiSpec, reaction: &ReactionType) -> bool {
    match (spec, reaction) {
        (EmojiSpec::Unicode(want), ReactionType::Unicode(got)) => want == got,
        (EmojiSpec::Custom { id, .. }, ReactionType::Custom { id: got, .. }) => *id == got.get(),
        _ => false,
    }
}

/// Which gate emoji a reaction is, if either.
pub fn gate_emoji(emojis: &GateEmojis, reaction: &ReactionType) -> Option<GateEmoji> {
    if matches(emojis.accept(), reaction) {
        Some(GateEmoji::Accept)
    } else if matches(emojis.decline(), reaction) {
        Some(GateEmoji::Decline)
    } else {
        None
    }
}

/// The configured spec of a gate emoji.
pub fn emoji_spec(emojis: &GateEmojis, emoji: GateEmoji) -> &EmojiSpec {
    match emoji {
        GateEmoji::Accept => emojis.accept(),
        GateEmoji::Decline => emojis.decline(),
    }
}
