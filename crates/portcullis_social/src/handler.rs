//! Serenity event handler feeding the gateway dispatcher.
//!
//! The dispatcher is built on the first `ready`, once the HTTP client and
//! cache exist. Boot reconciliation waits for `cache_ready`, so guild
//! structure is cached before the first guard check. Events that arrive in
//! between are held by the dispatcher and replayed after boot.

use crate::commands::{Command, Cooldowns, execute};
use crate::conversions::{departed_member, gate_emoji, member_info, platform_error};
use crate::platform::SerenityPlatform;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{ChannelId, GuildId, MessageId, RoleId, UserId};
use portcullis_error::{CommandError, CommandErrorKind, PortcullisError, PortcullisErrorKind, PortcullisResult};
use portcullis_gateway::{
    Dispatcher, GateEmojis, GatewayContext, GatewaySettings, GuildEvent, LogChannelNotifier,
    PortcullisConfig, spawn_commit_scheduler, spawn_sweep_scheduler,
};
use portcullis_interface::{ChatPlatform, GatewayStore};
use serenity::client::{Context, EventHandler};
use serenity::model::channel::{Message, Reaction};
use serenity::model::event::GuildMemberUpdateEvent;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::guild::{Guild, Member, UnavailableGuild};
use serenity::model::id as sid;
use serenity::model::user::User;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

/// Event handler for the Portcullis bot.
pub struct PortcullisHandler {
    store: Arc<dyn GatewayStore>,
    settings: GatewaySettings,
    emojis: GateEmojis,
    default_prefix: String,
    cooldowns: Cooldowns,
    dispatcher: OnceLock<Arc<Dispatcher>>,
    booted: AtomicBool,
}

impl PortcullisHandler {
    /// Create a handler that persists through `store`.
    pub fn new(store: Arc<dyn GatewayStore>, config: &PortcullisConfig) -> Self {
        Self {
            store,
            settings: config.gateway.clone(),
            emojis: GateEmojis::new(
                config.gateway.accept_emoji.clone(),
                config.gateway.decline_emoji.clone(),
            ),
            default_prefix: config.commands.default_prefix.clone(),
            cooldowns: Cooldowns::new(&config.commands),
            dispatcher: OnceLock::new(),
            booted: AtomicBool::new(false),
        }
    }

    /// Gateway intents the handler depends on.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
    }

    fn build_dispatcher(&self, ctx: &Context) -> Arc<Dispatcher> {
        let platform: Arc<dyn ChatPlatform> = Arc::new(SerenityPlatform::new(
            ctx.http.clone(),
            ctx.cache.clone(),
            self.emojis.clone(),
        ));
        let notifier = Arc::new(LogChannelNotifier::new(
            self.store.clone(),
            platform.clone(),
        ));
        let gateway = GatewayContext::new(
            self.store.clone(),
            platform,
            notifier,
            self.emojis.clone(),
        );
        Arc::new(Dispatcher::new(gateway, self.settings.queue_capacity))
    }

    async fn dispatch(&self, guild: sid::GuildId, event: GuildEvent) {
        let Some(dispatcher) = self.dispatcher.get() else {
            debug!(guild_id = %guild, "Event before ready, dropped");
            return;
        };
        let kind = event.as_ref().to_string();
        if let Err(e) = dispatcher.dispatch(GuildId(guild.get()), event).await {
            error!(error = ?e, guild_id = %guild, event = %kind, "Failed to dispatch event");
        }
    }

    /// Read the watermark, boot the dispatcher and start the schedulers.
    #[instrument(skip(self, dispatcher))]
    async fn boot(&self, dispatcher: Arc<Dispatcher>) -> PortcullisResult<()> {
        let store = dispatcher.context().store().clone();
        let watermark = store.last_commit().await?.unwrap_or(DateTime::UNIX_EPOCH);
        info!(watermark = %watermark, "Booting gateway");
        dispatcher.boot(watermark, Utc::now()).await?;

        spawn_sweep_scheduler(dispatcher, self.settings.sweep_interval());
        spawn_commit_scheduler(store, self.settings.commit_interval());
        info!("Gateway booted");
        Ok(())
    }

    #[instrument(skip_all, fields(guild_id = %guild, user_id = %msg.author.id))]
    async fn run_command(
        &self,
        ctx: &Context,
        msg: &Message,
        guild: GuildId,
        dispatcher: &Dispatcher,
        parsed: PortcullisResult<Command>,
    ) -> PortcullisResult<String> {
        let command = parsed?;
        if command.needs_manage_guild() && !can_manage_guild(ctx, msg).await? {
            return Err(CommandError::new(CommandErrorKind::MissingPermission(
                "Manage Server".to_string(),
            ))
            .into());
        }
        if let Some(cooldown) = command.cooldown() {
            self.cooldowns.check(cooldown, guild)?;
        }
        execute(dispatcher, guild, command).await
    }
}

async fn can_manage_guild(ctx: &Context, msg: &Message) -> PortcullisResult<bool> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(false);
    };
    let member = guild_id
        .member(ctx, msg.author.id)
        .await
        .map_err(|e| platform_error("fetch member", e))?;
    let permissions = ctx.cache.guild(guild_id).map(|g| g.member_permissions(&member));
    Ok(permissions.is_some_and(|p| p.manage_guild()))
}

/// What the operator sees when a command fails.
fn refusal(err: &PortcullisError) -> String {
    match err.kind() {
        PortcullisErrorKind::Command(e) => e.kind.to_string(),
        PortcullisErrorKind::Setting(e) => e.kind.to_string(),
        _ => {
            error!(error = ?err, "Command failed");
            "Something went wrong while running that command.".to_string()
        }
    }
}

#[async_trait]
impl EventHandler for PortcullisHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Connected to Discord"
        );
        self.dispatcher.get_or_init(|| self.build_dispatcher(&ctx));
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<sid::GuildId>) {
        let Some(dispatcher) = self.dispatcher.get().cloned() else {
            warn!("Cache ready before the dispatcher was built");
            return;
        };
        if self.booted.swap(true, Ordering::SeqCst) {
            debug!("Cache ready again, already booted");
            return;
        }
        debug!(guilds = guilds.len(), "Cache ready");
        if let Err(e) = self.boot(dispatcher).await {
            error!(error = ?e, "Gateway boot failed");
            self.booted.store(false, Ordering::SeqCst);
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            self.dispatch(guild.id, GuildEvent::GuildJoined).await;
        }
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        if incomplete.unavailable {
            debug!(guild_id = %incomplete.id, "Guild unavailable, keeping its rows");
            return;
        }
        self.dispatch(incomplete.id, GuildEvent::GuildLeft).await;
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        let event = GuildEvent::MemberJoined(member_info(&new_member));
        self.dispatch(new_member.guild_id, event).await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: sid::GuildId,
        user: User,
        member_data_if_available: Option<Member>,
    ) {
        let member = member_data_if_available
            .as_ref()
            .map(member_info)
            .unwrap_or_else(|| departed_member(&user));
        self.dispatch(guild_id, GuildEvent::MemberLeft(member)).await;
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Member>,
        new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(new) = new else {
            debug!(guild_id = %event.guild_id, "Member update without cached member");
            return;
        };
        let member = member_info(&new);
        // Without the previous state every current role counts as new.
        let added: Vec<RoleId> = match old_if_available {
            Some(old) => member
                .roles
                .iter()
                .copied()
                .filter(|r| !old.roles.iter().any(|o| o.get() == r.get()))
                .collect(),
            None => member.roles.clone(),
        };
        if added.is_empty() {
            return;
        }
        self.dispatch(event.guild_id, GuildEvent::RolesAdded { member, added })
            .await;
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        let (Some(guild_id), Some(user_id)) = (add_reaction.guild_id, add_reaction.user_id) else {
            return;
        };
        let me = ctx.cache.current_user().id;
        if user_id == me {
            return;
        }
        let Some(emoji) = gate_emoji(&self.emojis, &add_reaction.emoji) else {
            return;
        };
        let event = GuildEvent::ReactionAdded {
            channel_id: ChannelId(add_reaction.channel_id.get()),
            message_id: MessageId(add_reaction.message_id.get()),
            user_id: UserId(user_id.get()),
            emoji,
        };
        self.dispatch(guild_id, event).await;
    }

    async fn message(&self, ctx: Context, new_message: Message) {
        if new_message.author.bot {
            return;
        }
        let Some(guild_id) = new_message.guild_id else {
            return;
        };
        let Some(dispatcher) = self.dispatcher.get() else {
            return;
        };
        let guild = GuildId(guild_id.get());

        let prefix = match dispatcher.context().store().system_config(guild).await {
            Ok(system) => system
                .prefix
                .unwrap_or_else(|| self.default_prefix.clone()),
            Err(e) => {
                error!(error = ?e, guild_id = %guild, "Failed to read command prefix");
                return;
            }
        };
        let Some(parsed) = Command::parse(&new_message.content, &prefix) else {
            return;
        };

        let reply = match self
            .run_command(&ctx, &new_message, guild, dispatcher, parsed)
            .await
        {
            Ok(text) => text,
            Err(e) => refusal(&e),
        };
        if let Err(e) = new_message.channel_id.say(&ctx.http, reply).await {
            warn!(error = %e, guild_id = %guild, "Failed to reply to command");
        }
    }
}
