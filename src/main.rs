mod audit;
mod commands;
mod config;
mod error;
mod llm;
mod reveal;
mod session;
mod state;

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tracing::{error, info, warn, Level};

use audit::AuditPipeline;
use config::AuditConfig;
use session::SessionManager;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let _ = dotenv::dotenv();
    let token = dotenv::var("DISCORD_TOKEN")
        .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN required"))?;
    let guild_id: Option<serenity::GuildId> = dotenv::var("DISCORD_GUILD_ID")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(serenity::GuildId::new);

    // The provider key is only checked when an audit runs
    let audit_config = AuditConfig::from_env();
    if audit_config.api_key.is_none() {
        warn!("GEMINI_API_KEY not set, audits will fail until it is configured");
    }
    info!(
        model = %audit_config.model,
        retry_delay_ms = audit_config.retry_delay.as_millis() as u64,
        "Audit pipeline configured"
    );

    let app_state = AppState {
        model: audit_config.model.clone(),
        pipeline: Arc::new(AuditPipeline::new(audit_config)),
        sessions: Arc::new(SessionManager::new()),
    };

    let intents = serenity::GatewayIntents::GUILDS;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::audit()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(user = %ready.user.name, id = %ready.user.id, "Bot connected");
                register_commands(ctx, &framework.options().commands, guild_id).await?;
                Ok(app_state)
            })
        })
        .build();

    info!("Starting epistemic auditor bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!(error = %e, "Discord client stopped");
        return Err(e.into());
    }

    Ok(())
}

/// Publish the slash commands: per guild when one is configured, since that
/// takes effect immediately, otherwise globally.
async fn register_commands(
    ctx: &serenity::Context,
    commands: &[poise::Command<AppState, anyhow::Error>],
    guild_id: Option<serenity::GuildId>,
) -> Result<(), serenity::Error> {
    let names: Vec<String> = commands
        .iter()
        .flat_map(|cmd| {
            cmd.subcommands
                .iter()
                .map(move |sub| format!("/{} {}", cmd.name, sub.name))
        })
        .collect();

    match guild_id {
        Some(gid) => {
            poise::builtins::register_in_guild(ctx, commands, gid).await?;
            info!(guild = %gid, commands = ?names, "Slash commands registered to guild");
        }
        None => {
            poise::builtins::register_globally(ctx, commands).await?;
            info!(commands = ?names, "Slash commands registered globally, may take up to an hour");
        }
    }
    Ok(())
}
