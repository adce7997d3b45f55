use crate::state::Context;

/// Show whether an audit is running
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let state = if ctx.data().sessions.is_busy() {
        "An audit is in progress."
    } else {
        "Idle. Ready for a new audit."
    };

    ctx.say(format!(
        "**Status:** {}\n**Model:** `{}`",
        state,
        ctx.data().model
    ))
    .await?;
    Ok(())
}
