mod audit;
mod deeper;
mod render;
mod status;

use crate::state::Context;

/// Epistemic audits of claims, forecasts and concepts
#[poise::command(
    slash_command,
    subcommands(
        "audit::claim",
        "audit::forecast",
        "audit::define",
        "deeper::deeper",
        "status::status"
    )
)]
pub async fn audit(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}
