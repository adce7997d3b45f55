use tracing::warn;

use super::render::send_chunked;
use crate::audit::DeeperLens;
use crate::error::USER_FACING_ERROR;
use crate::state::Context;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Lens {
    #[name = "steelman"]
    Steelman,
    #[name = "crux"]
    Crux,
    #[name = "historical"]
    Historical,
}

impl Lens {
    fn title(self) -> &'static str {
        match self {
            Lens::Steelman => "Steelman",
            Lens::Crux => "Crux",
            Lens::Historical => "Historical parallels",
        }
    }
}

impl From<Lens> for DeeperLens {
    fn from(lens: Lens) -> Self {
        match lens {
            Lens::Steelman => DeeperLens::Steelman,
            Lens::Crux => DeeperLens::Crux,
            Lens::Historical => DeeperLens::Historical,
        }
    }
}

/// Go deeper on a claim: steelman, crux, or historical parallels
#[poise::command(slash_command, guild_only)]
pub async fn deeper(
    ctx: Context<'_>,
    #[description = "steelman | crux | historical"] lens: Lens,
    #[description = "The claim to examine"] claim: String,
) -> Result<(), anyhow::Error> {
    ctx.defer().await?;

    match ctx.data().pipeline.go_deeper(lens.into(), claim.trim()).await {
        Ok(text) => {
            let full = format!("**{}** on: {}\n\n{}", lens.title(), claim.trim(), text);
            send_chunked(&ctx, &full).await
        }
        Err(err) => {
            warn!(?lens, error = %err, "Follow-up failed");
            ctx.say(USER_FACING_ERROR).await?;
            Ok(())
        }
    }
}
