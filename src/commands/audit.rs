use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::render::{render_result, send_chunked, ProgressLog};
use crate::audit::types::{AuditMode, AuditRequest};
use crate::error::USER_FACING_ERROR;
use crate::session::SessionUpdate;
use crate::state::Context;

/// Audit a factual claim
#[poise::command(slash_command, guild_only)]
pub async fn claim(
    ctx: Context<'_>,
    #[description = "The claim to audit"] text: String,
) -> Result<(), anyhow::Error> {
    run_audit(ctx, text, AuditMode::Claim).await
}

/// Audit a probability forecast
#[poise::command(slash_command, guild_only)]
pub async fn forecast(
    ctx: Context<'_>,
    #[description = "The forecast, e.g. \"70% chance of X by 2030\""] text: String,
) -> Result<(), anyhow::Error> {
    run_audit(ctx, text, AuditMode::Forecast).await
}

/// Define and analyze a concept
#[poise::command(slash_command, guild_only)]
pub async fn define(
    ctx: Context<'_>,
    #[description = "The concept to define"] concept: String,
) -> Result<(), anyhow::Error> {
    run_audit(ctx, concept, AuditMode::Definition).await
}

async fn run_audit(ctx: Context<'_>, input: String, mode: AuditMode) -> Result<(), anyhow::Error> {
    let input = input.trim().to_string();
    if input.is_empty() {
        ctx.say("Give me something to audit.").await?;
        return Ok(());
    }

    let data = ctx.data();
    let Some((session, mut updates)) = data.sessions.begin() else {
        ctx.say("An audit is already running. Try again when it finishes.")
            .await?;
        return Ok(());
    };

    info!(
        user = %ctx.author().name,
        session = session.id(),
        %mode,
        "Audit requested"
    );

    let request = AuditRequest::new(input, mode);
    let mut progress = ProgressLog::new(&request);
    let reply = &ctx.say(progress.render()).await?;

    let audit = data.pipeline.run(&request, &session);
    let outcome = drive(audit, &mut updates, &mut progress, |content| async move {
        reply
            .edit(ctx, poise::CreateReply::default().content(content))
            .await
    })
    .await;
    session.finish();

    // Updates queued in the same tick as completion, such as "Complete."
    if progress.absorb(&mut updates) {
        redraw_or_warn(
            reply
                .edit(ctx, poise::CreateReply::default().content(progress.render()))
                .await,
        );
    }

    match outcome {
        Ok(result) => {
            info!(
                session = session.id(),
                mode = %result.mode(),
                fragments = session.fragment_count(),
                sources = result.sources.len(),
                "Audit delivered"
            );
            send_chunked(&ctx, &render_result(&result)).await
        }
        Err(err) => {
            // Internal detail stays in the logs
            warn!(session = session.id(), error = %err, "Audit failed");
            ctx.say(USER_FACING_ERROR).await?;
            Ok(())
        }
    }
}

/// Poll `audit` to completion, redrawing the progress message on every
/// session update. A failed redraw is logged and the audit keeps running.
async fn drive<T, A, R, RFut, E>(
    audit: A,
    updates: &mut mpsc::UnboundedReceiver<SessionUpdate>,
    progress: &mut ProgressLog,
    mut redraw: R,
) -> T
where
    A: Future<Output = T>,
    R: FnMut(String) -> RFut,
    RFut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    tokio::pin!(audit);
    loop {
        tokio::select! {
            result = &mut audit => return result,
            Some(update) = updates.recv() => {
                progress.apply(update);
                redraw_or_warn(redraw(progress.render()).await);
            }
        }
    }
}

fn redraw_or_warn<E: fmt::Display>(result: Result<(), E>) {
    if let Err(err) = result {
        warn!(error = %err, "Progress message update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_failed_redraw_does_not_abort_audit() {
        let (tx, mut updates) = mpsc::unbounded_channel();
        let mut progress = ProgressLog::new(&AuditRequest::new("X", AuditMode::Claim));

        let audit = async move {
            for step in ["Researching with web search...", "Extracting structured analysis..."] {
                let _ = tx.send(SessionUpdate::Status(step.to_string()));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            "finished"
        };

        let mut attempts = 0;
        let outcome = drive(audit, &mut updates, &mut progress, |_content| {
            attempts += 1;
            async { Err::<(), _>("edit rejected") }
        })
        .await;

        assert_eq!(outcome, "finished");
        assert_eq!(attempts, 2);
        assert!(progress.render().ends_with("_Extracting structured analysis..._"));
    }

    #[test]
    fn test_updates_after_completion_are_absorbed() {
        let (tx, mut updates) = mpsc::unbounded_channel();
        let mut progress = ProgressLog::new(&AuditRequest::new("X", AuditMode::Claim));
        assert!(!progress.absorb(&mut updates));

        tx.send(SessionUpdate::Status("Complete.".to_string())).unwrap();
        assert!(progress.absorb(&mut updates));
        assert!(progress.render().ends_with("_Complete._"));
        assert!(!progress.absorb(&mut updates));
    }
}
