//! Cron evaluation for the daily scheduled post.
//!
//! Fire times are computed in local time. Between fires the task sleeps,
//! and it stops as soon as shutdown is signalled.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::app::AppContext;
use crate::autopost::{self, PostOptions, PostOutcome, WorkflowError};

/// Parse a six-field cron expression (seconds first).
///
/// # Errors
///
/// Returns the cron parser error for malformed expressions.
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    cron::Schedule::from_str(expr.trim())
}

/// First fire time strictly after `after`.
pub fn next_fire<Tz: TimeZone>(
    schedule: &cron::Schedule,
    after: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

/// Time left until `next`, zero if it has already passed.
pub fn until<Tz: TimeZone>(next: &DateTime<Tz>, now: &DateTime<Tz>) -> Duration {
    next.clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Run the daily post on `schedule` until shutdown.
///
/// A failed or skipped post is logged and the loop moves on to the next
/// fire time.
pub async fn run_daily_posts(
    ctx: AppContext,
    schedule: cron::Schedule,
    options: PostOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("daily post scheduler started");

    loop {
        let now = Local::now();
        let Some(next) = next_fire(&schedule, &now) else {
            warn!("daily post schedule has no upcoming fire times");
            break;
        };
        info!(next = %next, "next daily post scheduled");

        if !autopost::wait_or_shutdown(until(&next, &now), &mut shutdown).await {
            break;
        }

        match autopost::run_post(&ctx, options.clone(), shutdown.clone()).await {
            Ok(PostOutcome::Sent { .. }) => info!("daily post sent"),
            Ok(PostOutcome::Duplicate { .. }) => warn!("daily post skipped: duplicate"),
            Ok(PostOutcome::Cancelled { .. }) => break,
            Err(WorkflowError::MissingTheme) => warn!("no theme scheduled for today"),
            Err(e) => error!(error = %e, "daily post failed"),
        }
    }

    info!("daily post scheduler stopped");
}
