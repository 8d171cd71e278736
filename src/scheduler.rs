use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::review::ReviewRegistry;

/// Start the periodic overdue-review sweep.
///
/// The sweep only reports; it never mutates review state. Its job is to
/// make blown review deadlines visible in the logs before they go stale.
pub async fn start_scheduler(config: Arc<Config>, db: Database) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cron_expr = minutes_to_cron(config.overdue_check_minutes);
    info!("Scheduling overdue-review sweep (cron: {})", cron_expr);

    let registry = ReviewRegistry::new(db);
    let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
        let registry = registry.clone();
        Box::pin(async move {
            if let Err(e) = sweep_overdue(&registry).await {
                error!("Overdue sweep failed: {}", e);
            }
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;
    info!("✓ Scheduler started");

    Ok(scheduler)
}

/// Convert an interval in minutes to a six-field cron expression.
/// Intervals of an hour or more collapse to an hourly run.
fn minutes_to_cron(minutes: u32) -> String {
    if minutes == 0 || minutes >= 60 {
        return "0 0 * * * *".to_string();
    }
    format!("0 */{} * * * *", minutes)
}

async fn sweep_overdue(registry: &ReviewRegistry) -> Result<()> {
    let overdue = registry.list_overdue()?;
    if overdue.is_empty() {
        info!("No overdue review tasks");
        return Ok(());
    }

    warn!("{} review task(s) past due", overdue.len());
    for task in &overdue {
        warn!(
            "Review task {} for file {} was due {}",
            task.id, task.file_id, task.due_date
        );
    }
    Ok(())
}
