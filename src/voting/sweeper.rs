use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::service::{CloseOutcome, DayOffService};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub closed: usize,
    pub announced: usize,
    pub failed: usize,
}

/// One pass: retry pending announcements, then close every due request.
///
/// A failing record is logged and counted; the rest are still processed.
pub async fn sweep(service: &DayOffService, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    match service.pending_announcements().await {
        Ok(pending) => {
            for record in pending {
                match service.close_and_announce(record.id, now).await {
                    Ok(CloseOutcome::Announced(_)) => report.announced += 1,
                    Ok(CloseOutcome::AnnouncementPending(_)) => report.failed += 1,
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, request_id = record.id, "Announcement retry failed");
                        report.failed += 1;
                    }
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Could not list pending announcements");
            report.failed += 1;
        }
    }

    let open = match service.open_requests().await {
        Ok(open) => open,
        Err(e) => {
            error!(error = %e, "Could not list open day-off requests");
            report.failed += 1;
            return report;
        }
    };

    let policy = service.policy();
    for record in open.into_iter().filter(|r| policy.should_close(r, now)) {
        match service.close_and_announce(record.id, now).await {
            Ok(CloseOutcome::Announced(_)) => {
                report.closed += 1;
                report.announced += 1;
            }
            Ok(CloseOutcome::AnnouncementPending(_)) => {
                report.closed += 1;
                report.failed += 1;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, request_id = record.id, "Closing day-off request failed");
                report.failed += 1;
            }
        }
    }

    report
}

/// Sweeps on every tick until `shutdown` flips to true. The first tick fires
/// immediately, which doubles as startup recovery.
pub async fn run(service: Arc<DayOffService>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = every.as_secs(), "Day-off sweeper started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sweep(&service, Utc::now()).await;
                if report != SweepReport::default() {
                    info!(
                        closed = report.closed,
                        announced = report.announced,
                        failed = report.failed,
                        "Day-off sweep finished"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("Day-off sweeper stopped");
}
