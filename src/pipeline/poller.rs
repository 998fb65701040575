//! Timer-driven triage runs.
//!
//! Each tick runs the pipeline to completion before the next begins; there
//! is no overlap between runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::triage::TriagePipeline;

/// Spawn a background task that runs the triage pipeline on an interval.
///
/// Returns the `JoinHandle` and a shutdown flag; setting the flag stops the
/// loop at the next tick.
pub fn spawn_triage_poller(
    pipeline: Arc<TriagePipeline>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Triage poller started — running every {:?}", interval);

        let mut tick = tokio::time::interval(interval);

        // Run immediately on first tick
        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Triage poller shutting down");
                return;
            }

            match pipeline.run().await {
                Ok(run) => {
                    info!(outcome = run.outcome.label(), "Triage tick complete");
                }
                Err(e) => {
                    error!(stage = e.stage(), error = %e, "Triage tick failed");
                    // Leave the item unprocessed — retried on the next tick.
                }
            }
        }
    });

    (handle, shutdown_flag)
}
