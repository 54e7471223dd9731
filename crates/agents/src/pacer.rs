//! Per-agent budget pacing: a periodic task reporting the agent's balance to
//! the banker.

use crate::clients::Banker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A running pacing loop. Dropping the handle does not stop the loop; call
/// [`PacingTask::stop`] or cancel the parent token.
pub struct PacingTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PacingTask {
    /// Spawn the pacing loop. The first report fires one `period` after start.
    ///
    /// Each report runs on its own task so a slow banker never delays the
    /// next tick.
    pub fn spawn(
        agent: String,
        accounts: Vec<String>,
        balance: i64,
        period: Duration,
        banker: Arc<dyn Banker>,
        parent: &CancellationToken,
    ) -> Self {
        let token = parent.child_token();
        let loop_token = token.clone();
        let accounts: Arc<[String]> = accounts.into();

        let handle = tokio::spawn(async move {
            info!(agent = %agent, period_ms = period.as_millis() as u64, "Pacer started");

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let banker = banker.clone();
                        let accounts = accounts.clone();
                        let agent = agent.clone();
                        tokio::spawn(async move {
                            debug!(agent = %agent, "Pacing");
                            metrics::counter!("bidder.pacing.reports").increment(1);
                            if let Err(e) = banker.report_balance(&accounts, balance).await {
                                warn!(agent = %agent, error = %e, "Balance report failed");
                                metrics::counter!("bidder.pacing.failures").increment(1);
                            }
                        });
                    }
                }
            }

            info!(agent = %agent, "Pacer stopped");
        });

        Self { token, handle }
    }

    /// Signal the loop to exit. Safe to call any number of times.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the loop and wait for it to exit. Reports already in flight are
    /// left to finish on their own.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Pacer task panicked");
        }
    }
}
