use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::agents::PlcAgent;
use crate::controller::{PageController, PollOutcome};
use crate::page::Page;
use crate::Result;

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

/// Drives `PageController::poll` on a fixed period.
pub struct Poller<A, P> {
    controller: Arc<PageController<A, P>>,
    period: Duration
}

impl<A, P> Poller<A, P>
    where A: PlcAgent, P: Page
{
    pub fn new(controller: Arc<PageController<A, P>>, period: Duration) -> Self {
        Poller { controller, period }
    }

    /// Poll right away, then every period until `shutdown` flips to true
    /// or its sender is dropped. A poll still in flight at that point is
    /// dropped. `on_poll` sees every outcome; a failed poll
    /// is logged and the loop keeps going.
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_poll: F)
        where F: FnMut(&Result<PollOutcome>)
    {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(url = %self.controller.poll_url(), period_ms = self.period.as_millis() as u64, "polling");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },
                _ = ticker.tick() => {
                    //== a request the plc never answers must not hold up shutdown
                    let poll = self.controller.poll();
                    tokio::pin!(poll);
                    let outcome = loop {
                        tokio::select! {
                            outcome = &mut poll => break Some(outcome),
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    break None;
                                }
                            }
                        }
                    };
                    let outcome = match outcome {
                        Some(outcome) => outcome,
                        None => break
                    };
                    match &outcome {
                        Ok(PollOutcome::Updated(snapshot)) => debug!(%snapshot, "displays updated"),
                        Ok(PollOutcome::Status(_)) => {},
                        Err(err) => warn!(error = %err, "poll failed"),
                    }
                    on_poll(&outcome);
                }
            }
        }

        info!("polling stopped");
    }
}
