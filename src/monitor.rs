use tracing::{error, info};

use crate::notify::{format_alert, Direction, Notifier};
use crate::reading::Reading;
use crate::source::ReadingSource;

/// Everything the loop remembers between cycles.
#[derive(Debug, Default)]
pub struct MonitorState {
    last_reading: Option<Reading>,
}

impl MonitorState {
    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.last_reading.is_some()
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Fetch failed; state untouched.
    Skipped,
    /// First reading since start; stored without alerting.
    Baseline { value: i64 },
    Unchanged { value: i64 },
    Changed {
        previous: i64,
        current: i64,
        delivered: bool,
    },
}

/// Poll-diff-notify context: one source, one notifier, one remembered reading.
pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    state: MonitorState,
}

impl<S: ReadingSource, N: Notifier> Monitor<S, N> {
    pub fn new(source: S, notifier: N) -> Self {
        Self {
            source,
            notifier,
            state: MonitorState::default(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    /// Fetch, compare against the last reading, alert on change, remember.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let current = match self.source.fetch().await {
            Ok(reading) => reading,
            Err(e) => {
                error!(source = %self.source.describe(), error = %e, "Fetch failed, skipping cycle");
                return CycleOutcome::Skipped;
            }
        };

        let outcome = match self.state.last_reading.as_ref() {
            None => {
                info!(value = current.value, "Monitoring started, baseline set");
                CycleOutcome::Baseline {
                    value: current.value,
                }
            }
            Some(previous) if previous.value == current.value => {
                info!(value = current.value, "Checked risk, unchanged");
                CycleOutcome::Unchanged {
                    value: current.value,
                }
            }
            Some(previous) => {
                let direction = if current.value > previous.value {
                    Direction::Up
                } else {
                    Direction::Down
                };
                info!(
                    previous = previous.value,
                    current = current.value,
                    direction = %direction,
                    "Risk changed"
                );
                let message = format_alert(previous, &current);
                let delivered = match self.notifier.notify(&message).await {
                    Ok(()) => {
                        info!(value = current.value, "Notification sent");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "Notification failed");
                        false
                    }
                };
                CycleOutcome::Changed {
                    previous: previous.value,
                    current: current.value,
                    delivered,
                }
            }
        };

        self.state.last_reading = Some(current);
        outcome
    }

    /// Release the source's resources.
    pub async fn close(&mut self) {
        self.source.close().await;
    }
}
