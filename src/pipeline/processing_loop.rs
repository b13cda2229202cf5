//! Processing loop shared by every monitor and input mode.
//!
//! Reads one message, hands it to the monitor, writes the resulting points,
//! and repeats until the source ends or the token is cancelled. The next
//! message is not read until the current one has been written, so a slow
//! sink throttles ingestion.

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Monitor, MonitorError};
use crate::acquisition::{MessageSource, SourceError, SourceEvent};
use crate::config::defaults::PROGRESS_LOG_INTERVAL;
use crate::sink::PointSink;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub messages: u64,
    pub points_emitted: u64,
    pub malformed: u64,
    pub not_routed: u64,
    pub detector_errors: u64,
    pub sink_failures: u64,
}

enum Step {
    Cancelled,
    Message(Result<SourceEvent, SourceError>),
    FlushDue,
}

pub struct ProcessingLoop<M: Monitor, K: PointSink> {
    monitor: M,
    sink: K,
    cancel_token: CancellationToken,
    stats: LoopStats,
}

impl<M: Monitor, K: PointSink> ProcessingLoop<M, K> {
    pub fn new(monitor: M, sink: K, cancel_token: CancellationToken) -> Self {
        Self {
            monitor,
            sink,
            cancel_token,
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn into_parts(self) -> (M, K) {
        (self.monitor, self.sink)
    }

    /// Run until the source is exhausted or cancellation, then flush the sink.
    pub async fn run<S: MessageSource>(&mut self, source: &mut S) -> LoopStats {
        info!(
            monitor = self.monitor.name(),
            source = source.source_name(),
            sink = self.sink.name(),
            "Processing messages"
        );
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let mut flush_tick = self.sink.flush_interval().map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let step = tokio::select! {
                _ = self.cancel_token.cancelled() => Step::Cancelled,
                result = source.next_message() => Step::Message(result),
                _ = next_tick(&mut flush_tick) => Step::FlushDue,
            };

            match step {
                Step::Cancelled => {
                    info!("Shutdown signal received");
                    break;
                }
                Step::FlushDue => self.flush().await,
                Step::Message(Err(e)) => {
                    warn!(source = source.source_name(), error = %e, "Source error");
                    break;
                }
                Step::Message(Ok(SourceEvent::Eof)) => {
                    info!(messages = self.stats.messages, "Source reached end");
                    break;
                }
                Step::Message(Ok(SourceEvent::Message(raw))) => {
                    self.handle_message(&raw).await;
                }
            }
        }

        self.flush().await;
        self.log_final_stats();
        self.stats.clone()
    }

    async fn handle_message(&mut self, raw: &str) {
        self.stats.messages += 1;

        match self.monitor.handle(raw) {
            Ok(points) => {
                for point in points {
                    match self.sink.write(point).await {
                        Ok(()) => self.stats.points_emitted += 1,
                        Err(e) => {
                            self.stats.sink_failures += 1;
                            warn!(sink = self.sink.name(), error = %e, "Point not written");
                        }
                    }
                }
            }
            Err(MonitorError::Payload(e)) => {
                self.stats.malformed += 1;
                warn!(
                    field = e.field().unwrap_or("-"),
                    device = e.device().unwrap_or("-"),
                    error = %e,
                    "Malformed message skipped"
                );
            }
            Err(e @ MonitorError::NotRouted { .. }) => {
                self.stats.not_routed += 1;
                debug!(reason = %e, "Message skipped");
            }
            Err(MonitorError::Registry(e)) => {
                self.stats.detector_errors += 1;
                error!(error = %e, "Detector lookup failed");
            }
        }

        if self.stats.messages % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                messages = self.stats.messages,
                points = self.stats.points_emitted,
                malformed = self.stats.malformed,
                "Progress"
            );
        }
    }

    async fn flush(&mut self) {
        if let Err(e) = self.sink.flush().await {
            self.stats.sink_failures += 1;
            warn!(sink = self.sink.name(), error = %e, "Flush failed, batch dropped");
        }
    }

    fn log_final_stats(&self) {
        let s = &self.stats;
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("FINAL STATISTICS ({})", self.monitor.name());
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Messages:          {}", s.messages);
        info!("   Points Emitted:    {}", s.points_emitted);
        info!("   Malformed:         {}", s.malformed);
        info!("   Not Routed:        {}", s.not_routed);
        info!("   Detector Errors:   {}", s.detector_errors);
        info!("   Sink Failures:     {}", s.sink_failures);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// Next flush tick, or never for sinks without a flush interval.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
