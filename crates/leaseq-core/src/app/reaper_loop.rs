//! ReaperLoop - Lease 期限切れの定期回収
//!
//! 通常はリクエストの度に sweep するので不要ですが、リクエストが来ない間も
//! 期限切れを pending に戻したい場合に使います。store のロックは
//! リクエスト処理と同じものを取ります。

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::QueueService;

pub struct ReaperLoop {
    service: QueueService,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(service: QueueService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweep every `interval` until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        debug!(interval_ms = self.interval.as_millis() as u64, "reaper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let requeued = self.service.sweep().await;
                    if requeued > 0 {
                        info!(requeued, "reaper requeued expired leases");
                    }
                }
                _ = &mut shutdown => break,
            }
        }
        debug!("reaper stopped");
    }
}
