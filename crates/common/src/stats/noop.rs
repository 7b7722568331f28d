//! Discard sink used when metrics collection is disabled.

use std::time::Duration;

use super::{Labels, StatsClient, StatsResult};

/// No-op stats client for testing or when metrics are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStatsClient;

impl StatsClient for NoOpStatsClient {
    fn timing(&self, _name: &str, _labels: &Labels, _duration: Duration) -> StatsResult<()> {
        Ok(())
    }

    fn incr(&self, _name: &str, _labels: &Labels, _value: i64) -> StatsResult<()> {
        Ok(())
    }

    fn gauge(&self, _name: &str, _labels: &Labels, _value: f64) -> StatsResult<()> {
        Ok(())
    }
}
