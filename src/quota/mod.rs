//! Daily quota store.
//!
//! Reads apply the day-rollover rule without writing. Each increment is a
//! single conditional statement against the stored record, so concurrent
//! submissions neither lose each other's increments nor overshoot a cap.

use std::sync::Arc;

use crate::clock::Clock;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{DailyQuota, QuotaCounter};

pub struct QuotaStore {
    repo: Arc<Repository>,
    clock: Arc<dyn Clock>,
}

impl QuotaStore {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// The quota for today. A missing or stale record reads as zero.
    pub async fn get_quota(&self) -> Result<DailyQuota, AppError> {
        let stored = self.repo.load_quota().await?;
        Ok(DailyQuota::current(stored.as_ref(), &self.clock.today()))
    }

    /// Count one more attempt unless `max_attempts` is already reached.
    pub async fn try_increment_attempts(&self, max_attempts: u32) -> Result<bool, AppError> {
        self.repo
            .increment_quota(QuotaCounter::Attempts, &self.clock.today(), max_attempts)
            .await
    }

    /// Count one more accepted question unless `max_accepted` is already reached.
    pub async fn try_increment_accepted(&self, max_accepted: u32) -> Result<bool, AppError> {
        self.repo
            .increment_quota(QuotaCounter::Accepted, &self.clock.today(), max_accepted)
            .await
    }
}
