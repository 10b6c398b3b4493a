//! Daily submission quota.
//!
//! The quota is a plain value. Reading it for a given day is a pure function
//! of the stored record; increments happen in the database.

use serde::{Deserialize, Serialize};

use crate::config::QuotaLimits;

/// The singleton quota record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuota {
    /// Calendar day (`YYYY-MM-DD`, UTC) the counters belong to
    pub date: String,
    pub attempts: u32,
    pub accepted: u32,
}

impl DailyQuota {
    pub fn fresh(today: &str) -> Self {
        Self {
            date: today.to_string(),
            attempts: 0,
            accepted: 0,
        }
    }

    /// The logical quota for `today`: a missing or stale record reads as zero.
    pub fn current(stored: Option<&DailyQuota>, today: &str) -> Self {
        match stored {
            Some(quota) if quota.date == today => quota.clone(),
            _ => Self::fresh(today),
        }
    }

    pub fn status(&self, limits: QuotaLimits) -> LimitStatus {
        LimitStatus {
            limit_reached: self.attempts >= limits.max_attempts
                || self.accepted >= limits.max_accepted,
            attempts: self.attempts,
            max_attempts: limits.max_attempts,
            accepted: self.accepted,
            max_accepted: limits.max_accepted,
        }
    }
}

/// One of the two daily counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCounter {
    Attempts,
    Accepted,
}

/// Response body for `GET /api/limits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub limit_reached: bool,
    pub attempts: u32,
    pub max_attempts: u32,
    pub accepted: u32,
    pub max_accepted: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(date: &str, attempts: u32, accepted: u32) -> DailyQuota {
        DailyQuota {
            date: date.to_string(),
            attempts,
            accepted,
        }
    }

    #[test]
    fn test_current_resets_stale_record() {
        let stored = quota("2026-10-18", 7, 3);
        assert_eq!(
            DailyQuota::current(Some(&stored), "2026-10-19"),
            DailyQuota::fresh("2026-10-19")
        );
        assert_eq!(DailyQuota::current(Some(&stored), "2026-10-18"), stored);
        assert_eq!(
            DailyQuota::current(None, "2026-10-19"),
            DailyQuota::fresh("2026-10-19")
        );
    }

    #[test]
    fn test_status_reports_either_cap() {
        let limits = QuotaLimits {
            max_attempts: 100,
            max_accepted: 50,
        };
        assert!(!quota("d", 99, 49).status(limits).limit_reached);
        assert!(quota("d", 100, 0).status(limits).limit_reached);
        assert!(quota("d", 60, 50).status(limits).limit_reached);
    }
}
