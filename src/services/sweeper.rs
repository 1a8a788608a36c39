use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SweeperConfig;
use crate::db::Store;

/// Rows removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub password_resets: u64,
    pub blacklisted_tokens: u64,
    pub unverified_users: u64,
}

impl SweepReport {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.password_resets + self.blacklisted_tokens + self.unverified_users
    }
}

/// Deletes every time-bound row that is past its expiry at `now`.
///
/// Verification-time checks stay authoritative; this only reclaims space.
pub async fn sweep_once(store: &Store, now: DateTime<Utc>) -> Result<SweepReport> {
    let report = SweepReport {
        password_resets: store.password_reset_repo().delete_expired(now).await?,
        blacklisted_tokens: store.token_blacklist_repo().delete_expired(now).await?,
        unverified_users: store.user_repo().delete_expired_unverified(now).await?,
    };

    metrics::counter!("expired_rows_deleted_total").increment(report.total());
    Ok(report)
}

pub struct ExpirySweeper {
    store: Store,
    config: SweeperConfig,
}

impl ExpirySweeper {
    #[must_use]
    pub const fn new(store: Store, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Schedules the sweep job. Returns `None` when sweeping is disabled.
    pub async fn start(self) -> Result<Option<JobScheduler>> {
        if !self.config.enabled {
            info!("Expiry sweeper is disabled in config");
            return Ok(None);
        }

        let sched = JobScheduler::new().await?;
        let store = self.store.clone();

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_uuid, _lock| {
            let store = store.clone();
            Box::pin(async move {
                let start = std::time::Instant::now();
                match sweep_once(&store, Utc::now()).await {
                    Ok(report) => info!(
                        event = "job_finished",
                        job_name = "expiry_sweep",
                        password_resets = report.password_resets,
                        blacklisted_tokens = report.blacklisted_tokens,
                        unverified_users = report.unverified_users,
                        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Expiry sweep finished"
                    ),
                    Err(e) => {
                        error!(event = "job_failed", job_name = "expiry_sweep", error = %e, "Expiry sweep failed");
                    }
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Expiry sweeper running with cron: {}", self.config.cron_expression);
        Ok(Some(sched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use chrono::Duration;

    #[tokio::test]
    async fn test_sweep_removes_only_expired_rows() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        let stale = NewUser {
            username: "stale".to_string(),
            email: "stale@x.com".to_string(),
            password_hash: None,
            email_verified: false,
            verification_code: Some("123456".to_string()),
            code_expires_at: Some(now - Duration::minutes(1)),
            last_verification_sent: Some(now - Duration::minutes(11)),
        };
        let pending = NewUser {
            username: "pending".to_string(),
            email: "pending@x.com".to_string(),
            code_expires_at: Some(now + Duration::minutes(5)),
            ..stale.clone()
        };
        let verified = NewUser {
            username: "verified".to_string(),
            email: "verified@x.com".to_string(),
            email_verified: true,
            verification_code: None,
            code_expires_at: None,
            ..stale.clone()
        };
        for user in [stale, pending, verified] {
            store.user_repo().create(user).await.unwrap();
        }

        store
            .token_blacklist_repo()
            .add("old", now - Duration::seconds(1))
            .await
            .unwrap();
        store
            .token_blacklist_repo()
            .add("live", now + Duration::hours(1))
            .await
            .unwrap();

        let report = sweep_once(&store, now).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                password_resets: 0,
                blacklisted_tokens: 1,
                unverified_users: 1,
            }
        );

        assert!(store.user_repo().get_by_email("stale@x.com").await.unwrap().is_none());
        assert!(store.user_repo().get_by_email("pending@x.com").await.unwrap().is_some());
        assert!(store.user_repo().get_by_email("verified@x.com").await.unwrap().is_some());
        assert!(store.token_blacklist_repo().contains("live").await.unwrap());
    }
}
