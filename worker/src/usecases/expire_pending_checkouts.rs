use anyhow::Result;
use chrono::{Duration, Utc};
use crates::domain::repositories::checkout_sweep::CheckoutSweepRepository;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const ABANDONED_REASON: &str = "expired before completion";
const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Clone)]
pub struct ExpirePendingCheckoutsParams {
    pub older_than_minutes: i64,
    pub limit: Option<i64>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExpirePendingCheckoutsResult {
    pub scanned: usize,
    pub abandoned: usize,
    pub already_resolved: usize,
    pub failed: usize,
    pub cancelled_orphans: usize,
    pub expired_subscriptions: usize,
    pub candidate_ids: Vec<Uuid>,
    pub abandoned_ids: Vec<Uuid>,
}

pub struct ExpirePendingCheckoutsUseCase {
    repository: Arc<dyn CheckoutSweepRepository + Send + Sync>,
}

impl ExpirePendingCheckoutsUseCase {
    pub fn new(repository: Arc<dyn CheckoutSweepRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Abandons stale pending checkouts, cancels pending subscriptions left behind by failed
    /// payments, then expires lapsed active subscriptions.
    /// A dry run only reports candidates.
    pub async fn run(
        &self,
        params: ExpirePendingCheckoutsParams,
    ) -> Result<ExpirePendingCheckoutsResult> {
        let now = Utc::now();
        let created_before = now - Duration::minutes(params.older_than_minutes.max(0));
        let limit = params.limit.filter(|l| *l > 0);

        let payments = self
            .repository
            .list_stale_pending_payments(created_before, limit)
            .await
            .inspect_err(|err| {
                error!(db_error = ?err, "expire_pending_checkouts: failed to list stale payments");
            })?;

        let mut result = ExpirePendingCheckoutsResult {
            scanned: payments.len(),
            ..Default::default()
        };

        for payment in payments {
            if result.candidate_ids.len() < MAX_REPORTED_IDS {
                result.candidate_ids.push(payment.id);
            }

            if params.dry_run {
                continue;
            }

            match self
                .repository
                .abandon_pending_checkout(payment.id, payment.subscription_id, ABANDONED_REASON)
                .await
            {
                Ok(true) => {
                    result.abandoned += 1;
                    if result.abandoned_ids.len() < MAX_REPORTED_IDS {
                        result.abandoned_ids.push(payment.id);
                    }
                }
                // Resolved by a late callback between the scan and the update.
                Ok(false) => result.already_resolved += 1,
                Err(err) => {
                    error!(
                        payment_id = %payment.id,
                        subscription_id = %payment.subscription_id,
                        db_error = ?err,
                        "expire_pending_checkouts: failed to abandon checkout"
                    );
                    result.failed += 1;
                }
            }
        }

        if !params.dry_run {
            result.cancelled_orphans = self
                .repository
                .cancel_orphaned_subscriptions(created_before, now)
                .await
                .inspect_err(|err| {
                    error!(db_error = ?err, "expire_pending_checkouts: failed to cancel orphaned subscriptions");
                })?;

            result.expired_subscriptions = self
                .repository
                .expire_lapsed_subscriptions(now)
                .await
                .inspect_err(|err| {
                    error!(db_error = ?err, "expire_pending_checkouts: failed to expire lapsed subscriptions");
                })?;
        }

        info!(
            scanned = result.scanned,
            abandoned = result.abandoned,
            already_resolved = result.already_resolved,
            failed = result.failed,
            cancelled_orphans = result.cancelled_orphans,
            expired_subscriptions = result.expired_subscriptions,
            dry_run = params.dry_run,
            "expire_pending_checkouts: completed"
        );

        Ok(result)
    }
}
