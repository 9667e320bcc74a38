use crate::{
    config::config_model::Sweep,
    usecases::expire_pending_checkouts::{
        ExpirePendingCheckoutsParams, ExpirePendingCheckoutsUseCase,
    },
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run_sweep_loop(
    usecase: Arc<ExpirePendingCheckoutsUseCase>,
    sweep: Sweep,
) -> Result<()> {
    info!(
        interval_seconds = sweep.interval_seconds,
        pending_ttl_minutes = sweep.pending_ttl_minutes,
        "sweep_loop: started"
    );

    loop {
        let params = ExpirePendingCheckoutsParams {
            older_than_minutes: sweep.pending_ttl_minutes,
            limit: sweep.batch_limit,
            dry_run: false,
        };

        if let Err(e) = usecase.run(params).await {
            error!(error = ?e, "sweep_loop: pending checkout sweep failed");
        }

        tokio::time::sleep(Duration::from_secs(sweep.interval_seconds)).await;
    }
}
