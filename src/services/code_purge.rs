use std::{sync::Arc, time::Duration};

use tracing::{error, info};

use crate::usecases::verification_codes::VerificationCodeUseCase;

pub const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Deletes expired verification codes and stale rate-limit attempts on a
/// fixed interval. Runs until the process exits.
pub async fn run(verification: Arc<VerificationCodeUseCase>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "code_purge: loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = verification.purge_expired().await {
            error!(error = ?err, "code_purge: failed to purge expired codes");
        }
        if let Err(err) = verification.purge_stale_rate_limits().await {
            error!(error = ?err, "code_purge: failed to purge rate limit attempts");
        }
    }
}
