//! Per-service admission control. Consulted after the lock is taken and
//! before the claim, so a rejected job is parked as DEAD without ever being
//! claimed.

use relay_store::{ServiceThreshold, ThresholdStore};
use tracing::warn;

/// Outcome of the threshold check for one dispatch attempt.
pub enum AdmissionVerdict {
    /// No threshold row covers this service right now.
    Unrestricted,
    /// Within quota; the threshold to charge on success.
    Admitted(ServiceThreshold),
    /// Quota exhausted for the current window.
    Rejected,
    /// The threshold could not be read. Treated like a rejection: better to
    /// park the job than to deliver past an unverifiable quota.
    Unavailable,
}

pub async fn admit(
    thresholds: &dyn ThresholdStore,
    service_name: &str,
    now: i64,
) -> AdmissionVerdict {
    match thresholds.find_active(service_name, now).await {
        Ok(None) => AdmissionVerdict::Unrestricted,
        Ok(Some(threshold)) if threshold.is_within_limit() => AdmissionVerdict::Admitted(threshold),
        Ok(Some(_)) => AdmissionVerdict::Rejected,
        Err(err) => {
            warn!(service = %service_name, error = %err, "threshold lookup failed");
            AdmissionVerdict::Unavailable
        }
    }
}
