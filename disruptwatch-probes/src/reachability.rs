//! Pre-flight reachability checks.

use std::time::Duration;

use tracing::{debug, info};

use crate::http::HttpCheck;
use crate::ProbeError;

/// Poll `check` until it succeeds `success_count` times in a row.
///
/// The first request is sent immediately; later ones every `poll`. A failure
/// resets the count. Gives up with [`ProbeError::NotReachable`] after `timeout`.
pub async fn wait_until_reachable(
    check: &HttpCheck,
    success_count: u32,
    poll: Duration,
    timeout: Duration,
) -> Result<(), ProbeError> {
    let polling = async {
        let mut consecutive = 0u32;
        loop {
            match check.check().await {
                Ok(()) => {
                    consecutive += 1;
                    if consecutive >= success_count {
                        return;
                    }
                }
                Err(e) => {
                    debug!(url = check.url(), "not reachable yet: {}", e);
                    consecutive = 0;
                }
            }
            tokio::time::sleep(poll).await;
        }
    };

    tokio::time::timeout(timeout, polling)
        .await
        .map_err(|_| ProbeError::NotReachable {
            required: success_count,
            timeout,
        })?;

    info!(url = check.url(), "target reachable for {} consecutive requests", success_count);
    Ok(())
}
