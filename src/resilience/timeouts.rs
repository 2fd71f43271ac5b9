//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream connect and request futures with a deadline
//! - Map an elapsed deadline to a transport error naming the stage
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other transport errors
//! - Timed-out calls are answered with 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::relay::error::TransportError;

/// Deadlines applied by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub connect: Duration,
    pub request: Duration,
}

impl Deadlines {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            request: Duration::from_secs(config.request_secs),
        }
    }
}

impl Default for Deadlines {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

/// Run `fut` with a deadline; `stage` names the step in the error.
pub async fn with_timeout<T, F>(
    stage: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(stage, limit_secs = limit.as_secs(), "Upstream deadline elapsed");
            Err(TransportError::Timeout {
                stage,
                secs: limit.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_timeout("request", Duration::from_secs(1), async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_elapsed_deadline() {
        let result = with_timeout("connect", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TransportError>(())
        })
        .await;

        assert!(matches!(result, Err(TransportError::Timeout { stage: "connect", .. })));
    }

    #[test]
    fn test_deadlines_from_config() {
        let d = Deadlines::from_config(&TimeoutConfig { connect_secs: 2, request_secs: 9 });
        assert_eq!(d.connect, Duration::from_secs(2));
        assert_eq!(d.request, Duration::from_secs(9));
    }
}
