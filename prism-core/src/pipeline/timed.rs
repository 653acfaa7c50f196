use std::{future::Future, time::Duration};

use crate::error::{MediaError, Result};

/// Bound a single store or repository call.
pub(crate) async fn timed<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout { operation, after }),
    }
}
