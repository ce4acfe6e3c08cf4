use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use crate::error::InterviewError;

/// Run an outbound call with a timeout, aborting early when `cancel` flips to `true`.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    cancel: &watch::Receiver<bool>,
    call: F,
) -> Result<T, InterviewError>
where
    F: Future<Output = Result<T, InterviewError>>,
{
    let mut cancel = cancel.clone();
    if *cancel.borrow() {
        return Err(InterviewError::Cancelled(operation));
    }

    tokio::select! {
        result = tokio::time::timeout(limit, call) => match result {
            Ok(inner) => inner,
            Err(_) => {
                warn!("{} timed out after {:?}", operation, limit);
                Err(InterviewError::Timeout { operation, after: limit })
            }
        },
        _ = async {
            // A dropped sender means nobody can cancel any more.
            if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        } => {
            warn!("{} cancelled", operation);
            Err(InterviewError::Cancelled(operation))
        }
    }
}
