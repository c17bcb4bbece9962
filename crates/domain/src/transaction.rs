//! Commit-or-rollback plumbing shared by the services.

use store::{StoreError, StoreTx};

/// Commits `tx` when `result` is `Ok`, otherwise rolls it back and returns
/// the original error.
///
/// A failed rollback is only logged; the caller still gets the original
/// error.
pub(crate) async fn finish<X, T, E>(tx: X, result: Result<T, E>) -> Result<T, E>
where
    X: StoreTx,
    E: From<StoreError>,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
