use sqlx::{Postgres, Transaction};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::services::AttemptError;

pub(crate) async fn begin(state: &AppState) -> Result<Transaction<'static, Postgres>, ApiError> {
    state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))
}

/// Commits on success and on errors raised after a lazy expiry was written; everything
/// else rolls back when the transaction is dropped.
pub(crate) async fn settle<T>(
    tx: Transaction<'static, Postgres>,
    outcome: Result<T, AttemptError>,
) -> Result<T, ApiError> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
            Ok(value)
        }
        Err(err) if err.keeps_writes() => {
            tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn now_primitive() -> time::PrimitiveDateTime {
    crate::core::time::primitive_now_utc()
}
