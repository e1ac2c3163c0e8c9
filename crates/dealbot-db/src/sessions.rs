//! Snapshot persistence for `user_sessions`.

use dealbot_core::UserSession;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_session(pool: &PgPool, user_id: &str) -> Result<Option<UserSession>, DbError> {
    let state = sqlx::query_scalar::<_, Json<UserSession>>(
        "SELECT state FROM user_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(state.map(|Json(session)| session))
}

/// Overwrite the stored snapshot for `session.user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_session(pool: &PgPool, session: &UserSession) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO user_sessions (user_id, state, updated_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE SET \
             state      = EXCLUDED.state, \
             updated_at = EXCLUDED.updated_at",
    )
    .bind(&session.user_id)
    .bind(Json(session))
    .bind(session.last_updated)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_session(pool: &PgPool, user_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
