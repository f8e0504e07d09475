pub mod auth_service;
pub mod blog_service;
pub mod collection_service;
pub mod contact_service;
pub mod order_service;
pub mod product_service;

use sea_orm::{DbErr, SqlErr};

use crate::{
    error::{AppError, AppResult},
    media::{MediaStore, StoredFile},
};

/// Returns the value or a 400 carrying `message`.
pub(crate) fn require<T>(value: Option<T>, message: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// Trims the value, treating blank strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parses a form checkbox value.
pub(crate) fn parse_flag(field: &str, value: Option<&str>) -> AppResult<Option<bool>> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("true" | "on" | "1") => Ok(Some(true)),
        Some("false" | "off" | "0") => Ok(Some(false)),
        Some(other) => Err(AppError::BadRequest(format!(
            "Invalid value '{other}' for {field}."
        ))),
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn is_foreign_key_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
}

/// Runs `op` and removes `uploads` from disk if it fails.
pub(crate) async fn cleanup_on_error<T, F>(
    media: &MediaStore,
    uploads: &[StoredFile],
    op: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    let result = op.await;
    if result.is_err() {
        media.discard(uploads).await;
    }
    result
}
