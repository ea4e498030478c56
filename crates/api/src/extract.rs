//! Request body extractors.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejection renders as an [`AppError`] body.
///
/// Malformed or mistyped bodies keep axum's status (400, 415 or 422) but
/// answer with the same `{error, code}` shape as every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
