use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::errors::AppError;

/// `axum::Json` whose rejections render as a 400 with the usual error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
