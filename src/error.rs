use axum::{
	extract::rejection::{JsonRejection, PathRejection, QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::types::{Bid, BorrowId, Uid};

#[derive(Error, Debug)]
pub enum AppError {
	#[error("Book {0} is not available")]
	BookUnavailable(Bid),

	#[error("Borrow {0} was already returned")]
	AlreadyReturned(BorrowId),

	#[error("{0}")]
	Conflict(String),

	#[error("{0} not found")]
	NotFound(Missing),

	#[error("{0}")]
	Validation(String),

	#[error("Not logged in")]
	Unauthorized,

	#[error("Not allowed for user {0}")]
	Forbidden(Uid),

	#[error("Store unavailable: {0}")]
	StoreUnavailable(#[from] sqlx::Error),

	#[error("Internal error: {0}")]
	Internal(String),
}

/// The record a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
	Book(Bid),
	User(Uid),
	Borrow(BorrowId),
}

impl std::fmt::Display for Missing {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Missing::Book(id) => write!(f, "Book {id}"),
			Missing::User(id) => write!(f, "User {id}"),
			Missing::Borrow(id) => write!(f, "Borrow {id}"),
		}
	}
}

impl AppError {
	pub fn kind(&self) -> &'static str {
		match self {
			AppError::BookUnavailable(_) => "conflict",
			AppError::AlreadyReturned(_) => "already_returned",
			AppError::Conflict(_) => "conflict",
			AppError::NotFound(_) => "not_found",
			AppError::Validation(_) => "validation",
			AppError::Unauthorized => "unauthorized",
			AppError::Forbidden(_) => "forbidden",
			AppError::StoreUnavailable(_) => "store_unavailable",
			AppError::Internal(_) => "internal",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			AppError::BookUnavailable(_) => StatusCode::BAD_REQUEST,
			AppError::AlreadyReturned(_) => StatusCode::CONFLICT,
			AppError::Conflict(_) => StatusCode::CONFLICT,
			AppError::NotFound(_) => StatusCode::NOT_FOUND,
			AppError::Validation(_) => StatusCode::BAD_REQUEST,
			AppError::Unauthorized => StatusCode::UNAUTHORIZED,
			AppError::Forbidden(_) => StatusCode::FORBIDDEN,
			AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn validation(message: impl Into<String>) -> Self {
		AppError::Validation(message.into())
	}
}

impl From<JsonRejection> for AppError {
	fn from(rejection: JsonRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<PathRejection> for AppError {
	fn from(rejection: PathRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<QueryRejection> for AppError {
	fn from(rejection: QueryRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status();
		match &self {
			AppError::StoreUnavailable(e) => error!(error = %e, "store failure"),
			AppError::Internal(e) => error!(error = %e, "internal failure"),
			_ => {}
		}

		let body = json!({
			"error": self.kind(),
			"message": self.to_string(),
		});
		(status, Json(body)).into_response()
	}
}

/// True when the store rejected a write on a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
	err.as_database_error()
		.map(|e| e.is_unique_violation())
		.unwrap_or(false)
}

/// True when the store rejected a write on a FOREIGN KEY constraint.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
	err.as_database_error()
		.map(|e| e.is_foreign_key_violation())
		.unwrap_or(false)
}
