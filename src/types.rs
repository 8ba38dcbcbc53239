use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::time::Timestamp;

pub type Bid = i64;
pub type Uid = i64;
pub type BorrowId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
	pub id: Bid,
	pub title: String,
	pub author: String,
	pub isbn: String,
	pub available: bool,
	pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
	#[default]
	Student,
	Admin,
}

impl Role {
	pub fn is_admin(self) -> bool {
		matches!(self, Role::Admin)
	}
}

impl std::str::FromStr for Role {
	type Err = AppError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"student" => Ok(Role::Student),
			"admin" => Ok(Role::Admin),
			other => Err(AppError::validation(format!("unknown role {other:?}"))),
		}
	}
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
	pub id: Uid,
	pub name: String,
	pub email: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub role: Role,
	pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Borrow {
	pub id: BorrowId,
	pub user_id: Uid,
	pub book_id: Bid,
	pub borrowed_at: Timestamp,
	pub returned: bool,
	pub returned_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
	Open,
	Returned,
}

impl Borrow {
	pub fn status(&self) -> BorrowStatus {
		if self.returned {
			BorrowStatus::Returned
		} else {
			BorrowStatus::Open
		}
	}
}

/// Borrow row joined with what the dashboards display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowView {
	#[serde(flatten)]
	pub borrow: Borrow,
	pub status: BorrowStatus,
	pub book: BookSummary,
	pub user: BorrowerSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
	pub title: String,
	pub author: String,
	pub isbn: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BorrowerSummary {
	pub name: String,
	pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
	/// creation time, newest first
	#[default]
	Newest,
	/// title, ascending
	Title,
}

impl std::str::FromStr for BookSort {
	type Err = AppError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"newest" | "created_at" => Ok(BookSort::Newest),
			"title" => Ok(BookSort::Title),
			other => Err(AppError::validation(format!("unknown sort key {other:?}"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
	Own(Uid),
	All,
}

// request bodies

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBorrow {
	#[serde(alias = "user_id")]
	pub user_id: Uid,
	#[serde(alias = "book_id")]
	pub book_id: Bid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookForm {
	pub title: String,
	pub author: String,
	pub isbn: String,
}

impl BookForm {
	pub fn validate(&self) -> Result<(), AppError> {
		required("title", &self.title)?;
		required("author", &self.author)?;
		required("isbn", &self.isbn)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormRegister {
	pub name: String,
	pub email: String,
	pub password: String,
	#[serde(default)]
	pub role: Option<String>,
}

impl FormRegister {
	pub fn validate(&self) -> Result<Role, AppError> {
		required("name", &self.name)?;
		required("email", &self.email)?;
		required("password", &self.password)?;
		if !self.email.contains('@') {
			return Err(AppError::validation("email is not an address"));
		}
		match &self.role {
			Some(role) => role.parse(),
			None => Ok(Role::Student),
		}
	}
}

#[derive(Deserialize)]
pub struct FormLogin {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct BookListParams {
	pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BorrowListParams {
	pub scope: Option<String>,
}

fn required(field: &str, value: &str) -> Result<(), AppError> {
	if value.trim().is_empty() {
		Err(AppError::validation(format!("{field} is required")))
	} else {
		Ok(())
	}
}
