//! Borrow and return.
//!
//! A book is available exactly when no open borrow references it. Both
//! operations keep that true by doing their two writes in one transaction,
//! and both open the transaction with the conditional write, so SQLite's
//! write lock orders racing calls: the loser sees zero affected rows and
//! fails before anything of its own is written.
//!
//! ```text
//! borrow:  Open --return--> Returned
//! book:    Available --borrow--> Unavailable --return--> Available
//! ```

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
	error::{is_unique_violation, AppError, Missing},
	time,
	types::{Bid, Borrow, BorrowId, Uid},
};

const BORROW_COLUMNS: &str = "id, user_id, book_id, borrowed_at, returned, returned_at";

pub async fn borrow(pool: &SqlitePool, uid: Uid, bid: Bid) -> Result<Borrow, AppError> {
	let mut tx = pool.begin().await?;

	let claimed = sqlx::query("UPDATE books SET available = false WHERE id = ? AND available = true")
		.bind(bid)
		.execute(&mut *tx)
		.await?
		.rows_affected();

	if claimed == 0 {
		let exists: Option<(Bid,)> = sqlx::query_as("SELECT id FROM books WHERE id = ?")
			.bind(bid)
			.fetch_optional(&mut *tx)
			.await?;
		return match exists {
			Some(_) => {
				warn!(user_id = uid, book_id = bid, "borrow refused, book unavailable");
				Err(AppError::BookUnavailable(bid))
			}
			None => Err(AppError::NotFound(Missing::Book(bid))),
		};
	}

	let user: Option<(Uid,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
		.bind(uid)
		.fetch_optional(&mut *tx)
		.await?;
	if user.is_none() {
		// dropping tx rolls the availability flip back
		return Err(AppError::NotFound(Missing::User(uid)));
	}

	let inserted = sqlx::query_as::<_, Borrow>(&format!(
		"INSERT INTO borrows (user_id, book_id, borrowed_at, returned)
		VALUES (?, ?, ?, false)
		RETURNING {BORROW_COLUMNS}"
	))
	.bind(uid)
	.bind(bid)
	.bind(time::to_sql(&time::now()))
	.fetch_one(&mut *tx)
	.await;

	let record = match inserted {
		Ok(record) => record,
		Err(e) if is_unique_violation(&e) => {
			// flag and records disagreed; the open-borrow index still holds the line
			warn!(book_id = bid, "open borrow already exists for book marked available");
			return Err(AppError::BookUnavailable(bid));
		}
		Err(e) => return Err(e.into()),
	};

	tx.commit().await?;

	info!(borrow_id = record.id, user_id = uid, book_id = bid, "book borrowed");
	Ok(record)
}

pub async fn return_borrow(pool: &SqlitePool, id: BorrowId) -> Result<Borrow, AppError> {
	let mut tx = pool.begin().await?;

	let closed = sqlx::query_as::<_, Borrow>(&format!(
		"UPDATE borrows SET returned = true, returned_at = ?
		WHERE id = ? AND returned = false
		RETURNING {BORROW_COLUMNS}"
	))
	.bind(time::to_sql(&time::now()))
	.bind(id)
	.fetch_optional(&mut *tx)
	.await?;

	let Some(record) = closed else {
		let exists: Option<(BorrowId,)> = sqlx::query_as("SELECT id FROM borrows WHERE id = ?")
			.bind(id)
			.fetch_optional(&mut *tx)
			.await?;
		return match exists {
			Some(_) => {
				warn!(borrow_id = id, "return refused, already returned");
				Err(AppError::AlreadyReturned(id))
			}
			None => Err(AppError::NotFound(Missing::Borrow(id))),
		};
	};

	let released = sqlx::query("UPDATE books SET available = true WHERE id = ?")
		.bind(record.book_id)
		.execute(&mut *tx)
		.await?
		.rows_affected();
	if released == 0 {
		return Err(AppError::NotFound(Missing::Book(record.book_id)));
	}

	tx.commit().await?;

	info!(borrow_id = id, book_id = record.book_id, "book returned");
	Ok(record)
}

/// Looks a single borrow up, used to authorize a return before running it.
pub async fn get_borrow(pool: &SqlitePool, id: BorrowId) -> Result<Borrow, AppError> {
	sqlx::query_as::<_, Borrow>(&format!("SELECT {BORROW_COLUMNS} FROM borrows WHERE id = ?"))
		.bind(id)
		.fetch_optional(pool)
		.await?
		.ok_or(AppError::NotFound(Missing::Borrow(id)))
}
