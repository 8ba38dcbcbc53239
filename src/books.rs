// catalogue management, admin side

use sqlx::SqlitePool;
use tracing::info;

use crate::{
	error::{is_foreign_key_violation, AppError, Missing},
	time,
	types::{Bid, Book, BookForm},
};

const BOOK_COLUMNS: &str = "id, title, author, isbn, available, created_at";

pub async fn add_book(pool: &SqlitePool, form: &BookForm) -> Result<Book, AppError> {
	form.validate()?;

	let mut tx = pool.begin().await?;
	let book = sqlx::query_as::<_, Book>(&format!(
		"INSERT INTO books (title, author, isbn, available, created_at)
		VALUES (?, ?, ?, true, ?)
		RETURNING {BOOK_COLUMNS}"
	))
	.bind(form.title.trim())
	.bind(form.author.trim())
	.bind(form.isbn.trim())
	.bind(time::to_sql(&time::now()))
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	info!(book_id = book.id, title = %book.title, "book added");
	Ok(book)
}

pub async fn get_book(pool: &SqlitePool, bid: Bid) -> Result<Book, AppError> {
	sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
		.bind(bid)
		.fetch_optional(pool)
		.await?
		.ok_or(AppError::NotFound(Missing::Book(bid)))
}

/// Rewrites the descriptive fields. Availability belongs to the borrow
/// lifecycle and is left untouched.
pub async fn update_book(pool: &SqlitePool, bid: Bid, form: &BookForm) -> Result<Book, AppError> {
	form.validate()?;

	let mut tx = pool.begin().await?;
	let book = sqlx::query_as::<_, Book>(&format!(
		"UPDATE books SET title = ?, author = ?, isbn = ?
		WHERE id = ?
		RETURNING {BOOK_COLUMNS}"
	))
	.bind(form.title.trim())
	.bind(form.author.trim())
	.bind(form.isbn.trim())
	.bind(bid)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or(AppError::NotFound(Missing::Book(bid)))?;
	tx.commit().await?;

	info!(book_id = bid, "book updated");
	Ok(book)
}

/// Borrow history is never deleted, so a book that was ever borrowed stays.
pub async fn delete_book(pool: &SqlitePool, bid: Bid) -> Result<(), AppError> {
	let result = sqlx::query("DELETE FROM books WHERE id = ?")
		.bind(bid)
		.execute(pool)
		.await;

	match result {
		Ok(done) if done.rows_affected() == 0 => Err(AppError::NotFound(Missing::Book(bid))),
		Ok(_) => {
			info!(book_id = bid, "book deleted");
			Ok(())
		}
		Err(e) if is_foreign_key_violation(&e) => Err(AppError::Conflict(format!(
			"Book {bid} has borrow history and cannot be deleted"
		))),
		Err(e) => Err(e.into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{lifecycle, sql::testing, users};

	fn form(title: &str) -> BookForm {
		BookForm {
			title: title.to_string(),
			author: "Frank Herbert".to_string(),
			isbn: "9780441013593".to_string(),
		}
	}

	#[tokio::test]
	async fn added_books_start_available() {
		let (_dir, pool) = testing::pool().await;
		let book = add_book(&pool, &form("  Dune ")).await.unwrap();
		assert!(book.available);
		assert_eq!(book.title, "Dune");
		assert_eq!(get_book(&pool, book.id).await.unwrap(), book);
	}

	#[tokio::test]
	async fn writes_are_visible_to_other_connections() {
		let (dir, pool) = testing::pool().await;
		let other = testing::reopen(&dir).await;

		let book = add_book(&pool, &form("Dune")).await.unwrap();
		assert_eq!(get_book(&other, book.id).await.unwrap(), book);

		let updated = update_book(&pool, book.id, &form("Dune Messiah")).await.unwrap();
		assert_eq!(get_book(&other, book.id).await.unwrap().title, "Dune Messiah");
		assert_eq!(
			crate::projections::list_books(&other, crate::types::BookSort::Newest).await.unwrap(),
			vec![updated]
		);
	}

	#[tokio::test]
	async fn update_keeps_availability() {
		let (_dir, pool) = testing::pool().await;
		let user = users::tests::student(&pool, "reader@example.com").await;
		let book = add_book(&pool, &form("Dune")).await.unwrap();
		lifecycle::borrow(&pool, user.id, book.id).await.unwrap();

		let updated = update_book(&pool, book.id, &form("Dune Messiah")).await.unwrap();
		assert_eq!(updated.title, "Dune Messiah");
		assert!(!updated.available);
	}

	#[tokio::test]
	async fn missing_books() {
		let (_dir, pool) = testing::pool().await;
		assert!(matches!(get_book(&pool, 7).await, Err(AppError::NotFound(Missing::Book(7)))));
		assert!(matches!(
			update_book(&pool, 7, &form("x")).await,
			Err(AppError::NotFound(Missing::Book(7)))
		));
		assert!(matches!(delete_book(&pool, 7).await, Err(AppError::NotFound(_))));
	}

	#[tokio::test]
	async fn borrowed_books_cannot_be_deleted() {
		let (_dir, pool) = testing::pool().await;
		let user = users::tests::student(&pool, "reader@example.com").await;
		let kept = add_book(&pool, &form("Dune")).await.unwrap();
		let dropped = add_book(&pool, &form("Emma")).await.unwrap();

		let borrow = lifecycle::borrow(&pool, user.id, kept.id).await.unwrap();
		lifecycle::return_borrow(&pool, borrow.id).await.unwrap();

		assert!(matches!(delete_book(&pool, kept.id).await, Err(AppError::Conflict(_))));
		delete_book(&pool, dropped.id).await.unwrap();
		assert!(get_book(&pool, kept.id).await.is_ok());
	}
}
