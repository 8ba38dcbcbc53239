// read side: catalogue listings and the denormalized borrow history

use sqlx::{FromRow, SqlitePool};

use crate::{
	error::AppError,
	time::Timestamp,
	types::{Bid, Book, BookSort, BookSummary, Borrow, BorrowId, BorrowView, BorrowerSummary, Scope, Uid},
};

pub async fn list_books(pool: &SqlitePool, sort: BookSort) -> Result<Vec<Book>, AppError> {
	let order = match sort {
		BookSort::Newest => "created_at DESC, id DESC",
		BookSort::Title => "title COLLATE NOCASE ASC, id ASC",
	};

	let books = sqlx::query_as::<_, Book>(&format!(
		"SELECT id, title, author, isbn, available, created_at FROM books ORDER BY {order}"
	))
	.fetch_all(pool)
	.await?;
	Ok(books)
}

#[derive(FromRow)]
struct BorrowRow {
	id: BorrowId,
	user_id: Uid,
	book_id: Bid,
	borrowed_at: Timestamp,
	returned: bool,
	returned_at: Option<Timestamp>,
	title: String,
	author: String,
	isbn: String,
	name: String,
	email: String,
}

impl From<BorrowRow> for BorrowView {
	fn from(row: BorrowRow) -> Self {
		let borrow = Borrow {
			id: row.id,
			user_id: row.user_id,
			book_id: row.book_id,
			borrowed_at: row.borrowed_at,
			returned: row.returned,
			returned_at: row.returned_at,
		};
		BorrowView {
			status: borrow.status(),
			borrow,
			book: BookSummary {
				title: row.title,
				author: row.author,
				isbn: row.isbn,
			},
			user: BorrowerSummary {
				name: row.name,
				email: row.email,
			},
		}
	}
}

const BORROW_VIEW_QUERY: &str = "
	SELECT
		r.id, r.user_id, r.book_id, r.borrowed_at, r.returned, r.returned_at,
		b.title, b.author, b.isbn,
		u.name, u.email
	FROM borrows r
	JOIN books b ON b.id = r.book_id
	JOIN users u ON u.id = r.user_id";

/// Newest borrow first. `Scope::All` is for admins; the access surface
/// decides who gets it.
pub async fn list_borrows(pool: &SqlitePool, scope: Scope) -> Result<Vec<BorrowView>, AppError> {
	let rows = match scope {
		Scope::Own(uid) => {
			sqlx::query_as::<_, BorrowRow>(&format!(
				"{BORROW_VIEW_QUERY} WHERE r.user_id = ? ORDER BY r.borrowed_at DESC, r.id DESC"
			))
			.bind(uid)
			.fetch_all(pool)
			.await?
		}
		Scope::All => {
			sqlx::query_as::<_, BorrowRow>(&format!(
				"{BORROW_VIEW_QUERY} ORDER BY r.borrowed_at DESC, r.id DESC"
			))
			.fetch_all(pool)
			.await?
		}
	};

	Ok(rows.into_iter().map(BorrowView::from).collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		books, lifecycle,
		sql::testing,
		types::{BookForm, BorrowStatus},
		users::tests::student,
	};

	async fn add_book(pool: &SqlitePool, title: &str, author: &str) -> Book {
		books::add_book(
			pool,
			&BookForm {
				title: title.to_string(),
				author: author.to_string(),
				isbn: "0000000000".to_string(),
			},
		)
		.await
		.unwrap()
	}

	#[tokio::test]
	async fn empty_store_lists_nothing() {
		let (_dir, pool) = testing::pool().await;
		assert!(list_books(&pool, BookSort::Newest).await.unwrap().is_empty());
		assert!(list_books(&pool, BookSort::Title).await.unwrap().is_empty());
		assert!(list_borrows(&pool, Scope::All).await.unwrap().is_empty());
		assert!(list_borrows(&pool, Scope::Own(1)).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn books_sort_by_title_or_newest() {
		let (_dir, pool) = testing::pool().await;
		let emma = add_book(&pool, "Emma", "Jane Austen").await;
		let beloved = add_book(&pool, "beloved", "Toni Morrison").await;
		let dune = add_book(&pool, "Dune", "Frank Herbert").await;

		let by_title: Vec<Bid> = list_books(&pool, BookSort::Title)
			.await
			.unwrap()
			.iter()
			.map(|b| b.id)
			.collect();
		assert_eq!(by_title, [beloved.id, dune.id, emma.id]);

		let newest: Vec<Bid> = list_books(&pool, BookSort::Newest)
			.await
			.unwrap()
			.iter()
			.map(|b| b.id)
			.collect();
		assert_eq!(newest, [dune.id, beloved.id, emma.id]);
	}

	#[tokio::test]
	async fn own_scope_filters_and_orders_newest_first() {
		let (_dir, pool) = testing::pool().await;
		let ada = student(&pool, "ada@example.com").await;
		let bob = student(&pool, "bob@example.com").await;
		let emma = add_book(&pool, "Emma", "Jane Austen").await;
		let dune = add_book(&pool, "Dune", "Frank Herbert").await;
		let ulysses = add_book(&pool, "Ulysses", "James Joyce").await;

		let first = lifecycle::borrow(&pool, ada.id, emma.id).await.unwrap();
		lifecycle::return_borrow(&pool, first.id).await.unwrap();
		lifecycle::borrow(&pool, bob.id, dune.id).await.unwrap();
		let second = lifecycle::borrow(&pool, ada.id, ulysses.id).await.unwrap();

		let own = list_borrows(&pool, Scope::Own(ada.id)).await.unwrap();
		assert_eq!(own.len(), 2);
		assert!(own.iter().all(|v| v.borrow.user_id == ada.id));
		assert_eq!(own[0].borrow.id, second.id);
		assert_eq!(own[0].status, BorrowStatus::Open);
		assert_eq!(own[0].book.title, "Ulysses");
		assert_eq!(own[1].borrow.id, first.id);
		assert_eq!(own[1].status, BorrowStatus::Returned);
		assert!(own[0].borrow.borrowed_at >= own[1].borrow.borrowed_at);

		let all = list_borrows(&pool, Scope::All).await.unwrap();
		assert_eq!(all.len(), 3);
		assert!(all.windows(2).all(|w| w[0].borrow.borrowed_at >= w[1].borrow.borrowed_at));
		assert!(all.iter().any(|v| v.user.email == "bob@example.com" && v.book.author == "Frank Herbert"));
	}

	#[tokio::test]
	async fn views_serialize_flat_with_nested_summaries() {
		let (_dir, pool) = testing::pool().await;
		let ada = student(&pool, "ada@example.com").await;
		let emma = add_book(&pool, "Emma", "Jane Austen").await;
		lifecycle::borrow(&pool, ada.id, emma.id).await.unwrap();

		let views = list_borrows(&pool, Scope::Own(ada.id)).await.unwrap();
		let json = serde_json::to_value(&views[0]).unwrap();
		assert_eq!(json["bookId"], emma.id);
		assert_eq!(json["returned"], false);
		assert!(json["returnedAt"].is_null());
		assert_eq!(json["status"], "open");
		assert_eq!(json["book"]["title"], "Emma");
		assert_eq!(json["user"]["name"], "Test Reader");
	}
}
