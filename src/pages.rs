use axum::extract::State;
use maud::{html, Markup, DOCTYPE};

use crate::{error::AppError, projections, state::SharedState, types::{Book, BookSort}};

pub async fn display_catalogue(State(state): State<SharedState>) -> Result<Markup, AppError> {
	let books = projections::list_books(&state.db, BookSort::Title).await?;
	Ok(catalogue(&books))
}

pub fn catalogue(books: &[Book]) -> Markup {
	html! {
		(DOCTYPE)
		html {
			head { title { "Library" } }
			body {
				h1 { "Library catalogue" }
				@if books.is_empty() {
					p { "No books available yet." }
				} @else {
					table {
						thead { tr {
							th { "ISBN" }
							th { "Title" }
							th { "Author" }
							th { "Status" }
						} }
						tbody {
							@for book in books {
								tr {
									td { (book.isbn) }
									td { (book.title) }
									td { (book.author) }
									td { @if book.available { "Available" } @else { "Borrowed" } }
								}
							}
						}
					}
				}
			}
		}
	}
}
