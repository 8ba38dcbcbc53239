use std::{str::FromStr, time::Duration};

use sqlx::{
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
	Executor,
};
use tracing::info;

use crate::config::Config;

pub const TABLE_SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL,
	email TEXT NOT NULL UNIQUE,
	password_hash TEXT NOT NULL,
	role TEXT NOT NULL DEFAULT 'student',
	created_at TEXT NOT NULL,
	CHECK(role IN ('student', 'admin'))
);

CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	title TEXT NOT NULL,
	author TEXT NOT NULL,
	isbn TEXT NOT NULL,
	available BOOL NOT NULL DEFAULT true,
	created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS borrows (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	borrowed_at TEXT NOT NULL,
	returned BOOL NOT NULL DEFAULT false,
	returned_at TEXT DEFAULT NULL,
	CHECK((returned_at IS NULL) == (returned == false)),
	FOREIGN KEY(user_id) REFERENCES users(id),
	FOREIGN KEY(book_id) REFERENCES books(id)
);

-- at most one open borrow per book
CREATE UNIQUE INDEX IF NOT EXISTS borrows_open_book
	ON borrows(book_id) WHERE returned = false;

CREATE INDEX IF NOT EXISTS borrows_user
	ON borrows(user_id, borrowed_at);

CREATE TABLE IF NOT EXISTS sessions (
	token TEXT NOT NULL PRIMARY KEY,
	user_id INTEGER NOT NULL,
	expires_at TEXT NOT NULL,
	FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
);

"#;

pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(&config.database_url)?
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(5));

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(config.acquire_timeout)
		.connect_with(options)
		.await?;

	pool.execute(TABLE_SCHEMA).await?;
	info!(url = %config.database_url, "database schema ready");

	Ok(pool)
}
