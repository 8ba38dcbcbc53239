use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;

pub struct ServerState {
	pub db: SqlitePool,
	pub config: Config,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
	pub fn new(db: SqlitePool, config: Config) -> SharedState {
		Arc::new(Self { db, config })
	}
}
