//! Library management service.
//!
//! Books, users and borrow records behind a JSON API, plus a server rendered
//! catalogue page. The interesting part is [`lifecycle`]: borrowing and
//! returning keep a book's availability flag in step with its open borrow,
//! atomically and race free.
//!
//! # Configuration
//!
//! Read from the environment (and `.env`) by [`config::Config::load`]:
//!
//! | variable | default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite://library.db` |
//! | `PORT` | `5000` |
//! | `DB_MAX_CONNECTIONS` | `5` |
//! | `DB_ACQUIRE_TIMEOUT_SECS` | `3` |
//! | `BCRYPT_COST` | `10` |
//! | `SESSION_TTL_HOURS` | `24` |
//! | `ADMIN_EMAIL`, `ADMIN_PASSWORD` | unset, no admin seeded |
//!
//! Logging follows `RUST_LOG`, e.g. `RUST_LOG=libman=debug,tower_http=info`.

use std::time::Duration;

use axum::{
	http::{header::CONTENT_TYPE, Method},
	routing::{get, post, put},
	Router,
};
use tokio::{net::TcpListener, signal};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod books;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pages;
pub mod projections;
pub mod routes;
pub mod sql;
pub mod state;
pub mod time;
pub mod types;
pub mod users;

use config::Config;
use state::{ServerState, SharedState};

pub fn router(state: SharedState) -> Router {
	let cors = CorsLayer::new()
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
		.allow_headers([CONTENT_TYPE])
		.max_age(Duration::from_secs(60 * 60));

	Router::new()
		.route("/", get(pages::display_catalogue))
		.route("/books", get(routes::list_books).post(routes::add_book))
		.route(
			"/books/:id",
			get(routes::get_book)
				.put(routes::update_book)
				.delete(routes::delete_book),
		)
		.route("/borrows", get(routes::list_borrows).post(routes::create_borrow))
		.route("/borrows/:id/return", put(routes::return_borrow))
		.route("/users", get(routes::list_users).post(routes::register_user))
		.route("/users/:id", axum::routing::delete(routes::delete_user))
		.route("/login", post(routes::login))
		.route("/logout", post(routes::logout))
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.layer(cors)
		.with_state(state)
}

/// Connects the store, seeds the admin if configured and serves until
/// Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
	info!("Connecting to database...");
	let db = sql::connect(&config).await?;

	if let Some(seed) = &config.admin {
		if let Some(admin) = users::ensure_admin(&db, seed, config.bcrypt_cost).await? {
			info!(user_id = admin.id, email = %admin.email, "admin account seeded");
		}
	}

	let address = format!("0.0.0.0:{}", config.port);
	let state = ServerState::new(db.clone(), config);
	let app = router(state);

	info!("Binding to {address}");
	let listener = TcpListener::bind(&address).await?;
	info!("Server running on {address}");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	db.close().await;
	info!("Server shut down");
	Ok(())
}

pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("libman=info,tower_http=info"));
	fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
	let ctrl_c = async {
		match signal::ctrl_c().await {
			Ok(()) => info!("Received Ctrl+C, shutting down"),
			Err(_) => std::future::pending::<()>().await,
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
				info!("Received terminate signal, shutting down");
			}
			Err(_) => std::future::pending::<()>().await,
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
