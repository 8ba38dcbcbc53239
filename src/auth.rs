// passwords, sessions and the caller identity used for role gating

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::SqlitePool;
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
	error::AppError,
	state::SharedState,
	time,
	types::{Account, Role, Uid},
	users,
};

pub const SESSION_COOKIE: &str = "session";

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
	tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
		.await
		.map_err(|e| AppError::Internal(e.to_string()))?
		.map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
	tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
		.await
		.map_err(|e| AppError::Internal(e.to_string()))?
		.map_err(|e| AppError::Internal(e.to_string()))
}

pub fn generate_session_token() -> String {
	Uuid::new_v4().to_string()
}

/// Checks the credentials and opens a session. Unknown email and wrong
/// password are indistinguishable to the client.
pub async fn login(
	pool: &SqlitePool,
	email: &str,
	password: &str,
	ttl: chrono::Duration,
) -> Result<(Account, String), AppError> {
	let account = users::find_by_email(pool, email)
		.await?
		.ok_or(AppError::Unauthorized)?;

	if !verify_password(password.to_string(), account.password_hash.clone()).await? {
		debug!(user_id = account.id, "wrong password");
		return Err(AppError::Unauthorized);
	}

	let token = create_session(pool, account.id, ttl).await?;
	info!(user_id = account.id, "logged in");
	Ok((account, token))
}

pub async fn create_session(pool: &SqlitePool, uid: Uid, ttl: chrono::Duration) -> Result<String, AppError> {
	let token = generate_session_token();
	let now = time::now();

	// expired sessions nobody came back with are swept on each login
	let swept = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
		.bind(time::to_sql(&now))
		.execute(pool)
		.await?
		.rows_affected();
	if swept > 0 {
		debug!(swept, "expired sessions removed");
	}

	sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
		.bind(&token)
		.bind(uid)
		.bind(time::to_sql(&(now + ttl)))
		.execute(pool)
		.await?;

	Ok(token)
}

pub async fn destroy_session(pool: &SqlitePool, token: &str) -> Result<(), AppError> {
	sqlx::query("DELETE FROM sessions WHERE token = ?")
		.bind(token)
		.execute(pool)
		.await?;
	Ok(())
}

/// Looks the token up. Expired sessions are removed on sight.
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<Caller>, AppError> {
	let row: Option<(Uid, Role, time::Timestamp)> = sqlx::query_as(
		"SELECT u.id, u.role, s.expires_at
		FROM sessions s
		JOIN users u ON u.id = s.user_id
		WHERE s.token = ?",
	)
	.bind(token)
	.fetch_optional(pool)
	.await?;

	match row {
		Some((uid, _, expires_at)) if expires_at <= time::now() => {
			debug!(user_id = uid, "session expired");
			destroy_session(pool, token).await?;
			Ok(None)
		}
		Some((uid, role, _)) => Ok(Some(Caller { uid, role })),
		None => Ok(None),
	}
}

pub fn session_cookie(token: String) -> Cookie<'static> {
	let mut cookie = Cookie::new(SESSION_COOKIE, token);
	cookie.set_path("/");
	cookie.set_http_only(true);
	cookie
}

/// The logged-in user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
	pub uid: Uid,
	pub role: Role,
}

impl Caller {
	pub fn require_admin(self) -> Result<Self, AppError> {
		if self.role.is_admin() {
			Ok(self)
		} else {
			Err(AppError::Forbidden(self.uid))
		}
	}

	/// Admins act for anyone, students only for themselves.
	pub fn require_self_or_admin(self, uid: Uid) -> Result<Self, AppError> {
		if self.role.is_admin() || self.uid == uid {
			Ok(self)
		} else {
			Err(AppError::Forbidden(self.uid))
		}
	}
}

#[async_trait]
impl FromRequestParts<SharedState> for Caller {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
		let cookies = Cookies::from_request_parts(parts, state)
			.await
			.map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

		let token = cookies
			.get(SESSION_COOKIE)
			.map(|c| c.value().to_string())
			.ok_or(AppError::Unauthorized)?;

		resolve_session(&state.db, &token)
			.await?
			.ok_or(AppError::Unauthorized)
	}
}
