use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
	pub port: u16,
	pub database_url: String,
	pub max_connections: u32,
	pub acquire_timeout: Duration,
	pub bcrypt_cost: u32,
	pub session_ttl: chrono::Duration,
	pub admin: Option<AdminSeed>,
}

/// Credentials of an admin account created at startup when missing.
#[derive(Clone)]
pub struct AdminSeed {
	pub email: String,
	pub password: String,
}

impl std::fmt::Debug for AdminSeed {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdminSeed")
			.field("email", &self.email)
			.field("password", &"***")
			.finish()
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			port: 5000,
			database_url: "sqlite://library.db".to_string(),
			max_connections: 5,
			acquire_timeout: Duration::from_secs(3),
			bcrypt_cost: 10,
			session_ttl: chrono::Duration::hours(24),
			admin: None,
		}
	}
}

impl Config {
	pub fn load() -> anyhow::Result<Self> {
		let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
			(Some(email), Some(password)) => Some(AdminSeed { email, password }),
			(None, None) => None,
			_ => {
				warn!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together, skipping admin seed");
				None
			}
		};

		Ok(Self {
			port: try_load("PORT", "5000")?,
			database_url: try_load("DATABASE_URL", "sqlite://library.db")?,
			max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
			acquire_timeout: Duration::from_secs(try_load("DB_ACQUIRE_TIMEOUT_SECS", "3")?),
			bcrypt_cost: checked_cost(try_load("BCRYPT_COST", "10")?)?,
			session_ttl: chrono::Duration::hours(try_load("SESSION_TTL_HOURS", "24")?),
			admin,
		})
	}
}

fn var(key: &str) -> Option<String> {
	env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
	T::Err: Display,
{
	let raw = var(key).unwrap_or_else(|| {
		info!("{key} not set, using default: {default}");
		default.to_string()
	});

	raw.parse::<T>()
		.map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}

/// bcrypt only accepts costs in 4..=31; anything else would fail every hash.
fn checked_cost(cost: u32) -> anyhow::Result<u32> {
	if (4..=31).contains(&cost) {
		Ok(cost)
	} else {
		anyhow::bail!("BCRYPT_COST must be between 4 and 31, got {cost}")
	}
}
