use sqlx::SqlitePool;
use tracing::info;

use crate::{
	auth::hash_password,
	config::AdminSeed,
	error::{is_foreign_key_violation, is_unique_violation, AppError, Missing},
	time,
	types::{Account, FormRegister, Role, Uid},
};

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

/// Inserts a new account. The role was already vetted by the caller.
pub async fn create_account(
	pool: &SqlitePool,
	form: &FormRegister,
	role: Role,
	bcrypt_cost: u32,
) -> Result<Account, AppError> {
	let email = form.email.trim().to_lowercase();
	let password_hash = hash_password(form.password.clone(), bcrypt_cost).await?;

	let mut tx = pool.begin().await?;
	let result = sqlx::query_as::<_, Account>(&format!(
		"INSERT INTO users (name, email, password_hash, role, created_at)
		VALUES (?, ?, ?, ?, ?)
		RETURNING {ACCOUNT_COLUMNS}"
	))
	.bind(form.name.trim())
	.bind(&email)
	.bind(&password_hash)
	.bind(role)
	.bind(time::to_sql(&time::now()))
	.fetch_one(&mut *tx)
	.await;

	match result {
		Ok(account) => {
			tx.commit().await?;
			info!(user_id = account.id, role = ?account.role, "account created");
			Ok(account)
		}
		Err(e) if is_unique_violation(&e) => {
			Err(AppError::Conflict(format!("Email {email} is already registered")))
		}
		Err(e) => Err(e.into()),
	}
}

pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<Account>, AppError> {
	let accounts = sqlx::query_as::<_, Account>(&format!(
		"SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
	))
	.fetch_all(pool)
	.await?;
	Ok(accounts)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Account>, AppError> {
	let account = sqlx::query_as::<_, Account>(&format!(
		"SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = ?"
	))
	.bind(email.trim().to_lowercase())
	.fetch_optional(pool)
	.await?;
	Ok(account)
}

/// Accounts with borrow history are kept, like the history itself.
pub async fn delete_account(pool: &SqlitePool, uid: Uid) -> Result<(), AppError> {
	let result = sqlx::query("DELETE FROM users WHERE id = ?")
		.bind(uid)
		.execute(pool)
		.await;

	match result {
		Ok(done) if done.rows_affected() == 0 => Err(AppError::NotFound(Missing::User(uid))),
		Ok(_) => {
			info!(user_id = uid, "account deleted");
			Ok(())
		}
		Err(e) if is_foreign_key_violation(&e) => Err(AppError::Conflict(format!(
			"User {uid} has borrow history and cannot be deleted"
		))),
		Err(e) => Err(e.into()),
	}
}

/// Creates the configured admin account unless its email is taken.
pub async fn ensure_admin(
	pool: &SqlitePool,
	seed: &AdminSeed,
	bcrypt_cost: u32,
) -> Result<Option<Account>, AppError> {
	if find_by_email(pool, &seed.email).await?.is_some() {
		return Ok(None);
	}

	let form = FormRegister {
		name: "Administrator".to_string(),
		email: seed.email.clone(),
		password: seed.password.clone(),
		role: None,
	};
	form.validate()?;
	create_account(pool, &form, Role::Admin, bcrypt_cost).await.map(Some)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::{books, lifecycle, sql::testing, types::BookForm};

	pub(crate) const TEST_COST: u32 = 4;

	async fn get_account(pool: &SqlitePool, uid: Uid) -> Result<Account, AppError> {
		sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?"))
			.bind(uid)
			.fetch_optional(pool)
			.await?
			.ok_or(AppError::NotFound(Missing::User(uid)))
	}

	pub(crate) fn registration(email: &str) -> FormRegister {
		FormRegister {
			name: "Test Reader".to_string(),
			email: email.to_string(),
			password: "correct horse".to_string(),
			role: None,
		}
	}

	pub(crate) async fn student(pool: &SqlitePool, email: &str) -> Account {
		create_account(pool, &registration(email), Role::Student, TEST_COST)
			.await
			.unwrap()
	}

	pub(crate) async fn admin(pool: &SqlitePool, email: &str) -> Account {
		create_account(pool, &registration(email), Role::Admin, TEST_COST)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn emails_are_unique_regardless_of_case() {
		let (_dir, pool) = testing::pool().await;
		student(&pool, "ada@example.com").await;
		let again = create_account(&pool, &registration("ADA@example.com"), Role::Student, TEST_COST).await;
		assert!(matches!(again, Err(AppError::Conflict(_))));
	}

	#[tokio::test]
	async fn password_hash_is_stored_but_not_serialized() {
		let (_dir, pool) = testing::pool().await;
		let account = student(&pool, "ada@example.com").await;
		assert!(account.password_hash.starts_with("$2"));

		let json = serde_json::to_value(&account).unwrap();
		assert!(json.get("passwordHash").is_none());
		assert_eq!(json["role"], "student");
	}

	#[tokio::test]
	async fn new_accounts_are_visible_to_other_connections() {
		let (dir, pool) = testing::pool().await;
		let other = testing::reopen(&dir).await;

		let account = student(&pool, "ada@example.com").await;
		let found = find_by_email(&other, "ada@example.com").await.unwrap();
		assert_eq!(found.map(|a| a.id), Some(account.id));
		assert_eq!(get_account(&other, account.id).await.unwrap().email, "ada@example.com");
	}

	#[tokio::test]
	async fn admin_seed_runs_once() {
		let (_dir, pool) = testing::pool().await;
		let seed = AdminSeed {
			email: "root@example.com".to_string(),
			password: "changeme".to_string(),
		};
		let first = ensure_admin(&pool, &seed, TEST_COST).await.unwrap();
		assert_eq!(first.map(|a| a.role), Some(Role::Admin));
		assert!(ensure_admin(&pool, &seed, TEST_COST).await.unwrap().is_none());
		assert_eq!(list_accounts(&pool).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn users_with_history_are_kept() {
		let (_dir, pool) = testing::pool().await;
		let reader = student(&pool, "reader@example.com").await;
		let idle = student(&pool, "idle@example.com").await;
		let book = books::add_book(
			&pool,
			&BookForm {
				title: "Emma".into(),
				author: "Jane Austen".into(),
				isbn: "9780141439587".into(),
			},
		)
		.await
		.unwrap();
		lifecycle::borrow(&pool, reader.id, book.id).await.unwrap();

		assert!(matches!(delete_account(&pool, reader.id).await, Err(AppError::Conflict(_))));
		delete_account(&pool, idle.id).await.unwrap();
		assert!(matches!(get_account(&pool, idle.id).await, Err(AppError::NotFound(_))));
		assert!(matches!(delete_account(&pool, idle.id).await, Err(AppError::NotFound(_))));
	}
}
