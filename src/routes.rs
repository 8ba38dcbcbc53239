use axum::{
	extract::{
		rejection::{JsonRejection, PathRejection, QueryRejection},
		Path, Query, State,
	},
	http::StatusCode,
	response::IntoResponse,
	Json,
};
use serde_json::json;
use tower_cookies::{Cookie, Cookies};

use crate::{
	auth::{self, Caller, SESSION_COOKIE},
	books, lifecycle, projections,
	error::AppError,
	state::SharedState,
	types::{
		Bid, BookForm, BookListParams, BookSort, BorrowId, BorrowListParams, FormLogin, FormRegister,
		NewBorrow, Role, Scope, Uid,
	},
	users,
};

// borrows

pub async fn create_borrow(
	State(state): State<SharedState>,
	caller: Caller,
	payload: Result<Json<NewBorrow>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Json(req) = payload?;
	caller.require_self_or_admin(req.user_id)?;

	let record = lifecycle::borrow(&state.db, req.user_id, req.book_id).await?;
	Ok((StatusCode::CREATED, Json(record)))
}

pub async fn return_borrow(
	State(state): State<SharedState>,
	caller: Caller,
	path: Result<Path<BorrowId>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Path(id) = path?;
	let record = lifecycle::get_borrow(&state.db, id).await?;
	caller.require_self_or_admin(record.user_id)?;

	let record = lifecycle::return_borrow(&state.db, id).await?;
	Ok(Json(record))
}

pub async fn list_borrows(
	State(state): State<SharedState>,
	caller: Caller,
	params: Result<Query<BorrowListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Query(params) = params?;
	let scope = match params.scope.as_deref() {
		None | Some("own") => Scope::Own(caller.uid),
		Some("all") => {
			caller.require_admin()?;
			Scope::All
		}
		Some(other) => return Err(AppError::validation(format!("unknown scope {other:?}"))),
	};

	let views = projections::list_borrows(&state.db, scope).await?;
	Ok(Json(views))
}

// books

pub async fn list_books(
	State(state): State<SharedState>,
	params: Result<Query<BookListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Query(params) = params?;
	let sort = match params.sort.as_deref() {
		Some(key) => key.parse()?,
		None => BookSort::default(),
	};

	let books = projections::list_books(&state.db, sort).await?;
	Ok(Json(books))
}

pub async fn get_book(
	State(state): State<SharedState>,
	path: Result<Path<Bid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Path(bid) = path?;
	Ok(Json(books::get_book(&state.db, bid).await?))
}

pub async fn add_book(
	State(state): State<SharedState>,
	caller: Caller,
	payload: Result<Json<BookForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	caller.require_admin()?;
	let Json(form) = payload?;

	let book = books::add_book(&state.db, &form).await?;
	Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update_book(
	State(state): State<SharedState>,
	caller: Caller,
	path: Result<Path<Bid>, PathRejection>,
	payload: Result<Json<BookForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	caller.require_admin()?;
	let Path(bid) = path?;
	let Json(form) = payload?;

	Ok(Json(books::update_book(&state.db, bid, &form).await?))
}

pub async fn delete_book(
	State(state): State<SharedState>,
	caller: Caller,
	path: Result<Path<Bid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
	caller.require_admin()?;
	let Path(bid) = path?;
	books::delete_book(&state.db, bid).await?;
	Ok(Json(json!({ "message": "Book deleted successfully" })))
}

// users

/// Open registration creates students; only an admin can create admins.
pub async fn register_user(
	State(state): State<SharedState>,
	caller: Option<Caller>,
	payload: Result<Json<FormRegister>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Json(form) = payload?;
	let role = form.validate()?;
	if role == Role::Admin {
		match caller {
			Some(caller) => {
				caller.require_admin()?;
			}
			None => return Err(AppError::Unauthorized),
		}
	}

	let account = users::create_account(&state.db, &form, role, state.config.bcrypt_cost).await?;
	Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_users(
	State(state): State<SharedState>,
	caller: Caller,
) -> Result<impl IntoResponse, AppError> {
	caller.require_admin()?;
	Ok(Json(users::list_accounts(&state.db).await?))
}

pub async fn delete_user(
	State(state): State<SharedState>,
	caller: Caller,
	path: Result<Path<Uid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
	caller.require_admin()?;
	let Path(uid) = path?;
	if caller.uid == uid {
		return Err(AppError::Conflict("Admins cannot delete their own account".to_string()));
	}

	users::delete_account(&state.db, uid).await?;
	Ok(Json(json!({ "message": "User deleted successfully" })))
}

// sessions

pub async fn login(
	State(state): State<SharedState>,
	cookies: Cookies,
	payload: Result<Json<FormLogin>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let Json(form) = payload?;

	let (account, token) = auth::login(&state.db, &form.email, &form.password, state.config.session_ttl).await?;
	cookies.add(auth::session_cookie(token));
	Ok(Json(account))
}

pub async fn logout(
	State(state): State<SharedState>,
	cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
	if let Some(cookie) = cookies.get(SESSION_COOKIE) {
		auth::destroy_session(&state.db, cookie.value()).await?;
	}

	let mut expired = Cookie::new(SESSION_COOKIE, "");
	expired.set_path("/");
	cookies.remove(expired);
	Ok(Json(json!({ "message": "Logged out" })))
}
