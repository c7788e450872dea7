use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::dto::{check_limit, BirthdayParams, ContactRequest, ContactResponse, ListParams, SearchParams};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

const NOT_FOUND: &str = "Contact not found";

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/birthday", get(upcoming_birthdays))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

fn to_response(rows: Vec<super::repo::Contact>) -> Json<Vec<ContactResponse>> {
    Json(rows.into_iter().map(ContactResponse::from).collect())
}

#[instrument(skip_all, fields(user_id = %user.id, offset = p.offset, limit = p.limit))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(p): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let limit = check_limit(p.limit)?;
    let rows = state.contacts.list(user.id, p.offset, limit).await?;
    Ok(to_response(rows))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn search_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(p): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let limit = check_limit(p.limit)?;
    let query = p.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("query must not be empty".into()));
    }
    let rows = state.contacts.search(user.id, query, p.offset, limit).await?;
    Ok(to_response(rows))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(p): ApiQuery<BirthdayParams>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let limit = check_limit(p.limit)?;
    let today = OffsetDateTime::now_utc().date();
    let rows = state
        .contacts
        .upcoming_birthdays(user.id, today, p.offset, limit)
        .await?;
    Ok(to_response(rows))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn get_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = state
        .contacts
        .get(user.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<ContactRequest>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    let fields = body.validate()?;
    let contact = state.contacts.create(user.id, &fields).await?;
    info!(contact_id = contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ContactRequest>,
) -> ApiResult<Json<ContactResponse>> {
    let fields = body.validate()?;
    let contact = state
        .contacts
        .update(user.id, id, &fields)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = state
        .contacts
        .delete(user.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    info!("contact deleted");
    Ok(Json(contact.into()))
}
