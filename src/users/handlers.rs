use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{PublicUser, RegisterRequest, SetPasswordRequest, SubscribedAuthor, UserSummary},
    repo::{NewUser, User},
    subscriptions,
};
use crate::{
    auth::{
        password::{ensure_acceptable, hash_password, verify_password},
        AuthUser, Viewer,
    },
    error::{is_unique_violation, ApiError},
    pagination::{Page, PageQuery},
    state::AppState,
};

/// Pagination plus the optional cap on recipes shown per author.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

impl SubscriptionQuery {
    fn recipes_limit(&self) -> Result<Option<i64>, ApiError> {
        match self.recipes_limit {
            Some(n) if n < 0 => Err(ApiError::Validation(
                "recipes_limit must not be negative".into(),
            )),
            other => Ok(other),
        }
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

fn already_registered() -> ApiError {
    ApiError::Validation("A user with this email or username already exists".into())
}

/// A concurrent registration can pass `is_taken` and still lose on the
/// unique constraint; that is the same client error, not a server fault.
fn registration_failed(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e) {
        warn!("registration lost a race on a unique column");
        return already_registered();
    }
    ApiError::Internal(e)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    if let Err(e) = payload.normalize_and_validate() {
        warn!(error = %e, "invalid registration");
        return Err(e);
    }

    if User::is_taken(&state.db, &payload.email, &payload.username).await? {
        warn!(email = %payload.email, username = %payload.username, "user already registered");
        return Err(already_registered());
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e)
    })?;

    let user = User::create(
        &state.db,
        NewUser {
            email: &payload.email,
            username: &payload.username,
            first_name: payload.first_name.trim(),
            last_name: payload.last_name.trim(),
            password_hash: &hash,
        },
    )
    .await
    .map_err(registration_failed)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<UserSummary>>, ApiError> {
    let (limit, offset) = q.resolve(state.config.page_size)?;
    let (users, count) = User::list(&state.db, limit, offset).await?;
    let mut results = Vec::with_capacity(users.len());
    for user in users {
        results.push(subscriptions::summarize(state.subscriptions.as_ref(), viewer, user).await?);
    }
    Ok(Json(Page::new(results, count, limit, offset)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSummary>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(
        subscriptions::summarize(state.subscriptions.as_ref(), viewer, user).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserSummary>, ApiError> {
    let user = User::find_by_id(&state.db, auth.0).await?.ok_or_else(|| {
        error!(user_id = %auth.0, "token subject not found");
        ApiError::Unauthenticated("User not found".into())
    })?;
    Ok(Json(
        subscriptions::summarize(state.subscriptions.as_ref(), auth.into(), user).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(%user_id, "set_password with wrong current password");
        return Err(ApiError::Validation("Current password is incorrect".into()));
    }
    ensure_acceptable(&payload.new_password)?;

    let hash = hash_password(&payload.new_password)?;
    User::set_password_hash(&state.db, user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<SubscriptionQuery>,
) -> Result<Json<Page<SubscribedAuthor>>, ApiError> {
    let recipes_limit = q.recipes_limit()?;
    let (limit, offset) = q.page().resolve(state.config.page_size)?;
    let (authors, count) = User::followed_by(&state.db, auth.0, limit, offset).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in authors {
        results.push(
            subscriptions::represent_author(
                state.subscriptions.as_ref(),
                auth.into(),
                author,
                recipes_limit,
            )
            .await?,
        );
    }
    Ok(Json(Page::new(results, count, limit, offset)))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
    Query(q): Query<SubscriptionQuery>,
) -> Result<(StatusCode, Json<SubscribedAuthor>), ApiError> {
    let author = subscriptions::subscribe(
        state.subscriptions.as_ref(),
        user_id,
        author_id,
        q.recipes_limit()?,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    subscriptions::unsubscribe(state.subscriptions.as_ref(), user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
