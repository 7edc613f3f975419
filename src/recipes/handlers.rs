use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, RecipeFilter, RecipeSummary, RecipeView, UpdateRecipeRequest},
    lists::{self, RecipeList},
    services, shopping_list,
};
use crate::{
    auth::{AuthUser, Viewer},
    error::ApiError,
    pagination::Page,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/:id",
            axum::routing::patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<RecipeView>>, ApiError> {
    let (filter, page) = RecipeFilter::from_query(&pairs, viewer.user_id())?;
    let (limit, offset) = page.resolve(state.config.page_size)?;
    Ok(Json(
        services::list(&state, viewer, &filter, limit, offset).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeView>, ApiError> {
    Ok(Json(services::get(&state, viewer, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeView>), ApiError> {
    let recipe = services::create(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeView>, ApiError> {
    Ok(Json(services::update(&state, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to_list(
    state: &AppState,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    let summary = lists::add(state.recipe_lists.as_ref(), list, user_id, recipe_id).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn remove_from_list(
    state: &AppState,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<StatusCode, ApiError> {
    lists::remove(state.recipe_lists.as_ref(), list, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_to_list(&state, RecipeList::Favorites, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_from_list(&state, RecipeList::Favorites, user_id, id).await
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_to_list(&state, RecipeList::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_from_list(&state, RecipeList::ShoppingCart, user_id, id).await
}

/// Plain-text shopping list served as a file attachment.
#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let report = shopping_list::build_report(state.recipe_lists.as_ref(), user_id).await?;
    info!(%user_id, bytes = report.len(), "shopping list built");
    let disposition = format!(
        "attachment; filename={}",
        state.config.shopping_list_filename
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report,
    )
        .into_response())
}
