use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, IngredientAmount, RecipeFilter, RecipeView, UpdateRecipeRequest},
    lists,
    repo::Recipe,
};
use crate::{
    auth::Viewer,
    catalog::repo::{Ingredient, Tag},
    error::ApiError,
    pagination::Page,
    state::AppState,
    users::{repo::User, subscriptions},
};

/// Full read model of a recipe as seen by `viewer`.
pub async fn view(state: &AppState, viewer: Viewer, recipe: Recipe) -> anyhow::Result<RecipeView> {
    let author = match recipe.author_id {
        Some(author_id) => match User::find_by_id(&state.db, author_id).await? {
            Some(user) => {
                Some(subscriptions::summarize(state.subscriptions.as_ref(), viewer, user).await?)
            }
            None => None,
        },
        None => None,
    };
    let flags = lists::flags(state.recipe_lists.as_ref(), viewer, recipe.id).await?;

    Ok(RecipeView {
        id: recipe.id,
        tags: Tag::for_recipe(&state.db, recipe.id).await?,
        author,
        ingredients: Recipe::ingredients(&state.db, recipe.id).await?,
        is_favorited: flags.is_favorited,
        is_in_shopping_cart: flags.is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn list(
    state: &AppState,
    viewer: Viewer,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Page<RecipeView>> {
    let (recipes, count) = Recipe::list(&state.db, filter, limit, offset).await?;
    let mut results = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        results.push(view(state, viewer, recipe).await?);
    }
    Ok(Page::new(results, count, limit, offset))
}

pub async fn get(state: &AppState, viewer: Viewer, id: Uuid) -> Result<RecipeView, ApiError> {
    let recipe = found(Recipe::find(&state.db, id).await?)?;
    Ok(view(state, viewer, recipe).await?)
}

async fn ensure_references(
    state: &AppState,
    tags: Option<&[Uuid]>,
    ingredients: Option<&[IngredientAmount]>,
) -> Result<(), ApiError> {
    if let Some(tags) = tags {
        if Tag::count_existing(&state.db, tags).await? != tags.len() as i64 {
            return Err(ApiError::Validation("Unknown tag".into()));
        }
    }
    if let Some(items) = ingredients {
        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        if Ingredient::count_existing(&state.db, &ids).await? != ids.len() as i64 {
            return Err(ApiError::Validation("Unknown ingredient".into()));
        }
    }
    Ok(())
}

fn found(recipe: Option<Recipe>) -> Result<Recipe, ApiError> {
    recipe.ok_or_else(|| ApiError::not_found("Recipe"))
}

/// The author may always edit; anyone else needs an admin account.
/// `editor` is only loaded when the caller is not the author.
fn authorize_edit(
    recipe: Option<Recipe>,
    editor: Option<&User>,
    user_id: Uuid,
) -> Result<Recipe, ApiError> {
    let recipe = found(recipe)?;
    let is_admin = editor.is_some_and(|u| u.id == user_id && u.is_admin);
    if recipe.author_id == Some(user_id) || is_admin {
        return Ok(recipe);
    }
    warn!(%user_id, recipe_id = %recipe.id, "recipe edit forbidden");
    Err(ApiError::Forbidden(
        "Only the author can change this recipe".into(),
    ))
}

async fn editable(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Recipe, ApiError> {
    let recipe = Recipe::find(&state.db, id).await?;
    let editor = match &recipe {
        Some(r) if r.author_id != Some(user_id) => User::find_by_id(&state.db, user_id).await?,
        _ => None,
    };
    authorize_edit(recipe, editor.as_ref(), user_id)
}

pub async fn create(
    state: &AppState,
    author_id: Uuid,
    req: CreateRecipeRequest,
) -> Result<RecipeView, ApiError> {
    req.validate()?;
    ensure_references(
        state,
        Some(req.tags.as_slice()),
        Some(req.ingredients.as_slice()),
    )
    .await?;

    let recipe = Recipe::create(&state.db, author_id, &req).await?;
    info!(recipe_id = %recipe.id, %author_id, "recipe created");
    Ok(view(state, Viewer::User(author_id), recipe).await?)
}

pub async fn update(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    req: UpdateRecipeRequest,
) -> Result<RecipeView, ApiError> {
    req.validate()?;
    editable(state, user_id, id).await?;
    ensure_references(state, req.tags.as_deref(), req.ingredients.as_deref()).await?;

    // The row may be gone if a concurrent delete won the race.
    let recipe = found(Recipe::update(&state.db, id, &req).await?)?;
    info!(recipe_id = %id, %user_id, "recipe updated");
    Ok(view(state, Viewer::User(user_id), recipe).await?)
}

pub async fn delete(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
    editable(state, user_id, id).await?;
    if !Recipe::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Recipe"));
    }
    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(())
}
