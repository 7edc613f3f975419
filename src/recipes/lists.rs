//! Per-user recipe lists: favorites and the shopping cart.
//!
//! Both lists share one toggle contract. `add` fails with `Conflict` when the
//! recipe is already listed, `remove` fails with `InvalidOperation` when it is
//! not. Uniqueness is held by the `(user_id, recipe_id)` constraint on each
//! table, so concurrent adds still leave at most one row.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{dto::RecipeSummary, shopping_list::CartLine};
use crate::{auth::Viewer, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_carts",
        }
    }

    fn already_listed(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_listed(self) -> &'static str {
        match self {
            RecipeList::Favorites => "This recipe is not in your favorites",
            RecipeList::ShoppingCart => "This recipe is not in your shopping cart",
        }
    }
}

#[async_trait]
pub trait RecipeListStore: Send + Sync {
    async fn recipe_summary(&self, recipe_id: Uuid) -> anyhow::Result<Option<RecipeSummary>>;
    /// Returns `false` when the pair was already present.
    async fn insert(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid)
        -> anyhow::Result<bool>;
    /// Returns `false` when there was nothing to delete.
    async fn remove(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid)
        -> anyhow::Result<bool>;
    async fn contains(&self, list: RecipeList, user_id: Uuid, recipe_id: Uuid)
        -> anyhow::Result<bool>;
    /// Every recipe-ingredient row of every recipe in the user's cart.
    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>>;
}

#[derive(Clone)]
pub struct PgRecipeLists {
    db: PgPool,
}

impl PgRecipeLists {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeListStore for PgRecipeLists {
    async fn recipe_summary(&self, recipe_id: Uuid) -> anyhow::Result<Option<RecipeSummary>> {
        let row = sqlx::query_as::<_, RecipeSummary>(
            r#"SELECT id, name, image, cooking_time FROM recipes WHERE id = $1"#,
        )
        .bind(recipe_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, recipe_id) DO NOTHING",
            list.table()
        );
        let done = sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn remove(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            list.table()
        );
        let done = sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn contains(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
            list.table()
        );
        let found = sqlx::query_scalar::<_, bool>(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .fetch_one(&self.db)
            .await?;
        Ok(found)
    }

    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
              FROM shopping_carts sc
              JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE sc.user_id = $1
             ORDER BY i.name, i.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

pub async fn add(
    store: &dyn RecipeListStore,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<RecipeSummary, ApiError> {
    let recipe = store
        .recipe_summary(recipe_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;

    if !store.insert(list, user_id, recipe.id).await? {
        warn!(%user_id, %recipe_id, ?list, "recipe already listed");
        return Err(ApiError::Conflict(list.already_listed().into()));
    }

    info!(%user_id, %recipe_id, ?list, "recipe listed");
    Ok(recipe)
}

pub async fn remove(
    store: &dyn RecipeListStore,
    list: RecipeList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(), ApiError> {
    store
        .recipe_summary(recipe_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;

    if !store.remove(list, user_id, recipe_id).await? {
        warn!(%user_id, %recipe_id, ?list, "recipe not listed");
        return Err(ApiError::InvalidOperation(list.not_listed().into()));
    }

    info!(%user_id, %recipe_id, ?list, "recipe unlisted");
    Ok(())
}

/// Viewer-relative flags shown on every recipe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecipeFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Anonymous viewers get all-false flags without touching the store.
pub async fn flags(
    store: &dyn RecipeListStore,
    viewer: Viewer,
    recipe_id: Uuid,
) -> anyhow::Result<RecipeFlags> {
    let Viewer::User(user_id) = viewer else {
        return Ok(RecipeFlags::default());
    };
    Ok(RecipeFlags {
        is_favorited: store
            .contains(RecipeList::Favorites, user_id, recipe_id)
            .await?,
        is_in_shopping_cart: store
            .contains(RecipeList::ShoppingCart, user_id, recipe_id)
            .await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, UnreachableStore};

    #[tokio::test]
    async fn adding_twice_conflicts_and_keeps_one_row() {
        let store = MemoryStore::default();
        let user = store.add_user("reader");
        let recipe = store.add_recipe(None, "Soup", &[("salt", "g", 5)]);

        let summary = add(&store, RecipeList::Favorites, user.id, recipe.id)
            .await
            .expect("first add");
        assert_eq!(summary, recipe);

        let err = add(&store, RecipeList::Favorites, user.id, recipe.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.list_rows(RecipeList::Favorites), 1);
    }

    #[tokio::test]
    async fn lists_are_independent() {
        let store = MemoryStore::default();
        let user = store.add_user("reader");
        let recipe = store.add_recipe(None, "Soup", &[]);

        add(&store, RecipeList::Favorites, user.id, recipe.id)
            .await
            .unwrap();
        add(&store, RecipeList::ShoppingCart, user.id, recipe.id)
            .await
            .expect("cart is a separate list");
        assert_eq!(store.list_rows(RecipeList::ShoppingCart), 1);
    }

    #[tokio::test]
    async fn add_unknown_recipe_is_not_found() {
        let store = MemoryStore::default();
        let user = store.add_user("reader");
        let err = add(&store, RecipeList::ShoppingCart, user.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.list_rows(RecipeList::ShoppingCart), 0);
    }

    #[tokio::test]
    async fn removing_absent_entry_is_invalid_operation() {
        let store = MemoryStore::default();
        let user = store.add_user("reader");
        let recipe = store.add_recipe(None, "Soup", &[]);

        let err = remove(&store, RecipeList::Favorites, user.id, recipe.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn remove_deletes_only_the_matching_row() {
        let store = MemoryStore::default();
        let alice = store.add_user("alice");
        let bob = store.add_user("bob");
        let soup = store.add_recipe(None, "Soup", &[]);
        let stew = store.add_recipe(None, "Stew", &[]);

        for (user, recipe) in [(alice.id, soup.id), (alice.id, stew.id), (bob.id, soup.id)] {
            add(&store, RecipeList::Favorites, user, recipe).await.unwrap();
        }

        remove(&store, RecipeList::Favorites, alice.id, soup.id)
            .await
            .expect("remove");

        assert_eq!(store.list_rows(RecipeList::Favorites), 2);
        assert!(!store
            .contains(RecipeList::Favorites, alice.id, soup.id)
            .await
            .unwrap());
        assert!(store
            .contains(RecipeList::Favorites, alice.id, stew.id)
            .await
            .unwrap());
        assert!(store
            .contains(RecipeList::Favorites, bob.id, soup.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn anonymous_flags_are_false_without_lookup() {
        let flags = flags(&UnreachableStore, Viewer::Anonymous, Uuid::new_v4())
            .await
            .expect("no store access");
        assert_eq!(flags, RecipeFlags::default());
    }

    #[tokio::test]
    async fn user_flags_reflect_lists() {
        let store = MemoryStore::default();
        let user = store.add_user("reader");
        let recipe = store.add_recipe(None, "Soup", &[]);
        add(&store, RecipeList::ShoppingCart, user.id, recipe.id)
            .await
            .unwrap();

        let got = flags(&store, Viewer::User(user.id), recipe.id).await.unwrap();
        assert_eq!(
            got,
            RecipeFlags {
                is_favorited: false,
                is_in_shopping_cart: true
            }
        );
    }
}
