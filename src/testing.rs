//! In-memory stand-ins for the Postgres stores, used by unit and router tests.

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    fmt,
    sync::Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    recipes::{
        dto::RecipeSummary,
        lists::{RecipeList, RecipeListStore},
        shopping_list::CartLine,
    },
    users::{repo::User, subscriptions::SubscriptionStore},
};

struct StoredRecipe {
    author_id: Option<Uuid>,
    summary: RecipeSummary,
    lines: Vec<CartLine>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    /// Newest first, matching the default recipe ordering.
    recipes: Vec<StoredRecipe>,
    ingredients: HashMap<(String, String), Uuid>,
    lists: HashSet<(RecipeList, Uuid, Uuid)>,
    subscriptions: HashSet<(Uuid, Uuid)>,
}

/// Keeps the same uniqueness rules as the schema: a set per join table.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn add_user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            password_hash: String::new(),
            is_admin: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    /// `ingredients` are `(name, unit, amount)`; a repeated name+unit pair
    /// refers to the same ingredient across recipes.
    pub fn add_recipe(
        &self,
        author_id: Option<Uuid>,
        name: &str,
        ingredients: &[(&str, &str, i32)],
    ) -> RecipeSummary {
        let mut inner = self.inner.lock().unwrap();
        let summary = RecipeSummary {
            id: Uuid::new_v4(),
            name: name.into(),
            image: None,
            cooking_time: 10,
        };
        let lines = ingredients
            .iter()
            .map(|&(name, unit, amount)| {
                let ingredient_id = *inner
                    .ingredients
                    .entry((name.to_string(), unit.to_string()))
                    .or_insert_with(Uuid::new_v4);
                CartLine {
                    ingredient_id,
                    name: name.into(),
                    measurement_unit: unit.into(),
                    amount,
                }
            })
            .collect();
        inner.recipes.insert(
            0,
            StoredRecipe {
                author_id,
                summary: summary.clone(),
                lines,
            },
        );
        summary
    }

    pub fn list_rows(&self, list: RecipeList) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.lists.iter().filter(|(l, _, _)| *l == list).count()
    }

    pub fn subscription_rows(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }
}

#[async_trait]
impl RecipeListStore for MemoryStore {
    async fn recipe_summary(&self, recipe_id: Uuid) -> anyhow::Result<Option<RecipeSummary>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipes
            .iter()
            .find(|r| r.summary.id == recipe_id)
            .map(|r| r.summary.clone()))
    }

    async fn insert(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .insert((list, user_id, recipe_id)))
    }

    async fn remove(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .remove(&(list, user_id, recipe_id)))
    }

    async fn contains(
        &self,
        list: RecipeList,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .contains(&(list, user_id, recipe_id)))
    }

    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipes
            .iter()
            .filter(|r| {
                inner
                    .lists
                    .contains(&(RecipeList::ShoppingCart, user_id, r.summary.id))
            })
            .flat_map(|r| r.lines.iter().cloned())
            .collect())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .insert((user_id, author_id)))
    }

    async fn remove(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .remove(&(user_id, author_id)))
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .contains(&(user_id, author_id)))
    }

    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<RecipeSummary>> {
        let inner = self.inner.lock().unwrap();
        let take = limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(inner
            .recipes
            .iter()
            .filter(|r| r.author_id == Some(author_id))
            .take(take)
            .map(|r| r.summary.clone())
            .collect())
    }

    async fn recipes_count(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipes
            .iter()
            .filter(|r| r.author_id == Some(author_id))
            .count() as i64)
    }
}

/// Fails every call; proves a code path never reaches the store.
pub struct UnreachableStore;

fn unreachable_store<T>() -> anyhow::Result<T> {
    anyhow::bail!("store must not be queried")
}

#[async_trait]
impl RecipeListStore for UnreachableStore {
    async fn recipe_summary(&self, _: Uuid) -> anyhow::Result<Option<RecipeSummary>> {
        unreachable_store()
    }
    async fn insert(&self, _: RecipeList, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn remove(&self, _: RecipeList, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn contains(&self, _: RecipeList, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn cart_lines(&self, _: Uuid) -> anyhow::Result<Vec<CartLine>> {
        unreachable_store()
    }
}

#[async_trait]
impl SubscriptionStore for UnreachableStore {
    async fn find_user(&self, _: Uuid) -> anyhow::Result<Option<User>> {
        unreachable_store()
    }
    async fn insert(&self, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn remove(&self, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn exists(&self, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
        unreachable_store()
    }
    async fn author_recipes(&self, _: Uuid, _: Option<i64>) -> anyhow::Result<Vec<RecipeSummary>> {
        unreachable_store()
    }
    async fn recipes_count(&self, _: Uuid) -> anyhow::Result<i64> {
        unreachable_store()
    }
}

/// What Postgres reports when an insert hits a unique constraint.
#[derive(Debug)]
struct DuplicateKey;

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("duplicate key value violates unique constraint")
    }
}

impl std::error::Error for DuplicateKey {}

impl sqlx::error::DatabaseError for DuplicateKey {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

/// A repository error as `?` would produce it from a duplicate insert.
pub fn unique_violation() -> anyhow::Error {
    sqlx::Error::Database(Box::new(DuplicateKey)).into()
}
