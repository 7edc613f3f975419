use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{SubscribedAuthor, SubscriptionDetails, UserSummary},
    repo::User,
};
use crate::{auth::Viewer, error::ApiError, recipes::dto::RecipeSummary};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Returns `false` when the subscription already existed.
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` when there was nothing to delete.
    async fn remove(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    /// Newest first, truncated to `limit` when given.
    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<RecipeSummary>>;
    async fn recipes_count(&self, author_id: Uuid) -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgSubscriptions {
    db: PgPool,
}

impl PgSubscriptions {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptions {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        User::find_by_id(&self.db, id).await
    }

    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn remove(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.db)
        .await?;
        Ok(found)
    }

    async fn author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<RecipeSummary>> {
        // LIMIT NULL means no limit.
        let rows = sqlx::query_as::<_, RecipeSummary>(
            r#"
            SELECT id, name, image, cooking_time
              FROM recipes
             WHERE author_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn recipes_count(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

/// Whether `viewer` follows `author_id`; always false for anonymous viewers.
pub async fn is_subscribed(
    store: &dyn SubscriptionStore,
    viewer: Viewer,
    author_id: Uuid,
) -> anyhow::Result<bool> {
    match viewer {
        Viewer::Anonymous => Ok(false),
        Viewer::User(user_id) => store.exists(user_id, author_id).await,
    }
}

pub async fn summarize(
    store: &dyn SubscriptionStore,
    viewer: Viewer,
    user: User,
) -> anyhow::Result<UserSummary> {
    let subscribed = is_subscribed(store, viewer, user.id).await?;
    Ok(UserSummary::new(user, subscribed))
}

/// Profile plus the author's recipes, as shown in subscription listings.
pub async fn represent_author(
    store: &dyn SubscriptionStore,
    viewer: Viewer,
    author: User,
    recipes_limit: Option<i64>,
) -> anyhow::Result<SubscribedAuthor> {
    let author_id = author.id;
    let summary = summarize(store, viewer, author).await?;
    let details = SubscriptionDetails {
        recipes: store.author_recipes(author_id, recipes_limit).await?,
        recipes_count: store.recipes_count(author_id).await?,
    };
    Ok(SubscribedAuthor { summary, details })
}

pub async fn subscribe(
    store: &dyn SubscriptionStore,
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
) -> Result<SubscribedAuthor, ApiError> {
    let author = store
        .find_user(author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if author.id == user_id {
        warn!(%user_id, "self subscription rejected");
        return Err(ApiError::InvalidOperation(
            "You cannot subscribe to yourself".into(),
        ));
    }

    if !store.insert(user_id, author.id).await? {
        warn!(%user_id, %author_id, "already subscribed");
        return Err(ApiError::Conflict(
            "You are already subscribed to this user".into(),
        ));
    }

    info!(%user_id, %author_id, "user subscribed");
    Ok(represent_author(store, Viewer::User(user_id), author, recipes_limit).await?)
}

pub async fn unsubscribe(
    store: &dyn SubscriptionStore,
    user_id: Uuid,
    author_id: Uuid,
) -> Result<(), ApiError> {
    store
        .find_user(author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !store.remove(user_id, author_id).await? {
        warn!(%user_id, %author_id, "not subscribed");
        return Err(ApiError::InvalidOperation(
            "You are not subscribed to this user".into(),
        ));
    }

    info!(%user_id, %author_id, "user unsubscribed");
    Ok(())
}
