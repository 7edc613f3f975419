use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{
    CreateRecipeRequest, IngredientAmount, RecipeFilter, RecipeIngredientView,
    UpdateRecipeRequest,
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Option<Uuid>,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub created_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        )
        .push_bind(filter.tags.clone())
        .push("))");
    }
    if let Some(user_id) = filter.favorited_by {
        qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        qb.push(
            " AND EXISTS (SELECT 1 FROM shopping_carts sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
        )
        .push_bind(user_id)
        .push(")");
    }
}

async fn insert_links(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    tags: Option<&[Uuid]>,
    ingredients: Option<&[IngredientAmount]>,
) -> anyhow::Result<()> {
    if let Some(tags) = tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut **tx)
            .await
            .context("clear recipe tags")?;
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut **tx)
        .await
        .context("insert recipe tags")?;
    }
    if let Some(items) = ingredients {
        let (ids, amounts): (Vec<Uuid>, Vec<i32>) = items.iter().map(|i| (i.id, i.amount)).unzip();
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut **tx)
            .await
            .context("clear recipe ingredients")?;
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            SELECT $1, i.id, i.amount
              FROM UNNEST($2::uuid[], $3::int4[]) AS i(id, amount)
            "#,
        )
        .bind(recipe_id)
        .bind(ids)
        .bind(amounts)
        .execute(&mut **tx)
        .await
        .context("insert recipe ingredients")?;
    }
    Ok(())
}

impl Recipe {
    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, author_id, name, text, image, cooking_time, created_at
              FROM recipes
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(recipe)
    }

    /// Filtered page of recipes, newest first, plus the total match count.
    pub async fn list(
        db: &PgPool,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Recipe>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.created_at \
             FROM recipes r",
        );
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let recipes = qb.build_query_as::<Recipe>().fetch_all(db).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r");
        push_filters(&mut count_qb, filter);
        let count = count_qb.build_query_scalar::<i64>().fetch_one(db).await?;

        Ok((recipes, count))
    }

    pub async fn ingredients(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredientView>> {
        let rows = sqlx::query_as::<_, RecipeIngredientView>(
            r#"
            SELECT i.id, i.name, i.measurement_unit, ri.amount
              FROM recipe_ingredients ri
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = $1
             ORDER BY i.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Inserts the recipe with its tag and ingredient links in one transaction.
    pub async fn create(
        db: &PgPool,
        author_id: Uuid,
        req: &CreateRecipeRequest,
    ) -> anyhow::Result<Recipe> {
        let mut tx = db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (author_id, name, text, image, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, name, text, image, cooking_time, created_at
            "#,
        )
        .bind(author_id)
        .bind(req.name.trim())
        .bind(&req.text)
        .bind(&req.image)
        .bind(req.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        insert_links(
            &mut tx,
            recipe.id,
            Some(req.tags.as_slice()),
            Some(req.ingredients.as_slice()),
        )
        .await?;
        tx.commit().await.context("commit tx")?;
        Ok(recipe)
    }

    /// Applies a partial update; provided tag and ingredient sets replace the old ones.
    /// `None` when the recipe no longer exists; nothing is written then.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        req: &UpdateRecipeRequest,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut tx = db.begin().await.context("begin tx")?;
        let Some(recipe) = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
               SET name = COALESCE($2, name),
                   text = COALESCE($3, text),
                   image = CASE WHEN $4 THEN $5 ELSE image END,
                   cooking_time = COALESCE($6, cooking_time)
             WHERE id = $1
            RETURNING id, author_id, name, text, image, cooking_time, created_at
            "#,
        )
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.text)
        .bind(req.image.is_some())
        .bind(req.image.clone().flatten())
        .bind(req.cooking_time)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?
        else {
            return Ok(None);
        };

        insert_links(
            &mut tx,
            id,
            req.tags.as_deref(),
            req.ingredients.as_deref(),
        )
        .await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(recipe))
    }

    /// Links, favorites and cart rows go with it via ON DELETE CASCADE.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete recipe")?;
        Ok(done.rows_affected() > 0)
    }
}
