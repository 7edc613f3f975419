use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

/// Escapes LIKE wildcards so user input only matches literally.
pub(crate) fn like_prefix(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 1);
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

impl Tag {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY name")
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Tag>> {
        let row = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn for_recipe(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.color, t.slug
              FROM recipe_tags rt
              JOIN tags t ON t.id = rt.tag_id
             WHERE rt.recipe_id = $1
             ORDER BY t.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Number of the given ids that exist.
    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(db)
            .await?;
        Ok(n)
    }
}

impl Ingredient {
    /// Case-insensitive name prefix search; all ingredients when `name` is empty.
    pub async fn search(db: &PgPool, name: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let pattern = like_prefix(name.unwrap_or("").trim());
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
              FROM ingredients
             WHERE name ILIKE $1
             ORDER BY name, measurement_unit
            "#,
        )
        .bind(pattern)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<i64> {
        let n =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
                .bind(ids)
                .fetch_one(db)
                .await?;
        Ok(n)
    }
}
