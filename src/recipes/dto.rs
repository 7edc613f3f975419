use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    catalog::repo::Tag, error::ApiError, pagination::PageQuery, users::dto::UserSummary,
};

const MAX_NAME_LEN: usize = 200;

/// Short recipe form returned by the favorite/cart toggles and inside
/// subscription listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeIngredientView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: Option<UserSummary>,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecipeRequest {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    pub cooking_time: i32,
}

/// PATCH body; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub name: Option<String>,
    pub text: Option<String>,
    /// `Some(None)` is an explicit `null` and clears the image.
    #[serde(default, deserialize_with = "present")]
    pub image: Option<Option<String>>,
    pub cooking_time: Option<i32>,
}

/// Tells a field sent as `null` apart from one left out.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Parsed recipe list filters. `tags` holds slugs and matches any of them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

impl RecipeFilter {
    /// Builds filters and pagination from raw query pairs, since `tags` may
    /// repeat. Relation filters only apply to authenticated viewers.
    pub fn from_query(
        pairs: &[(String, String)],
        viewer: Option<Uuid>,
    ) -> Result<(Self, PageQuery), ApiError> {
        let mut filter = RecipeFilter::default();
        let mut page = PageQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "author" => {
                    let id = value
                        .parse()
                        .map_err(|_| ApiError::Validation("Invalid author id".into()))?;
                    filter.author = Some(id);
                }
                "tags" => filter.tags.push(value.clone()),
                "is_favorited" if is_truthy(Some(value.as_str())) => filter.favorited_by = viewer,
                "is_in_shopping_cart" if is_truthy(Some(value.as_str())) => filter.in_cart_of = viewer,
                "page" => page.page = Some(parse_number(key, value)?),
                "limit" => page.limit = Some(parse_number(key, value)?),
                _ => {}
            }
        }
        Ok((filter, page))
    }
}

fn parse_number(key: &str, value: &str) -> Result<i64, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid {key}")))
}

pub fn is_truthy(flag: Option<&str>) -> bool {
    matches!(flag, Some("1") | Some("true") | Some("True"))
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Recipe name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "Recipe name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_cooking_time(minutes: i32) -> Result<(), ApiError> {
    if minutes < 1 {
        return Err(ApiError::Validation(
            "Cooking time must be at least 1 minute".into(),
        ));
    }
    Ok(())
}

fn validate_tags(tags: &[Uuid]) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Err(ApiError::Validation("At least one tag is required".into()));
    }
    let unique: HashSet<_> = tags.iter().collect();
    if unique.len() != tags.len() {
        return Err(ApiError::Validation("Tags must not repeat".into()));
    }
    Ok(())
}

fn validate_ingredients(items: &[IngredientAmount]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::Validation(
            "At least one ingredient is required".into(),
        ));
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(ApiError::Validation("Ingredients must not repeat".into()));
        }
        if item.amount < 1 {
            return Err(ApiError::Validation(
                "Ingredient amount must be at least 1".into(),
            ));
        }
    }
    Ok(())
}

impl CreateRecipeRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_name(&self.name)?;
        validate_cooking_time(self.cooking_time)?;
        validate_tags(&self.tags)?;
        validate_ingredients(&self.ingredients)
    }
}

impl UpdateRecipeRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(minutes) = self.cooking_time {
            validate_cooking_time(minutes)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(items) = &self.ingredients {
            validate_ingredients(items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateRecipeRequest {
        CreateRecipeRequest {
            tags: vec![Uuid::new_v4()],
            ingredients: vec![IngredientAmount {
                id: Uuid::new_v4(),
                amount: 200,
            }],
            name: "Pancakes".into(),
            text: "Mix and fry.".into(),
            image: None,
            cooking_time: 20,
        }
    }

    #[test]
    fn accepts_well_formed_recipe() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_ingredient() {
        let mut r = request();
        let dup = r.ingredients[0].clone();
        r.ingredients.push(dup);
        assert!(matches!(r.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn rejects_non_positive_amount_and_cooking_time() {
        let mut r = request();
        r.ingredients[0].amount = 0;
        assert!(r.validate().is_err());

        let mut r = request();
        r.cooking_time = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn rejects_missing_or_repeated_tags() {
        let mut r = request();
        r.tags.clear();
        assert!(r.validate().is_err());

        let mut r = request();
        r.tags.push(r.tags[0]);
        assert!(r.validate().is_err());
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(UpdateRecipeRequest::default().validate().is_ok());
        let patch = UpdateRecipeRequest {
            ingredients: Some(vec![]),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn patch_distinguishes_null_image_from_missing() {
        let keep: UpdateRecipeRequest = serde_json::from_str(r#"{"name": "Soup"}"#).unwrap();
        assert_eq!(keep.image, None);

        let clear: UpdateRecipeRequest = serde_json::from_str(r#"{"image": null}"#).unwrap();
        assert_eq!(clear.image, Some(None));

        let set: UpdateRecipeRequest =
            serde_json::from_str(r#"{"image": "data:image/png;base64,AAAA"}"#).unwrap();
        assert_eq!(
            set.image,
            Some(Some("data:image/png;base64,AAAA".to_string()))
        );
    }

    #[test]
    fn filter_collects_repeated_tags_and_pagination() {
        let author = Uuid::new_v4();
        let pairs = vec![
            ("tags".to_string(), "breakfast".to_string()),
            ("tags".to_string(), "lunch".to_string()),
            ("author".to_string(), author.to_string()),
            ("page".to_string(), "2".to_string()),
            ("limit".to_string(), "3".to_string()),
        ];
        let (filter, page) = RecipeFilter::from_query(&pairs, None).unwrap();
        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.author, Some(author));
        assert_eq!(page.resolve(6).unwrap(), (3, 3));
    }

    #[test]
    fn relation_filters_ignored_for_anonymous() {
        let pairs = vec![
            ("is_favorited".to_string(), "1".to_string()),
            ("is_in_shopping_cart".to_string(), "1".to_string()),
        ];
        let (filter, _) = RecipeFilter::from_query(&pairs, None).unwrap();
        assert_eq!(filter, RecipeFilter::default());

        let me = Uuid::new_v4();
        let (filter, _) = RecipeFilter::from_query(&pairs, Some(me)).unwrap();
        assert_eq!(filter.favorited_by, Some(me));
        assert_eq!(filter.in_cart_of, Some(me));
    }

    #[test]
    fn filter_rejects_malformed_author() {
        let pairs = vec![("author".to_string(), "bob".to_string())];
        assert!(RecipeFilter::from_query(&pairs, None).is_err());
    }

    #[test]
    fn truthy_flags() {
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("true")));
        assert!(!is_truthy(Some("0")));
        assert!(!is_truthy(None));
    }
}
