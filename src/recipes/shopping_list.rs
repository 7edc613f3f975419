use std::collections::HashMap;

use sqlx::FromRow;
use uuid::Uuid;

use super::lists::RecipeListStore;

pub const HEADER: &str = "Shopping list:";

/// One recipe-ingredient row reachable from a user's cart.
#[derive(Debug, Clone, FromRow)]
pub struct CartLine {
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Sums amounts per ingredient. Items keep the order in which their
/// ingredient first appears in `lines`.
pub fn aggregate(lines: impl IntoIterator<Item = CartLine>) -> Vec<ShoppingItem> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut items: Vec<ShoppingItem> = Vec::new();
    for line in lines {
        match index.get(&line.ingredient_id) {
            Some(&i) => items[i].total += i64::from(line.amount),
            None => {
                index.insert(line.ingredient_id, items.len());
                items.push(ShoppingItem {
                    name: line.name,
                    measurement_unit: line.measurement_unit,
                    total: i64::from(line.amount),
                });
            }
        }
    }
    items
}

pub fn render(items: &[ShoppingItem]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|it| format!("{} - {} {}.", it.name, it.total, it.measurement_unit))
        .collect();
    format!("{HEADER}\n{}", lines.join("\n"))
}

pub async fn build_report(store: &dyn RecipeListStore, user_id: Uuid) -> anyhow::Result<String> {
    let lines = store.cart_lines(user_id).await?;
    Ok(render(&aggregate(lines)))
}
