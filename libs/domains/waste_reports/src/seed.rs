//! Synthetic waste items for development databases.

use chrono::Utc;
use uuid::Uuid;

use crate::models::WasteItem;

const SECONDS_PER_DAY: i64 = 86_400;

const PRODUCT_NAMES: [&str; 10] = [
    "Banana",
    "Orange",
    "Apple",
    "Mango",
    "Strawberry",
    "Tomato",
    "Lettuce",
    "Pear",
    "Grapes",
    "Sweet Pepper",
];

const LOTS: [&str; 10] = [
    "A101", "B201", "O301", "M401", "S501", "T601", "L701", "P801", "G901", "SW1001",
];

/// Item with a timestamp between 50 days before and 5 days after `now`.
pub fn random_waste_item_at(now: i64) -> WasteItem {
    let product = rand::random_range(0..PRODUCT_NAMES.len());
    let total_weight: i64 = rand::random_range(100..300);
    let waste_weight: i64 = rand::random_range(1..total_weight);
    let sku: u32 = rand::random_range(11_111_111..99_999_999);
    let day_offset: i64 = rand::random_range(-50..6);

    WasteItem {
        id: None,
        item_id: Uuid::new_v4().to_string(),
        waste_id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: PRODUCT_NAMES[product].to_string(),
        lot: LOTS[product].to_string(),
        weight: waste_weight as f64,
        total_weight: total_weight as f64,
        timestamp: now + day_offset * SECONDS_PER_DAY,
    }
}

pub fn random_waste_items(count: usize) -> Vec<WasteItem> {
    let now = Utc::now().timestamp();
    (0..count).map(|_| random_waste_item_at(now)).collect()
}
