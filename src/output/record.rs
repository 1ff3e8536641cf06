//! The exported recipe record and its column layout

use crate::normalize::collapse_ws;
use chrono::{SecondsFormat, Utc};

/// Column order of the TSV export; also the key order of the JSONL mirror
pub const TSV_HEADERS: [&str; 28] = [
    "title",
    "instructions",
    "ingredients",
    "url",
    "description",
    "author",
    "total_time",
    "servings",
    "calories",
    "rating_value",
    "rating_count",
    "categories",
    "equipment",
    "tags",
    "image",
    "captured_at",
    "protein_percent",
    "protein_grams",
    "fat_percent",
    "fat_grams",
    "carb_percent",
    "carb_grams",
    "calories_per_100g",
    "calories_total",
    "gi_min",
    "gi_avg",
    "gi_max",
    "total_weight_grams",
];

/// One parsed recipe page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeRecord {
    pub title: String,
    pub instructions: String,
    pub ingredients: String,
    pub url: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub total_time: Option<String>,
    pub servings: Option<String>,
    pub calories: Option<String>,
    pub rating_value: Option<String>,
    pub rating_count: Option<String>,
    pub categories: Option<String>,
    pub equipment: Option<String>,
    pub tags: Option<String>,
    pub image: Option<String>,
    pub captured_at: String,
    pub protein_percent: Option<String>,
    pub protein_grams: Option<String>,
    pub fat_percent: Option<String>,
    pub fat_grams: Option<String>,
    pub carb_percent: Option<String>,
    pub carb_grams: Option<String>,
    pub calories_per_100g: Option<String>,
    pub calories_total: Option<String>,
    pub gi_min: Option<String>,
    pub gi_avg: Option<String>,
    pub gi_max: Option<String>,
    pub total_weight_grams: Option<String>,
}

impl RecipeRecord {
    /// Creates a record with the required fields and a capture timestamp
    pub fn new(title: String, instructions: String, ingredients: String, url: String) -> Self {
        Self {
            title,
            instructions,
            ingredients,
            url,
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ..Self::default()
        }
    }

    /// Values in TSV column order, whitespace-collapsed so embedded tabs and
    /// newlines can never break the row format
    pub fn to_row(&self) -> Vec<String> {
        let clean_opt = |v: &Option<String>| v.as_deref().map(collapse_ws).unwrap_or_default();
        vec![
            collapse_ws(&self.title),
            collapse_ws(&self.instructions),
            collapse_ws(&self.ingredients),
            collapse_ws(&self.url),
            clean_opt(&self.description),
            clean_opt(&self.author),
            clean_opt(&self.total_time),
            clean_opt(&self.servings),
            clean_opt(&self.calories),
            clean_opt(&self.rating_value),
            clean_opt(&self.rating_count),
            clean_opt(&self.categories),
            clean_opt(&self.equipment),
            clean_opt(&self.tags),
            clean_opt(&self.image),
            collapse_ws(&self.captured_at),
            clean_opt(&self.protein_percent),
            clean_opt(&self.protein_grams),
            clean_opt(&self.fat_percent),
            clean_opt(&self.fat_grams),
            clean_opt(&self.carb_percent),
            clean_opt(&self.carb_grams),
            clean_opt(&self.calories_per_100g),
            clean_opt(&self.calories_total),
            clean_opt(&self.gi_min),
            clean_opt(&self.gi_avg),
            clean_opt(&self.gi_max),
            clean_opt(&self.total_weight_grams),
        ]
    }

    /// JSON object with the same cleaned values as the TSV row
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, value) in TSV_HEADERS.iter().zip(self.to_row()) {
            map.insert(key.to_string(), serde_json::Value::String(value));
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_matches_header_count() {
        let record = RecipeRecord::new(
            "Borscht".into(),
            "Step 1\nStep 2".into(),
            "beets, cabbage".into(),
            "https://1000.menu/cooking/1".into(),
        );
        assert_eq!(record.to_row().len(), TSV_HEADERS.len());
    }

    #[test]
    fn test_row_collapses_control_whitespace() {
        let record = RecipeRecord::new(
            "A\ttitle".into(),
            "line one\nline two".into(),
            "x".into(),
            "https://1000.menu/cooking/1".into(),
        );
        let row = record.to_row();
        assert_eq!(row[0], "A title");
        assert_eq!(row[1], "line one line two");
    }

    #[test]
    fn test_missing_optionals_are_empty_columns() {
        let record = RecipeRecord::new("t".into(), "i".into(), "g".into(), "u".into());
        let row = record.to_row();
        assert_eq!(row[4], ""); // description
        assert_eq!(row[27], ""); // total_weight_grams
    }

    #[test]
    fn test_json_mirrors_row_values() {
        let mut record = RecipeRecord::new("t".into(), "i".into(), "g".into(), "u".into());
        record.author = Some("  someone \u{a0} else ".into());
        let json = record.to_json();
        assert_eq!(json["title"], "t");
        assert_eq!(json["author"], "someone else");
        assert_eq!(json.as_object().unwrap().len(), TSV_HEADERS.len());
    }

    #[test]
    fn test_captured_at_is_set() {
        let record = RecipeRecord::new("t".into(), "i".into(), "g".into(), "u".into());
        assert!(!record.captured_at.is_empty());
    }
}
