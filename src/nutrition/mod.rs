//! Nutrition lookup with a cascading fallback ladder.
//!
//! Classifier labels (`chicken_quesadilla`) rarely match an FDC food name
//! exactly, so the resolver widens the query step by step and takes the
//! first usable hit:
//!
//! 1. direct lookup of the full phrase,
//! 2. free-text search for the full phrase,
//! 3. free-text search for the phrase's first word.

mod fdc;

pub use fdc::{parse_food_response, parse_search_response, FdcClient, FoodRecord};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::errors::LookupError;
use crate::models::{NutrientValue, NutritionRecord, UNKNOWN_MARKER};

pub const ENERGY: &str = "Energy";
pub const PROTEIN: &str = "Protein";
pub const CARBOHYDRATE: &str = "Carbohydrate, by difference";
pub const TOTAL_FAT: &str = "Total lipid (fat)";

/// Transport to a food-composition database.
#[async_trait]
pub trait FoodDataApi: Send + Sync {
    /// Single-item lookup by name. `Ok(None)` when the service has no usable
    /// entry for `name`.
    async fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>, LookupError>;

    /// Free-text search, best match first.
    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError>;
}

#[async_trait]
pub trait NutritionLookup: Send + Sync {
    async fn lookup(&self, food_label: &str) -> Result<NutritionRecord, LookupError>;
}

impl From<&FoodRecord> for NutritionRecord {
    fn from(food: &FoodRecord) -> Self {
        Self {
            food_name: food
                .description
                .clone()
                .unwrap_or_else(|| UNKNOWN_MARKER.to_owned()),
            calories: NutrientValue::from(food.nutrient(ENERGY)),
            protein: NutrientValue::from(food.nutrient(PROTEIN)),
            carbs: NutrientValue::from(food.nutrient(CARBOHYDRATE)),
            fats: NutrientValue::from(food.nutrient(TOTAL_FAT)),
        }
    }
}

/// Turn a classifier label into a search phrase.
#[must_use]
pub fn query_phrase(food_label: &str) -> String {
    food_label.replace('_', " ")
}

pub struct NutritionResolver<A> {
    api: A,
}

impl<A: FoodDataApi> NutritionResolver<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: FoodDataApi> NutritionLookup for NutritionResolver<A> {
    async fn lookup(&self, food_label: &str) -> Result<NutritionRecord, LookupError> {
        let phrase = query_phrase(food_label);

        match self.api.food_by_name(&phrase).await {
            Ok(Some(food)) => {
                info!(%phrase, step = "direct", "nutrition match");
                return Ok(NutritionRecord::from(&food));
            }
            Ok(None) => debug!(%phrase, "no direct match"),
            Err(e) => warn!(%phrase, error = ?e, "direct lookup failed, falling back to search"),
        }

        if let Some(food) = self.api.search(&phrase).await?.first() {
            info!(%phrase, step = "phrase_search", "nutrition match");
            return Ok(NutritionRecord::from(food));
        }

        let Some(first_word) = phrase.split_whitespace().next() else {
            return Err(LookupError::NotFound);
        };

        let foods = self.api.search(first_word).await?;
        let food = foods.first().ok_or(LookupError::NotFound)?;
        info!(%phrase, query = first_word, step = "first_word_search", "nutrition match");
        Ok(NutritionRecord::from(food))
    }
}
