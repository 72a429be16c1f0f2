use serde::{Serialize, Serializer};

/// Marker written in place of any value the nutrition API did not provide.
pub const UNKNOWN_MARKER: &str = "N/A";

/// Top prediction of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

/// A nutrient amount, or the explicit unknown marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NutrientValue {
    Known(f64),
    Unknown,
}

impl From<Option<f64>> for NutrientValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl Serialize for NutrientValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(amount) => serializer.serialize_f64(*amount),
            Self::Unknown => serializer.serialize_str(UNKNOWN_MARKER),
        }
    }
}

/// Nutrition facts in the shape returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRecord {
    #[serde(rename = "Food Name")]
    pub food_name: String,
    #[serde(rename = "Calories")]
    pub calories: NutrientValue,
    #[serde(rename = "Protein")]
    pub protein: NutrientValue,
    #[serde(rename = "Carbs")]
    pub carbs: NutrientValue,
    #[serde(rename = "Fats")]
    pub fats: NutrientValue,
}

#[derive(Debug, Serialize)]
pub struct RecognitionResponse {
    pub food_name: String,
    pub confidence: f32,
    pub nutritional_info: NutritionRecord,
}

impl RecognitionResponse {
    #[must_use]
    pub fn new(prediction: ClassificationResult, nutrition: NutritionRecord) -> Self {
        Self {
            food_name: prediction.label,
            confidence: prediction.confidence,
            nutritional_info: nutrition,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_nutrients_serialize_as_marker() {
        let record = NutritionRecord {
            food_name: "Pizza, cheese".into(),
            calories: NutrientValue::Known(266.0),
            protein: NutrientValue::Known(11.4),
            carbs: NutrientValue::Known(33.3),
            fats: NutrientValue::Unknown,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "Food Name": "Pizza, cheese",
                "Calories": 266.0,
                "Protein": 11.4,
                "Carbs": 33.3,
                "Fats": "N/A",
            })
        );
    }
}
