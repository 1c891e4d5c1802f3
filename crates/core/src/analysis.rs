//! Waste Analysis
//!
//! Result types for classifying a photo of agricultural waste, plus the parsing of a
//! vision model's free-text reply into those types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Waste types the classifier is asked to choose from, with the visual cues it
/// should look for.
pub const KNOWN_WASTE_TYPES: [(&str, &str); 6] = [
    ("Rice Husk", "Tiny, flaky, light-brown V-shaped shells."),
    ("Wheat Straw", "Long, hollow, golden-yellow tubes."),
    ("Sugarcane Bagasse", "Coarse, crushed, stringy fiber."),
    ("Cotton Stalks", "Dark, woody, branched sticks."),
    ("Corn Stover", "Large flat leaves and thick stalk segments."),
    ("Groundnut Shells", "Rugged, tan, oval-shaped pods."),
];

/// Metadata sent alongside the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Original file name of the photo.
    pub file_name: String,

    /// Where the waste is, as reported by the farmer.
    pub location: String,

    /// Reported quantity.
    pub quantity: String,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            file_name: "waste-image.jpg".to_string(),
            location: "Not Specified".to_string(),
            quantity: "1".to_string(),
        }
    }
}

/// Classification of one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteAnalysis {
    /// One of the known waste types, or the model's own label.
    pub waste_type: String,

    /// Short visual justification.
    pub reasoning: String,

    /// Excellent / Good / Average / Poor.
    pub quality: String,

    /// Confidence in percent, 0 to 100.
    pub confidence: u8,

    /// Suggested price range, e.g. "₹3-5 per kg".
    pub suggested_price: String,

    /// Industries likely to buy this waste.
    pub industries: Vec<String>,

    /// Weight estimate, when the photo allows one.
    pub estimated_weight: String,

    /// Name of the analysed file.
    pub file_name: Option<String>,

    /// When the analysis finished.
    pub analysed_at: Option<Timestamp>,

    /// `false` when this is the fallback result.
    pub success: bool,

    /// Why the fallback result was returned.
    pub error: Option<String>,
}

impl WasteAnalysis {
    /// Generic result used when classification fails, so a farmer can still list.
    #[must_use]
    pub fn fallback(reason: &str) -> Self {
        Self {
            waste_type: "Agricultural Waste".to_string(),
            reasoning: format!("Analysis failed: {reason}"),
            quality: "Good".to_string(),
            confidence: 50,
            suggested_price: "₹3 - ₹8 per kg".to_string(),
            industries: vec![
                "Biomass Energy".to_string(),
                "Composting".to_string(),
                "Animal Feed".to_string(),
            ],
            estimated_weight: "200-800 kg".to_string(),
            file_name: None,
            analysed_at: None,
            success: false,
            error: Some(reason.to_string()),
        }
    }
}

/// Errors turning a model reply into a [`WasteAnalysis`].
#[derive(Debug, Error)]
pub enum AnalysisParseError {
    #[error("no JSON object found in model reply")]
    MissingJson,

    #[error("model reply is not valid JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    waste_type: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    suggested_price: Option<String>,
    #[serde(default)]
    industries: Option<Vec<String>>,
    #[serde(default)]
    estimated_weight: Option<Value>,
}

/// Extract and parse the JSON object embedded in a model reply.
///
/// Models sometimes wrap the object in prose or code fences; everything from the
/// first `{` to the last `}` is taken as the object.
///
/// # Errors
///
/// Returns an error when the reply holds no object or the object is malformed.
pub fn parse_model_reply(
    reply: &str,
    request: &AnalysisRequest,
) -> Result<WasteAnalysis, AnalysisParseError> {
    let json = extract_json_object(reply).ok_or(AnalysisParseError::MissingJson)?;
    let raw: RawAnalysis = serde_json::from_str(json)?;

    Ok(WasteAnalysis {
        waste_type: raw.waste_type.unwrap_or_else(|| "Unknown".to_string()),
        reasoning: raw
            .reasoning
            .unwrap_or_else(|| "Analysis complete.".to_string()),
        quality: raw.quality.unwrap_or_else(|| "Standard".to_string()),
        confidence: raw.confidence.as_ref().map_or(0, confidence_percent),
        suggested_price: raw
            .suggested_price
            .unwrap_or_else(|| "Market Rate".to_string()),
        industries: raw.industries.unwrap_or_default(),
        estimated_weight: raw
            .estimated_weight
            .as_ref()
            .and_then(value_to_text)
            .unwrap_or_else(|| request.quantity.clone()),
        file_name: Some(request.file_name.clone()),
        analysed_at: Some(Timestamp::now()),
        success: true,
        error: None,
    })
}

fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;

    reply.get(start..=end)
}

/// Normalise a confidence value to whole percent.
///
/// Values in `(0, 1]` are read as fractions, anything else as percent; the result
/// is clamped to `0..=100`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped to 0..=100 before the cast"
)]
fn confidence_percent(value: &Value) -> u8 {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };

    let Some(number) = number.filter(|n| n.is_finite()) else {
        return 0;
    };

    let percent = if number > 0.0 && number <= 1.0 {
        number * 100.0
    } else {
        number
    };

    percent.clamp(0.0, 100.0).round() as u8
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
