//! Waste classification

use agrimarket::analysis::{AnalysisRequest, WasteAnalysis};
use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::warn;

mod client;
pub mod errors;

pub use client::{DEFAULT_VISION_API_URL, DEFAULT_VISION_MODEL, VisionClient, VisionConfig};
pub use errors::VisionError;

/// Classifies a waste photo.
#[automock]
#[async_trait]
pub trait WasteClassifier: Send + Sync {
    /// Classify the waste shown in an image given as a `data:` URL.
    async fn classify(
        &self,
        image_data_url: &str,
        request: &AnalysisRequest,
    ) -> Result<WasteAnalysis, VisionError>;
}

/// Classify an image, substituting the generic fallback result on any failure so a
/// farmer can still create a listing.
pub async fn classify_or_fallback(
    classifier: &dyn WasteClassifier,
    image_data_url: &str,
    request: &AnalysisRequest,
) -> WasteAnalysis {
    match classifier.classify(image_data_url, request).await {
        Ok(analysis) => analysis,
        Err(error) => {
            warn!(file = %request.file_name, "waste classification failed: {error}");

            WasteAnalysis {
                file_name: Some(request.file_name.clone()),
                analysed_at: Some(Timestamp::now()),
                ..WasteAnalysis::fallback(&error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_fall_back_to_generic_result() {
        let mut classifier = MockWasteClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Err(VisionError::MissingApiKey));

        let request = AnalysisRequest {
            file_name: "husk.jpg".to_string(),
            ..AnalysisRequest::default()
        };

        let analysis = classify_or_fallback(&classifier, "data:image/jpeg;base64,", &request).await;

        assert!(!analysis.success);
        assert_eq!(analysis.waste_type, "Agricultural Waste");
        assert_eq!(analysis.confidence, 50);
        assert_eq!(analysis.file_name.as_deref(), Some("husk.jpg"));
        assert_eq!(
            analysis.error.as_deref(),
            Some(VisionError::MissingApiKey.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn successful_classification_is_passed_through() {
        let mut classifier = MockWasteClassifier::new();
        classifier.expect_classify().returning(|_, _| {
            Ok(WasteAnalysis {
                waste_type: "Rice Husk".to_string(),
                confidence: 91,
                success: true,
                error: None,
                ..WasteAnalysis::fallback("unused")
            })
        });

        let analysis =
            classify_or_fallback(&classifier, "data:image/jpeg;base64,", &AnalysisRequest::default())
                .await;

        assert!(analysis.success);
        assert_eq!(analysis.waste_type, "Rice Husk");
        assert_eq!(analysis.confidence, 91);
    }
}
