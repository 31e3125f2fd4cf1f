pub mod http;
pub mod multipart;

use serde::{Serialize, Deserialize};

use crate::error::GatewayError;
use crate::model::activation::{Activation, ActivationSet, ActivationStats};
use crate::model::attribution::{AttributionParams, AttributionResult, MethodInfo};
use crate::model::custom::CustomModelConfig;
use crate::model::descriptor::{LayerCatalog, ModelDescriptor};
use crate::model::prediction::PredictionSet;
use crate::model::upload::FileUpload;

/// Response to an image upload: predictions plus the model that produced them,
/// which may differ from the client's cached view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub predictions: PredictionSet,
    pub model_info: ModelDescriptor,
}

/// Result of a custom weights upload. A rejection (incompatible weights,
/// missing architecture, ...) is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomModelOutcome {
    Accepted,
    Rejected { detail: String },
}

/// One method per backend endpoint. Implementations hold no analysis state:
/// every call is a single independent request and may be repeated freely.
pub trait Backend: Send + Sync {
    /// `POST /upload`
    fn upload_image(&self, image: &FileUpload) -> Result<ImageAnalysis, GatewayError>;

    /// `GET /layers`
    fn list_layers(&self) -> Result<LayerCatalog, GatewayError>;

    /// `GET /activations/{layer}`
    fn get_activations(&self, layer_name: &str) -> Result<ActivationSet, GatewayError>;

    /// `GET /activations/{layer}?channel=N`
    fn get_activation_channel(&self, layer_name: &str, channel: usize) -> Result<Activation, GatewayError>;

    /// `GET /activations/{layer}/stats`
    fn get_activation_stats(&self, layer_name: &str) -> Result<ActivationStats, GatewayError>;

    /// `GET /models`
    fn list_models(&self) -> Result<Vec<String>, GatewayError>;

    /// `POST /models/load`
    fn load_model(&self, model_name: &str) -> Result<(), GatewayError>;

    /// `GET /models/info`
    fn model_info(&self) -> Result<ModelDescriptor, GatewayError>;

    /// `POST /models/upload`
    fn upload_custom_model(
        &self,
        weights: &FileUpload,
        config: &CustomModelConfig,
    ) -> Result<CustomModelOutcome, GatewayError>;

    /// `GET /attribution/methods`
    fn list_attribution_methods(&self) -> Result<Vec<MethodInfo>, GatewayError>;

    /// `POST /attribution/{method}`
    fn compute_attribution(&self, params: &AttributionParams) -> Result<AttributionResult, GatewayError>;
}
