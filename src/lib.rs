pub mod config;
pub mod error;
pub mod model;
pub mod gateway;
pub mod session;

// Convenience re-exports
pub use config::GatewayConfig;
pub use error::{GatewayError, ValidationError};
pub use model::activation::{Activation, ActivationSet, ActivationStats, EncodedImage};
pub use model::attribution::{AttributionMethod, AttributionOptions, AttributionParams, AttributionResult, MethodInfo};
pub use model::custom::{Architecture, CustomModelConfig};
pub use model::descriptor::{LayerCatalog, LayerDescriptor, ModelDescriptor, Normalization};
pub use model::prediction::PredictionSet;
pub use model::upload::FileUpload;
pub use gateway::{Backend, CustomModelOutcome, ImageAnalysis};
pub use gateway::http::HttpGateway;
pub use session::{AnalysisSession, Outcome, SessionState};
