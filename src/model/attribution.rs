use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::model::activation::EncodedImage;

/// Which backend attribution computation to run.
///
/// - `GradCam`: gradient-weighted class activation map of a layer
/// - `GuidedGradCam`: GradCAM combined with guided backprop
/// - `Saliency`: input-gradient magnitude
/// - `IntegratedGradients`: path-integrated gradients from a black baseline
/// - `Occlusion`: sliding-window occlusion sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributionMethod {
    #[serde(rename = "gradcam")]
    GradCam,
    #[serde(rename = "guided_gradcam")]
    GuidedGradCam,
    #[serde(rename = "saliency")]
    Saliency,
    #[serde(rename = "integrated_gradients")]
    IntegratedGradients,
    #[serde(rename = "occlusion")]
    Occlusion,
}

impl AttributionMethod {
    pub const ALL: [AttributionMethod; 5] = [
        AttributionMethod::GradCam,
        AttributionMethod::GuidedGradCam,
        AttributionMethod::Saliency,
        AttributionMethod::IntegratedGradients,
        AttributionMethod::Occlusion,
    ];

    /// Wire identifier, also the endpoint's last path segment.
    pub fn id(self) -> &'static str {
        match self {
            AttributionMethod::GradCam             => "gradcam",
            AttributionMethod::GuidedGradCam       => "guided_gradcam",
            AttributionMethod::Saliency            => "saliency",
            AttributionMethod::IntegratedGradients => "integrated_gradients",
            AttributionMethod::Occlusion           => "occlusion",
        }
    }

    /// Layer-dependent methods need a selected layer.
    pub fn requires_layer(self) -> bool {
        matches!(self, AttributionMethod::GradCam | AttributionMethod::GuidedGradCam)
    }
}

impl fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AttributionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        AttributionMethod::ALL
            .into_iter()
            .find(|m| m.id() == wanted)
            .ok_or_else(|| format!(
                "unknown attribution method '{}' (expected one of: {})",
                s,
                AttributionMethod::ALL.map(|m| m.id()).join(", ")
            ))
    }
}

/// Tunables for the methods that take them. Defaults match the backend's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionOptions {
    /// Integrated gradients interpolation steps.
    pub steps: u32,
    /// Occlusion window edge in pixels.
    pub window_size: u32,
    /// Occlusion window stride in pixels.
    pub stride: u32,
}

impl Default for AttributionOptions {
    fn default() -> Self {
        AttributionOptions { steps: 50, window_size: 15, stride: 8 }
    }
}

/// A fully-specified attribution request: the method plus exactly the
/// parameters its endpoint takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributionParams {
    GradCam { layer_name: String },
    GuidedGradCam { layer_name: String },
    Saliency,
    IntegratedGradients { steps: u32 },
    Occlusion { window_size: u32, stride: u32 },
}

impl AttributionParams {
    pub fn method(&self) -> AttributionMethod {
        match self {
            AttributionParams::GradCam { .. }             => AttributionMethod::GradCam,
            AttributionParams::GuidedGradCam { .. }       => AttributionMethod::GuidedGradCam,
            AttributionParams::Saliency                   => AttributionMethod::Saliency,
            AttributionParams::IntegratedGradients { .. } => AttributionMethod::IntegratedGradients,
            AttributionParams::Occlusion { .. }           => AttributionMethod::Occlusion,
        }
    }

    /// The layer a layer-dependent request targets.
    pub fn layer_name(&self) -> Option<&str> {
        match self {
            AttributionParams::GradCam { layer_name }
            | AttributionParams::GuidedGradCam { layer_name } => Some(layer_name),
            _ => None,
        }
    }

    /// JSON request body, or `None` for endpoints that take no body.
    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            AttributionParams::GradCam { layer_name }
            | AttributionParams::GuidedGradCam { layer_name } => {
                Some(serde_json::json!({ "layer_name": layer_name }))
            }
            AttributionParams::Saliency => None,
            AttributionParams::IntegratedGradients { steps } => {
                Some(serde_json::json!({ "steps": steps }))
            }
            AttributionParams::Occlusion { window_size, stride } => {
                Some(serde_json::json!({ "window_size": window_size, "stride": stride }))
            }
        }
    }
}

/// One computed heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub method: AttributionMethod,
    /// Colour-mapped heatmap.
    pub heatmap: EncodedImage,
    /// Class the attribution explains (the top-1 prediction).
    pub target_class: usize,
    /// Layer the attribution was computed against, for layer-dependent methods.
    #[serde(default)]
    pub layer: Option<String>,
    /// Grayscale attribution before colour mapping.
    #[serde(default)]
    pub attribution: Option<EncodedImage>,
}

/// Entry of `GET /attribution/methods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub description: String,
    pub requires_layer: bool,
}
