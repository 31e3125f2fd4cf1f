use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use serde::{Serialize, Deserialize};

/// An opaque encoded image (PNG in practice) as delivered by the backend:
/// base64 text that can be embedded directly in a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn from_base64(text: impl Into<String>) -> Self {
        EncodedImage(text.into())
    }

    /// Base64-encodes raw image bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        EncodedImage(STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Raw encoded bytes (still PNG/JPEG/..., not pixels).
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.as_bytes())
    }

    /// Sniffs the container format from the magic bytes.
    pub fn format(&self) -> Result<ImageFormat, String> {
        let bytes = self.decode().map_err(|e| e.to_string())?;
        image::guess_format(&bytes).map_err(|e| e.to_string())
    }

    /// Decodes all the way down to pixels.
    pub fn to_image(&self) -> Result<DynamicImage, String> {
        let bytes = self.decode().map_err(|e| e.to_string())?;
        image::load_from_memory(&bytes).map_err(|e| e.to_string())
    }

    /// `data:<mime>;base64,<payload>` for inline display. Falls back to
    /// `image/png`, the only format the backend emits, when sniffing fails.
    pub fn to_data_uri(&self) -> String {
        let mime = match self.format() {
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            Ok(ImageFormat::Gif)  => "image/gif",
            Ok(ImageFormat::Bmp)  => "image/bmp",
            _                     => "image/png",
        };
        format!("data:{};base64,{}", mime, self.0)
    }
}

/// One channel of a layer's activation, rendered as an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub channel: usize,
    pub image: EncodedImage,
}

/// All channels of one layer for the current image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivationSet {
    #[serde(default)]
    pub layer: String,
    /// Tensor shape `[batch, channels, height, width]` as reported by the backend.
    #[serde(default)]
    pub shape: Vec<usize>,
    pub activations: Vec<Activation>,
}

impl ActivationSet {
    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }

    pub fn channel(&self, channel: usize) -> Option<&Activation> {
        self.activations.iter().find(|a| a.channel == channel)
    }
}

/// Summary statistics of a layer's raw activation tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationStats {
    pub layer: String,
    pub shape: Vec<usize>,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}
