use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::error::ValidationError;

/// Architectures the backend can instantiate before loading a bare state dict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Resnet18,
    Resnet50,
    Vgg16,
}

impl Architecture {
    pub fn id(self) -> &'static str {
        match self {
            Architecture::Resnet18 => "resnet18",
            Architecture::Resnet50 => "resnet50",
            Architecture::Vgg16    => "vgg16",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "resnet18" => Ok(Architecture::Resnet18),
            "resnet50" => Ok(Architecture::Resnet50),
            "vgg16"    => Ok(Architecture::Vgg16),
            other      => Err(format!("unknown architecture '{}' (expected resnet18, resnet50 or vgg16)", other)),
        }
    }
}

/// Parameters sent alongside a custom weights upload.
///
/// Without `architecture` the backend expects a fully pickled module rather
/// than a state dict.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomModelConfig {
    pub input_size: u32,
    pub mean: [f64; 3],
    pub std: [f64; 3],
    pub architecture: Option<Architecture>,
}

impl Default for CustomModelConfig {
    fn default() -> Self {
        CustomModelConfig {
            input_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            architecture: Some(Architecture::Resnet18),
        }
    }
}

impl CustomModelConfig {
    /// Builds a config from loosely-typed input (e.g. CLI values), checking
    /// that `mean` and `std` have exactly three entries.
    pub fn from_parts(
        input_size: u32,
        mean: &[f64],
        std: &[f64],
        architecture: Option<Architecture>,
    ) -> Result<Self, ValidationError> {
        let mean: [f64; 3] = mean.try_into().map_err(|_| {
            ValidationError::InvalidModelConfig(format!("mean needs exactly 3 values, got {}", mean.len()))
        })?;
        let std: [f64; 3] = std.try_into().map_err(|_| {
            ValidationError::InvalidModelConfig(format!("std needs exactly 3 values, got {}", std.len()))
        })?;
        Ok(CustomModelConfig { input_size, mean, std, architecture })
    }

    /// Rejects configs the backend could not normalize with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input_size == 0 {
            return Err(ValidationError::InvalidModelConfig("input size must be positive".into()));
        }
        if let Some(v) = self.mean.iter().find(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidModelConfig(format!("mean contains non-finite value {}", v)));
        }
        if let Some(v) = self.std.iter().find(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidModelConfig(format!("std contains non-finite value {}", v)));
        }
        if self.std.iter().any(|v| *v == 0.0) {
            return Err(ValidationError::InvalidModelConfig("std must not contain zero".into()));
        }
        Ok(())
    }

    /// Multipart text fields in the order the backend form declares them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("input_size", self.input_size.to_string()),
            ("mean_r", self.mean[0].to_string()),
            ("mean_g", self.mean[1].to_string()),
            ("mean_b", self.mean[2].to_string()),
            ("std_r", self.std[0].to_string()),
            ("std_g", self.std[1].to_string()),
            ("std_b", self.std[2].to_string()),
        ];
        if let Some(arch) = self.architecture {
            fields.push(("architecture", arch.id().to_owned()));
        }
        fields
    }
}
