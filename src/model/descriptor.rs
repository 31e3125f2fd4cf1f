use std::collections::HashMap;
use serde::{Serialize, Deserialize, Deserializer};

/// Per-channel input normalization (R, G, B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f64; 3],
    pub std: [f64; 3],
}

impl Default for Normalization {
    /// ImageNet statistics, which every preset model uses.
    fn default() -> Self {
        Normalization {
            mean: [0.485, 0.456, 0.406],
            std:  [0.229, 0.224, 0.225],
        }
    }
}

/// Identifies the model currently loaded on the backend.
///
/// Replaced wholesale whenever the model changes; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model name, or the weights file name for custom uploads. The backend
    /// reports `null` before its first load; that decodes as an empty string.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Square input edge in pixels.
    pub input_size: u32,
    #[serde(default)]
    pub normalization: Normalization,
    /// Number of introspectable (convolutional) layers.
    #[serde(default)]
    pub num_layers: usize,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One introspectable layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub in_channels: usize,
    pub out_channels: usize,
    #[serde(default)]
    pub kernel_size: Vec<u32>,
}

/// Wire shape of `GET /layers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LayerListing {
    pub layers: Vec<String>,
    pub info: HashMap<String, LayerDescriptor>,
}

/// The layers of the current model, in display order.
///
/// Every name returned by `names()` has a descriptor; names the backend listed
/// without one are dropped when the catalog is built, so callers can never be
/// handed a key that `get` would not resolve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerCatalog {
    order: Vec<String>,
    info: HashMap<String, LayerDescriptor>,
}

impl LayerCatalog {
    /// Builds a catalog from an ordered name list plus descriptors.
    pub fn new(order: Vec<String>, info: HashMap<String, LayerDescriptor>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let order = order
            .into_iter()
            .filter(|name| info.contains_key(name) && seen.insert(name.clone()))
            .collect();
        LayerCatalog { order, info }
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&LayerDescriptor> {
        if self.contains(name) { self.info.get(name) } else { None }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(name, descriptor)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayerDescriptor)> {
        self.order.iter().filter_map(move |name| self.info.get(name).map(|d| (name.as_str(), d)))
    }
}

impl From<LayerListing> for LayerCatalog {
    fn from(listing: LayerListing) -> Self {
        LayerCatalog::new(listing.layers, listing.info)
    }
}
