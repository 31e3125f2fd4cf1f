use crate::model::activation::ActivationSet;
use crate::model::attribution::{AttributionMethod, AttributionResult};
use crate::model::descriptor::{LayerCatalog, ModelDescriptor};
use crate::model::prediction::PredictionSet;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelState {
    /// Nothing known about the backend's model yet.
    #[default]
    Unloaded,
    /// A preset load or custom upload is in flight.
    Loading { previous: Option<ModelDescriptor> },
    Ready(ModelDescriptor),
    /// The last load failed; `previous` is whatever was active before it.
    LoadFailed { previous: Option<ModelDescriptor>, error: String },
}

impl ModelState {
    /// The descriptor the backend is believed to be serving.
    pub fn descriptor(&self) -> Option<&ModelDescriptor> {
        match self {
            ModelState::Ready(desc) => Some(desc),
            ModelState::Loading { previous } | ModelState::LoadFailed { previous, .. } => previous.as_ref(),
            ModelState::Unloaded => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ImageState {
    #[default]
    Empty,
    Uploading { file_name: String },
    Analyzed { file_name: String, predictions: PredictionSet },
    Failed { file_name: String, error: String },
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LayerState {
    #[default]
    None,
    Loading,
    Loaded(LayerCatalog),
    Failed(String),
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    Unselected,
    /// Activations for `0` are being fetched.
    Selecting(String),
    Selected { layer: String, activations: ActivationSet },
    Failed { layer: String, error: String },
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributionState {
    #[default]
    Idle,
    Computing(AttributionMethod),
    Done(AttributionResult),
    Failed { method: AttributionMethod, error: String },
}

// ---------------------------------------------------------------------------
// Whole session
// ---------------------------------------------------------------------------

/// Everything a presentation layer can observe. Cloned out by
/// `AnalysisSession::snapshot`; never mutated from outside the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub model:       ModelState,
    pub image:       ImageState,
    pub layers:      LayerState,
    pub selection:   SelectionState,
    pub attribution: AttributionState,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::default()
    }

    pub fn model_descriptor(&self) -> Option<&ModelDescriptor> {
        self.model.descriptor()
    }

    pub fn predictions(&self) -> Option<&PredictionSet> {
        match &self.image {
            ImageState::Analyzed { predictions, .. } => Some(predictions),
            _ => None,
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(self.image, ImageState::Analyzed { .. })
    }

    pub fn layer_catalog(&self) -> Option<&LayerCatalog> {
        match &self.layers {
            LayerState::Loaded(catalog) => Some(catalog),
            _ => None,
        }
    }

    /// Layer names in display order; empty unless a catalog is loaded.
    pub fn layer_names(&self) -> &[String] {
        self.layer_catalog().map(|c| c.names()).unwrap_or(&[])
    }

    /// The layer the user has chosen, while its activations load or once they
    /// have arrived. A failed fetch does not count as a selection.
    pub fn selected_layer(&self) -> Option<&str> {
        match &self.selection {
            SelectionState::Selecting(layer) | SelectionState::Selected { layer, .. } => Some(layer),
            _ => None,
        }
    }

    pub fn activations(&self) -> Option<&ActivationSet> {
        match &self.selection {
            SelectionState::Selected { activations, .. } => Some(activations),
            _ => None,
        }
    }

    pub fn attribution_result(&self) -> Option<&AttributionResult> {
        match &self.attribution {
            AttributionState::Done(result) => Some(result),
            _ => None,
        }
    }

    /// True while any slice is waiting on the backend.
    pub fn is_busy(&self) -> bool {
        matches!(self.model, ModelState::Loading { .. })
            || matches!(self.image, ImageState::Uploading { .. })
            || matches!(self.layers, LayerState::Loading)
            || matches!(self.selection, SelectionState::Selecting(_))
            || matches!(self.attribution, AttributionState::Computing(_))
    }

    /// Most recent error per slice, for display.
    pub fn errors(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let ModelState::LoadFailed { error, .. } = &self.model {
            out.push(("model", error.as_str()));
        }
        if let ImageState::Failed { error, .. } = &self.image {
            out.push(("image", error.as_str()));
        }
        if let LayerState::Failed(error) = &self.layers {
            out.push(("layers", error.as_str()));
        }
        if let SelectionState::Failed { error, .. } = &self.selection {
            out.push(("selection", error.as_str()));
        }
        if let AttributionState::Failed { error, .. } = &self.attribution {
            out.push(("attribution", error.as_str()));
        }
        out
    }

    /// Drops everything derived from the previous model.
    pub(crate) fn reset_model_dependents(&mut self) {
        self.image       = ImageState::Empty;
        self.layers      = LayerState::None;
        self.selection   = SelectionState::Unselected;
        self.attribution = AttributionState::Idle;
    }
}
