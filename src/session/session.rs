use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{GatewayError, ValidationError};
use crate::gateway::{Backend, CustomModelOutcome};
use crate::model::attribution::{AttributionMethod, AttributionOptions, AttributionParams};
use crate::model::custom::CustomModelConfig;
use crate::model::descriptor::LayerCatalog;
use crate::model::upload::FileUpload;
use crate::session::sequence::{SequenceBook, Ticket};
use crate::session::state::{
    AttributionState, ImageState, LayerState, ModelState, SelectionState, SessionState,
};

/// How an operation's response was applied.
///
/// - `Committed`: the response was the latest for its slice and is now state
/// - `Failed`: the latest response was an error; the slice holds it
/// - `Superseded`: a newer request (or a model change) overtook this one, so
///   the response was dropped without touching state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    Failed,
    Superseded,
}

struct Inner {
    state: SessionState,
    seqs: SequenceBook,
}

/// Client-side analysis state plus the operations that mutate it.
///
/// Clones share the same state and backend, so an operation can be started
/// from any thread while others are still waiting on the backend. The lock
/// is held only while reading or committing state, never across a backend
/// call. Each slice accepts a response only from its most recently issued
/// request; anything older is dropped.
pub struct AnalysisSession<B: Backend> {
    backend: Arc<B>,
    inner: Arc<Mutex<Inner>>,
}

impl<B: Backend> Clone for AnalysisSession<B> {
    fn clone(&self) -> Self {
        AnalysisSession { backend: Arc::clone(&self.backend), inner: Arc::clone(&self.inner) }
    }
}

impl<B: Backend> AnalysisSession<B> {
    pub fn new(backend: B) -> Self {
        AnalysisSession::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        AnalysisSession {
            backend,
            inner: Arc::new(Mutex::new(Inner { state: SessionState::new(), seqs: SequenceBook::new() })),
        }
    }

    /// The gateway, for stateless lookups (model list, method list, stats).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Model
    // -----------------------------------------------------------------------

    /// Loads one of the backend's preset models.
    pub fn load_preset(&self, model_name: &str) -> Outcome {
        let ticket = self.begin_model_load();
        log::info!("loading preset model '{}' (request #{})", model_name, ticket.seq());
        let result = self.backend.load_model(model_name).map(|()| CustomModelOutcome::Accepted);
        self.finish_model_load(ticket, result)
    }

    /// Uploads custom weights. The config is checked before anything is sent.
    pub fn upload_custom(&self, weights: &FileUpload, config: &CustomModelConfig) -> Result<Outcome, ValidationError> {
        if let Err(err) = config.validate() {
            log::warn!("custom model '{}' rejected locally: {}", weights.file_name, err);
            return Err(err);
        }
        let ticket = self.begin_model_load();
        log::info!(
            "uploading custom model '{}' ({} bytes, request #{})",
            weights.file_name, weights.bytes.len(), ticket.seq()
        );
        let result = self.backend.upload_custom_model(weights, config);
        Ok(self.finish_model_load(ticket, result))
    }

    /// Re-reads the backend's model descriptor. A descriptor different from
    /// the cached one counts as a model change.
    pub fn refresh_model_info(&self) -> Outcome {
        let ticket = self.lock().seqs.model.issue();
        let result = self.backend.model_info();

        let mut inner = self.lock();
        if !inner.seqs.model.is_current(ticket) {
            log::debug!("discarding stale model info (request #{})", ticket.seq());
            return Outcome::Superseded;
        }
        match result {
            Ok(desc) => {
                if inner.state.model.descriptor() != Some(&desc) {
                    log::info!("backend model is now '{}'", desc.name);
                    inner.seqs.invalidate_model_dependents();
                    inner.state.reset_model_dependents();
                }
                inner.state.model = ModelState::Ready(desc);
                Outcome::Committed
            }
            Err(err) => {
                log::warn!("model info unavailable: {}", err);
                let previous = inner.state.model.descriptor().cloned();
                inner.state.model = ModelState::LoadFailed { previous, error: err.detail() };
                Outcome::Failed
            }
        }
    }

    /// Refreshes the model descriptor, drops the selection and re-fetches the
    /// layer list.
    pub fn refresh_model(&self) -> Outcome {
        let info = self.refresh_model_info();
        if info == Outcome::Superseded {
            return info;
        }
        self.clear();
        let layers = self.fetch_layers();
        if info == Outcome::Failed { Outcome::Failed } else { layers }
    }

    fn begin_model_load(&self) -> Ticket {
        let mut inner = self.lock();
        let ticket = inner.seqs.model.issue();
        let previous = inner.state.model.descriptor().cloned();
        inner.state.model = ModelState::Loading { previous };
        ticket
    }

    fn finish_model_load(&self, ticket: Ticket, result: Result<CustomModelOutcome, GatewayError>) -> Outcome {
        {
            let mut inner = self.lock();
            if !inner.seqs.model.is_current(ticket) {
                log::debug!("model load #{} superseded", ticket.seq());
                return Outcome::Superseded;
            }
            match result {
                Ok(CustomModelOutcome::Accepted) => {
                    inner.seqs.invalidate_model_dependents();
                    inner.state.reset_model_dependents();
                }
                Ok(CustomModelOutcome::Rejected { detail }) => {
                    return Self::fail_model_load(&mut inner, detail);
                }
                Err(err) => {
                    return Self::fail_model_load(&mut inner, err.detail());
                }
            }
        }

        let info = self.backend.model_info();
        let mut inner = self.lock();
        if !inner.seqs.model.is_current(ticket) {
            log::debug!("model info for load #{} superseded", ticket.seq());
            return Outcome::Superseded;
        }
        match info {
            Ok(desc) => {
                log::info!("model '{}' ready ({} layers)", desc.name, desc.num_layers);
                inner.state.model = ModelState::Ready(desc);
                Outcome::Committed
            }
            Err(err) => {
                log::warn!("model loaded but its descriptor is unavailable: {}", err);
                inner.state.model = ModelState::LoadFailed {
                    previous: None,
                    error: format!("model loaded but info unavailable: {}", err.detail()),
                };
                Outcome::Failed
            }
        }
    }

    fn fail_model_load(inner: &mut Inner, error: String) -> Outcome {
        log::warn!("model load failed: {}", error);
        let previous = inner.state.model.descriptor().cloned();
        inner.state.model = ModelState::LoadFailed { previous, error };
        Outcome::Failed
    }

    // -----------------------------------------------------------------------
    // Image + layers
    // -----------------------------------------------------------------------

    /// Uploads an image for analysis. On success the previous selection and
    /// attribution are dropped and the layer list is fetched straight away.
    ///
    /// The returned outcome describes the upload; a failed layer fetch shows
    /// up in the layer slice.
    pub fn upload(&self, image: &FileUpload) -> Outcome {
        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.seqs.image.issue();
            inner.state.image = ImageState::Uploading { file_name: image.file_name.clone() };
            ticket
        };
        log::info!("uploading image '{}' (request #{})", image.file_name, ticket.seq());
        let result = self.backend.upload_image(image);

        let layer_ticket = {
            let mut inner = self.lock();
            if !inner.seqs.image.is_current(ticket) {
                log::debug!("discarding stale upload #{}", ticket.seq());
                return Outcome::Superseded;
            }
            let analysis = match result {
                Ok(analysis) => analysis,
                Err(err) => {
                    log::warn!("image upload failed: {}", err);
                    inner.state.image = ImageState::Failed { file_name: image.file_name.clone(), error: err.detail() };
                    return Outcome::Failed;
                }
            };

            if !matches!(inner.state.model, ModelState::Loading { .. }) {
                inner.state.model = ModelState::Ready(analysis.model_info);
            }
            inner.state.image = ImageState::Analyzed {
                file_name: image.file_name.clone(),
                predictions: analysis.predictions,
            };
            inner.seqs.selection.invalidate();
            inner.state.selection = SelectionState::Unselected;
            inner.seqs.attribution.invalidate();
            inner.state.attribution = AttributionState::Idle;

            let layer_ticket = inner.seqs.layers.issue();
            inner.state.layers = LayerState::Loading;
            layer_ticket
        };

        self.commit_layers(layer_ticket, self.backend.list_layers());
        Outcome::Committed
    }

    fn fetch_layers(&self) -> Outcome {
        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.seqs.layers.issue();
            inner.state.layers = LayerState::Loading;
            ticket
        };
        self.commit_layers(ticket, self.backend.list_layers())
    }

    fn commit_layers(
        &self,
        ticket: Ticket,
        result: Result<LayerCatalog, GatewayError>,
    ) -> Outcome {
        let mut inner = self.lock();
        if !inner.seqs.layers.is_current(ticket) {
            log::debug!("discarding stale layer list #{}", ticket.seq());
            return Outcome::Superseded;
        }
        match result {
            Ok(catalog) => {
                log::debug!("layer list loaded: {} layers", catalog.len());
                let keeps_selection = inner.state.selected_layer().map_or(true, |l| catalog.contains(l));
                if !keeps_selection {
                    inner.seqs.selection.invalidate();
                    inner.state.selection = SelectionState::Unselected;
                }
                inner.state.layers = LayerState::Loaded(catalog);
                Outcome::Committed
            }
            Err(err) => {
                log::warn!("layer list unavailable: {}", err);
                inner.seqs.selection.invalidate();
                inner.state.selection = SelectionState::Unselected;
                inner.state.layers = LayerState::Failed(err.detail());
                Outcome::Failed
            }
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Selects a layer and fetches its activations. Only names from the
    /// current layer list are accepted. Selecting the same name again while a
    /// fetch is pending issues a new request; the latest one wins.
    pub fn select(&self, layer_name: &str) -> Result<Outcome, ValidationError> {
        let ticket = {
            let mut inner = self.lock();
            let known = inner.state.layer_catalog().map_or(false, |c| c.contains(layer_name));
            if !known {
                log::warn!("refusing to select unknown layer '{}'", layer_name);
                return Err(ValidationError::UnknownLayer(layer_name.to_owned()));
            }
            let ticket = inner.seqs.selection.issue();
            inner.state.selection = SelectionState::Selecting(layer_name.to_owned());
            ticket
        };
        log::info!("fetching activations for '{}' (request #{})", layer_name, ticket.seq());
        let result = self.backend.get_activations(layer_name);

        let mut inner = self.lock();
        if !inner.seqs.selection.is_current(ticket) {
            log::debug!("discarding stale activations for '{}' (request #{})", layer_name, ticket.seq());
            return Ok(Outcome::Superseded);
        }
        match result {
            Ok(activations) => {
                inner.state.selection = SelectionState::Selected { layer: layer_name.to_owned(), activations };
                Ok(Outcome::Committed)
            }
            Err(err) => {
                log::warn!("activations for '{}' unavailable: {}", layer_name, err);
                inner.state.selection = SelectionState::Failed { layer: layer_name.to_owned(), error: err.detail() };
                Ok(Outcome::Failed)
            }
        }
    }

    /// Drops the selection; any activation fetch still in flight is ignored.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.seqs.selection.invalidate();
        inner.state.selection = SelectionState::Unselected;
    }

    // -----------------------------------------------------------------------
    // Attribution
    // -----------------------------------------------------------------------

    /// Computes an attribution heatmap. GradCAM-style methods run against the
    /// currently selected layer.
    pub fn run_attribution(
        &self,
        method: AttributionMethod,
        options: AttributionOptions,
    ) -> Result<Outcome, ValidationError> {
        let (ticket, params) = {
            let mut inner = self.lock();
            let params = build_params(method, options, inner.state.selected_layer())
                .map_err(|err| {
                    log::warn!("attribution '{}' rejected locally: {}", method, err);
                    err
                })?;
            let ticket = inner.seqs.attribution.issue();
            inner.state.attribution = AttributionState::Computing(method);
            (ticket, params)
        };
        log::info!("computing {} (request #{})", method, ticket.seq());
        let result = self.backend.compute_attribution(&params);

        let mut inner = self.lock();
        if !inner.seqs.attribution.is_current(ticket) {
            log::debug!("discarding stale {} result (request #{})", method, ticket.seq());
            return Ok(Outcome::Superseded);
        }
        match result {
            Ok(res) => {
                inner.state.attribution = AttributionState::Done(res);
                Ok(Outcome::Committed)
            }
            Err(err) => {
                log::warn!("{} failed: {}", method, err);
                inner.state.attribution = AttributionState::Failed { method, error: err.detail() };
                Ok(Outcome::Failed)
            }
        }
    }
}

fn build_params(
    method: AttributionMethod,
    options: AttributionOptions,
    selected_layer: Option<&str>,
) -> Result<AttributionParams, ValidationError> {
    let layer = || {
        selected_layer
            .map(str::to_owned)
            .ok_or(ValidationError::MissingLayerSelection)
    };
    let positive = |name: &str, value: u32| {
        if value == 0 {
            Err(ValidationError::InvalidAttributionParams(format!("{} must be positive", name)))
        } else {
            Ok(value)
        }
    };
    Ok(match method {
        AttributionMethod::GradCam       => AttributionParams::GradCam { layer_name: layer()? },
        AttributionMethod::GuidedGradCam => AttributionParams::GuidedGradCam { layer_name: layer()? },
        AttributionMethod::Saliency      => AttributionParams::Saliency,
        AttributionMethod::IntegratedGradients => AttributionParams::IntegratedGradients {
            steps: positive("steps", options.steps)?,
        },
        AttributionMethod::Occlusion => AttributionParams::Occlusion {
            window_size: positive("window_size", options.window_size)?,
            stride: positive("stride", options.stride)?,
        },
    })
}
