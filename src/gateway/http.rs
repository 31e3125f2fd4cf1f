use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::multipart::MultipartForm;
use crate::gateway::{Backend, CustomModelOutcome, ImageAnalysis};
use crate::model::activation::{Activation, ActivationSet, ActivationStats};
use crate::model::attribution::{AttributionParams, AttributionResult, MethodInfo};
use crate::model::custom::CustomModelConfig;
use crate::model::descriptor::{LayerCatalog, LayerListing, ModelDescriptor};
use crate::model::upload::FileUpload;

// ---------------------------------------------------------------------------
// Wire shapes that never leave this module
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ModelListing {
    models: Vec<String>,
}

#[derive(Deserialize)]
struct MethodListing {
    methods: Vec<MethodInfo>,
}

#[derive(Deserialize)]
struct CustomUploadReply {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthReply {
    status: String,
}

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// `Backend` over HTTP/JSON using a blocking `ureq` agent.
///
/// No timeouts are configured: a hung request blocks its caller until the
/// backend answers or the connection drops.
#[derive(Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    agent: ureq::Agent,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(&config.user_agent)
            .build();
        HttpGateway { config, agent }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// `GET /health` (outside the API prefix).
    pub fn health(&self) -> Result<String, GatewayError> {
        let url = self.config.root_endpoint("/health");
        log::debug!("GET {}", url);
        let reply: HealthReply = decode(send(self.agent.get(&url).call())?)?;
        Ok(reply.status)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.config.endpoint(path);
        log::debug!("GET {}", url);
        decode(send(self.agent.get(&url).call())?)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, body: Option<&serde_json::Value>) -> Result<T, GatewayError> {
        let url = self.config.endpoint(path);
        log::debug!("POST {}", url);
        let request = self.agent.post(&url);
        let result = match body {
            Some(value) => request
                .set("Content-Type", "application/json")
                .send_string(&value.to_string()),
            None => request.call(),
        };
        decode(send(result)?)
    }

    fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: MultipartForm) -> Result<T, GatewayError> {
        let url = self.config.endpoint(path);
        let (content_type, body) = form.finish();
        log::debug!("POST {} ({} bytes multipart)", url, body.len());
        let result = self.agent.post(&url)
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        decode(send(result)?)
    }
}

/// Maps ureq's error split onto `GatewayError`.
fn send(result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response, GatewayError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(GatewayError::Backend { status, detail: error_detail(&body, status) })
        }
        Err(ureq::Error::Transport(transport)) => Err(GatewayError::Transport(transport.to_string())),
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    let text = response.into_string()?;
    Ok(serde_json::from_str(&text)?)
}

/// Pulls `detail` out of an error body; FastAPI validation errors carry a
/// structured detail, which is rendered as JSON.
fn error_detail(body: &str, status: u16) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_owned(),
        },
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => body.trim().to_owned(),
    }
}

impl Backend for HttpGateway {
    fn upload_image(&self, image: &FileUpload) -> Result<ImageAnalysis, GatewayError> {
        let form = MultipartForm::new().file("file", image);
        let analysis: ImageAnalysis = self.post_multipart("/upload", form)?;
        analysis.predictions.check().map_err(GatewayError::Decode)?;
        Ok(analysis)
    }

    fn list_layers(&self) -> Result<LayerCatalog, GatewayError> {
        let listing: LayerListing = self.get_json("/layers")?;
        Ok(listing.into())
    }

    fn get_activations(&self, layer_name: &str) -> Result<ActivationSet, GatewayError> {
        self.get_json(&format!("/activations/{}", urlencoding::encode(layer_name)))
    }

    fn get_activation_channel(&self, layer_name: &str, channel: usize) -> Result<Activation, GatewayError> {
        self.get_json(&format!("/activations/{}?channel={}", urlencoding::encode(layer_name), channel))
    }

    fn get_activation_stats(&self, layer_name: &str) -> Result<ActivationStats, GatewayError> {
        self.get_json(&format!("/activations/{}/stats", urlencoding::encode(layer_name)))
    }

    fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let listing: ModelListing = self.get_json("/models")?;
        Ok(listing.models)
    }

    fn load_model(&self, model_name: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "model_name": model_name });
        let _: serde_json::Value = self.post_json("/models/load", Some(&body))?;
        Ok(())
    }

    fn model_info(&self) -> Result<ModelDescriptor, GatewayError> {
        self.get_json("/models/info")
    }

    fn upload_custom_model(
        &self,
        weights: &FileUpload,
        config: &CustomModelConfig,
    ) -> Result<CustomModelOutcome, GatewayError> {
        let form = config
            .form_fields()
            .into_iter()
            .fold(MultipartForm::new().file("file", weights), |form, (name, value)| form.text(name, &value));
        let reply: CustomUploadReply = self.post_multipart("/models/upload", form)?;
        if reply.status == "error" {
            let detail = reply.error.unwrap_or_else(|| "model upload rejected".to_owned());
            Ok(CustomModelOutcome::Rejected { detail })
        } else {
            Ok(CustomModelOutcome::Accepted)
        }
    }

    fn list_attribution_methods(&self) -> Result<Vec<MethodInfo>, GatewayError> {
        let listing: MethodListing = self.get_json("/attribution/methods")?;
        Ok(listing.methods)
    }

    fn compute_attribution(&self, params: &AttributionParams) -> Result<AttributionResult, GatewayError> {
        let path = format!("/attribution/{}", params.method().id());
        self.post_json(&path, params.body().as_ref())
    }
}
