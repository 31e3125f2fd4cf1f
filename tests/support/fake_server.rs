use std::io::Read;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};

use convscope::EncodedImage;

use super::multipart::{self, Part};

/// One request as the fake backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn parts(&self) -> Vec<Part> {
        match multipart::boundary_of(&self.content_type) {
            Some(boundary) => multipart::parse(&self.body, &boundary),
            None => Vec::new(),
        }
    }

    pub fn text_field(&self, name: &str) -> Option<String> {
        self.parts()
            .into_iter()
            .find(|p| p.name == name && p.filename.is_none())
            .and_then(|p| String::from_utf8(p.data).ok())
    }

    pub fn file_field(&self, name: &str) -> Option<(String, Vec<u8>)> {
        self.parts()
            .into_iter()
            .find(|p| p.name == name)
            .and_then(|p| Some((p.filename?, p.data)))
    }
}

struct BackendModel {
    name: String,
    input_size: u32,
}

/// HTTP stand-in for the analysis backend, serving fixed data shaped like
/// the real thing: two conv layers (`conv1` with 64 channels, `conv2` with 128).
pub struct FakeServer {
    pub url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
    pub fn start() -> FakeServer {
        let server = Server::http("127.0.0.1:0").expect("bind fake backend");
        let addr = server.server_addr().to_ip().expect("tcp listener");
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let model = Arc::new(Mutex::new(BackendModel { name: "resnet18".into(), input_size: 224 }));

        let rec = recorded.clone();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                dispatch(request, &rec, &model);
            }
        });

        FakeServer { url: format!("http://{}", addr), recorded }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// The most recent request to `path`.
    pub fn last(&self, path: &str) -> Option<Recorded> {
        self.recorded().into_iter().rev().find(|r| r.path == path)
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn json_response(status: u16, body: Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap())
}

fn detail(status: u16, msg: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    json_response(status, json!({ "detail": msg }))
}

fn png_b64() -> String {
    EncodedImage::from_bytes(&super::tiny_png()).as_base64().to_owned()
}

fn layer_channels(name: &str) -> Option<(usize, usize)> {
    match name {
        "conv1" => Some((3, 64)),
        "conv2" => Some((64, 128)),
        _ => None,
    }
}

fn model_info(model: &BackendModel) -> Value {
    json!({
        "name": model.name,
        "input_size": model.input_size,
        "normalization": { "mean": [0.485, 0.456, 0.406], "std": [0.229, 0.224, 0.225] },
        "num_layers": 2,
    })
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

fn dispatch(mut request: Request, recorded: &Mutex<Vec<Recorded>>, model: &Mutex<BackendModel>) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let (path, query) = match url.find('?') {
        Some(pos) => (url[..pos].to_owned(), url[pos + 1..].to_owned()),
        None => (url.clone(), String::new()),
    };
    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);

    let rec = Recorded { method: method.to_string(), path: path.clone(), query: query.clone(), content_type, body };
    recorded.lock().unwrap().push(rec.clone());

    let response = match (&method, path.as_str()) {
        (Method::Get, "/health") => json_response(200, json!({ "status": "healthy" })),

        (Method::Post, "/api/upload") => match rec.file_field("file") {
            Some((_, bytes)) if !bytes.is_empty() => json_response(200, json!({
                "status": "processed",
                "layers_captured": 2,
                "predictions": { "top5_indices": [3, 7, 1, 9, 2], "top5_probs": [0.62, 0.15, 0.10, 0.08, 0.05] },
                "model_info": model_info(&model.lock().unwrap()),
            })),
            _ => detail(422, "file field required"),
        },

        (Method::Get, "/api/layers") => json_response(200, json!({
            "layers": ["conv1", "conv2"],
            "info": {
                "conv1": { "type": "Conv2d", "in_channels": 3, "out_channels": 64, "kernel_size": [7, 7] },
                "conv2": { "type": "Conv2d", "in_channels": 64, "out_channels": 128, "kernel_size": [3, 3] },
            },
        })),

        (Method::Get, "/api/models") => json_response(200, json!({
            "models": ["resnet18", "resnet50", "vgg16"],
            "current": model_info(&model.lock().unwrap()),
        })),

        (Method::Get, "/api/models/info") => json_response(200, model_info(&model.lock().unwrap())),

        (Method::Post, "/api/models/load") => match rec.json().get("model_name").and_then(Value::as_str) {
            Some(name) => {
                let mut m = model.lock().unwrap();
                m.name = name.to_owned();
                m.input_size = 224;
                json_response(200, json!({ "status": "loaded", "model": name, "num_layers": 2 }))
            }
            None => detail(422, "model_name required"),
        },

        (Method::Post, "/api/models/upload") => {
            let file = rec.file_field("file");
            match (file, rec.text_field("architecture")) {
                (Some((filename, _)), Some(_)) => {
                    let mut m = model.lock().unwrap();
                    m.name = filename.clone();
                    m.input_size = rec.text_field("input_size").and_then(|s| s.parse().ok()).unwrap_or(224);
                    json_response(200, json!({ "status": "loaded", "model": filename, "num_layers": 2 }))
                }
                (Some(_), None) => json_response(200, json!({
                    "status": "error",
                    "error": "Model file contains state_dict only. Please specify architecture.",
                })),
                (None, _) => detail(422, "file field required"),
            }
        }

        (Method::Get, "/api/attribution/methods") => json_response(200, json!({ "methods": [
            { "name": "gradcam", "description": "Gradient-weighted Class Activation Mapping", "requires_layer": true },
            { "name": "guided_gradcam", "description": "Guided GradCAM with finer details", "requires_layer": true },
            { "name": "saliency", "description": "Simple gradient-based saliency", "requires_layer": false },
            { "name": "integrated_gradients", "description": "Integrated Gradients attribution", "requires_layer": false },
            { "name": "occlusion", "description": "Occlusion-based attribution", "requires_layer": false },
        ]})),

        (Method::Post, p) if p.starts_with("/api/attribution/") => {
            let method_id = &p["/api/attribution/".len()..];
            attribution(method_id, &rec.json())
        }

        (Method::Get, p) if p.starts_with("/api/activations/") => {
            let rest = &p["/api/activations/".len()..];
            activations(rest, &query)
        }

        _ => detail(404, "Not Found"),
    };

    let _ = request.respond(response);
}

fn activations(rest: &str, query: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let (raw_name, stats) = match rest.strip_suffix("/stats") {
        Some(name) => (name, true),
        None => (rest, false),
    };
    let name = urlencoding::decode(raw_name).map(|n| n.into_owned()).unwrap_or_default();
    let Some((_, channels)) = layer_channels(&name) else {
        return detail(404, "Layer not found or no image processed");
    };
    let shape = json!([1, channels, 56, 56]);

    if stats {
        return json_response(200, json!({
            "layer": name, "shape": shape, "mean": 0.25, "std": 0.5, "min": 0.0, "max": 3.5,
        }));
    }
    if let Some(ch) = query.strip_prefix("channel=") {
        return match ch.parse::<usize>() {
            Ok(c) if c < channels => json_response(200, json!({
                "layer": name, "channel": c, "shape": shape, "image": png_b64(),
            })),
            _ => detail(400, "Channel out of range"),
        };
    }
    let image = png_b64();
    let items: Vec<Value> = (0..channels).map(|c| json!({ "channel": c, "image": image })).collect();
    json_response(200, json!({
        "layer": name, "shape": shape, "num_channels": channels, "activations": items,
    }))
}

fn attribution(method_id: &str, body: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let layer = body.get("layer_name").and_then(Value::as_str).map(str::to_owned);
    match method_id {
        "gradcam" | "guided_gradcam" => match &layer {
            Some(l) if layer_channels(l).is_some() => {}
            Some(l) => return detail(400, &format!("Layer {} not found", l)),
            None => return detail(422, "layer_name required"),
        },
        "saliency" | "integrated_gradients" | "occlusion" => {}
        _ => return detail(404, "Not Found"),
    }
    json_response(200, json!({
        "method": method_id,
        "layer": layer,
        "target_class": 3,
        "attribution": png_b64(),
        "heatmap": png_b64(),
    }))
}
