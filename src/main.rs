//! convscope
//!
//! Command-line driver for an analysis session against a running backend.
//! Every subcommand drives the same `AnalysisSession` a UI would, then prints
//! the resulting state. Activation maps and heatmaps can be written out as PNGs.
//!
//! Run with:
//!   cargo run -- --backend http://127.0.0.1:8000 inspect cat.jpg --layer layer4.1.conv2 --method gradcam --out out/
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueHint};

use convscope::session::{AttributionState, ImageState, LayerState, ModelState, SelectionState};
use convscope::{
    AnalysisSession, Architecture, AttributionMethod, AttributionOptions, Backend, CustomModelConfig,
    EncodedImage, FileUpload, GatewayConfig, HttpGateway, Outcome, SessionState,
};

type DynError = Box<dyn Error>;

type Result<T> = std::result::Result<T, DynError>;

#[derive(Parser)]
#[command(author, version, about = "Inspect CNN layers, activations and attributions served by a remote backend")]
struct Cli {
    /// Backend base URL (overrides the config file and CONVSCOPE_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// JSON gateway config file
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the backend is up
    Health,
    /// Show the backend's current model
    Info,
    /// List preset models
    Models,
    /// List attribution methods the backend offers
    Methods,
    /// Load a preset model
    Load {
        /// Preset name, e.g. resnet18
        name: String,
    },
    /// Upload custom model weights
    UploadModel(UploadModelArgs),
    /// Upload an image and inspect predictions, layers, activations and attributions
    Inspect(InspectArgs),
}

#[derive(Args)]
struct UploadModelArgs {
    /// .pt / .pth weights file
    #[arg(value_hint = ValueHint::FilePath)]
    weights: PathBuf,

    /// Square input edge in pixels
    #[arg(long, default_value_t = 224)]
    input_size: u32,

    /// Per-channel mean, R,G,B
    #[arg(long, value_delimiter = ',', default_values_t = [0.485, 0.456, 0.406])]
    mean: Vec<f64>,

    /// Per-channel std, R,G,B
    #[arg(long, value_delimiter = ',', default_values_t = [0.229, 0.224, 0.225])]
    std: Vec<f64>,

    /// Architecture to instantiate before loading a state dict (resnet18, resnet50, vgg16)
    #[arg(long)]
    architecture: Option<Architecture>,
}

#[derive(Args)]
struct InspectArgs {
    /// Image to analyse
    #[arg(value_hint = ValueHint::FilePath)]
    image: PathBuf,

    /// Layer whose activations to fetch
    #[arg(long)]
    layer: Option<String>,

    /// Attribution methods to run (repeatable)
    #[arg(long = "method")]
    methods: Vec<AttributionMethod>,

    /// Integrated gradients steps
    #[arg(long, default_value_t = 50)]
    steps: u32,

    /// Occlusion window size in pixels
    #[arg(long, default_value_t = 15)]
    window_size: u32,

    /// Occlusion stride in pixels
    #[arg(long, default_value_t = 8)]
    stride: u32,

    /// Print activation statistics for the selected layer
    #[arg(long)]
    stats: bool,

    /// Directory to write activation maps and heatmaps into
    #[arg(long, value_hint = ValueHint::DirPath)]
    out: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn gateway_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load_json(&path.to_string_lossy())?,
        None => GatewayConfig::default(),
    }
    .apply_env();
    if let Some(url) = &cli.backend {
        config.base_url = url.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = gateway_config(&cli)?;
    log::info!("using backend {}", config.base_url);
    let gateway = HttpGateway::new(config);

    match cli.command {
        Command::Health => {
            println!("backend: {}", gateway.health()?);
        }
        Command::Info => {
            let session = AnalysisSession::new(gateway);
            session.refresh_model_info();
            let state = session.snapshot();
            print_model(&state);
            check(&state)?;
        }
        Command::Models => {
            for name in gateway.list_models()? {
                println!("{}", name);
            }
        }
        Command::Methods => {
            for m in gateway.list_attribution_methods()? {
                let layer = if m.requires_layer { " (needs layer)" } else { "" };
                println!("{:<22} {}{}", m.name, m.description, layer);
            }
        }
        Command::Load { name } => {
            let session = AnalysisSession::new(gateway);
            session.load_preset(&name);
            let state = session.snapshot();
            check(&state)?;
            print_model(&state);
        }
        Command::UploadModel(args) => {
            let config = CustomModelConfig::from_parts(args.input_size, &args.mean, &args.std, args.architecture)?;
            let weights = FileUpload::weights_from_path(&args.weights)?;
            let session = AnalysisSession::new(gateway);
            session.upload_custom(&weights, &config)?;
            let state = session.snapshot();
            check(&state)?;
            print_model(&state);
        }
        Command::Inspect(args) => inspect(AnalysisSession::new(gateway), args)?,
    }
    Ok(())
}

fn inspect(session: AnalysisSession<HttpGateway>, args: InspectArgs) -> Result<()> {
    let image = FileUpload::image_from_path(&args.image)?;
    if session.upload(&image) != Outcome::Committed {
        check(&session.snapshot())?;
    }
    let state = session.snapshot();
    print_model(&state);
    print_predictions(&state);
    print_layers(&state);
    check(&state)?;

    if let Some(layer) = &args.layer {
        session.select(layer)?;
        let state = session.snapshot();
        check(&state)?;
        if let Some(set) = state.activations() {
            println!("\nactivations: {} ({} channels, shape {:?})", layer, set.len(), set.shape);
            if let Some(dir) = &args.out {
                let layer_dir = dir.join(sanitize(layer));
                std::fs::create_dir_all(&layer_dir)?;
                for act in &set.activations {
                    write_png(&act.image, &layer_dir.join(format!("channel_{:04}.png", act.channel)))?;
                }
                println!("  written to {}", layer_dir.display());
            }
        }
        if args.stats {
            let stats = session.backend().get_activation_stats(layer)?;
            println!(
                "  mean {:.4}  std {:.4}  min {:.4}  max {:.4}",
                stats.mean, stats.std, stats.min, stats.max
            );
        }
    }

    let options = AttributionOptions { steps: args.steps, window_size: args.window_size, stride: args.stride };
    for method in &args.methods {
        session.run_attribution(*method, options)?;
        let state = session.snapshot();
        match &state.attribution {
            AttributionState::Done(result) => {
                println!("\n{}: target class {}", result.method, result.target_class);
                if let Some(dir) = &args.out {
                    std::fs::create_dir_all(dir)?;
                    let path = dir.join(format!("{}.png", result.method));
                    write_png(&result.heatmap, &path)?;
                    println!("  heatmap written to {}", path.display());
                }
            }
            AttributionState::Failed { method, error } => {
                eprintln!("\n{} failed: {}", method, error);
            }
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Turns the first slice error into a process error.
fn check(state: &SessionState) -> Result<()> {
    match state.errors().first() {
        Some((slice, error)) => Err(format!("{} failed: {}", slice, error).into()),
        None => Ok(()),
    }
}

fn print_model(state: &SessionState) {
    match &state.model {
        ModelState::Ready(desc) => {
            let n = &desc.normalization;
            println!("model: {} ({}px, {} layers)", desc.name, desc.input_size, desc.num_layers);
            println!("  mean {:?}  std {:?}", n.mean, n.std);
        }
        ModelState::LoadFailed { error, .. } => println!("model: load failed ({})", error),
        ModelState::Loading { .. } => println!("model: loading"),
        ModelState::Unloaded => println!("model: unknown"),
    }
}

fn print_predictions(state: &SessionState) {
    if let ImageState::Analyzed { file_name, predictions } = &state.image {
        println!("\npredictions for {}:", file_name);
        for (rank, (class, prob)) in predictions.entries().enumerate() {
            println!("  {}. class {:<5} {:>6.2}%", rank + 1, class, prob * 100.0);
        }
    }
}

fn print_layers(state: &SessionState) {
    match &state.layers {
        LayerState::Loaded(catalog) => {
            println!("\nlayers ({}):", catalog.len());
            for (name, d) in catalog.iter() {
                println!("  {:<28} {:<8} {:>4} -> {:<4} kernel {:?}", name, d.kind, d.in_channels, d.out_channels, d.kernel_size);
            }
        }
        LayerState::Failed(error) => println!("\nlayers unavailable: {}", error),
        _ => {}
    }
    if let SelectionState::Failed { layer, error } = &state.selection {
        println!("selection of {} failed: {}", layer, error);
    }
}

fn write_png(image: &EncodedImage, path: &Path) -> Result<()> {
    let decoded = image.to_image()?;
    decoded.save(path)?;
    Ok(())
}

/// Layer names contain dots; keep them but strip anything path-like.
fn sanitize(name: &str) -> String {
    let cleaned: String = name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
        .collect();
    if cleaned.chars().all(|c| c == '.') { "_".to_owned() } else { cleaned }
}
