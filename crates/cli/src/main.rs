use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use facewatch_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facewatch_core::capture::infrastructure::image_file::load_image;
use facewatch_core::detection::domain::face_detector::FaceDetector;
use facewatch_core::detection::infrastructure::detector_factory::{
    load_detector, resolving_yolo_loader, yolo_loader,
};
use facewatch_core::pipeline::enroll_face_use_case::EnrollFaceUseCase;
use facewatch_core::pipeline::event_sink::EventSink;
use facewatch_core::pipeline::infrastructure::fanout_sink::FanoutSink;
use facewatch_core::pipeline::infrastructure::json_lines_event_sink::JsonLinesEventSink;
use facewatch_core::pipeline::infrastructure::log_event_sink::LogEventSink;
use facewatch_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use facewatch_core::pipeline::manage_gallery_use_case::ManageGalleryUseCase;
use facewatch_core::pipeline::pipeline_executor::{PipelineComponents, PipelineExecutor};
use facewatch_core::pipeline::refresh_gallery_use_case::RefreshGalleryUseCase;
use facewatch_core::recognition::domain::face_embedder::FaceEmbedder;
use facewatch_core::recognition::domain::gallery::{Gallery, PersonId};
use facewatch_core::recognition::infrastructure::histogram_embedder::HistogramEmbedder;
use facewatch_core::recognition::infrastructure::json_gallery_store::JsonGalleryStore;
use facewatch_core::recognition::infrastructure::onnx_arcface_embedder::OnnxArcFaceEmbedder;
use facewatch_core::shared::config::{default_gallery_path, WatchConfig};
use facewatch_core::shared::constants::{
    DEFAULT_DEVICE, DEFAULT_FPS, DEFAULT_RESOLUTION, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
    YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facewatch_core::shared::model_resolver::{ModelResolver, ProgressFn};
use facewatch_core::shared::stream_info::CaptureSettings;

/// How often the run loop reports the number of active tracks.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Live face tracking with alerts for unrecognized people.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a camera and raise alerts.
    Run(RunArgs),
    /// Enroll a person from a photo.
    Enroll(EnrollArgs),
    /// List enrolled people as JSON lines.
    List(GalleryArgs),
    /// Rename an enrolled person.
    Rename {
        #[command(flatten)]
        gallery: GalleryArgs,
        /// Person id as shown by `list`.
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
    },
    /// Remove an enrolled person.
    Remove {
        #[command(flatten)]
        gallery: GalleryArgs,
        #[arg(long)]
        id: u64,
    },
}

#[derive(Args)]
struct GalleryArgs {
    /// Gallery file (defaults to the per-user data directory).
    #[arg(long)]
    gallery: Option<PathBuf>,
}

#[derive(Args)]
struct ModelArgs {
    /// Face detection model (skips download when given).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Detector used when the primary model cannot be loaded.
    #[arg(long)]
    fallback_detector_model: Option<PathBuf>,

    /// ArcFace embedding model (skips download when given).
    #[arg(long)]
    embedder_model: Option<PathBuf>,

    /// Use the colour-histogram embedder instead of ArcFace.
    #[arg(long)]
    histogram_embedder: bool,

    /// Never download models; fail if they are not cached.
    #[arg(long)]
    offline: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Camera device path or stream URL.
    #[arg(long, default_value = DEFAULT_DEVICE)]
    device: String,

    #[arg(long, default_value_t = DEFAULT_RESOLUTION.0)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_RESOLUTION.1)]
    height: u32,

    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Similarity needed to recognize an enrolled person (-1.0-1.0).
    #[arg(long)]
    similarity: Option<f64>,

    /// Seconds between repeated alerts for the same unknown face.
    #[arg(long)]
    cooldown: Option<u64>,

    /// Also alert when an enrolled person appears.
    #[arg(long)]
    alert_on_known: bool,

    /// Number of detection/embedding workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Append every event as JSON to this file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Stop after this many seconds (runs until the stream ends otherwise).
    #[arg(long)]
    duration: Option<u64>,

    #[command(flatten)]
    gallery: GalleryArgs,

    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Args)]
struct EnrollArgs {
    /// Display name of the person.
    #[arg(long, required_unless_present = "id")]
    name: Option<String>,

    /// Photo of the person's face.
    #[arg(long)]
    image: PathBuf,

    /// Add the photo to an existing person instead of creating one.
    #[arg(long)]
    id: Option<u64>,

    /// Embed the whole image instead of detecting the face first.
    #[arg(long)]
    no_detect: bool,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    #[command(flatten)]
    gallery: GalleryArgs,

    #[command(flatten)]
    models: ModelArgs,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Run(args) => run_watch(args),
        Command::Enroll(args) => run_enroll(args),
        Command::List(args) => run_list(&args),
        Command::Rename { gallery, id, name } => {
            let (gallery, store) = open_gallery(&gallery)?;
            ManageGalleryUseCase::new(gallery, store).rename(PersonId(id), &name)?;
            Ok(())
        }
        Command::Remove { gallery, id } => {
            let (gallery, store) = open_gallery(&gallery)?;
            ManageGalleryUseCase::new(gallery, store).remove(PersonId(id))?;
            Ok(())
        }
    }
}

fn run_watch(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    let (gallery, store) = open_gallery(&args.gallery)?;

    let detectors = (0..config.recognition_workers)
        .map(|_| build_detector(&args.models, config.min_confidence))
        .collect::<Result<Vec<_>, _>>()?;
    let embedder = build_embedder(&args.models)?;
    let sink = build_sink(args.events.as_deref())?;

    let components = PipelineComponents {
        camera: Box::new(FfmpegCamera::new()),
        capture: CaptureSettings {
            device: args.device.clone(),
            width: args.width,
            height: args.height,
            fps: args.fps,
        },
        detectors,
        embedder: Arc::clone(&embedder),
        gallery: Arc::clone(&gallery),
        sink,
    };

    let handle = ThreadedPipelineExecutor::new().start(components, &config)?;
    let stats = handle.stats();
    let snapshot = handle.snapshot();
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut next_status = Instant::now() + STATUS_INTERVAL;
    let mut refresher =
        RefreshGalleryUseCase::new(gallery, store, embedder, config.gallery_refresh());

    while !handle.is_finished() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Duration reached, shutting down");
            break;
        }
        if Instant::now() >= next_status {
            log::info!(
                "{} active track(s), {} alert(s) so far",
                snapshot.active_tracks().len(),
                stats.snapshot().alerts_emitted
            );
            next_status += STATUS_INTERVAL;
        }
        refresher.poll(Instant::now());
        std::thread::sleep(Duration::from_millis(200));
    }

    let result = handle.shutdown();
    log::info!("{}", stats.summary_string());
    result?;
    Ok(())
}

fn run_enroll(args: EnrollArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            args.confidence
        )
        .into());
    }
    if !args.image.exists() {
        return Err(format!("Image not found: {}", args.image.display()).into());
    }

    let image = load_image(&args.image)?;
    let (gallery, store) = open_gallery(&args.gallery)?;
    let embedder = build_embedder(&args.models)?;
    let mut use_case = EnrollFaceUseCase::new(embedder, gallery, store)
        .with_sink(Arc::new(LogEventSink));
    if !args.no_detect {
        use_case = use_case.with_detector(build_detector(&args.models, args.confidence)?);
    }

    match (args.id, &args.name) {
        (Some(id), _) => {
            use_case.add_sample(PersonId(id), &image)?;
            log::info!("Added a photo to {}", PersonId(id));
        }
        (None, Some(name)) => {
            let person_id = use_case.enroll(name, &image)?;
            println!("{}", person_id.0);
        }
        (None, None) => return Err("Either --name or --id is required".into()),
    }
    Ok(())
}

fn run_list(args: &GalleryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (gallery, _store) = open_gallery(args)?;
    for entry in gallery.snapshot().entries() {
        let line = serde_json::json!({
            "id": entry.person_id,
            "name": entry.name,
            "embeddings": entry.embeddings.len(),
        });
        println!("{line}");
    }
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<WatchConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => WatchConfig::load(path)?,
        None => WatchConfig::default(),
    };
    if let Some(confidence) = args.confidence {
        config.min_confidence = confidence;
    }
    if let Some(similarity) = args.similarity {
        config.similarity_threshold = similarity;
    }
    if let Some(cooldown) = args.cooldown {
        config.alert_cooldown_ms = cooldown * 1000;
    }
    if let Some(workers) = args.workers {
        config.recognition_workers = workers;
    }
    if args.alert_on_known {
        config.alert_on_known = true;
    }
    if args.width == 0 || args.height == 0 || args.fps == 0 {
        return Err("Resolution and fps must be positive".into());
    }
    config.validate()?;
    Ok(config)
}

fn open_gallery(
    args: &GalleryArgs,
) -> Result<(Arc<Gallery>, Arc<JsonGalleryStore>), Box<dyn std::error::Error>> {
    let path = match &args.gallery {
        Some(path) => path.clone(),
        None => default_gallery_path().ok_or("No data directory; pass --gallery")?,
    };
    let store = Arc::new(JsonGalleryStore::new(path));
    let gallery = Gallery::from_store(store.as_ref())?;
    log::info!("Gallery: {}", store.path().display());
    Ok((Arc::new(gallery), store))
}

fn resolve_model(
    explicit: Option<&Path>,
    name: &str,
    url: &str,
    offline: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    log::info!("Resolving model: {name}");
    let resolver = ModelResolver::new()?
        .bundled_dir(bundled_models_dir())
        .offline(offline);
    let label = name.to_string();
    let progress: ProgressFn = Box::new(move |done, total| download_progress(&label, done, total));
    let path = resolver.resolve(name, url, Some(progress))?;
    Ok(path)
}

fn build_detector(
    models: &ModelArgs,
    min_confidence: f64,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let primary = resolving_yolo_loader(
        YOLO_MODEL_NAME,
        || {
            resolve_model(
                models.detector_model.as_deref(),
                YOLO_MODEL_NAME,
                YOLO_MODEL_URL,
                models.offline,
            )
        },
        min_confidence,
    );
    let fallback = models
        .fallback_detector_model
        .as_deref()
        .map(|path| yolo_loader(path, min_confidence));
    Ok(load_detector(primary, fallback)?)
}

fn build_embedder(models: &ModelArgs) -> Result<Arc<dyn FaceEmbedder>, Box<dyn std::error::Error>> {
    if models.histogram_embedder {
        return Ok(Arc::new(HistogramEmbedder::new()));
    }
    let path = resolve_model(
        models.embedder_model.as_deref(),
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        models.offline,
    );
    match path.map(|p| OnnxArcFaceEmbedder::new(&p)) {
        Ok(Ok(embedder)) => Ok(Arc::new(embedder)),
        Ok(Err(e)) => {
            log::warn!("ArcFace unavailable ({e}), using colour histograms");
            Ok(Arc::new(HistogramEmbedder::new()))
        }
        Err(e) => {
            log::warn!("Embedding model unavailable ({e}), using colour histograms");
            Ok(Arc::new(HistogramEmbedder::new()))
        }
    }
}

fn build_sink(events: Option<&Path>) -> Result<Arc<dyn EventSink>, Box<dyn std::error::Error>> {
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogEventSink)];
    if let Some(path) = events {
        sinks.push(Arc::new(JsonLinesEventSink::open(path)?));
        log::info!("Writing events to {}", path.display());
    }
    Ok(Arc::new(FanoutSink::new(sinks)))
}

/// `models/` next to the executable, if present.
fn bundled_models_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(|dir| dir.join("models"))
        .filter(|dir| dir.is_dir())
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
