use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Command-line overrides for the common knobs; everything else comes from
/// `SMILE_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "smiled", about = "Smile Mirror daemon")]
pub struct Cli {
    /// V4L2 device path
    #[arg(long)]
    pub camera: Option<String>,
    /// Directory holding (or receiving) the ONNX model weights
    #[arg(long)]
    pub model_dir: Option<PathBuf>,
    /// Directory holding the audio clips
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,
    /// Render a periodic ASCII preview of the camera feed
    #[arg(long)]
    pub preview: bool,
}

/// Daemon configuration, loaded from environment variables with CLI
/// overrides applied on top.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files; missing weights are fetched here.
    pub model_dir: PathBuf,
    /// Directory containing the lead-in clip and voice notes.
    pub assets_dir: PathBuf,
    /// Path to the SQLite slot-store file.
    pub db_path: PathBuf,
    /// Number of startup frames to discard (camera auto-exposure settling).
    pub warmup_frames: usize,
    /// Confetti burst particle count.
    pub particle_count: u32,
    /// Confetti burst spread in degrees.
    pub spread_degrees: f32,
    /// Whether to render the ASCII camera preview.
    pub preview: bool,
}

impl Config {
    /// Load configuration from `SMILE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());

        let model_dir = std::env::var("SMILE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_CACHE_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(&home).join(".cache"))
                    .join("smile-mirror/models")
            });

        let db_path = std::env::var("SMILE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(&home).join(".local/share"))
                    .join("smile-mirror/slots.db")
            });

        Self {
            camera_device: std::env::var("SMILE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            assets_dir: std::env::var("SMILE_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("assets")),
            db_path,
            warmup_frames: env_parse("SMILE_WARMUP_FRAMES", 4),
            particle_count: env_parse("SMILE_PARTICLE_COUNT", 150),
            spread_degrees: env_parse("SMILE_SPREAD_DEGREES", 60.0),
            preview: false,
        }
    }

    /// Environment config with CLI flags layered on top.
    pub fn load(cli: &Cli) -> Self {
        let mut cfg = Self::from_env();
        if let Some(camera) = &cli.camera {
            cfg.camera_device = camera.clone();
        }
        if let Some(dir) = &cli.model_dir {
            cfg.model_dir = dir.clone();
        }
        if let Some(dir) = &cli.assets_dir {
            cfg.assets_dir = dir.clone();
        }
        cfg.preview = cli.preview;
        cfg
    }

    /// Path to the UltraFace detection model.
    pub fn ultraface_model_path(&self) -> String {
        self.model_dir
            .join(crate::weights::ULTRAFACE_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the FER+ expression model.
    pub fn ferplus_model_path(&self) -> String {
        self.model_dir
            .join(crate::weights::FERPLUS_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// The fixed lead-in clip played before each voice note.
    pub fn lead_in_path(&self) -> PathBuf {
        self.assets_dir.join("lead-in-chime.mp3")
    }

    /// Resolve a voice-note clip name against the assets directory.
    pub fn voice_note_path(&self, clip: &str) -> PathBuf {
        self.assets_dir.join(clip)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
