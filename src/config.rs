use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "ocr-relay-server")]
#[command(about = "Relays uploaded images to an external OCR engine")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// How the OCR engine is reached
    #[arg(long, env = "OCR_INVOKER", value_enum, default_value_t = InvokerKind::Local)]
    pub invoker: InvokerKind,

    /// Interpreter used to run the OCR and face scripts
    #[arg(long, env = "OCR_EXECUTABLE", default_value = "python3")]
    pub executable: String,

    /// OCR script passed to the interpreter (local invoker)
    #[arg(long, env = "OCR_SCRIPT_PATH", default_value = "python/ocr_processor.py")]
    pub script_path: PathBuf,

    /// Base URL of the remote OCR engine; `/process` is appended (remote invoker)
    #[arg(long, env = "OCR_REMOTE_URL", default_value = "http://127.0.0.1:5001")]
    pub remote_url: String,

    /// Upper bound for a single OCR invocation, in seconds
    #[arg(long, env = "OCR_TIMEOUT_SECS", default_value = "60")]
    pub timeout_secs: u64,

    /// Directory for staged uploads (system temp dir if not set)
    #[arg(long, env = "OCR_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Face extraction script; face extraction is disabled if not set
    #[arg(long, env = "OCR_FACE_SCRIPT_PATH")]
    pub face_script_path: Option<PathBuf>,

    /// Directory extracted faces are written to
    #[arg(long, env = "OCR_FACE_OUTPUT_DIR", default_value = "extracted_faces")]
    pub face_output_dir: PathBuf,

    /// Upper bound for face extraction, in seconds
    #[arg(long, env = "OCR_FACE_TIMEOUT_SECS", default_value = "15")]
    pub face_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvokerKind {
    /// Spawn the OCR script as a subprocess
    Local,
    /// POST the image to a remote OCR service
    Remote,
}

/// Strategy used to reach the OCR engine, chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokerConfig {
    LocalProcess {
        executable: String,
        script_path: PathBuf,
    },
    RemoteHttp {
        base_url: String,
    },
}

/// Optional face extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceConfig {
    pub executable: String,
    pub script_path: PathBuf,
    pub output_dir: PathBuf,
    pub timeout: Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub invoker: InvokerConfig,
    pub timeout: Duration,
    pub temp_dir: Option<PathBuf>,
    pub face: Option<FaceConfig>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let invoker = match args.invoker {
            InvokerKind::Local => InvokerConfig::LocalProcess {
                executable: args.executable.clone(),
                script_path: args.script_path,
            },
            InvokerKind::Remote => InvokerConfig::RemoteHttp {
                base_url: args.remote_url,
            },
        };

        let face = args.face_script_path.map(|script_path| FaceConfig {
            executable: args.executable,
            script_path,
            output_dir: args.face_output_dir,
            timeout: Duration::from_secs(args.face_timeout_secs),
        });

        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            invoker,
            timeout: Duration::from_secs(args.timeout_secs),
            temp_dir: args.temp_dir,
            face,
        }
    }
}
