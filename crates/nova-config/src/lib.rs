//! Configuration and logging bootstrap for the Nova JDWP back-end.
//!
//! Configuration is read from TOML. Every field has a default so an empty file
//! (or no file at all) yields a usable [`NovaConfig`].

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NovaConfig {
    /// Global logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// JDWP back-end tuning.
    #[serde(default)]
    pub jdwp: JdwpBackendConfig,
}

impl NovaConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: NovaConfig = toml::from_str(text)?;
        config.jdwp.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level for all Nova crates.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks
    /// remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// Create the effective `EnvFilter`.
    ///
    /// `level` may be either a simple level (`info`, `debug`, ...) or a full
    /// `tracing_subscriber::EnvFilter` directive string. If `RUST_LOG` is set,
    /// it is merged into the resulting filter.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JdwpBackendConfig {
    /// First identifier handed out by the identifier registry.
    ///
    /// `0` is reserved for the null reference and is rejected.
    #[serde(default = "JdwpBackendConfig::default_first_id")]
    pub first_id: u64,

    /// Number of collected registry entries tolerated before the registry
    /// sweeps them on the next registration.
    #[serde(default = "JdwpBackendConfig::default_sweep_threshold")]
    pub sweep_threshold: usize,

    /// Transient socket errors retried before the connection is dropped.
    #[serde(default = "JdwpBackendConfig::default_io_retry_limit")]
    pub io_retry_limit: u32,

    /// Largest inbound command packet accepted, header included.
    #[serde(default = "JdwpBackendConfig::default_max_packet_bytes")]
    pub max_packet_bytes: usize,

    /// Character encoding used for wire strings. Only UTF-8 is supported.
    #[serde(default = "JdwpBackendConfig::default_string_encoding")]
    pub string_encoding: String,
}

impl Default for JdwpBackendConfig {
    fn default() -> Self {
        Self {
            first_id: Self::default_first_id(),
            sweep_threshold: Self::default_sweep_threshold(),
            io_retry_limit: Self::default_io_retry_limit(),
            max_packet_bytes: Self::default_max_packet_bytes(),
            string_encoding: Self::default_string_encoding(),
        }
    }
}

impl JdwpBackendConfig {
    fn default_first_id() -> u64 {
        1
    }

    fn default_sweep_threshold() -> usize {
        1024
    }

    fn default_io_retry_limit() -> u32 {
        3
    }

    fn default_max_packet_bytes() -> usize {
        16 * 1024 * 1024
    }

    fn default_string_encoding() -> String {
        "UTF-8".to_owned()
    }

    /// Reject settings the back-end cannot run with.
    ///
    /// An unsupported string encoding is a startup failure; the codec never
    /// falls back to a lossy conversion.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let encoding = self.string_encoding.trim().to_ascii_lowercase();
        if encoding != "utf-8" && encoding != "utf8" {
            return Err(ConfigError::UnsupportedEncoding(self.string_encoding.clone()));
        }
        if self.first_id == 0 {
            return Err(ConfigError::Invalid(
                "jdwp.first_id must be non-zero (0 is the null identifier)".to_owned(),
            ));
        }
        if self.max_packet_bytes < 11 {
            return Err(ConfigError::Invalid(format!(
                "jdwp.max_packet_bytes must cover the 11 byte packet header (got {})",
                self.max_packet_bytes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("unsupported string encoding {0:?}; only UTF-8 is available")]
    UnsupportedEncoding(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_owned())
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber described by `config`.
///
/// Only the first call has an effect; later calls are no-ops so tests and
/// embedders can call this unconditionally.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let file = config
            .file
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(|file| Arc::new(Mutex::new(file)));
        let file_open_failed = config.file.is_some() && file.is_none();

        let mut make_writer = BoxMakeWriter::new(io::sink);
        if config.stderr {
            // `cargo test` output capture only works for the stdlib's `print!/eprint!`
            // macros, so debug builds route through `TestWriter`.
            if cfg!(debug_assertions) {
                make_writer = BoxMakeWriter::new(
                    make_writer.and(tracing_subscriber::fmt::writer::TestWriter::with_stderr),
                );
            } else {
                make_writer = BoxMakeWriter::new(make_writer.and(io::stderr));
            }
        }
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(MutexFileMakeWriter { file }));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_open_failed {
            if let Some(path) = config.file.as_ref() {
                tracing::warn!(
                    target: "nova.config",
                    path = %path.display(),
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
}

#[derive(Clone)]
struct MutexFileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

struct MutexFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl io::Write for MutexFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut *self.file.lock(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut *self.file.lock())
    }
}

impl<'a> MakeWriter<'a> for MutexFileMakeWriter {
    type Writer = MutexFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MutexFileWriter {
            file: self.file.clone(),
        }
    }
}
