use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use protobench_core::summary::{SummaryOptions, DEFAULT_ZERO_DURATION_DIVISOR_S};

/// Default pause between starting the target servers and the first client.
pub const DEFAULT_SERVER_SETTLE: Duration = Duration::from_millis(500);

/// How long a signalled process gets to exit before it is killed.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(2);

/// Parallelism the Go benchmark clients are pinned to.
const CLIENT_GOMAXPROCS: &str = "8";

/// A configuration variable held a value that could not be used.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(var: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            var,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Parse `var` with [`FromStr`], falling back to `default` when unset.
pub fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(var) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(e) => Err(ConfigError::new(var, raw, e)),
        },
        None => Ok(default),
    }
}

/// Engine configuration: where the targets are, where the binaries live,
/// and the timing policy of a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target URL for the HTTP/2 client (default: `https://localhost:8444`).
    pub h2_addr: String,
    /// Target URL for the HTTP/3 client (default: `https://localhost:8443`).
    pub h3_addr: String,
    /// Directory holding the benchmark binaries. `None` resolves through `PATH`.
    pub bin_dir: Option<PathBuf>,
    /// Where client CSV artifacts are written (default: the OS temp dir).
    pub artifact_dir: PathBuf,
    /// Listen address passed to `bench-server-h2` (default: `:8444`).
    pub h2_listen: String,
    /// Listen address passed to `bench-server-h3` (default: `:8443`).
    pub h3_listen: String,
    pub server_cert: String,
    pub server_key: String,
    pub server_settle: Duration,
    pub termination_grace: Duration,
    /// Extra environment for every client process.
    pub client_env: Vec<(String, String)>,
    pub summary: SummaryOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            h2_addr: "https://localhost:8444".into(),
            h3_addr: "https://localhost:8443".into(),
            bin_dir: None,
            artifact_dir: std::env::temp_dir(),
            h2_listen: ":8444".into(),
            h3_listen: ":8443".into(),
            server_cert: "cert/dev.crt".into(),
            server_key: "cert/dev.key".into(),
            server_settle: DEFAULT_SERVER_SETTLE,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            client_env: vec![("GOMAXPROCS".into(), CLIENT_GOMAXPROCS.into())],
            summary: SummaryOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `H2_ADDR`                  | `https://localhost:8444` |
    /// | `H3_ADDR`                  | `https://localhost:8443` |
    /// | `BENCH_BIN_DIR`            | unset (`PATH` lookup)    |
    /// | `ARTIFACT_DIR`             | OS temp dir              |
    /// | `SERVER_SETTLE_MS`         | `500`                    |
    /// | `SERVER_CERT`              | `cert/dev.crt`           |
    /// | `SERVER_KEY`               | `cert/dev.key`           |
    /// | `ZERO_DURATION_FLOOR_SECS` | `1.0`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let settle_ms: u64 = parse_var(&lookup, "SERVER_SETTLE_MS", 500)?;

        let floor: f64 = parse_var(
            &lookup,
            "ZERO_DURATION_FLOOR_SECS",
            DEFAULT_ZERO_DURATION_DIVISOR_S,
        )?;
        if !(floor.is_finite() && floor > 0.0) {
            return Err(ConfigError::new(
                "ZERO_DURATION_FLOOR_SECS",
                floor.to_string(),
                "must be a positive number of seconds",
            ));
        }

        Ok(Self {
            h2_addr: non_empty("H2_ADDR").unwrap_or(defaults.h2_addr),
            h3_addr: non_empty("H3_ADDR").unwrap_or(defaults.h3_addr),
            bin_dir: non_empty("BENCH_BIN_DIR").map(PathBuf::from),
            artifact_dir: non_empty("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            server_cert: non_empty("SERVER_CERT").unwrap_or(defaults.server_cert),
            server_key: non_empty("SERVER_KEY").unwrap_or(defaults.server_key),
            server_settle: Duration::from_millis(settle_ms),
            summary: SummaryOptions {
                zero_duration_divisor_s: floor,
            },
            ..defaults
        })
    }
}
