//! Reading the per-request CSV a benchmark client writes.
//!
//! The file has a header row; `ts_unix_ns`, `latency_ns` and `ok` are
//! located by name, so column order and extra columns do not matter.

use std::path::{Path, PathBuf};

use protobench_core::protocol::Protocol;
use protobench_core::summary::Sample;

const COL_TIMESTAMP: &str = "ts_unix_ns";
const COL_LATENCY: &str = "latency_ns";
const COL_OK: &str = "ok";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact contains no samples")]
    Empty,

    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A unique artifact path for one client invocation:
/// `bench-{protocol}-{unix_millis}-{uuid}.csv` inside `dir`.
pub fn artifact_path(dir: &Path, protocol: Protocol) -> PathBuf {
    dir.join(format!(
        "bench-{}-{}-{}.csv",
        protocol.as_str(),
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    ))
}

/// Read and parse the artifact at `path`, then delete it.
///
/// Deletion is attempted whether or not reading succeeded.
pub async fn read_samples(path: &Path) -> Result<Vec<Sample>, ArtifactError> {
    let result = match tokio::fs::read(path).await {
        Ok(bytes) => parse_samples(&bytes),
        Err(e) => Err(ArtifactError::Io(e)),
    };
    remove_artifact(path).await;
    result
}

/// Best-effort removal of an artifact. Failures are logged and ignored.
pub async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %e, "Artifact not removed");
    }
}

/// Removes the artifacts of one run when dropped or cleared.
///
/// Covers runs that are abandoned mid-flight, where no error path executes.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
}

impl ArtifactGuard {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Remove every artifact that still exists and forget the paths.
    pub fn clear(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Leftover artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Leftover artifact not removed");
                }
            }
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        self.clear();
    }
}

struct Columns {
    timestamp: usize,
    latency: usize,
    ok: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, ArtifactError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ArtifactError::Malformed {
                    line: 1,
                    reason: format!("missing column '{name}'"),
                })
        };
        Ok(Self {
            timestamp: find(COL_TIMESTAMP)?,
            latency: find(COL_LATENCY)?,
            ok: find(COL_OK)?,
        })
    }
}

/// Parse CSV bytes into samples. Blank lines are skipped.
pub fn parse_samples(bytes: &[u8]) -> Result<Vec<Sample>, ArtifactError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| malformed_csv(&e))?.clone();
    if headers.is_empty() {
        return Err(ArtifactError::Empty);
    }
    let columns = Columns::locate(&headers)?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed_csv(&e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        samples.push(parse_record(&record, &columns, line)?);
    }

    if samples.is_empty() {
        return Err(ArtifactError::Empty);
    }
    Ok(samples)
}

fn parse_record(
    record: &csv::StringRecord,
    columns: &Columns,
    line: u64,
) -> Result<Sample, ArtifactError> {
    let malformed = |reason: String| ArtifactError::Malformed { line, reason };
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .ok_or_else(|| malformed(format!("missing value for '{name}'")))
    };

    let latency_raw = field(columns.latency, COL_LATENCY)?;
    let latency_ns: i64 = latency_raw
        .parse()
        .map_err(|_| malformed(format!("{COL_LATENCY} '{latency_raw}' is not an integer")))?;
    if latency_ns < 0 {
        return Err(malformed(format!("{COL_LATENCY} {latency_ns} is negative")));
    }

    let ts_raw = field(columns.timestamp, COL_TIMESTAMP)?;
    let timestamp_ns: i64 = ts_raw
        .parse()
        .map_err(|_| malformed(format!("{COL_TIMESTAMP} '{ts_raw}' is not an integer")))?;

    let ok = match field(columns.ok, COL_OK)? {
        "true" => true,
        "false" => false,
        other => return Err(malformed(format!("{COL_OK} '{other}' must be true or false"))),
    };

    Ok(Sample::from_nanos(latency_ns, timestamp_ns, ok))
}

fn malformed_csv(err: &csv::Error) -> ArtifactError {
    ArtifactError::Malformed {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_header_named_columns_in_any_order() {
        let csv = "ok,latency_ns,extra,ts_unix_ns\ntrue,1500000,x,100\nfalse,2500000,y,200\n";
        let samples = parse_samples(csv.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].latency_ms, 1.5);
        assert_eq!(samples[0].timestamp_ns, 100);
        assert!(samples[0].ok);
        assert!(!samples[1].ok);
    }

    #[test]
    fn skips_blank_lines() {
        let csv = "ts_unix_ns,latency_ns,ok\n\n1,1000000,true\n\n2,2000000,true\n";
        assert_eq!(parse_samples(csv.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn header_only_is_empty() {
        let res = parse_samples(b"ts_unix_ns,latency_ns,ok\n");
        assert_matches!(res, Err(ArtifactError::Empty));
    }

    #[test]
    fn zero_byte_file_is_empty() {
        assert_matches!(parse_samples(b""), Err(ArtifactError::Empty));
    }

    #[test]
    fn missing_column_is_malformed() {
        let res = parse_samples(b"ts_unix_ns,ok\n1,true\n");
        assert_matches!(res, Err(ArtifactError::Malformed { line: 1, reason }) if reason.contains("latency_ns"));
    }

    #[test]
    fn non_integer_latency_is_malformed_with_line() {
        let csv = "ts_unix_ns,latency_ns,ok\n1,1000,true\n2,1.5,true\n";
        let res = parse_samples(csv.as_bytes());
        assert_matches!(res, Err(ArtifactError::Malformed { line: 3, .. }));
    }

    #[test]
    fn negative_latency_is_malformed() {
        let res = parse_samples(b"ts_unix_ns,latency_ns,ok\n1,-5,true\n");
        assert_matches!(res, Err(ArtifactError::Malformed { reason, .. }) if reason.contains("negative"));
    }

    #[test]
    fn ok_must_be_exact_literal() {
        for bad in ["1", "TRUE", "yes", ""] {
            let csv = format!("ts_unix_ns,latency_ns,ok\n1,1000,{bad}\n");
            let res = parse_samples(csv.as_bytes());
            assert_matches!(res, Err(ArtifactError::Malformed { .. }), "ok={bad:?}");
        }
    }

    #[test]
    fn short_record_is_malformed() {
        let res = parse_samples(b"ts_unix_ns,latency_ns,ok\n1,1000\n");
        assert_matches!(res, Err(ArtifactError::Malformed { line: 2, .. }));
    }

    #[test]
    fn artifact_paths_are_unique_and_named_by_protocol() {
        let dir = Path::new("/tmp");
        let a = artifact_path(dir, Protocol::H3);
        let b = artifact_path(dir, Protocol::H3);
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("bench-h3-"));
        assert!(name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn read_samples_deletes_the_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("run.csv");
        tokio::fs::write(&path, "ts_unix_ns,latency_ns,ok\n1,1000000,true\n")
            .await
            .unwrap();

        let samples = read_samples(&path).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn read_samples_deletes_even_when_malformed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bad.csv");
        tokio::fs::write(&path, "nope\n1\n").await.unwrap();

        assert_matches!(read_samples(&path).await, Err(ArtifactError::Malformed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn guard_removes_leftovers_on_drop() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let written = dir.path().join("bench-h2.csv");
        let never_written = dir.path().join("bench-h3.csv");
        std::fs::write(&written, "ts_unix_ns,latency_ns,ok\n").unwrap();

        drop(ArtifactGuard::new(vec![written.clone(), never_written]));
        assert!(!written.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn cleared_guard_forgets_its_paths() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bench-h3.csv");
        let mut guard = ArtifactGuard::new(vec![path.clone()]);
        guard.clear();

        // A file created under the same name afterwards is not the guard's.
        std::fs::write(&path, "").unwrap();
        drop(guard);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let res = read_samples(&dir.path().join("absent.csv")).await;
        assert_matches!(res, Err(ArtifactError::Io(_)));
    }
}
