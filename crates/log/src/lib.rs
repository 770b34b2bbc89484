//! Global logging setup shared by nmpath binaries.
//!
//! Log records are written both to stdout and to a file named after the
//! start time of the process. Verbosity is controlled by `RUST_LOG` and
//! defaults to `INFO`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{subscriber::SetGlobalDefaultError, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to set a global collector: {0}")]
    Global(#[from] SetGlobalDefaultError),
}

/// Handle of the file writer. Dropping it flushes and stops the writer.
pub struct LogGuard {
    _guard: WorkerGuard,
    path: PathBuf,
}

impl LogGuard {
    /// Path of the log file written by this process.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

/// Installs the global tracing collector. Must be called at most once per
/// process.
///
/// # Arguments
///
/// * `dir` - directory where the log file is created. It is created if it
///   does not exist.
pub fn init(dir: &Path) -> Result<LogGuard, LogError> {
    std::fs::create_dir_all(dir).map_err(|source| LogError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let file_name = file_name(chrono::Local::now());
    let file_appender = tracing_appender::rolling::never(dir, file_name.as_str());
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let collector = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(writer));
    tracing::subscriber::set_global_default(collector)?;

    Ok(LogGuard {
        _guard: guard,
        path: dir.join(file_name),
    })
}

fn file_name<Tz>(time: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y-%m-%d_%H-%M-%S.log").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_file_name() {
        let time = Utc.with_ymd_and_hms(2023, 4, 9, 7, 5, 31).unwrap();
        assert_eq!(file_name(time), "2023-04-09_07-05-31.log");
    }
}
