use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialize logging for a component.
///
/// `RUST_LOG` wins over `config.filter`; `verbosity` raises the fallback
/// filter to `debug` (1) or `trace` (2+). With `config.file` set, logs are
/// also written to `<data dir>/logs/<component>.log`.
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_logging(
    component_name: &str,
    config: &LoggingConfig,
    verbosity: u8,
) -> io::Result<Option<WorkerGuard>> {
    let fallback = match verbosity {
        0 => config.filter.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback));

    if !config.file {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return Ok(None);
    }

    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(format!("{}.log", component_name));
    truncate_if_needed(&log_path, config.max_size_bytes)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("Logging to file: {}", log_path.display());

    Ok(Some(guard))
}

fn get_log_directory() -> io::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "reactor")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to find home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}

/// Empty the file if it has grown past `max_size` bytes
pub fn truncate_if_needed(log_path: &Path, max_size: u64) -> io::Result<()> {
    if log_path.exists() && fs::metadata(log_path)?.len() > max_size {
        let file = File::create(log_path)?;
        file.set_len(0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_truncate_only_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.log");

        let mut file = File::create(&path).unwrap();
        file.write_all(&[b'x'; 64]).unwrap();
        drop(file);

        truncate_if_needed(&path, 64).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 64);

        truncate_if_needed(&path, 32).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        truncate_if_needed(&dir.path().join("missing.log"), 0).unwrap();
    }
}
