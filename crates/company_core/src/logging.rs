//! Process-wide logging setup.
//!
//! The `log` facade is backed by `flexi_logger`, writing either rolling files
//! under an absolute directory or plain stderr. Setup happens once; later calls
//! must ask for the same level and target.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const FILE_BASENAME: &str = "company";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_SUMMARY_MAX_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    Files(PathBuf),
}

impl LogTarget {
    fn parse(log_dir: Option<&str>) -> Result<Self, String> {
        let Some(raw) = log_dir else {
            return Ok(Self::Stderr);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("log directory cannot be empty".to_string());
        }
        let path = Path::new(trimmed);
        if !path.is_absolute() {
            return Err(format!("log directory must be absolute, got `{trimmed}`"));
        }
        Ok(Self::Files(path.to_path_buf()))
    }

    fn dir(&self) -> Option<&Path> {
        match self {
            Self::Stderr => None,
            Self::Files(dir) => Some(dir),
        }
    }

    fn start(&self, level: &str) -> Result<LoggerHandle, String> {
        let started: Result<LoggerHandle, FlexiLoggerError> = match self {
            Self::Stderr => Logger::try_with_str(level).and_then(|logger| {
                logger
                    .log_to_stderr()
                    .format_for_stderr(flexi_logger::detailed_format)
                    .start()
            }),
            Self::Files(dir) => {
                std::fs::create_dir_all(dir).map_err(|err| {
                    format!("cannot create log directory `{}`: {err}", dir.display())
                })?;
                Logger::try_with_str(level).and_then(|logger| {
                    logger
                        .log_to_file(FileSpec::default().directory(dir).basename(FILE_BASENAME))
                        .rotate(
                            Criterion::Size(ROTATE_AT_BYTES),
                            Naming::Numbers,
                            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
                        )
                        .write_mode(WriteMode::BufferAndFlush)
                        .append()
                        .format_for_files(flexi_logger::detailed_format)
                        .start()
                })
            }
        };
        started.map_err(|err| format!("cannot start logger: {err}"))
    }
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => write!(f, "stderr"),
            Self::Files(dir) => write!(f, "{}", dir.display()),
        }
    }
}

struct ActiveLogger {
    level: &'static str,
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Starts logging at `level`, into rolling files under `log_dir` or to stderr
/// when no directory is given.
///
/// # Errors
/// - Unknown level, or a relative/empty/uncreatable directory.
/// - Logging is already running with another level or target.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), String> {
    let level = parse_level(level)?;
    let target = LogTarget::parse(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| {
        let handle = target.start(level)?;
        install_panic_hook();
        info!(
            "event=logging_start module=core status=ok version={} os={} level={} target={}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            level,
            target
        );
        Ok::<_, String>(ActiveLogger {
            level,
            target: target.clone(),
            _handle: handle,
        })
    })?;

    if active.level != level || active.target != target {
        return Err(format!(
            "logging already running with level `{}` to `{}`; requested level `{}` to `{}`",
            active.level, active.target, level, target
        ));
    }
    Ok(())
}

/// Active `(level, log_dir)`; the directory is `None` when logging to stderr.
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.target.dir().map(Path::to_path_buf)))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(level: &str) -> Result<&'static str, String> {
    let normalized = level.trim().to_ascii_lowercase();
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| *known == normalized)
        .or_else(|| (normalized == "warning").then_some("warn"))
        .ok_or_else(|| {
            format!("unsupported log level `{normalized}`; expected trace|debug|info|warn|error")
        })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=core status=error location={} payload={}",
            location,
            one_line(&payload, PANIC_SUMMARY_MAX_CHARS)
        );
        previous(info);
    }));
}

/// Company names and descriptions can end up in panic payloads; keep them to
/// one bounded line.
fn one_line(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut out: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
