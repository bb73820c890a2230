use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};

pub fn is_plain() -> bool {
    if let Ok(plain) = std::env::var("RETROFY_PLAIN") {
        plain != "false"
    } else {
        !atty::is(atty::Stream::Stdout) || !atty::is(atty::Stream::Stderr)
    }
}

/// Install the `tracing` subscriber, filtered by `RETROFY_LOG` (default `warn`).
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("RETROFY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!is_plain())
        .without_time()
        .init();
}

/// The Python files under `path`, or `path` itself if it's a file.
///
/// Hidden directories (`.git`, `.venv`, ...) are skipped.
pub fn python_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });
    for entry in walker {
        let entry = entry
            .into_diagnostic()
            .wrap_err(format!("error walking {:?}", path.as_os_str()))?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == "py")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
