//! Log dispatch for the disk screen.
//!
//! Every record is handed to the caller, which shows it in the installer's
//! log pane. Records are also written to stderr and appended to
//! `installer.log` in `/tmp` and in the operator's home directory.

use log::{Level, LevelFilter};
use std::{io, path::PathBuf};

const LOG_NAME: &str = "installer.log";

/// Starts logging, forwarding each record's level and message to `callback`.
pub fn log<F: Fn(Level, &str) + Send + Sync + 'static>(callback: F) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .level(LevelFilter::Debug)
        .chain(fern::Output::call(move |record| callback(record.level(), &record.args().to_string())))
        .chain(persistent())
        .apply()?;

    info!("disk screen logging enabled");
    Ok(())
}

/// The stderr and log file outputs. A log file that cannot be opened is
/// skipped.
fn persistent() -> fern::Dispatch {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} partscreen{}] {}",
                record.level(),
                origin(record.file(), record.line()),
                message
            ))
        })
        .chain(io::stderr());

    for path in log_paths() {
        match fern::log_file(&path) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(why) => eprintln!("disk screen cannot log to {}: {}", path.display(), why),
        }
    }

    dispatch
}

fn log_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/tmp").join(LOG_NAME)];
    paths.extend(dirs::home_dir().map(|home| home.join(LOG_NAME)));
    paths
}

/// The `:file:line` suffix of a record's prefix, when the record knows it.
fn origin(file: Option<&str>, line: Option<u32>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!(":{}:{}", file, line),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_origin() {
        assert_eq!(origin(Some("src/screen.rs"), Some(42)), ":src/screen.rs:42");
        assert_eq!(origin(Some("src/screen.rs"), None), "");
        assert_eq!(origin(None, Some(42)), "");
    }

    #[test]
    fn tmp_log_comes_first() {
        let paths = log_paths();
        assert_eq!(paths[0], PathBuf::from("/tmp/installer.log"));
        assert!(paths.iter().all(|path| path.ends_with(LOG_NAME)));
    }
}
