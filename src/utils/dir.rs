use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

const APPLICATION_DIR_NAME: &str = "timeboxer";

/// Resolves the directory holding the database and logs. Uses `%APPDATA%` on Windows and
/// `$XDG_STATE_HOME` (falling back to `$HOME/.local/state`) elsewhere.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                PathBuf::from(env::var("APPDATA").context("APPDATA should be present on Windows")?)
            } else {
                env::var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .or_else(|_| {
                        env::var("HOME").map(|home| {
                            let mut path = PathBuf::from(home);
                            path.push(".local/state");
                            path
                        })
                    })
                    .context("Couldn't find neither XDG_STATE_HOME nor HOME")?
            }
        }
    };
    path.push(APPLICATION_DIR_NAME);
    ensure_dir(path)
}

/// Creates `path` (and parents) if needed and hands it back.
pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Failed to create directory {path:?}")),
    }
}
