use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Start scripts over HTTP and stream their output into the server log
#[derive(Debug, Clone, Parser)]
#[command(name = "jobserver", version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9922", env = "JOB_LISTEN")]
    pub listen: SocketAddr,

    /// File holding the shared secret callers must present
    #[arg(long, default_value = "token", env = "JOB_TOKEN_FILE")]
    pub token_file: PathBuf,

    /// Directory the `<job>.sh` scripts are looked up in and run from
    #[arg(long, default_value = ".", env = "JOB_SCRIPTS_DIR")]
    pub scripts_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read token file {path:?}: {source}")]
    TokenUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("token file {0:?} is empty")]
    TokenEmpty(PathBuf),
}

/// Read the shared secret once, trimming surrounding whitespace.
pub fn load_token(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::TokenUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let token = content.trim();
    if token.is_empty() {
        return Err(ConfigError::TokenEmpty(path.to_path_buf()));
    }
    Ok(token.to_string())
}
