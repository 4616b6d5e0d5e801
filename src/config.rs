//! Server configuration.
//!
//! Every option can be given as a command-line flag or through the
//! environment. A `.env` file in the working directory (or next to the
//! executable) is read first by [`load_dotenv`], so its values behave like
//! regular environment variables.

use std::path::PathBuf;

use clap::Parser;

use crate::database::OverlapPolicy;
use crate::error::{Error, Result};
use crate::loader::LoadOptions;

#[derive(Debug, Clone, Parser)]
#[command(name = "ip_location_server", version, about = "IP geolocation lookup service")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long = "listen", env = "HTTP_SERVER_ADDRESS", default_value = "0.0.0.0:8080")]
    pub http_server_address: String,

    /// CSV dataset with one IP range per row.
    #[arg(long = "csv", env = "CSV_FILE_PATH", default_value = "data/sample.csv")]
    pub csv_file_path: PathBuf,

    /// Whether the first CSV row is a header.
    #[arg(
        long,
        env = "CSV_HAS_HEADER",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub csv_has_header: bool,

    /// How overlapping ranges are handled: `reject` or `last-write-wins`.
    #[arg(long, env = "RANGE_OVERLAP_POLICY", default_value = "reject")]
    pub overlap_policy: OverlapPolicy,

    /// Tracing filter, e.g. `info` or `ip_geo_lookup=debug,tower_http=debug`.
    /// Falls back to `RUST_LOG`, then `info`.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Refresh the CSV dataset from this URL before loading it.
    /// Requires the `download` feature.
    #[arg(long, env = "DATASET_URL")]
    pub dataset_url: Option<String>,
}

impl Config {
    /// Parse flags and environment, then validate.
    pub fn load() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_server_address.trim().is_empty() {
            return Err(Error::Config("HTTP_SERVER_ADDRESS cannot be empty".to_string()));
        }
        if self.csv_file_path.as_os_str().is_empty() {
            return Err(Error::Config("CSV_FILE_PATH cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            has_header: self.csv_has_header,
            overlap_policy: self.overlap_policy,
        }
    }
}

/// Load `.env` from the working directory, or from next to the executable.
///
/// Returns the path that was loaded, if any. Variables already set in the
/// environment are not overridden.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }

    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let env_path = exe_dir.join(".env");
    if env_path.exists() && dotenvy::from_path(&env_path).is_ok() {
        return Some(env_path);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("ip_location_server").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--listen",
            "127.0.0.1:9000",
            "--csv",
            "/tmp/geo.csv",
            "--csv-has-header",
            "false",
            "--overlap-policy",
            "last-write-wins",
        ]);

        assert_eq!(config.http_server_address, "127.0.0.1:9000");
        assert_eq!(config.csv_file_path, PathBuf::from("/tmp/geo.csv"));
        assert_eq!(
            config.load_options(),
            LoadOptions { has_header: false, overlap_policy: OverlapPolicy::LastWriteWins }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_policy_rejected() {
        let argv = ["ip_location_server", "--overlap-policy", "sometimes"];
        assert!(Config::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_values() {
        let mut config = parse(&["--listen", "0.0.0.0:8080", "--csv", "data/sample.csv"]);
        config.http_server_address = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = parse(&["--listen", "0.0.0.0:8080", "--csv", "data/sample.csv"]);
        config.csv_file_path = PathBuf::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
