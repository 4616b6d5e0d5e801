use thiserror::Error;

/// Errors raised while loading data or building the range index.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid range: start {start} is greater than end {end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("range {start}-{end} overlaps existing range {existing_start}-{existing_end}")]
    OverlappingRange {
        start: u32,
        end: u32,
        existing_start: u32,
        existing_end: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "download")]
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
