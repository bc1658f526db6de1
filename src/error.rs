use thiserror::Error;

#[derive(Error, Debug)]
pub enum NowcastError {
    #[error("Empty query: nothing left after normalizing {0:?}")]
    EmptyQuery(String),

    #[error("No classification matched {query:?} above similarity {threshold}")]
    NoMatchFound { query: String, threshold: f64 },

    #[error(
        "Ambiguous resolution: {first} ({first_score:.3}) vs {second} ({second_score:.3}); \
         preselect a code"
    )]
    AmbiguousResolution {
        first: String,
        first_score: f64,
        second: String,
        second_score: f64,
    },

    #[error("Malformed period {label:?}: expected {expected}")]
    MalformedPeriod { label: String, expected: String },

    #[error("Insufficient history: {found} usable observation(s), need {required}")]
    InsufficientHistory { found: usize, required: usize },

    #[error("Non-positive observation {value} at {period}: growth rate undefined")]
    NonPositiveObservation { period: String, value: f64 },

    #[error("Invalid growth rate {0}: must be finite and greater than -1")]
    InvalidGrowthRate(f64),

    #[error("Horizon {horizon} exceeds the maximum of {max} periods")]
    HorizonTooLong { horizon: usize, max: usize },

    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Invalid classification dictionary: {0}")]
    InvalidDictionary(String),

    #[error("Unknown classification code: {0}")]
    UnknownCode(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Unknown table preset: {0}")]
    UnknownPreset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, NowcastError>;
