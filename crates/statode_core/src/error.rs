use thiserror::Error;

/// Errors raised by table edits, statistics and ODE runs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("Column '{0}' is not numeric")]
    NonNumericColumn(String),

    #[error("Column '{column}' is {kind}; value does not fit")]
    KindMismatch { column: String, kind: &'static str },

    #[error("Row index {index} out of bounds for {rows} rows")]
    RowOutOfBounds { index: usize, rows: usize },

    #[error("Column '{0}' has no non-missing values")]
    EmptyColumn(String),

    #[error("Invalid percentile {0} (must be a fraction in [0, 1])")]
    InvalidPercentile(f64),

    #[error("Invalid scaling method '{0}' (expected 'standard' or 'min-max')")]
    InvalidScalingMethod(String),

    #[error("Invalid solver type '{0}' (expected 'ForwardEuler', 'RK4' or 'MidPoint')")]
    InvalidSolverType(String),

    #[error("Invalid time range: t0 = {t0}, tf = {tf} (need finite tf > t0)")]
    InvalidTimeRange { t0: f64, tf: f64 },

    #[error("Invalid step count {0} (need at least 1)")]
    InvalidStepCount(usize),

    #[error("Degenerate variance: {0}")]
    DegenerateVariance(String),

    #[error("No trajectory recorded; call solve first")]
    NotSolved,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
