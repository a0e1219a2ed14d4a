use thiserror::Error;

/// Canonical result for the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error taxonomy. No kind is retried inside the core; the driver
/// is the recovery boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller broke an operator or block contract: pushing input the
    /// operator did not ask for, slicing twice, finishing a finished
    /// operator, or touching a position outside a block.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// An aggregator-state builder saw a record whose serialized width
    /// differs from the first record's. Fatal to the builder.
    #[error("variable-size aggregator state: expected {expected} bytes, got {got}")]
    VariableSizeState { expected: usize, got: usize },

    /// An aggregator received input on the wrong side of its mode, e.g. a
    /// primitive block where a state block was required.
    #[error("aggregator mode mismatch: {0}")]
    ModeMismatch(String),

    /// The underlying index reader failed. Fatal to the source operator and
    /// surfaced upward, terminating the pipeline.
    #[error("index reader I/O: {0}")]
    ReaderIo(String),

    /// The driver observed cancellation (or a deadline) between polls.
    #[error("pipeline cancelled")]
    Cancelled,
}

// Higher layers funnel reader I/O failures into the engine taxonomy.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::ReaderIo(e.to_string())
    }
}
