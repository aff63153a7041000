/// Problems that abort a run. Data quality issues that only affect one feature are never errors;
/// they're counted in the `Report` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required dataset is missing or malformed, or its joined tables can't be resolved.
    #[error("{0}")]
    SourceData(String),
    /// An output layer couldn't be written. Artifacts written earlier are untouched.
    #[error("Failed to write layer: '{path}': {reason}")]
    Export { path: String, reason: String },
}

impl Error {
    pub fn source_data<I: Into<String>>(msg: I) -> Error {
        Error::SourceData(msg.into())
    }
}
