use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid length: expected {0} bytes, found {1} bytes")]
    BadLength(usize, usize),
    #[error("Invalid parameter set: {0}")]
    InvalidParams(String),
    #[error("Unknown parameter set '{0}'")]
    UnknownParamSet(String),
    #[error("Signature verification failed: {0}")]
    VerificationFailed(#[from] VerificationError),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("No forgery found within {0} attempts")]
    ForgeryNotFound(usize),
    #[error("Signing oracle is closed")]
    OracleClosed,
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("SPHINCS+ verification failed: {0}")]
    SphincsPlusVerificationFailed(String),
    #[error("Hypertree root mismatch after layer {layer}")]
    RootMismatch { layer: usize },
    #[error("Malformed XMSS signature in layer {layer}")]
    MalformedLayer { layer: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
