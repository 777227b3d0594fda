use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("port name '{actual}' does not match expected '{expected}'")]
    PortNameMismatch { expected: String, actual: String },
    #[error("malformed port message: {0}")]
    Malformed(String),
}
