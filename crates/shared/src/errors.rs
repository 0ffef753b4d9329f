/// How a failure should be treated by retry loops and consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Likely to succeed if tried again (network, availability).
    Transient,
    /// Will never succeed no matter how often it is retried.
    Permanent,
    Cancelled,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),
    #[error("Broker timed out: {0}")]
    BrokerTimeout(String),
    #[error("Broker rejected message: {0}")]
    BrokerRejected(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{entity} with id {id} not found")]
    ReferenceNotFound { entity: &'static str, id: i32 },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::BrokerUnavailable(_) | AppError::BrokerTimeout(_) => ErrorKind::Transient,
            AppError::BrokerRejected(_)
            | AppError::MalformedPayload(_)
            | AppError::Serialization(_)
            | AppError::InvalidEvent(_)
            | AppError::InvalidConfig(_)
            | AppError::ReferenceNotFound { .. } => ErrorKind::Permanent,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal(_) => ErrorKind::Unexpected,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}
