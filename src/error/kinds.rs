use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
#[derive(Debug)]
pub enum ExportError {
    /// Request or configuration problems detected before any work starts.
    Configuration(ConfigurationError),

    /// The requested form does not exist (or is deleted).
    FormNotFound(String),

    /// An `alter_export` hook rejected the export.
    Veto(VetoError),

    /// The encoder refused to start; nothing has been written.
    EncoderInit(EncodingError),

    /// A record could not be transformed and the policy is to abort.
    Transform(TransformError),

    /// The encoder failed while streaming.
    Encoding(EncodingError),

    /// The record store failed.
    Store(StoreError),

    /// The output sink failed.
    Sink(SinkError),

    /// I/O errors outside of the sink (config files, output files).
    Io(io::Error),
}

/// Errors detected before the pipeline touches the store.
#[derive(Debug)]
pub enum ConfigurationError {
    /// Requested export format is not supported.
    UnknownFormat(String),

    /// The request carries no caller identity.
    MissingIdentity,

    /// Config file not found.
    FileNotFound(String),

    /// Config file could not be parsed.
    InvalidConfig(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Rejection raised by an extension hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VetoError {
    /// Message returned to the caller.
    pub message: String,
}

/// Per-record transformation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Nesting went past the configured depth cap.
    DepthExceeded { limit: usize },
}

/// Encoder failures.
#[derive(Debug)]
pub enum EncodingError {
    /// The form defines nothing the encoder could emit.
    NoColumns(String),

    /// A value could not be serialized.
    Serialize(String),

    /// Encoder methods were called out of order.
    InvalidState(&'static str),
}

/// Record store failures.
#[derive(Debug)]
pub enum StoreError {
    /// MongoDB driver error.
    Driver(mongodb::error::Error),

    /// A stored document could not be decoded.
    Decode(String),
}

/// Output sink failures.
#[derive(Debug)]
pub enum SinkError {
    /// The consumer went away before the export finished.
    Closed,

    /// Writing to the underlying output failed.
    Io(io::Error),
}

/// Outcome codes surfaced to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    InvalidFormat,
    NotFound,
    Unauthorized,
    BadRequest,
    InternalError,
}

impl ResultCode {
    /// HTTP status equivalent of this code
    pub fn http_status(self) -> u16 {
        match self {
            ResultCode::Ok => 200,
            ResultCode::InvalidFormat | ResultCode::BadRequest => 400,
            ResultCode::Unauthorized => 401,
            ResultCode::NotFound => 404,
            ResultCode::InternalError => 500,
        }
    }
}

impl ExportError {
    /// Map this error onto the code reported to the caller.
    pub fn result_code(&self) -> ResultCode {
        match self {
            ExportError::Configuration(ConfigurationError::UnknownFormat(_)) => {
                ResultCode::InvalidFormat
            }
            ExportError::Configuration(ConfigurationError::MissingIdentity) => {
                ResultCode::Unauthorized
            }
            ExportError::Configuration(_) => ResultCode::InternalError,
            ExportError::FormNotFound(_) => ResultCode::NotFound,
            ExportError::Veto(_) | ExportError::EncoderInit(_) => ResultCode::BadRequest,
            ExportError::Transform(_)
            | ExportError::Encoding(_)
            | ExportError::Store(_)
            | ExportError::Sink(_)
            | ExportError::Io(_) => ResultCode::InternalError,
        }
    }

    /// Whether the sink is guaranteed to be untouched by the failed export.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            ExportError::Configuration(_)
                | ExportError::FormNotFound(_)
                | ExportError::Veto(_)
                | ExportError::EncoderInit(_)
        )
    }
}

impl VetoError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Configuration(e) => write!(f, "Configuration error: {e}"),
            ExportError::FormNotFound(id) => write!(f, "Form not found: {id}"),
            ExportError::Veto(e) => write!(f, "Export rejected: {e}"),
            ExportError::EncoderInit(e) => write!(f, "Encoder initialization failed: {e}"),
            ExportError::Transform(e) => write!(f, "Transform error: {e}"),
            ExportError::Encoding(e) => write!(f, "Encoding error: {e}"),
            ExportError::Store(e) => write!(f, "Store error: {e}"),
            ExportError::Sink(e) => write!(f, "Sink error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnknownFormat(name) => write!(f, "Unknown format: {name}"),
            ConfigurationError::MissingIdentity => write!(f, "Missing caller identity"),
            ConfigurationError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigurationError::InvalidConfig(msg) => write!(f, "Invalid config: {msg}"),
            ConfigurationError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for VetoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::DepthExceeded { limit } => {
                write!(f, "Malformed record: nesting exceeds {limit} levels")
            }
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::NoColumns(form) => write!(f, "Form {form} has no exportable fields"),
            EncodingError::Serialize(msg) => write!(f, "Failed to serialize record: {msg}"),
            EncodingError::InvalidState(msg) => write!(f, "Invalid encoder state: {msg}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Driver(e) => write!(f, "{e}"),
            StoreError::Decode(msg) => write!(f, "Failed to decode document: {msg}"),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Closed => write!(f, "Output closed by consumer"),
            SinkError::Io(e) => write!(f, "Failed to write output: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for ConfigurationError {}
impl std::error::Error for VetoError {}
impl std::error::Error for TransformError {}
impl std::error::Error for EncodingError {}
impl std::error::Error for StoreError {}
impl std::error::Error for SinkError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<mongodb::error::Error> for ExportError {
    fn from(err: mongodb::error::Error) -> Self {
        ExportError::Store(StoreError::Driver(err))
    }
}

impl From<ConfigurationError> for ExportError {
    fn from(err: ConfigurationError) -> Self {
        ExportError::Configuration(err)
    }
}

impl From<VetoError> for ExportError {
    fn from(err: VetoError) -> Self {
        ExportError::Veto(err)
    }
}

impl From<TransformError> for ExportError {
    fn from(err: TransformError) -> Self {
        ExportError::Transform(err)
    }
}

impl From<EncodingError> for ExportError {
    fn from(err: EncodingError) -> Self {
        ExportError::Encoding(err)
    }
}

impl From<StoreError> for ExportError {
    fn from(err: StoreError) -> Self {
        ExportError::Store(err)
    }
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        ExportError::Sink(err)
    }
}

impl From<serde_json::Error> for EncodingError {
    fn from(err: serde_json::Error) -> Self {
        EncodingError::Serialize(err.to_string())
    }
}

impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => SinkError::Closed,
            _ => SinkError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        let cases: Vec<(ExportError, ResultCode)> = vec![
            (ConfigurationError::UnknownFormat("xml".into()).into(), ResultCode::InvalidFormat),
            (ConfigurationError::MissingIdentity.into(), ResultCode::Unauthorized),
            (ExportError::FormNotFound("abc".into()), ResultCode::NotFound),
            (VetoError::new("nope").into(), ResultCode::BadRequest),
            (
                ExportError::EncoderInit(EncodingError::NoColumns("f".into())),
                ResultCode::BadRequest,
            ),
            (SinkError::Closed.into(), ResultCode::InternalError),
            (
                TransformError::DepthExceeded { limit: 3 }.into(),
                ResultCode::InternalError,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(err.result_code(), code, "{err}");
        }
    }

    #[test]
    fn test_clean_errors() {
        assert!(ExportError::FormNotFound("x".into()).is_clean());
        assert!(!ExportError::Encoding(EncodingError::Serialize("x".into())).is_clean());
    }

    #[test]
    fn test_broken_pipe_maps_to_closed() {
        let err: SinkError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, SinkError::Closed));

        let err: SinkError = io::Error::other("disk full").into();
        assert!(matches!(err, SinkError::Io(_)));
    }

    #[test]
    fn test_display() {
        let err: ExportError = TransformError::DepthExceeded { limit: 32 }.into();
        assert_eq!(
            err.to_string(),
            "Transform error: Malformed record: nesting exceeds 32 levels"
        );
        assert_eq!(ResultCode::InternalError.http_status(), 500);
    }
}
