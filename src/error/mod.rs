//! Error handling for export operations.
//!
//! Errors fall into two classes with different recovery guarantees:
//! - Errors raised before streaming starts (unknown format, missing identity,
//!   missing form, hook veto, encoder initialisation) leave the sink untouched
//!   and can be reported to the caller as a clean error response.
//! - Errors raised after streaming starts (store failures, encoding failures,
//!   aborted transforms) can only terminate the stream. Bytes already sent
//!   stay sent, so consumers must treat a stream without an end-of-stream
//!   signal as an incomplete document.
//!
//! # Example
//!
//! ```rust
//! use submission_export::error::{ConfigurationError, ExportError, ResultCode};
//!
//! let err: ExportError = ConfigurationError::UnknownFormat("xml".into()).into();
//! assert_eq!(err.result_code(), ResultCode::InvalidFormat);
//! assert_eq!(err.result_code().http_status(), 400);
//! ```

pub mod kinds;

pub use kinds::{
    ConfigurationError, EncodingError, ExportError, Result, ResultCode, SinkError, StoreError,
    TransformError, VetoError,
};
