//! The business error type.

use std::fmt;

use serde_json::Value;

use super::codes;
use super::response::Envelope;

/// Boxed error accepted from business handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A business failure with a client-visible code.
///
/// This is the only error type the pipeline reports verbatim. Any other error
/// returned by a business handler is treated as a contract violation.
///
/// A code of [`codes::OK`] is indistinguishable from success once rendered:
/// no `msg` is emitted and the request is not counted as a failure.
#[derive(Debug)]
pub struct BizError {
    code: i64,
    message: String,
    causes: Vec<BoxError>,
}

impl BizError {
    /// Create a business error with the given code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Attach an underlying error. Causes only show up in the rendered message.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Attach several underlying errors at once, in order.
    pub fn with_causes<I, E>(mut self, causes: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<BoxError>,
    {
        self.causes.extend(causes.into_iter().map(Into::into));
        self
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[BoxError] {
        &self.causes
    }

    /// Render this error, together with any partial data, into a response envelope.
    pub fn render(&self, data: Option<Value>) -> Envelope {
        let msg = (self.code != codes::OK).then(|| self.to_string());
        Envelope::new(self.code, msg, data)
    }
}

impl fmt::Display for BizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "business error [code:{}] [msg:{}]", self.code, self.message)?;

        for (i, cause) in self.causes.iter().enumerate() {
            write!(f, " [err-{}:{}]", i, cause)?;
        }

        Ok(())
    }
}

impl std::error::Error for BizError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes
            .first()
            .map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}
