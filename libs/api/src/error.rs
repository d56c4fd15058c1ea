/// Category of an ingest error. Allows the worker pool to decide
/// between retrying a bulk request and dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration: permanent, fail at startup.
    Config,
    /// Transport error (connect, timeout, reset), transient, may retry.
    Io,
    /// Sink answered with a non-success HTTP status.
    Http,
    /// Data format/parse error: bad input, skip document.
    Format,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Http => f.write_str("http"),
            ErrorKind::Format => f.write_str("format"),
        }
    }
}

/// Unified error type for document parsing and bulk sink calls.
///
/// Carries an `ErrorKind` for categorization, a human-readable message
/// and, for `Http`, the status code returned by the sink.
#[derive(Clone)]
pub struct IngestError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
}

impl IngestError {
    /// Configuration error: permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, status: None, message: msg.into() }
    }

    /// Transport error, transient, may retry.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, status: None, message: msg.into() }
    }

    /// Non-success HTTP answer from the sink.
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Http, status: Some(status), message: msg.into() }
    }

    /// Format/parse error: bad input, skip document.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, status: None, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Имеет ли смысл повторить запрос: transport ошибки всегда,
    /// HTTP только 429 и 5xx.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Io => true,
            ErrorKind::Http => self.status.is_some_and(is_retryable_status),
            ErrorKind::Config | ErrorKind::Format => false,
        }
    }
}

/// 429 Too Many Requests и любые 5xx: временные ошибки sink'а.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl std::fmt::Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{} {status}] {}", self.kind, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self { Self::io(e.to_string()) }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self { Self::format_err(e.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(IngestError::io("connection refused").is_retryable());
        assert!(IngestError::http(503, "unavailable").is_retryable());
        assert!(IngestError::http(429, "slow down").is_retryable());
        assert!(!IngestError::http(400, "bad request").is_retryable());
        assert!(!IngestError::format_err("not json").is_retryable());
        assert!(!IngestError::config("empty url").is_retryable());
    }

    #[test]
    fn debug_includes_kind_and_status() {
        let e = IngestError::http(502, "bad gateway");
        assert_eq!(format!("{e:?}"), "[http 502] bad gateway");
        assert_eq!(e.to_string(), "bad gateway");

        let e = IngestError::format_err("trailing comma");
        assert_eq!(format!("{e:?}"), "[format] trailing comma");
    }
}
