use crate::errors::{ErrorCategory, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{title}: {description}")]
pub struct StrataError {
    pub code: String,
    pub title: String,
    pub description: String,
    pub sql: Option<String>,
    #[source]
    pub cause: Option<Box<StrataError>>,
}

impl StrataError {
    pub fn new(code: &str, title: &str, description: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            description: description.into(),
            sql: None,
            cause: None,
        }
    }

    /// Error raised by a backend that has no finer classification for it.
    pub fn unknown(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown.as_str(), "Unknown error", description)
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_cause(mut self, cause: StrataError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code_str(&self.code)
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code == code.as_str()
    }

    pub fn category(&self) -> ErrorCategory {
        self.error_code()
            .map(ErrorCode::category)
            .unwrap_or(ErrorCategory::BackendExecution)
    }
}
