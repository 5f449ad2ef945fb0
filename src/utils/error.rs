use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Type inference failed for value '{value}'")]
    TypeInferenceError { value: String },

    #[error("Row {line} could not be parsed: {message}")]
    RowParseError { line: u64, message: String },

    #[error("Write to feature store failed: {message}")]
    WriteError {
        message: String,
        #[source]
        source: Option<Box<IngestError>>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Inference,
    Data,
    Storage,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        IngestError::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        IngestError::WriteError {
            message: message.into(),
            source: None,
        }
    }

    /// 將底層錯誤包成 WriteError，保留原始原因
    pub fn write_caused_by(message: impl Into<String>, cause: IngestError) -> Self {
        match cause {
            // 已經是 WriteError 就不再重複包裝
            IngestError::WriteError { .. } => cause,
            other => IngestError::WriteError {
                message: message.into(),
                source: Some(Box::new(other)),
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::ConfigurationError { .. } => ErrorCategory::Configuration,
            IngestError::TypeInferenceError { .. } => ErrorCategory::Inference,
            IngestError::RowParseError { .. } | IngestError::CsvError(_) => ErrorCategory::Data,
            IngestError::WriteError { .. } => ErrorCategory::Storage,
            IngestError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IngestError::RowParseError { .. } => ErrorSeverity::Low,
            IngestError::ConfigurationError { .. } | IngestError::TypeInferenceError { .. } => {
                ErrorSeverity::High
            }
            IngestError::CsvError(_) => ErrorSeverity::High,
            IngestError::WriteError { .. } => ErrorSeverity::Medium,
            IngestError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the schema spec, the lat/lon field names and the row format options"
            }
            ErrorCategory::Inference => "Provide an explicit schema spec with --spec",
            ErrorCategory::Data => "Inspect the reported rows in the input file",
            ErrorCategory::Storage => {
                "No features were written; fix the output store and rerun the ingest"
            }
            ErrorCategory::Io => "Check that the input exists and the output directory is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            IngestError::ConfigurationError { message } => {
                format!("Invalid configuration: {}", message)
            }
            IngestError::TypeInferenceError { value } => {
                format!("Could not infer a column type from sample value '{}'", value)
            }
            IngestError::RowParseError { line, .. } => format!("Row {} was skipped", line),
            IngestError::WriteError { message, .. } => {
                format!("Writing features failed and was rolled back: {}", message)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_caused_by_keeps_original_cause() {
        let err = IngestError::write_caused_by("commit failed", IngestError::config("boom"));
        match &err {
            IngestError::WriteError { source, .. } => {
                assert!(matches!(
                    source.as_deref(),
                    Some(IngestError::ConfigurationError { .. })
                ));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_write_error_is_not_double_wrapped() {
        let err = IngestError::write_caused_by("outer", IngestError::write("inner"));
        assert_eq!(err.to_string(), "Write to feature store failed: inner");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(
            IngestError::IoError(std::io::Error::other("x")).severity()
                > IngestError::config("x").severity()
        );
    }
}
