use thiserror::Error;

#[derive(Error, Debug)]
pub enum CfoError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Upload rejected: {message}")]
    UploadError { message: String },

    #[error("Could not decode file: {message}")]
    EncodingError { message: String },

    #[error("CSV header error: {message}")]
    HeaderError { message: String },

    #[error("Invalid {kind} '{input}': {reason}")]
    ValueError {
        kind: ValueKind,
        input: String,
        reason: String,
    },

    #[error("Too many errors found ({count}). Check the CSV format")]
    TooManyErrors { count: usize },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Assistant error ({kind:?}): {message}")]
    AssistantError {
        kind: AssistantFailure,
        message: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// Which scalar a [`CfoError::ValueError`] was parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Date,
    Amount,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Date => write!(f, "date"),
            ValueKind::Amount => write!(f, "amount"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantFailure {
    Disabled,
    InvalidKey,
    PermissionDenied,
    QuotaExceeded,
    InvalidResponse,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Storage,
    Data,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CfoError {
    pub fn validation(message: impl Into<String>) -> Self {
        CfoError::ValidationError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        CfoError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CfoError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CfoError::ConfigError { .. }
            | CfoError::InvalidConfigValueError { .. }
            | CfoError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CfoError::UploadError { .. }
            | CfoError::EncodingError { .. }
            | CfoError::HeaderError { .. }
            | CfoError::ValueError { .. }
            | CfoError::TooManyErrors { .. }
            | CfoError::CsvError(_)
            | CfoError::ValidationError { .. } => ErrorCategory::Input,
            CfoError::HttpError(_) => ErrorCategory::Network,
            CfoError::IoError(_) | CfoError::ZipError(_) => ErrorCategory::Storage,
            CfoError::SerializationError(_)
            | CfoError::NotFound { .. }
            | CfoError::ProcessingError { .. } => ErrorCategory::Data,
            CfoError::AssistantError { .. } => ErrorCategory::Assistant,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CfoError::NotFound { .. } | CfoError::ValidationError { .. } => ErrorSeverity::Low,
            CfoError::HttpError(_) | CfoError::AssistantError { .. } => ErrorSeverity::Medium,
            CfoError::IoError(_) | CfoError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CfoError::ConfigError { .. }
            | CfoError::InvalidConfigValueError { .. }
            | CfoError::MissingConfigError { .. } => {
                "Check cfo-pro.toml and the environment variables it references"
            }
            CfoError::UploadError { .. } => "Export the statement as a .csv file under the size limit",
            CfoError::EncodingError { .. } => "Save the CSV as UTF-8 from your spreadsheet tool",
            CfoError::HeaderError { .. } => {
                "Make sure the CSV has Data, Descrição, Entrada and Saída (or Valor) columns"
            }
            CfoError::ValueError {
                kind: ValueKind::Date,
                ..
            } => "Use DD/MM/YYYY or YYYY-MM-DD dates",
            CfoError::ValueError {
                kind: ValueKind::Amount,
                ..
            } => "Use a comma for decimals (e.g. 1.234,56) or a plain dot (1234.56)",
            CfoError::TooManyErrors { .. } | CfoError::CsvError(_) => {
                "Open the file and fix the reported lines, then import again"
            }
            CfoError::NotFound { .. } => "List transactions to find a valid id",
            CfoError::ValidationError { .. } => "Correct the input and retry",
            CfoError::HttpError(_) => "Check your network connection and retry in a moment",
            CfoError::AssistantError { kind, .. } => match kind {
                AssistantFailure::Disabled => "Set a Gemini API key with `cfo-pro chat-test <KEY>`",
                AssistantFailure::InvalidKey => "Verify the Gemini API key in the settings",
                AssistantFailure::PermissionDenied => {
                    "Make sure the API key has access to the Generative Language API"
                }
                AssistantFailure::QuotaExceeded => "Wait a few minutes before sending more messages",
                AssistantFailure::InvalidResponse | AssistantFailure::Other => "Try again shortly",
            },
            CfoError::IoError(_) | CfoError::ZipError(_) => {
                "Check that the data directory exists and is writable"
            }
            CfoError::SerializationError(_) => "The data file may be corrupt; restore a backup",
            CfoError::ProcessingError { .. } => "Review the input data and retry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CfoError::EncodingError { .. } => {
                "File encoding problem. Try saving the CSV as UTF-8.".to_string()
            }
            CfoError::HeaderError { .. } => {
                "Wrong CSV layout. Check that it has the columns: Data, Descrição, Entrada, Saída."
                    .to_string()
            }
            CfoError::ValueError {
                kind: ValueKind::Date,
                input,
                ..
            } => format!("Unrecognised date format '{}'. Use DD/MM/YYYY or YYYY-MM-DD.", input),
            CfoError::ValueError {
                kind: ValueKind::Amount,
                input,
                ..
            } => format!(
                "Unrecognised amount '{}'. Use a comma for decimals (e.g. 1.234,56).",
                input
            ),
            CfoError::AssistantError { kind, message } => match kind {
                AssistantFailure::Disabled => {
                    "The AI chat is disabled: no Gemini API key configured.".to_string()
                }
                AssistantFailure::InvalidKey => {
                    "Your Google Gemini API key seems to be invalid. Check the settings.".to_string()
                }
                AssistantFailure::PermissionDenied => {
                    "Access denied by the API. Check the API key permissions.".to_string()
                }
                AssistantFailure::QuotaExceeded => {
                    "Google Gemini quota exceeded. Try again later.".to_string()
                }
                AssistantFailure::InvalidResponse | AssistantFailure::Other => format!(
                    "Error talking to the AI: {}. Try again in a few moments.",
                    message
                ),
            },
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CfoError>;
