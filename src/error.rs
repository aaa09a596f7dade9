//! Error types for Crystal
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Crystal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Backend errors (3xx)
    BackendUnavailable = 300,
    BackendRequest = 301,
    BackendResponse = 302,

    // Assistant errors (4xx)
    AssistantNotFound = 400,
    InstructionsUnavailable = 401,
    UnsupportedTask = 402,
    InvalidTaskParameters = 403,

    // File operation errors (5xx)
    DirectoryNotAllowed = 500,
    DirectoryNotFound = 501,
    FileOperationFailed = 502,
    FileOperationsDisabled = 503,

    // Scheduler errors (6xx)
    InvalidSchedule = 600,
    SchedulerNotRunning = 601,
    JobNotFound = 602,
    SchedulerFailure = 603,

    // Server errors (7xx)
    ServerBind = 700,
    ServerFailure = 701,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            700..=799 => 70,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────

    /// Backend could not be reached
    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// Backend request was rejected
    #[error("{backend} request failed: {message}")]
    BackendRequest { backend: String, message: String },

    /// Backend answered with something we could not use
    #[error("{backend} returned an invalid response: {message}")]
    BackendResponse { backend: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Assistant Errors
    // ─────────────────────────────────────────────────────────────

    /// No persona registered under this name
    #[error("Assistant '{name}' not found. Available: {}", .available.join(", "))]
    AssistantNotFound { name: String, available: Vec<String> },

    /// Instruction source missing or unreadable
    #[error("Instructions unavailable at {path}")]
    InstructionsUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Task type the persona does not implement
    #[error("Unsupported task type: {task_type}")]
    UnsupportedTask { task_type: String },

    /// Task parameters missing or malformed
    #[error("Invalid parameters for task {task_type}: {message}")]
    InvalidTaskParameters { task_type: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // File Operation Errors
    // ─────────────────────────────────────────────────────────────

    /// Directory outside the configured allow-list
    #[error("Directory not allowed: {path}")]
    DirectoryNotAllowed { path: PathBuf },

    /// Directory missing or not a directory
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A single file operation failed
    #[error("File operation failed on {path}: {message}")]
    FileOperation { path: PathBuf, message: String },

    /// File operations switched off in configuration
    #[error("File operations are disabled")]
    FileOperationsDisabled,

    // ─────────────────────────────────────────────────────────────
    // Scheduler Errors
    // ─────────────────────────────────────────────────────────────

    /// Trigger expression could not be understood
    #[error("Invalid schedule '{input}': {message}")]
    InvalidSchedule { input: String, message: String },

    /// Scheduler has not been started
    #[error("Scheduler is not running")]
    SchedulerNotRunning,

    /// No job registered under this id
    #[error("Scheduled job not found: {id}")]
    JobNotFound { id: String },

    /// Failure inside the scheduling library
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    // ─────────────────────────────────────────────────────────────
    // Server Errors
    // ─────────────────────────────────────────────────────────────

    /// Listener could not be bound
    #[error("Failed to bind {addr}")]
    ServerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server terminated abnormally
    #[error("Server error: {0}")]
    Server(String),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },

            Error::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Error::BackendRequest { .. } => ErrorCode::BackendRequest,
            Error::BackendResponse { .. } => ErrorCode::BackendResponse,

            Error::AssistantNotFound { .. } => ErrorCode::AssistantNotFound,
            Error::InstructionsUnavailable { .. } => ErrorCode::InstructionsUnavailable,
            Error::UnsupportedTask { .. } => ErrorCode::UnsupportedTask,
            Error::InvalidTaskParameters { .. } => ErrorCode::InvalidTaskParameters,

            Error::DirectoryNotAllowed { .. } => ErrorCode::DirectoryNotAllowed,
            Error::DirectoryNotFound { .. } => ErrorCode::DirectoryNotFound,
            Error::FileOperation { .. } => ErrorCode::FileOperationFailed,
            Error::FileOperationsDisabled => ErrorCode::FileOperationsDisabled,

            Error::InvalidSchedule { .. } => ErrorCode::InvalidSchedule,
            Error::SchedulerNotRunning => ErrorCode::SchedulerNotRunning,
            Error::JobNotFound { .. } => ErrorCode::JobNotFound,
            Error::Scheduler(_) => ErrorCode::SchedulerFailure,

            Error::ServerBind { .. } => ErrorCode::ServerBind,
            Error::Server(_) => ErrorCode::ServerFailure,

            Error::Json(_) => ErrorCode::InternalError,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the caller supplied something wrong (as opposed to a server-side fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::AssistantNotFound { .. }
                | Error::UnsupportedTask { .. }
                | Error::InvalidTaskParameters { .. }
                | Error::DirectoryNotAllowed { .. }
                | Error::DirectoryNotFound { .. }
                | Error::FileOperationsDisabled
                | Error::InvalidSchedule { .. }
                | Error::JobNotFound { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'crystal config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'crystal config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),

            Error::BackendUnavailable { .. } => Some(
                "Check that Ollama is running ('ollama serve') or that an OpenAI API key is configured.",
            ),
            Error::BackendRequest { .. } => Some(
                "Verify the model name and API key in the [openai] / [ollama] sections.",
            ),

            Error::AssistantNotFound { .. } => Some(
                "Run 'crystal status' to list the configured assistants.",
            ),
            Error::InstructionsUnavailable { .. } => Some(
                "Run 'crystal assistants install <name>' to write the bundled instructions.",
            ),

            Error::DirectoryNotAllowed { .. } => Some(
                "Add the directory to [files].allowed_directories or CRYSTAL_ALLOWED_DIRECTORIES.",
            ),
            Error::FileOperationsDisabled => Some(
                "Set [files].allow_file_operations = true to enable file operations.",
            ),

            Error::InvalidSchedule { .. } => Some(
                "Use a cron expression, 'every 10 minutes', 'daily at 09:30', 'in 2 hours' or an RFC 3339 time.",
            ),

            Error::ServerBind { .. } => Some(
                "Another process may be using the port. Try 'crystal serve --port <other>'.",
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn backend_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn backend_request(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendRequest {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn backend_response(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendResponse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn file_operation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::FileOperation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_schedule(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidSchedule {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn invalid_task_parameters(
        task_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidTaskParameters {
            task_type: task_type.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::BackendUnavailable.as_str(), "E300");
        assert_eq!(ErrorCode::DirectoryNotAllowed.as_str(), "E500");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::BackendRequest.exit_code(), 30);
        assert_eq!(ErrorCode::AssistantNotFound.exit_code(), 40);
        assert_eq!(ErrorCode::DirectoryNotFound.exit_code(), 50);
        assert_eq!(ErrorCode::InvalidSchedule.exit_code(), 60);
        assert_eq!(ErrorCode::ServerBind.exit_code(), 70);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_assistant_not_found_lists_names() {
        let err = Error::AssistantNotFound {
            name: "jade".into(),
            available: vec!["ruby".into(), "opal".into()],
        };
        assert_eq!(
            err.to_string(),
            "Assistant 'jade' not found. Available: ruby, opal"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::config_not_found("/test");
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::DirectoryNotAllowed { path: "/etc".into() };
        assert!(err.suggestion().unwrap().contains("allowed_directories"));
    }

    #[test]
    fn test_format_for_terminal() {
        let formatted = Error::config_not_found("/test/config.toml").format_for_terminal();
        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::invalid_schedule("sometimes", "unrecognized").format_for_log();
        assert!(formatted.contains("[E600]"));
        assert!(!formatted.contains("\x1b["));
    }
}
