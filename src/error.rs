/*!
 * Error handling for registry normalisation
 *
 * Every failure aborts the run: registry data is assumed to follow its
 * documented coding standard, so an unexpected value is reported with as much
 * context as possible instead of being normalised silently.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Library result type
pub type Result<T> = std::result::Result<T, SeerError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum SeerError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// Tab-separated parsing errors with location information
    #[error("TSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        column: Option<String>,
        context: ErrorContext,
    },

    /// A raw value that cannot be interpreted (bad integer, bad float, ...)
    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// A category code the code tables have not been taught
    #[error("Unrecognised {field} code '{code}'{}", site_suffix(.site))]
    UnknownCode {
        field: String,
        code: String,
        site: Option<String>,
        context: ErrorContext,
    },

    /// Malformed or incomplete static code tables
    #[error("Code table error: {message}")]
    CodeTable {
        message: String,
        table: String,
    },

    /// Column count or header mismatch
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        expected_columns: Option<usize>,
        found_columns: Option<usize>,
        mismatched_column: Option<(usize, String, String)>,
        context: ErrorContext,
    },

    /// File not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

fn site_suffix(site: &Option<String>) -> String {
    site.as_deref()
        .map(|s| format!(" for site '{}'", s))
        .unwrap_or_default()
}

/// Error context providing additional information
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub patient_id: Option<u64>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(path) = &self.file_path {
            parts.push(format!("file {}", path.display()));
        }
        if let Some(line) = self.line_number {
            parts.push(format!("line {}", line));
        }
        if let Some(column) = &self.column_name {
            parts.push(format!("column '{}'", column));
        }
        if let Some(pid) = self.patient_id {
            parts.push(format!("patient {}", pid));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Output format for canonical records and patient summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Tsv,
    JsonLines,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Tsv => write!(f, "TSV"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
        }
    }
}

impl SeerError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let suggestion = if path.extension().is_some_and(|ext| ext == "toml") {
            format!(
                "Check the configuration file at '{}'. Run `seercli config init` to write one with default values.",
                path.display()
            )
        } else {
            format!(
                "Check if the extract exists at '{}'. Registry extracts are tab-separated text without a header row.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an unrecognised code error for a raw field
    pub fn unknown_code(field: &str, code: &str) -> Self {
        Self::UnknownCode {
            field: field.to_string(),
            code: code.to_string(),
            site: None,
            context: ErrorContext::default(),
        }
    }

    /// Create an unrecognised code error whose meaning depends on the tumour site
    pub fn unknown_code_for_site(field: &str, code: &str, site: &str) -> Self {
        Self::UnknownCode {
            field: field.to_string(),
            code: code.to_string(),
            site: Some(site.to_string()),
            context: ErrorContext::default(),
        }
    }

    /// Create a validation error for a value that failed to parse
    pub fn invalid_value(field: &str, value: &str, expected: &str) -> Self {
        Self::DataValidation {
            message: format!("Cannot parse '{}' in field '{}' as {}", value, field, expected),
            field: Some(field.to_string()),
            value: Some(value.to_string()),
            context: ErrorContext::default(),
        }
    }

    /// Create a code table authoring error
    pub fn code_table(table: &str, message: impl Into<String>) -> Self {
        Self::CodeTable {
            message: message.into(),
            table: table.to_string(),
        }
    }

    /// Create a schema mismatch error with detailed information
    pub fn schema_mismatch_detailed(
        expected_columns: usize,
        found_columns: usize,
        mismatched_column: Option<(usize, String, String)>,
    ) -> Self {
        let message = if let Some((index, expected, found)) = &mismatched_column {
            format!(
                "Column {} mismatch: expected '{}', found '{}'",
                index, expected, found
            )
        } else {
            format!(
                "Expected {} columns, found {}",
                expected_columns, found_columns
            )
        };

        Self::SchemaMismatch {
            message,
            expected_columns: Some(expected_columns),
            found_columns: Some(found_columns),
            mismatched_column,
            context: ErrorContext::default(),
        }
    }

    /// Attach the location of the offending record.
    ///
    /// Fields already present in the context are kept.
    pub fn at_record(mut self, file_path: Option<PathBuf>, line_number: usize, patient_id: Option<u64>) -> Self {
        if let Some(context) = self.context_mut() {
            if context.file_path.is_none() {
                context.file_path = file_path;
            }
            if context.line_number.is_none() {
                context.line_number = Some(line_number);
            }
            if context.patient_id.is_none() {
                context.patient_id = patient_id;
            }
        }
        self
    }

    /// The record context, for variants that carry one
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::DataValidation { context, .. }
            | Self::UnknownCode { context, .. }
            | Self::SchemaMismatch { context, .. } => Some(context),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::DataValidation { context, .. }
            | Self::UnknownCode { context, .. }
            | Self::SchemaMismatch { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        let location = self
            .context()
            .map(|c| c.to_string())
            .filter(|s| !s.is_empty())
            .map(|s| format!(" ({})", s))
            .unwrap_or_default();

        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::UnknownCode { .. } => {
                format!(
                    "{}{}\n\nSuggestion: the code tables do not know this value; extend them rather than skipping the record",
                    self, location
                )
            }
            Self::CodeTable { table, .. } => {
                format!("{}\n\nSuggestion: correct the '{}' table", self, table)
            }
            Self::Configuration { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::Export { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => format!("{}{}", self, location),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for SeerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for SeerError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            column: None,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for SeerError {
    fn from(err: serde_json::Error) -> Self {
        SeerError::Export {
            message: err.to_string(),
            format: ExportFormat::JsonLines,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_record_fills_context() {
        let err = SeerError::unknown_code("grade_pathological", "M")
            .at_record(Some(PathBuf::from("extract.txt")), 42, Some(7));
        let context = err.context().unwrap();
        assert_eq!(context.line_number, Some(42));
        assert_eq!(context.patient_id, Some(7));
        assert!(err.user_message().contains("line 42"));
    }

    #[test]
    fn test_unknown_code_message_mentions_site() {
        let err = SeerError::unknown_code_for_site("grade", "M", "Lung and Bronchus");
        assert_eq!(
            err.to_string(),
            "Unrecognised grade code 'M' for site 'Lung and Bronchus'"
        );
    }

    #[test]
    fn test_code_table_errors_have_no_record_context() {
        let err = SeerError::code_table("site ranges", "overlap").at_record(None, 1, None);
        assert!(err.context().is_none());
    }
}
