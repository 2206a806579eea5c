use std::error::Error;
use std::fmt::{Display, Formatter};

/// Domain failures raised by the roster, grading and exchange code.
///
/// Each variant maps onto a stable snake_case code that the IPC layer puts in
/// the `error.code` field of a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordsError {
    /// A required field was blank or a value was out of range.
    InvalidInput(String),
    /// The enrollment number is already used in this batch+department roster.
    DuplicateEnrollment(String),
    /// No batch, semester or department was selected for the operation.
    MissingSelection(String),
    /// A CSV header lacks a required column, or the file has no data rows.
    MalformedCsvHeader(String),
    NotFound(String),
    /// The operation would drop data and the caller did not confirm it.
    ConfirmationRequired {
        message: String,
        details: serde_json::Value,
    },
}

pub type RecordsResult<T> = Result<T, RecordsError>;

impl RecordsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DuplicateEnrollment(_) => "duplicate_enrollment",
            Self::MissingSelection(_) => "missing_selection",
            Self::MalformedCsvHeader(_) => "malformed_csv_header",
            Self::NotFound(_) => "not_found",
            Self::ConfirmationRequired { .. } => "confirmation_required",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ConfirmationRequired { details, .. } => Some(details.clone()),
            _ => None,
        }
    }
}

impl Display for RecordsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg)
            | Self::MissingSelection(msg)
            | Self::MalformedCsvHeader(msg)
            | Self::NotFound(msg) => write!(f, "{msg}"),
            Self::DuplicateEnrollment(enrollment_no) => write!(
                f,
                "a student with enrollment number {enrollment_no} already exists in this batch"
            ),
            Self::ConfirmationRequired { message, .. } => write!(f, "{message}"),
        }
    }
}

impl Error for RecordsError {}

#[cfg(test)]
mod tests {
    use super::RecordsError;

    #[test]
    fn codes_are_stable_snake_case() {
        assert_eq!(
            RecordsError::DuplicateEnrollment("E1".into()).code(),
            "duplicate_enrollment"
        );
        assert_eq!(
            RecordsError::MissingSelection("x".into()).code(),
            "missing_selection"
        );
        assert_eq!(
            RecordsError::MalformedCsvHeader("x".into()).code(),
            "malformed_csv_header"
        );
    }

    #[test]
    fn duplicate_message_names_the_enrollment() {
        let e = RecordsError::DuplicateEnrollment("E100".into());
        assert!(e.to_string().contains("E100"));
        assert!(e.details().is_none());
    }
}
