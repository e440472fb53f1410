/// Application-level error carrying the process exit code.
///
/// Exit codes:
/// - `2`: invalid input or configuration (missing file, bad CSV schema, bad flags)
/// - `3`: insufficient data (no usable rows)
/// - `4`: numerical failure outside the per-candidate fit path
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<crate::fit::SearchError> for AppError {
    fn from(err: crate::fit::SearchError) -> Self {
        AppError::new(2, format!("Invalid search space: {err}"))
    }
}
