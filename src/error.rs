use thiserror::Error;

/// Failures of a single analysis or fetch request.
///
/// Every variant is terminal for the request that produced it; nothing is
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The trimmed article text was empty. No request was made.
    #[error("Please enter or fetch some news text to analyze.")]
    EmptyInput,

    /// Any other input rejected before a request was made.
    #[error("{0}")]
    Validation(String),

    /// The provider is missing its credential or is otherwise unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote call failed, timed out or returned a non-success status.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The returned document is not JSON or does not match the response schema.
    #[error("Schema violation at `{path}`: {message}")]
    SchemaViolation { path: String, message: String },

    /// Fetching or extracting an article from a URL failed.
    #[error("{0}")]
    Fetch(String),
}

impl AnalysisError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::SchemaViolation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Message suitable for showing to the person who submitted the request.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::EmptyInput | AnalysisError::Validation(_) | AnalysisError::Fetch(_) => {
                self.to_string()
            }
            AnalysisError::Config(_) => {
                "Failed to analyze news. The analysis service is not configured.".to_string()
            }
            AnalysisError::Upstream(message) => format!("Failed to analyze news: {}", message),
            AnalysisError::SchemaViolation { path, message } => format!(
                "Failed to analyze news. The AI model returned an invalid response ({}: {}).",
                path, message
            ),
        }
    }

    /// True for failures caught before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, AnalysisError::EmptyInput | AnalysisError::Validation(_))
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the request URL; credentials only travel in headers
        if err.is_timeout() {
            AnalysisError::Upstream("the request timed out".to_string())
        } else if err.is_connect() {
            AnalysisError::Upstream("could not connect to the analysis service".to_string())
        } else {
            AnalysisError::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_hide_details_from_users() {
        let err = AnalysisError::Config("GEMINI_API_KEY is not set".to_string());
        assert!(!err.user_message().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn schema_errors_name_the_field() {
        let err = AnalysisError::schema("knowledgeGraphData.links[0].source", "expected a string");
        let message = err.user_message();
        assert!(message.contains("knowledgeGraphData.links[0].source"));
        assert!(message.starts_with("Failed to analyze news."));
    }

    #[test]
    fn empty_input_is_a_validation_failure() {
        assert!(AnalysisError::EmptyInput.is_validation());
        assert!(!AnalysisError::Upstream("boom".into()).is_validation());
        assert_eq!(
            AnalysisError::EmptyInput.user_message(),
            "Please enter or fetch some news text to analyze."
        );
    }
}
