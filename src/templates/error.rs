//! Template error types.

/// Errors that can occur while rendering or editing templates.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// No template is registered under the id.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// One or more declared variables had no binding.
    #[error("Missing required variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = TemplateError::NotFound("agent-intro".to_string());
        assert_eq!(err.to_string(), "Template not found: agent-intro");
    }

    #[test]
    fn test_missing_variables_display() {
        let err = TemplateError::MissingVariables(vec!["agentName".to_string(), "x".to_string()]);
        assert_eq!(err.to_string(), "Missing required variables: agentName, x");
    }
}
