use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No strategy in the recovery chain produced a test-case array.
    /// `attempts` holds one `strategy: reason` line per strategy, for diagnostics only.
    Unrecoverable { input_len: usize, attempts: Vec<String> },
    /// Normalization received zero records.
    NoTestCases,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecoverable { input_len, .. } => write!(
                f,
                "could not locate a test case array in model response ({input_len} chars)"
            ),
            Self::NoTestCases => write!(f, "no valid test cases"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_message_names_only_length() {
        let err = EngineError::Unrecoverable {
            input_len: 42,
            attempts: vec!["direct: expected value at line 1 column 1".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("42 chars"));
        assert!(!msg.contains("direct"));
    }

    #[test]
    fn empty_input_message() {
        assert_eq!(EngineError::NoTestCases.to_string(), "no valid test cases");
    }
}
