//! CaseGrid export wire format
//!
//! Request and response types for the test case export service. Field names
//! are camelCase on the wire.
//!
//! Request fields stay loosely typed (`Option<String>`, raw `testCases`) so
//! the service can report a missing list or an unknown format as a
//! validation failure instead of a parse error.
//!
//! # Usage
//!
//! ```ignore
//! use casegrid_protocol::{ExportRequest, ExportResponse};
//!
//! let request: ExportRequest = serde_json::from_str(&body)?;
//! let json = serde_json::to_string(&ExportResponse::failure("no valid test cases", 3))?;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Request
// =============================================================================

/// Export request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Raw test case records; validated by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Value>,
    /// "markdown" or "excel".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// "category", "priority" or "none"; settings supply the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_steps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Output artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Excel,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "excel" | "xlsx" => Some(ExportFormat::Excel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
            ExportFormat::Excel => "excel",
        }
    }

    /// Whether `content` carries base64 of a binary document.
    pub fn is_binary(&self) -> bool {
        matches!(self, ExportFormat::Excel)
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Excel => "xlsx",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Response
// =============================================================================

/// Export response body. `processingTime` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExportData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Milliseconds.
    pub processing_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    /// Markdown text, or base64 of the spreadsheet bytes.
    pub content: String,
    pub format: ExportFormat,
    pub total_test_cases: usize,
    /// ISO-8601 UTC timestamp.
    pub exported_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl ExportResponse {
    pub fn success(data: ExportData, processing_time: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            processing_time,
        }
    }

    pub fn failure(message: impl Into<String>, processing_time: u64) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            processing_time,
        }
    }
}
