// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error rendering: one shape for humans, one line for `--json`.

use myc_core::Diagnostic;
use std::error::Error;

/// A fully-resolved diagnostic ready for either renderer.
#[derive(Debug, Clone)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
    pub causes: Vec<String>,
}

impl CliError {
    pub fn from_diagnostic<E>(err: &E) -> Self
    where
        E: Diagnostic + Error,
    {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self { code: err.code().to_string(), message: err.to_string(), hint: err.hint(), causes }
    }

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), hint: None, causes: Vec::new() }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Short mode prints title, message, and hint; debug mode adds the
    /// code and the cause chain.
    pub fn render(&self, debug: bool) -> String {
        let mut out = format!("error: {}", self.message);
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\n  hint: {hint}"));
        }
        if debug {
            out.push_str(&format!("\n  code: {}", self.code));
            for cause in &self.causes {
                out.push_str(&format!("\n  cause: {cause}"));
            }
        }
        out
    }

    /// `{ok:false,error:{code,message,details?}}`
    pub fn envelope(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        if self.hint.is_some() || !self.causes.is_empty() {
            error["details"] = serde_json::json!({
                "hint": self.hint,
                "causes": self.causes,
            });
        }
        serde_json::json!({ "ok": false, "error": error })
    }
}

/// Success envelope: `{ok:true,result}`.
pub fn ok_envelope(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "ok": true, "result": result })
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
