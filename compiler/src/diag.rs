// diag.rs — Unified diagnostics model
//
// Provides the diagnostic types the pipeline and the CLI report with. Errors
// from any stage convert into a `Diagnostic`; USID validation also produces
// warning-level diagnostics that do not stop generation.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::error::Error;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0100`, `W0100`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Node-model invariant violated.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Unresolved or mistyped symbol reference.
    pub const E0200: DiagCode = DiagCode("E0200");
    /// Temporary without exactly one location dimension.
    pub const E0201: DiagCode = DiagCode("E0201");
    /// Data type or built-in literal without a C++ spelling.
    pub const E0202: DiagCode = DiagCode("E0202");
    /// Source formatter failure.
    pub const E0300: DiagCode = DiagCode("E0300");
    /// IR document could not be loaded.
    pub const E0400: DiagCode = DiagCode("E0400");
    /// Kernel declared but never called.
    pub const W0100: DiagCode = DiagCode("W0100");
    /// Temporary declared but not bound by any kernel call.
    pub const W0101: DiagCode = DiagCode("W0101");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let diag = Diagnostic::new(DiagLevel::Error, err.to_string()).with_code(err.code());
        match err {
            Error::StructuralValidation { .. } => {
                diag.with_hint("the frontend must supply consistent location types and declarations")
            }
            Error::UnresolvedSymbol { .. } => {
                diag.with_hint("declare the symbol in an enclosing computation, kernel or neighbor loop")
            }
            Error::MissingLocationDimension { .. } => {
                diag.with_hint("give the temporary exactly one horizontal dimension")
            }
            Error::UnsupportedConstant { .. } => {
                diag.with_hint("resolve AUTO/INVALID data types before code generation")
            }
            Error::Formatting { .. } | Error::Load { .. } => diag,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
