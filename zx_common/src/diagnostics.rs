//! Diagnostic collection shared across lexing, parsing and lowering.

use crate::position::Position;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single `file:line:col: severity: message` diagnostic, anchored at a
/// source position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl Diagnostic {
    pub fn error(position: Position, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, position, message: message.into() }
    }

    pub fn warning(position: Position, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, position, message: message.into() }
    }

    pub fn note(position: Position, message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, position, message: message.into() }
    }

    /// Render without color, matching the `file:line:col: severity: message`
    /// wire format the CLI writes to its diagnostic stream.
    pub fn plain(&self) -> String {
        format!("{}: {}: {}", self.position, self.severity, self.message)
    }

    pub fn colored(&self) -> String {
        let severity = match self.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Note => "note".blue().bold(),
        };
        format!("{}: {}: {}", self.position, severity, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plain())
    }
}

/// An accumulating sink that every pipeline stage posts diagnostics into.
/// The compile is considered to have failed if any `Severity::Error` was
/// ever posted, even though lowering keeps going to surface as many
/// diagnostics as possible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn error(&mut self, position: Position, message: impl Into<String>) {
        self.push(Diagnostic::error(position, message));
    }

    pub fn warning(&mut self, position: Position, message: impl Into<String>) {
        self.push(Diagnostic::warning(position, message));
    }

    pub fn note(&mut self, position: Position, message: impl Into<String>) {
        self.push(Diagnostic::note(position, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn pos() -> Position {
        Position::new(Rc::from("a.c"), 3, 5, 10)
    }

    #[test]
    fn plain_format_matches_external_interface_contract() {
        let d = Diagnostic::error(pos(), "undefined identifier 'x'");
        assert_eq!(d.plain(), "a.c:3:5: error: undefined identifier 'x'");
    }

    #[test]
    fn has_errors_only_true_with_error_severity() {
        let mut diags = Diagnostics::new();
        diags.warning(pos(), "unused label");
        assert!(!diags.has_errors());
        diags.error(pos(), "redeclaration mismatch");
        assert!(diags.has_errors());
    }
}
