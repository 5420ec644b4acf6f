//! Diagnostics collected while marking.
//!
//! Conditions in the analysed program that do not stop the link are reported here rather than
//! returned as errors: unrecognized reflection, malformed dependency attributes, unresolved
//! references in ignore mode. Each entry carries a stable [`DiagnosticCode`]; consumers match on
//! the code, never on the message.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Append-only container for diagnostic entries
//! - [`Diagnostic`] - Individual entry with code, severity and origin
//! - [`DiagnosticCode`] - Stable numeric codes
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use reachscope::linker::{Diagnostics, DiagnosticCode};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.report(DiagnosticCode::UnresolvedDependencyAssembly, "Missing.Assembly");
//!
//! assert_eq!(diagnostics.count_code(DiagnosticCode::UnresolvedDependencyAssembly), 1);
//! for entry in diagnostics.iter() {
//!     println!("{entry}");
//! }
//! ```
//!
//! Warnings and errors are mirrored into `tracing` at `warn` level as they are pushed.

use std::fmt::{self, Write};

use serde::Serialize;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    Info,

    /// The link continues, but the result may be incomplete.
    ///
    /// Unrecognized reflection is the typical case: code reached by the call may be removed
    /// although it is needed at runtime.
    Warning,

    /// The analysed program is malformed.
    ///
    /// The offending construct was skipped.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating which part of the mark step reported the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum DiagnosticCategory {
    /// Root assembly handling
    Root,
    /// Reference resolution
    Resolution,
    /// `DynamicDependency` and `PreserveDependency` attributes
    DependencyAttribute,
    /// Reflection pattern analysis
    Reflection,
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum DiagnosticCode {
    /// A root assembly with entry point visibility has no entry point
    RootAssemblyWithoutEntryPoint,
    /// A type reference could not be resolved
    UnresolvedType,
    /// A method reference could not be resolved
    UnresolvedMethod,
    /// A field reference could not be resolved
    UnresolvedField,
    /// `PreserveDependencyAttribute` is deprecated in favor of `DynamicDependencyAttribute`
    DeprecatedPreserveDependency,
    /// A dependency attribute has an argument shape that cannot be interpreted
    InvalidDynamicDependencyArguments,
    /// A dependency attribute names an unknown assembly
    UnresolvedDependencyAssembly,
    /// A dependency attribute names an unknown type
    UnresolvedDependencyType,
    /// A dependency attribute names no member of its type
    UnresolvedDependencyMember,
    /// A reflection call's arguments cannot be determined statically
    UnrecognizedReflectionPattern,
}

impl DiagnosticCode {
    /// The numeric code.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            DiagnosticCode::RootAssemblyWithoutEntryPoint => 1034,
            DiagnosticCode::UnresolvedType => 2008,
            DiagnosticCode::UnresolvedMethod => 2009,
            DiagnosticCode::UnresolvedField => 2012,
            DiagnosticCode::DeprecatedPreserveDependency => 2033,
            DiagnosticCode::InvalidDynamicDependencyArguments => 2034,
            DiagnosticCode::UnresolvedDependencyAssembly => 2035,
            DiagnosticCode::UnresolvedDependencyType => 2036,
            DiagnosticCode::UnresolvedDependencyMember => 2037,
            DiagnosticCode::UnrecognizedReflectionPattern => 2075,
        }
    }

    /// The severity entries with this code are reported with.
    #[must_use]
    pub fn severity(self) -> DiagnosticSeverity {
        match self {
            DiagnosticCode::RootAssemblyWithoutEntryPoint
            | DiagnosticCode::InvalidDynamicDependencyArguments => DiagnosticSeverity::Error,
            _ => DiagnosticSeverity::Warning,
        }
    }

    /// The category of this code.
    #[must_use]
    pub fn category(self) -> DiagnosticCategory {
        match self {
            DiagnosticCode::RootAssemblyWithoutEntryPoint => DiagnosticCategory::Root,
            DiagnosticCode::UnresolvedType
            | DiagnosticCode::UnresolvedMethod
            | DiagnosticCode::UnresolvedField => DiagnosticCategory::Resolution,
            DiagnosticCode::DeprecatedPreserveDependency
            | DiagnosticCode::InvalidDynamicDependencyArguments
            | DiagnosticCode::UnresolvedDependencyAssembly
            | DiagnosticCode::UnresolvedDependencyType
            | DiagnosticCode::UnresolvedDependencyMember => DiagnosticCategory::DependencyAttribute,
            DiagnosticCode::UnrecognizedReflectionPattern => DiagnosticCategory::Reflection,
        }
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable code
    pub code: DiagnosticCode,

    /// Severity level of this diagnostic
    pub severity: DiagnosticSeverity,

    /// Human-readable description of the issue
    pub message: String,

    /// The member whose processing produced the diagnostic, if any
    pub origin: Option<String>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            origin: None,
        }
    }

    /// Names the member whose processing produced the diagnostic.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// The category of this diagnostic.
    #[must_use]
    pub fn category(&self) -> DiagnosticCategory {
        self.code.category()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] IL{} {}: {}",
            self.severity,
            self.code.code(),
            self.code.category(),
            self.message
        )?;

        if let Some(origin) = &self.origin {
            write!(f, " (in {origin})")?;
        }

        Ok(())
    }
}

/// Append-only container for diagnostic entries.
///
/// Uses `boxcar::Vec` internally so entries can be pushed through a shared reference while the
/// mark step holds other borrows of the link context.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Reports a diagnostic with the code's default severity.
    pub fn report(&self, code: DiagnosticCode, message: impl Into<String>) {
        self.push(Diagnostic::new(code, message));
    }

    /// Adds a diagnostic entry directly.
    pub fn push(&self, diagnostic: Diagnostic) {
        if diagnostic.severity != DiagnosticSeverity::Info {
            tracing::warn!(
                code = diagnostic.code.code(),
                origin = diagnostic.origin.as_deref().unwrap_or(""),
                "{}",
                diagnostic.message
            );
        }
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of diagnostics with `code`.
    pub fn count_code(&self, code: DiagnosticCode) -> usize {
        self.entries.iter().filter(|(_, d)| d.code == code).count()
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Warning)
            .count()
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// Returns an iterator over all diagnostics in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category() == category)
            .map(|(_, d)| d)
            .collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        );
        for diag in self.iter() {
            let _ = writeln!(output, "  {diag}");
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DiagnosticCode::DeprecatedPreserveDependency.code(), 2033);
        assert_eq!(DiagnosticCode::UnresolvedDependencyAssembly.code(), 2035);
        assert_eq!(DiagnosticCode::UnrecognizedReflectionPattern.code(), 2075);
        assert_eq!(
            DiagnosticCode::UnresolvedMethod.category(),
            DiagnosticCategory::Resolution
        );
    }

    #[test]
    fn test_diagnostics_container() {
        let diagnostics = Diagnostics::new();

        diagnostics.report(DiagnosticCode::UnresolvedDependencyType, "Missing.Type");
        diagnostics.report(DiagnosticCode::InvalidDynamicDependencyArguments, "bad shape");
        diagnostics.push(
            Diagnostic::new(DiagnosticCode::UnresolvedDependencyType, "Other.Type")
                .with_origin("App.Program::Main()"),
        );

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(diagnostics.count_code(DiagnosticCode::UnresolvedDependencyType), 2);
        assert_eq!(
            diagnostics
                .by_category(DiagnosticCategory::DependencyAttribute)
                .len(),
            3
        );
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(DiagnosticCode::UnrecognizedReflectionPattern, "GetMethod")
            .with_origin("App.Caller::Run()");

        let display = format!("{diag}");
        assert!(display.contains("WARN"));
        assert!(display.contains("IL2075"));
        assert!(display.contains("Reflection"));
        assert!(display.contains("(in App.Caller::Run())"));
    }
}
