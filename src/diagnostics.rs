// ABOUTME: Diagnostics accumulator for non-fatal warnings during a migration.
// ABOUTME: Collects warnings that shouldn't fail a migration but should be shown to users.

/// Collects non-fatal warnings during migration operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a migration.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }

    /// Create a helper container cleanup warning.
    pub fn helper_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HelperCleanup,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
    /// A helper container could not be removed and is left behind.
    HelperCleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::helper_cleanup("helper 1a2b left behind"));
        diag.warn(Warning::ssh_disconnect("connection reset"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(diag.warnings()[0].kind, WarningKind::HelperCleanup);
    }
}
