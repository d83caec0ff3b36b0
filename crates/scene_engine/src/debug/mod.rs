//! Diagnostics collection
//!
//! Named error entries for resource failures (shader compile/link, texture
//! loads, incomplete framebuffers) plus the set of programs currently failing
//! to link. A UI layer reads these; the engine itself only records.

use std::collections::BTreeMap;

/// Kind of failure an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCategory {
    /// Shader compile or program link failure
    Shader,
    /// Texture or image load failure
    Texture,
    /// Framebuffer incompleteness
    Framebuffer,
    /// Scene setup failure
    Scene,
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    /// Failure kind
    pub category: DiagnosticCategory,
    /// Resource name
    pub name: String,
    /// Driver or loader message
    pub message: String,
}

/// Recorded failures of the running engine
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<DiagnosticEntry>,
    failed_programs: BTreeMap<String, String>,
}

impl Diagnostics {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a named failure
    pub fn record(&mut self, category: DiagnosticCategory, name: impl Into<String>, message: impl Into<String>) {
        let entry = DiagnosticEntry {
            category,
            name: name.into(),
            message: message.into(),
        };
        log::warn!("[{:?}] {}: {}", entry.category, entry.name, entry.message);
        self.entries.push(entry);
    }

    /// Register a program whose link failed
    pub fn program_failed(&mut self, name: &str, message: &str) {
        self.failed_programs.insert(name.to_owned(), message.to_owned());
        self.record(DiagnosticCategory::Shader, name, message);
    }

    /// Remove a program from the failed set after a successful relink
    pub fn program_recovered(&mut self, name: &str) {
        if self.failed_programs.remove(name).is_some() {
            log::info!("Program '{}' links again", name);
        }
    }

    /// Names and messages of programs currently failing to link
    pub fn failed_programs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failed_programs.iter().map(|(n, m)| (n.as_str(), m.as_str()))
    }

    /// Whether a program is in the failed set
    pub fn is_program_failed(&self, name: &str) -> bool {
        self.failed_programs.contains_key(name)
    }

    /// Every recorded entry, oldest first
    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    /// Entries of one category
    pub fn entries_in(&self, category: DiagnosticCategory) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Whether anything has been recorded
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty() || !self.failed_programs.is_empty()
    }

    /// Forget the entry log; the failed-program set is kept
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_program_set() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.program_failed("lit", "syntax error");
        assert!(diagnostics.is_program_failed("lit"));
        assert_eq!(diagnostics.entries_in(DiagnosticCategory::Shader).count(), 1);

        diagnostics.program_recovered("lit");
        assert!(!diagnostics.is_program_failed("lit"));
        assert!(diagnostics.has_errors());

        diagnostics.clear_entries();
        assert!(!diagnostics.has_errors());
    }
}
