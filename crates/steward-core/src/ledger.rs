use std::collections::BTreeMap;

use serde::Serialize;

use crate::capability::Capability;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One accumulated validation or commit error.
pub struct ValidationError {
    pub capability: Capability,
    pub artifact_ref: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Append-only error ledger, namespaced by capability.
pub struct ErrorLedger {
    entries: BTreeMap<Capability, Vec<ValidationError>>,
}

impl ErrorLedger {
    pub fn record(&mut self, capability: Capability, artifact_ref: Option<&str>, message: String) {
        self.entries
            .entry(capability)
            .or_default()
            .push(ValidationError {
                capability,
                artifact_ref: artifact_ref.map(ToOwned::to_owned),
                message,
            });
    }

    pub fn merge(&mut self, other: ErrorLedger) {
        for (capability, errors) in other.entries {
            self.entries.entry(capability).or_default().extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn error_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn capability_errors(&self, capability: Capability) -> &[ValidationError] {
        self.entries
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.entries.values().flatten()
    }

    /// Markdown bullet list grouped by capability, used in the audit report
    /// and the error comment posted back on the triggering subject.
    pub fn render_markdown(&self) -> String {
        let mut lines = Vec::new();
        for (capability, errors) in &self.entries {
            for error in errors {
                match error.artifact_ref.as_deref() {
                    Some(artifact_ref) => lines.push(format!(
                        "- **{}**: {} in {}",
                        capability, error.message, artifact_ref
                    )),
                    None => lines.push(format!("- **{}**: {}", capability, error.message)),
                }
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorLedger;
    use crate::capability::Capability;

    #[test]
    fn unit_ledger_records_and_counts_per_capability() {
        let mut ledger = ErrorLedger::default();
        assert!(ledger.is_empty());
        ledger.record(Capability::AddComment, Some("add-comment.json"), "bad".into());
        ledger.record(Capability::MergePr, None, "too many".into());
        assert_eq!(ledger.error_count(), 2);
        assert_eq!(ledger.capability_errors(Capability::AddComment).len(), 1);
        assert!(ledger.capability_errors(Capability::AddLabel).is_empty());
    }

    #[test]
    fn functional_ledger_merge_preserves_both_sides() {
        let mut left = ErrorLedger::default();
        left.record(Capability::AddLabel, None, "one".into());
        let mut right = ErrorLedger::default();
        right.record(Capability::AddLabel, None, "two".into());
        right.record(Capability::DeleteBranch, None, "three".into());
        left.merge(right);
        assert_eq!(left.capability_errors(Capability::AddLabel).len(), 2);
        assert_eq!(left.error_count(), 3);
    }

    #[test]
    fn unit_render_markdown_namespaces_entries_by_capability() {
        let mut ledger = ErrorLedger::default();
        ledger.record(
            Capability::MergePr,
            Some("merge-pr.json"),
            "PR #9 is not open (state: closed)".into(),
        );
        let rendered = ledger.render_markdown();
        assert_eq!(
            rendered,
            "- **merge-pr**: PR #9 is not open (state: closed) in merge-pr.json"
        );
    }
}
