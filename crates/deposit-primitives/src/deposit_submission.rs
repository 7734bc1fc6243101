use serde::{Deserialize, Serialize};

use crate::submission::{Person, SubmissionMetadata};

/// A materialized file reference ready for packaging: a resolved content
/// location plus the role it plays in the package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositFile {
    pub name: String,
    pub content_location: String,
    pub role: String,
}

/// The core's in-memory, package-ready projection of a [`crate::submission::Submission`],
/// produced by an external builder from the submission and its linked
/// entities (manuscript, journal, article, persons).
///
/// Invariant: `files.len() >= 1` and every file has a non-empty
/// `content_location`. This is enforced by [`DepositSubmission::validate`],
/// which `SubmissionProcessor`'s postcheck calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSubmission {
    pub submission_id: crate::id::ResourceId,
    pub files: Vec<DepositFile>,
    pub persons: Vec<Person>,
    pub metadata: SubmissionMetadata,
}

impl DepositSubmission {
    pub fn validate(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|f| !f.content_location.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ResourceId;

    fn sample_file(location: &str) -> DepositFile {
        DepositFile {
            name: "manuscript.pdf".into(),
            content_location: location.into(),
            role: "manuscript".into(),
        }
    }

    #[test]
    fn validate_rejects_empty_file_list() {
        let ds = DepositSubmission {
            submission_id: ResourceId::new(),
            files: vec![],
            persons: vec![],
            metadata: SubmissionMetadata::default(),
        };
        assert!(!ds.validate());
    }

    #[test]
    fn validate_rejects_blank_content_location() {
        let ds = DepositSubmission {
            submission_id: ResourceId::new(),
            files: vec![sample_file("  ")],
            persons: vec![],
            metadata: SubmissionMetadata::default(),
        };
        assert!(!ds.validate());
    }

    #[test]
    fn validate_accepts_well_formed_submission() {
        let ds = DepositSubmission {
            submission_id: ResourceId::new(),
            files: vec![sample_file("http://example.org/file/1")],
            persons: vec![],
            metadata: SubmissionMetadata::default(),
        };
        assert!(ds.validate());
    }
}
