//! Integrity checks for a loaded snapshot

use std::collections::HashSet;

use crate::models::{Identity, PromptPod};

/// A problem found in persisted data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotIssue {
    DuplicatePodId(String),
    DuplicateIdentityId(String),
    DuplicateFileId { pod_id: String, file_id: String },
    DuplicateRitualId { pod_id: String, ritual_id: String },
    ModifiedBeforeCreated(String),
}

impl std::fmt::Display for SnapshotIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotIssue::DuplicatePodId(id) => write!(f, "duplicate pod id {}", id),
            SnapshotIssue::DuplicateIdentityId(id) => write!(f, "duplicate identity id {}", id),
            SnapshotIssue::DuplicateFileId { pod_id, file_id } => {
                write!(f, "duplicate file id {} in pod {}", file_id, pod_id)
            }
            SnapshotIssue::DuplicateRitualId { pod_id, ritual_id } => {
                write!(f, "duplicate ritual id {} in pod {}", ritual_id, pod_id)
            }
            SnapshotIssue::ModifiedBeforeCreated(id) => {
                write!(f, "pod {} was last modified before it was created", id)
            }
        }
    }
}

/// Check id uniqueness and timestamp ordering across the snapshot
pub fn validate_snapshot(pods: &[PromptPod], identities: &[Identity]) -> Vec<SnapshotIssue> {
    let mut issues = Vec::new();

    let mut pod_ids = HashSet::new();
    for pod in pods {
        if !pod_ids.insert(pod.id.as_str()) {
            issues.push(SnapshotIssue::DuplicatePodId(pod.id.clone()));
        }
        if pod.last_modified < pod.created_at {
            issues.push(SnapshotIssue::ModifiedBeforeCreated(pod.id.clone()));
        }

        let mut file_ids = HashSet::new();
        for file in &pod.files {
            if !file_ids.insert(file.id.as_str()) {
                issues.push(SnapshotIssue::DuplicateFileId {
                    pod_id: pod.id.clone(),
                    file_id: file.id.clone(),
                });
            }
        }

        let mut ritual_ids = HashSet::new();
        for ritual in &pod.rituals {
            if !ritual_ids.insert(ritual.id.as_str()) {
                issues.push(SnapshotIssue::DuplicateRitualId {
                    pod_id: pod.id.clone(),
                    ritual_id: ritual.id.clone(),
                });
            }
        }
    }

    let mut identity_ids = HashSet::new();
    for identity in identities {
        if !identity_ids.insert(identity.id.as_str()) {
            issues.push(SnapshotIssue::DuplicateIdentityId(identity.id.clone()));
        }
    }

    issues
}
