//! Data models for float pods
//!
//! These mirror the JSON records persisted under the `floatPods` and
//! `floatIdentities` keys, so field names stay camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pod
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    #[default]
    Running,
    Paused,
    Archived,
}

impl std::fmt::Display for PodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodStatus::Running => write!(f, "running"),
            PodStatus::Paused => write!(f, "paused"),
            PodStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for PodStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(PodStatus::Running),
            "paused" => Ok(PodStatus::Paused),
            "archived" => Ok(PodStatus::Archived),
            _ => Err(format!(
                "Invalid status: {}. Use: running, paused, archived",
                s
            )),
        }
    }
}

/// A reusable persona. Pods embed copies of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A named text blob owned by a single pod
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// An ordered list of steps owned by a single pod
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ritual {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// A pod: the unit of organization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptPod {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: PodStatus,
    /// Embedded copies of master identities, matched by id
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub files: Vec<FileResource>,
    #[serde(default)]
    pub rituals: Vec<Ritual>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl PromptPod {
    /// Build a pod from a draft. Both timestamps are set to `now`.
    pub fn from_draft(id: String, draft: NewPod, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            status: draft.status,
            identities: draft.identities,
            files: draft.files,
            rituals: draft.rituals,
            tags: draft.tags,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn has_identity(&self, id: &str) -> bool {
        self.identities.iter().any(|i| i.id == id)
    }

    pub fn file(&self, id: &str) -> Option<&FileResource> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn ritual(&self, id: &str) -> Option<&Ritual> {
        self.rituals.iter().find(|r| r.id == id)
    }

    /// Dashboard filter: substring search over name, description and tags,
    /// ignoring case, plus an optional status match.
    pub fn matches(&self, filter: &PodFilter) -> bool {
        if let Some(status) = filter.status {
            if self.status != status {
                return false;
            }
        }

        let query = filter.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

/// Search criteria for listing pods
#[derive(Debug, Clone, Default)]
pub struct PodFilter {
    pub query: String,
    /// `None` means all statuses
    pub status: Option<PodStatus>,
}

/// Input for creating a pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPod {
    pub name: String,
    pub description: String,
    pub status: PodStatus,
    pub identities: Vec<Identity>,
    pub files: Vec<FileResource>,
    pub rituals: Vec<Ritual>,
    pub tags: Vec<String>,
}

/// Input for creating an identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIdentity {
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub traits: Vec<String>,
}

impl NewIdentity {
    pub fn into_identity(self, id: String) -> Identity {
        Identity {
            id,
            name: self.name,
            description: self.description,
            avatar: self.avatar,
            traits: self.traits,
        }
    }
}

/// Input for adding a file to the active pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub file_type: String,
    pub content: String,
}

impl NewFile {
    pub fn into_file(self, id: String, now: DateTime<Utc>) -> FileResource {
        FileResource {
            id,
            name: self.name,
            file_type: self.file_type,
            content: self.content,
            created_at: now,
            last_modified: now,
        }
    }
}

/// Input for adding a ritual to the active pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRitual {
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
    pub is_active: bool,
}

impl NewRitual {
    pub fn into_ritual(self, id: String) -> Ritual {
        Ritual {
            id,
            name: self.name,
            description: self.description,
            steps: self.steps,
            is_active: self.is_active,
        }
    }
}

/// Split comma-separated user input into trimmed, non-empty entries.
/// Used for tags and traits.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_pod() -> PromptPod {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        PromptPod::from_draft(
            "pod-1".to_string(),
            NewPod {
                name: "Writing Room".to_string(),
                description: "Drafts for the novel".to_string(),
                status: PodStatus::Paused,
                tags: vec!["Fiction".to_string(), "longform".to_string()],
                ..Default::default()
            },
            now,
        )
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("Archived".parse::<PodStatus>().unwrap(), PodStatus::Archived);
        assert_eq!(PodStatus::Paused.to_string(), "paused");
        assert!("stopped".parse::<PodStatus>().is_err());
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" creative, ,imaginative ,detailed,"),
            vec!["creative", "imaginative", "detailed"]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_split_list_keeps_duplicates_in_order() {
        assert_eq!(split_list("b,a,b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn test_filter_matches_name_description_and_tags() {
        let pod = sample_pod();
        let by = |q: &str| PodFilter {
            query: q.to_string(),
            status: None,
        };

        assert!(pod.matches(&by("writing")));
        assert!(pod.matches(&by("NOVEL")));
        assert!(pod.matches(&by("fict")));
        assert!(pod.matches(&by("")));
        assert!(!pod.matches(&by("poetry")));
    }

    #[test]
    fn test_filter_respects_status() {
        let pod = sample_pod();
        let paused = PodFilter {
            query: String::new(),
            status: Some(PodStatus::Paused),
        };
        let running = PodFilter {
            query: "writing".to_string(),
            status: Some(PodStatus::Running),
        };

        assert!(pod.matches(&paused));
        assert!(!pod.matches(&running));
    }

    #[test]
    fn test_pod_json_uses_camel_case_fields() {
        let mut pod = sample_pod();
        pod.files.push(FileResource {
            id: "file-1".to_string(),
            name: "outline.md".to_string(),
            file_type: "markdown".to_string(),
            content: "# Act I".to_string(),
            created_at: pod.created_at,
            last_modified: pod.created_at,
        });
        pod.rituals.push(Ritual {
            id: "ritual-1".to_string(),
            name: "Morning pages".to_string(),
            description: String::new(),
            steps: vec!["Write three pages".to_string()],
            is_active: true,
        });

        let value = serde_json::to_value(&pod).unwrap();
        assert_eq!(value["status"], "paused");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("lastModified").is_some());
        assert_eq!(value["files"][0]["type"], "markdown");
        assert_eq!(value["rituals"][0]["isActive"], true);
    }

    #[test]
    fn test_identity_without_avatar_omits_field() {
        let identity = NewIdentity {
            name: "Muse".to_string(),
            traits: vec!["creative".to_string()],
            ..Default::default()
        }
        .into_identity("identity-1".to_string());

        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("avatar").is_none());
        assert_eq!(value["traits"][0], "creative");
    }

    #[test]
    fn test_reads_browser_style_timestamps() {
        let raw = r#"{
            "id": "pod-1714564800000",
            "name": "Legacy",
            "description": "",
            "status": "running",
            "identities": [],
            "files": [],
            "rituals": [],
            "tags": [],
            "createdAt": "2024-05-01T12:00:00.000Z",
            "lastModified": "2024-05-01T12:30:00.000Z"
        }"#;

        let pod: PromptPod = serde_json::from_str(raw).unwrap();
        assert_eq!(pod.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert!(pod.last_modified > pod.created_at);
    }
}
