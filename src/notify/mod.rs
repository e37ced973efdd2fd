//! User-visible notifications raised by the pod store

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A short message for the user, e.g. "PromptPod Created"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    /// Mirror the notice into the log
    pub(crate) fn trace(&self) {
        match self.level {
            NoticeLevel::Success => {
                tracing::info!(title = %self.title, "{}", self.description)
            }
            NoticeLevel::Error => {
                tracing::warn!(title = %self.title, "{}", self.description)
            }
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = match self.level {
            NoticeLevel::Success => "✓",
            NoticeLevel::Error => "✗",
        };
        write!(f, "{} {}: {}", marker, self.title, self.description)
    }
}
