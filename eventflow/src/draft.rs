use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NAME_PREFIX: &str = "Automation Event";
const DEFAULT_DESCRIPTION: &str = "QA automation smoke event.";
const SUFFIX_LEN: usize = 12;

/// The event the flow creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
}

impl EventDraft {
    /// New draft named after the current UTC time plus a random suffix.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            name: format!(
                "{NAME_PREFIX} {}-{}",
                now.format("%Y%m%d%H%M%S"),
                &suffix[..SUFFIX_LEN]
            ),
            description: DEFAULT_DESCRIPTION.to_string(),
            start_date: now.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Filesystem-safe form of the name, used as the evidence file prefix.
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    }
}
