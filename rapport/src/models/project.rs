use super::{generate_id, timestamp};
use crate::config::DEFAULT_PROJECT_COLORS;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A grouping tag for notes and tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// CSS colour used as a display hint
    #[serde(default)]
    pub color: String,
    #[serde(default = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl Project {
    /// Create a project, picking a palette colour when none is given
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        let color = color.filter(|c| !c.is_empty()).unwrap_or_else(|| {
            DEFAULT_PROJECT_COLORS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or("#4a90d9")
                .to_string()
        });

        Self {
            id: generate_id(),
            name: name.into(),
            color,
            created_at: timestamp(),
        }
    }

    pub fn apply(&self, patch: ProjectPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.name {
            next.name = v;
        }
        if let Some(v) = patch.color {
            next.color = v;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_color_from_palette() {
        let project = Project::new("Hiring", None);
        assert!(DEFAULT_PROJECT_COLORS.contains(&project.color.as_str()));
    }

    #[test]
    fn test_explicit_color_kept() {
        let project = Project::new("Hiring", Some("#123456".to_string()));
        assert_eq!(project.color, "#123456");

        let renamed = project.apply(ProjectPatch {
            name: Some("Recruiting".to_string()),
            ..Default::default()
        });
        assert_eq!(renamed.name, "Recruiting");
        assert_eq!(renamed.color, "#123456");
        assert_eq!(renamed.id, project.id);
    }
}
