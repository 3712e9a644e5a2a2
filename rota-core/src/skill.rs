//! Skill taxonomy. Skills are immutable once referenced by assignments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Technical,
    Soft,
    Language,
    Domain,
    Certification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: SkillCategory,
    pub parent_id: Option<String>,
}

impl Skill {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: SkillCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_json_roundtrip_is_stable() {
        let s = Skill::new("support_l2", "Support L2", SkillCategory::Technical)
            .with_parent("support");
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"category\":\"technical\""));
        let back: Skill = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
