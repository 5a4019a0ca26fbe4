//! In-memory skill catalog.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::types::Skill;

/// Catalog of loaded skills, keyed by name.
///
/// Loading skills from storage is left to the embedding application; the
/// registry only answers lookups.
///
/// # Example
/// ```
/// use skillclaw::skills::{Skill, SkillRegistry};
///
/// let mut registry = SkillRegistry::new();
/// registry.register(Skill::new("paper-analysis", "Analyze papers", "Read $ARGUMENTS"));
///
/// assert!(registry.has("paper-analysis"));
/// let hit = registry.find_auto_invocable_by_text("please run paper-analysis on this");
/// assert_eq!(hit.map(|s| s.name.as_str()), Some("paper-analysis"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
}

impl SkillRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a list of skills.
    pub fn with_skills(skills: impl IntoIterator<Item = Skill>) -> Self {
        let mut registry = Self::new();
        for skill in skills {
            registry.register(skill);
        }
        registry
    }

    /// Add or replace a skill.
    pub fn register(&mut self, skill: Skill) {
        info!(skill = %skill.name, "Registering skill");
        self.skills.insert(skill.name.clone(), skill);
    }

    /// Look up a skill by name.
    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Check whether a skill exists.
    pub fn has(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// All skills, sorted by name.
    pub fn list(&self) -> Vec<&Skill> {
        self.skills.values().collect()
    }

    /// Skills the owner may invoke as slash commands.
    pub fn user_invocable(&self) -> Vec<&Skill> {
        self.skills.values().filter(|s| s.user_invocable).collect()
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Returns `true` if no skills are registered.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Find an auto-invocable skill mentioned in `text`.
    ///
    /// A skill matches when its name or one of its triggers appears in the
    /// text as a standalone phrase (case-insensitive). The longest matching
    /// phrase wins; ties go to the alphabetically first skill.
    pub fn find_auto_invocable_by_text(&self, text: &str) -> Option<&Skill> {
        let haystack = text.to_lowercase();
        let mut best: Option<(&Skill, usize)> = None;

        for skill in self.skills.values().filter(|s| s.auto_invocable) {
            let phrases = std::iter::once(skill.name.as_str()).chain(skill.triggers.iter().map(String::as_str));
            for phrase in phrases {
                let needle = phrase.trim().to_lowercase();
                if needle.is_empty() || !contains_phrase(&haystack, &needle) {
                    continue;
                }
                let len = needle.chars().count();
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((skill, len));
                }
            }
        }

        if let Some((skill, _)) = best {
            debug!(skill = %skill.name, "Skill matched by text");
        }
        best.map(|(skill, _)| skill)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        // CJK phrases have no word boundaries to check against
        let cjk = needle.chars().any(|c| !c.is_ascii());
        cjk || (!before.is_some_and(is_word_char) && !after.is_some_and(is_word_char))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SkillRegistry {
        SkillRegistry::with_skills([
            Skill::new("deck", "Slides", "Make slides"),
            Skill::new("paper-analysis", "Papers", "Analyze").with_triggers(&["论文", "research paper"]),
            Skill::new("secret", "Hidden", "x").manual_only(),
        ])
    }

    #[test]
    fn test_list_is_sorted() {
        let names: Vec<_> = registry().list().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["deck", "paper-analysis", "secret"]);
    }

    #[test]
    fn test_match_requires_word_boundary() {
        let reg = registry();
        assert!(reg.find_auto_invocable_by_text("decked out").is_none());
        assert_eq!(
            reg.find_auto_invocable_by_text("Make a DECK please").map(|s| s.name.as_str()),
            Some("deck")
        );
    }

    #[test]
    fn test_match_by_trigger() {
        let reg = registry();
        let hit = reg.find_auto_invocable_by_text("帮我读这篇论文");
        assert_eq!(hit.map(|s| s.name.as_str()), Some("paper-analysis"));
        let hit = reg.find_auto_invocable_by_text("summarize this research paper");
        assert_eq!(hit.map(|s| s.name.as_str()), Some("paper-analysis"));
    }

    #[test]
    fn test_manual_only_skill_never_matches() {
        assert!(registry().find_auto_invocable_by_text("secret").is_none());
    }

    #[test]
    fn test_user_invocable_filter() {
        let mut reg = registry();
        let mut hidden = Skill::new("internal", "", "");
        hidden.user_invocable = false;
        reg.register(hidden);
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.user_invocable().len(), 3);
    }
}
