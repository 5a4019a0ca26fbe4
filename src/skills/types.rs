//! Skills type definitions.

use serde::{Deserialize, Serialize};

/// A skill: a named prompt template plus optional turn budget and tool policy.
///
/// Skills are loaded by an external collaborator and handed to the
/// [`SkillRegistry`](super::SkillRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Skill name.
    pub name: String,
    /// Short description, also used for listings.
    #[serde(default)]
    pub description: String,
    /// Markdown prompt template (`$ARGUMENTS`, `$0`, `$1`.. placeholders).
    #[serde(default)]
    pub content: String,
    /// Extra turn budget granted on activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Tool allow/deny policy applied while the skill is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_policy: Option<ToolPolicy>,
    /// Whether the owner may invoke it as `/name`.
    #[serde(default = "default_true")]
    pub user_invocable: bool,
    /// Whether it may be activated by natural-language match.
    #[serde(default = "default_true")]
    pub auto_invocable: bool,
    /// Hint shown next to the slash command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_hint: Option<String>,
    /// Extra phrases that trigger auto-activation.
    #[serde(default)]
    pub triggers: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Skill {
    /// Create a skill with a name, description and prompt template.
    ///
    /// # Example
    /// ```
    /// use skillclaw::skills::Skill;
    ///
    /// let skill = Skill::new("deck", "Build slide decks", "Make slides about $ARGUMENTS")
    ///     .with_max_turns(40)
    ///     .with_allowed_tools(&["read_file", "write_file"]);
    /// assert_eq!(skill.max_turns, Some(40));
    /// assert!(skill.user_invocable);
    /// ```
    pub fn new(name: &str, description: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            max_turns: None,
            tool_policy: None,
            user_invocable: true,
            auto_invocable: true,
            argument_hint: None,
            triggers: Vec::new(),
        }
    }

    /// Set the turn budget.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Restrict the catalog to `tools` while active.
    pub fn with_allowed_tools(mut self, tools: &[&str]) -> Self {
        let deny = self.tool_policy.as_ref().and_then(|p| p.deny.clone());
        self.tool_policy = ToolPolicy::new(Some(to_owned(tools)), deny);
        self
    }

    /// Remove `tools` from the catalog while active.
    pub fn with_denied_tools(mut self, tools: &[&str]) -> Self {
        let allow = self.tool_policy.as_ref().and_then(|p| p.allow.clone());
        self.tool_policy = ToolPolicy::new(allow, Some(to_owned(tools)));
        self
    }

    /// Add natural-language triggers.
    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = to_owned(triggers);
        self
    }

    /// Disable natural-language activation.
    pub fn manual_only(mut self) -> Self {
        self.auto_invocable = false;
        self
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Tool allow/deny lists applied while a skill is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// Only these tools may be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    /// These tools may not be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
}

impl ToolPolicy {
    /// Build a normalized policy.
    ///
    /// Names are trimmed and deduplicated in first-seen order; empty lists
    /// count as absent. Returns `None` when both lists end up absent.
    ///
    /// # Example
    /// ```
    /// use skillclaw::skills::ToolPolicy;
    ///
    /// let policy = ToolPolicy::new(Some(vec![" read_file ".into(), "read_file".into()]), Some(vec![]))
    ///     .unwrap();
    /// assert_eq!(policy.allow, Some(vec!["read_file".to_string()]));
    /// assert!(policy.deny.is_none());
    ///
    /// assert!(ToolPolicy::new(Some(vec!["  ".into()]), None).is_none());
    /// ```
    pub fn new(allow: Option<Vec<String>>, deny: Option<Vec<String>>) -> Option<Self> {
        Self { allow, deny }.normalized()
    }

    /// Normalize this policy (see [`ToolPolicy::new`]).
    pub fn normalized(self) -> Option<Self> {
        let allow = normalize_names(self.allow);
        let deny = normalize_names(self.deny);
        if allow.is_none() && deny.is_none() {
            None
        } else {
            Some(Self { allow, deny })
        }
    }
}

fn normalize_names(names: Option<Vec<String>>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for name in names.into_iter().flatten() {
        let trimmed = name.trim();
        if !trimmed.is_empty() && !out.iter().any(|n| n == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Arguments a skill is invoked with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillInvocation {
    /// Positional arguments (`$1`, `$2`, ..)
    pub arguments: Vec<String>,
    /// The raw argument string (`$ARGUMENTS`)
    pub raw_arguments: String,
    /// The message that triggered the invocation
    pub user_message: String,
}

impl SkillInvocation {
    /// Split a raw argument string on whitespace.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        Self {
            arguments: raw.split_whitespace().map(str::to_string).collect(),
            raw_arguments: raw.to_string(),
            user_message: raw.to_string(),
        }
    }

    /// Set the triggering user message.
    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_message = message.to_string();
        self
    }
}
