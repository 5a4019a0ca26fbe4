//! Skill activation signals.
//!
//! Activating a skill, whether by tool call, slash command or text match,
//! always goes through the same three steps: [`build`] a signal from the
//! skill, carry it as JSON through the tool-result channel, then [`upsert`]
//! it into the transcript as a tagged system message. At most one tagged
//! message per skill name is ever live.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::session::{Message, Role};

use super::types::{Skill, SkillInvocation, ToolPolicy};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(ARGUMENTS|\d+)").unwrap());

static SKILL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[skill:([^\]]+)\]").unwrap());

/// Structured request to activate a skill in the running conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillActivationSignal {
    /// Name of the skill being activated
    pub skill_name: String,
    /// Rendered prompt injected as the tagged system message
    pub prompt_body: String,
    /// Extra turn budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Catalog narrowing applied while the skill is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_policy: Option<ToolPolicy>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "__type__", rename_all = "snake_case")]
enum Envelope {
    SkillActivation(SkillActivationSignal),
}

impl SkillActivationSignal {
    /// Encode as the tagged JSON object carried in a tool result.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&Envelope::SkillActivation(self.clone()))
            .unwrap_or_else(|_| String::from("{}"))
    }

    /// The tagged system message text for this signal.
    pub fn system_prompt(&self) -> String {
        format!("{}\n{}", skill_marker(&self.skill_name), self.prompt_body)
    }
}

/// Marker prefix of a skill's system message.
pub fn skill_marker(name: &str) -> String {
    format!("[skill:{}]", name)
}

/// Name of the skill a tagged system message belongs to.
pub fn tagged_skill_name(msg: &Message) -> Option<&str> {
    if msg.role != Role::System {
        return None;
    }
    SKILL_MARKER
        .captures(msg.text())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Name of the most recently injected skill in `messages`.
pub fn latest_tagged_skill(messages: &[Message]) -> Option<&str> {
    messages.iter().rev().find_map(tagged_skill_name)
}

/// Substitute template placeholders.
///
/// `$ARGUMENTS` becomes the raw argument string, `$0` the skill name and
/// `$N` the N-th positional argument. Placeholders without a value are
/// removed. Substitution is a single pass, so argument text is never
/// re-expanded.
///
/// # Example
/// ```
/// use skillclaw::skills::{render_template, SkillInvocation};
///
/// let inv = SkillInvocation::from_raw("q3.pdf brief");
/// let out = render_template("$0: read $1 as $2 ($3) [$ARGUMENTS]", "paper", &inv);
/// assert_eq!(out, "paper: read q3.pdf as brief () [q3.pdf brief]");
/// ```
pub fn render_template(template: &str, skill_name: &str, invocation: &SkillInvocation) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            if key == "ARGUMENTS" {
                return invocation.raw_arguments.clone();
            }
            match key.parse::<usize>() {
                Ok(0) => skill_name.to_string(),
                Ok(n) => invocation.arguments.get(n - 1).cloned().unwrap_or_default(),
                Err(_) => String::new(),
            }
        })
        .into_owned()
}

/// Build an activation signal for `skill`.
///
/// # Example
/// ```
/// use skillclaw::skills::{build, parse, Skill, SkillInvocation};
///
/// let skill = Skill::new("deck", "Slides", "Make slides about $ARGUMENTS").with_max_turns(30);
/// let signal = build(&skill, &SkillInvocation::from_raw("rust"));
/// assert_eq!(signal.prompt_body, "Make slides about rust");
/// assert_eq!(parse(&signal.to_json()), Some(signal));
/// ```
pub fn build(skill: &Skill, invocation: &SkillInvocation) -> SkillActivationSignal {
    SkillActivationSignal {
        skill_name: skill.name.clone(),
        prompt_body: render_template(&skill.content, &skill.name, invocation),
        max_turns: skill.max_turns,
        tool_policy: skill.tool_policy.clone().and_then(ToolPolicy::normalized),
    }
}

/// Decode an activation signal from tool output.
///
/// Accepts only a JSON object tagged `"__type__": "skill_activation"` with
/// non-empty `skill_name` and `prompt_body`.
pub fn parse(raw: &str) -> Option<SkillActivationSignal> {
    let Envelope::SkillActivation(mut signal) = serde_json::from_str::<Envelope>(raw.trim()).ok()?;
    signal.skill_name = signal.skill_name.trim().to_string();
    if signal.skill_name.is_empty() || signal.prompt_body.trim().is_empty() {
        return None;
    }
    signal.tool_policy = signal.tool_policy.and_then(ToolPolicy::normalized);
    Some(signal)
}

/// Replace the skill's tagged system message in `messages`.
///
/// Every earlier system message tagged for the same skill is removed and
/// exactly one new one is appended. Returns the appended message.
pub fn upsert(messages: &mut Vec<Message>, signal: &SkillActivationSignal) -> Message {
    messages.retain(|m| tagged_skill_name(m) != Some(signal.skill_name.as_str()));
    let msg = Message::system(&signal.system_prompt());
    messages.push(msg.clone());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck() -> Skill {
        Skill::new("deck", "Slides", "Slides for $1").with_allowed_tools(&["write_file"])
    }

    #[test]
    fn test_build_then_parse_preserves_signal() {
        let signal = build(&deck(), &SkillInvocation::from_raw("launch"));
        let json = signal.to_json();
        assert!(json.contains("\"__type__\":\"skill_activation\""));
        assert_eq!(parse(&json), Some(signal));
    }

    #[test]
    fn test_parse_rejects_untagged_and_empty() {
        assert!(parse("not json").is_none());
        assert!(parse(r#"{"skill_name":"a","prompt_body":"b"}"#).is_none());
        assert!(parse(r#"{"__type__":"other","skill_name":"a","prompt_body":"b"}"#).is_none());
        assert!(parse(r#"{"__type__":"skill_activation","skill_name":" ","prompt_body":"b"}"#).is_none());
        assert!(parse(r#"{"__type__":"skill_activation","skill_name":"a","prompt_body":""}"#).is_none());
        assert!(parse(r#"["skill_activation"]"#).is_none());
    }

    #[test]
    fn test_parse_normalizes_policy() {
        let raw = r#"{"__type__":"skill_activation","skill_name":" deck ","prompt_body":"go",
            "tool_policy":{"allow":[" read_file","read_file"],"deny":[]}}"#;
        let signal = parse(raw).unwrap();
        assert_eq!(signal.skill_name, "deck");
        let policy = signal.tool_policy.unwrap();
        assert_eq!(policy.allow, Some(vec!["read_file".to_string()]));
        assert!(policy.deny.is_none());
    }

    #[test]
    fn test_upsert_twice_leaves_one_tagged_message() {
        let mut messages = vec![Message::system("base prompt"), Message::user("hi")];
        let first = build(&deck(), &SkillInvocation::from_raw("v1"));
        let second = build(&deck(), &SkillInvocation::from_raw("v2"));
        upsert(&mut messages, &first);
        messages.push(Message::assistant("working"));
        upsert(&mut messages, &second);

        let tagged: Vec<_> = messages
            .iter()
            .filter(|m| tagged_skill_name(m) == Some("deck"))
            .collect();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].text(), "[skill:deck]\nSlides for v2");
        assert_eq!(messages.last().map(|m| m.text()), Some("[skill:deck]\nSlides for v2"));
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_upsert_keeps_other_skills() {
        let mut messages = vec![Message::system("[skill:other]\nx")];
        upsert(&mut messages, &build(&deck(), &SkillInvocation::default()));
        assert_eq!(latest_tagged_skill(&messages), Some("deck"));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_tagged_name_requires_system_role() {
        assert!(tagged_skill_name(&Message::user("[skill:deck]\nx")).is_none());
        assert_eq!(tagged_skill_name(&Message::system("[skill:deck]\nx")), Some("deck"));
    }

    #[test]
    fn test_render_does_not_break_double_digit_placeholders() {
        let inv = SkillInvocation::from_raw("a b c d e f g h i j");
        assert_eq!(render_template("$1|$10|$11", "s", &inv), "a|j|");
    }
}
