//! Skill activation tool.
//!
//! Lets the model switch the conversation into a skill. The tool does not
//! touch the transcript itself: it returns a tagged activation signal,
//! which the runner recognizes and folds into the conversation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ClawError, Result};
use crate::skills::{self, SkillInvocation, SkillRegistry};

use super::{Tool, ToolContext, ToolOutput};

/// Name of the skill tool. Always kept in the catalog.
pub const SKILL_TOOL_NAME: &str = "skill";

/// Tool that activates a registered skill.
pub struct SkillTool {
    skills: Arc<SkillRegistry>,
}

impl SkillTool {
    /// Create a skill tool over a registry.
    pub fn new(skills: Arc<SkillRegistry>) -> Self {
        Self { skills }
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        SKILL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Activate a registered skill. Skills are task templates that bring their own \
         instructions and may narrow the available tools."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill": {
                    "type": "string",
                    "description": "Skill name, e.g. \"paper-analysis\""
                },
                "args": {
                    "type": "string",
                    "description": "Optional skill arguments"
                }
            },
            "required": ["skill"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let name = args
            .get("skill")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClawError::Tool("Missing 'skill' argument".into()))?;
        let raw_args = args.get("args").and_then(|v| v.as_str()).unwrap_or("");

        let Some(skill) = self.skills.get(name) else {
            let available: Vec<&str> = self.skills.list().iter().map(|s| s.name.as_str()).collect();
            return Ok(ToolOutput::error(format!(
                "Error: skill \"{}\" not found. Available skills: {}",
                name,
                available.join(", ")
            )));
        };

        info!(skill = %skill.name, args = raw_args, "Activating skill via tool");
        let signal = skills::build(skill, &SkillInvocation::from_raw(raw_args));
        Ok(ToolOutput::llm_only(signal.to_json()))
    }
}
