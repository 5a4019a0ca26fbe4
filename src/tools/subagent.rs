//! Tools that let a conversation delegate work to background sub-agents.
//!
//! The calling conversation's `session_id` is the owner of every task it
//! spawns; the other tools only see that owner's tasks.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ClawError, Result};
use crate::subagent::{ResumeOutcome, StopOutcome, SubAgentInfo, SubAgentManager, TaskAccessError};

use super::{Tool, ToolContext, ToolOutput};

/// Progress entries shown by `check_subagent`.
const PROGRESS_TAIL: usize = 10;

fn owner_of(ctx: &ToolContext) -> Result<&str> {
    ctx.session_id
        .as_deref()
        .ok_or_else(|| ClawError::Tool("No session available in tool context".into()))
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ClawError::Tool(format!("Missing '{}' argument", key)))
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn describe(info: &SubAgentInfo) -> String {
    let mut out = format!(
        "Sub-agent {} [{}]\nSkill: {}\nTask: {}",
        info.id, info.status, info.skill_name, info.task_description
    );
    if let Some(q) = &info.pending_question {
        out.push_str(&format!("\nWaiting for answer to: {}", q));
    }
    if let Some(result) = &info.result_summary {
        out.push_str(&format!("\nResult: {}", result));
    }
    let skip = info.progress_log.len().saturating_sub(PROGRESS_TAIL);
    if info.progress_log.len() > skip {
        out.push_str("\nRecent progress:");
        for entry in info.progress_log.iter().skip(skip) {
            out.push_str(&format!("\n- {}", entry));
        }
    }
    out
}

// ============================================================================
// spawn_subagent
// ============================================================================

/// Starts a background sub-agent for a skill.
pub struct SpawnSubAgentTool {
    manager: Arc<SubAgentManager>,
}

impl SpawnSubAgentTool {
    pub fn new(manager: Arc<SubAgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for SpawnSubAgentTool {
    fn name(&self) -> &str {
        "spawn_subagent"
    }

    fn description(&self) -> &str {
        "Hand a long-running task to a background sub-agent that works with one skill. \
         Returns immediately; the owner is notified when the task finishes."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "skill": {
                    "type": "string",
                    "description": "Skill the sub-agent works with"
                },
                "task": {
                    "type": "string",
                    "description": "Short description of the task"
                },
                "message": {
                    "type": "string",
                    "description": "Full instructions for the sub-agent (defaults to the task)"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Directory the sub-agent writes its output into"
                }
            },
            "required": ["skill", "task"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let owner = owner_of(ctx)?;
        let skill = required_str(&args, "skill")?;
        let task = required_str(&args, "task")?;
        let working_dir = optional_str(&args, "working_dir").or(ctx.working_dir.as_deref());

        match self.manager.spawn(
            owner,
            skill,
            task,
            optional_str(&args, "message"),
            working_dir,
        ) {
            Ok(info) => Ok(ToolOutput::llm_only(format!(
                "Spawned sub-agent {} with skill \"{}\". The owner will be notified when it finishes.",
                info.id, info.skill_name
            ))),
            Err(e) => Ok(ToolOutput::error(format!("Error: {}", e))),
        }
    }
}

// ============================================================================
// check_subagent
// ============================================================================

/// Reports on one background task, or lists all of the owner's tasks.
pub struct CheckSubAgentTool {
    manager: Arc<SubAgentManager>,
}

impl CheckSubAgentTool {
    pub fn new(manager: Arc<SubAgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for CheckSubAgentTool {
    fn name(&self) -> &str {
        "check_subagent"
    }

    fn description(&self) -> &str {
        "Check the status of a background sub-agent, or list all of them when no id is given."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Sub-agent id (omit to list all)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let owner = owner_of(ctx)?;
        let Some(id) = optional_str(&args, "task_id") else {
            return Ok(ToolOutput::llm_only(
                self.manager
                    .status_summary(owner)
                    .unwrap_or_else(|| "No background tasks.".to_string()),
            ));
        };

        match self.manager.get_info_for_owner(owner, id) {
            Ok(info) => Ok(ToolOutput::llm_only(describe(&info))),
            Err(TaskAccessError::NotFound) => {
                Ok(ToolOutput::error(format!("Error: sub-agent {} not found", id)))
            }
            Err(TaskAccessError::Forbidden) => Ok(ToolOutput::error(format!(
                "Error: sub-agent {} belongs to another conversation",
                id
            ))),
        }
    }
}

// ============================================================================
// stop_subagent
// ============================================================================

/// Stops a background task.
pub struct StopSubAgentTool {
    manager: Arc<SubAgentManager>,
}

impl StopSubAgentTool {
    pub fn new(manager: Arc<SubAgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for StopSubAgentTool {
    fn name(&self) -> &str {
        "stop_subagent"
    }

    fn description(&self) -> &str {
        "Stop a running or waiting background sub-agent."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Sub-agent id"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let owner = owner_of(ctx)?;
        let id = required_str(&args, "task_id")?;
        Ok(match self.manager.stop_for_owner(owner, id) {
            StopOutcome::Stopped => ToolOutput::llm_only(format!("Sub-agent {} stopped.", id)),
            StopOutcome::NotRunning => {
                ToolOutput::error(format!("Error: sub-agent {} has already finished", id))
            }
            StopOutcome::NotFound => {
                ToolOutput::error(format!("Error: sub-agent {} not found", id))
            }
            StopOutcome::Forbidden => ToolOutput::error(format!(
                "Error: sub-agent {} belongs to another conversation",
                id
            )),
        })
    }
}

// ============================================================================
// resume_subagent
// ============================================================================

/// Answers the question a background task is waiting on.
pub struct ResumeSubAgentTool {
    manager: Arc<SubAgentManager>,
}

impl ResumeSubAgentTool {
    pub fn new(manager: Arc<SubAgentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ResumeSubAgentTool {
    fn name(&self) -> &str {
        "resume_subagent"
    }

    fn description(&self) -> &str {
        "Answer the question a background sub-agent is waiting on so it can continue."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Sub-agent id"
                },
                "answer": {
                    "type": "string",
                    "description": "The owner's answer"
                }
            },
            "required": ["task_id", "answer"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let owner = owner_of(ctx)?;
        let id = required_str(&args, "task_id")?;
        let answer = required_str(&args, "answer")?;
        Ok(match self.manager.resume_for_owner(owner, id, answer) {
            ResumeOutcome::Resumed => {
                ToolOutput::llm_only(format!("Sub-agent {} resumed with the answer.", id))
            }
            ResumeOutcome::NotWaiting => ToolOutput::error(format!(
                "Error: sub-agent {} is not waiting for input",
                id
            )),
            ResumeOutcome::NotFound => {
                ToolOutput::error(format!("Error: sub-agent {} not found", id))
            }
            ResumeOutcome::Forbidden => ToolOutput::error(format!(
                "Error: sub-agent {} belongs to another conversation",
                id
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubAgentConfig;
    use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
    use crate::session::Message;
    use crate::skills::{Skill, SkillRegistry};
    use crate::subagent::SUBAGENT_TOOLS;
    use crate::tools::ToolRegistry;

    struct Hanging;

    #[async_trait]
    impl LLMProvider for Hanging {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            std::future::pending().await
        }
        fn default_model(&self) -> &str {
            "hanging"
        }
        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn manager() -> Arc<SubAgentManager> {
        let skills = SkillRegistry::with_skills([Skill::new("deck", "Slides", "Build slides")]);
        Arc::new(SubAgentManager::new(
            Arc::new(Hanging),
            Arc::new(ToolRegistry::new()),
            Arc::new(skills),
            SubAgentConfig::default(),
        ))
    }

    #[test]
    fn test_tool_names_match_exclusion_list() {
        let m = manager();
        let names = [
            SpawnSubAgentTool::new(Arc::clone(&m)).name().to_string(),
            CheckSubAgentTool::new(Arc::clone(&m)).name().to_string(),
            StopSubAgentTool::new(Arc::clone(&m)).name().to_string(),
            ResumeSubAgentTool::new(m).name().to_string(),
        ];
        assert_eq!(names.to_vec(), SUBAGENT_TOOLS.to_vec());
    }

    #[tokio::test]
    async fn test_spawn_requires_session() {
        let tool = SpawnSubAgentTool::new(manager());
        let err = tool
            .execute(json!({"skill": "deck", "task": "slides"}), &ToolContext::new())
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_spawn_then_check_and_stop() {
        let m = manager();
        let ctx = ToolContext::new().with_session("alice");

        let out = SpawnSubAgentTool::new(Arc::clone(&m))
            .execute(json!({"skill": "deck", "task": "Q3 slides"}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        let id = m.list_by_owner("alice")[0].id.clone();
        assert!(out.for_llm.contains(&id));

        let listed = CheckSubAgentTool::new(Arc::clone(&m))
            .execute(json!({}), &ctx)
            .await
            .unwrap();
        assert!(listed.for_llm.contains("[running] Q3 slides"));

        let stranger = ToolContext::new().with_session("bob");
        let denied = StopSubAgentTool::new(Arc::clone(&m))
            .execute(json!({"task_id": id}), &stranger)
            .await
            .unwrap();
        assert!(denied.is_error);
        assert!(denied.for_llm.contains("another conversation"));

        let stopped = StopSubAgentTool::new(Arc::clone(&m))
            .execute(json!({"task_id": id}), &ctx)
            .await
            .unwrap();
        assert_eq!(stopped.for_llm, format!("Sub-agent {} stopped.", id));

        let detail = CheckSubAgentTool::new(m)
            .execute(json!({"task_id": id}), &ctx)
            .await
            .unwrap();
        assert!(detail.for_llm.starts_with(&format!("Sub-agent {} [stopped]", id)));
        assert!(detail.for_llm.contains("- Stopped by owner"));
    }

    #[tokio::test]
    async fn test_spawn_unknown_skill_is_tool_error() {
        let ctx = ToolContext::new().with_session("alice");
        let out = SpawnSubAgentTool::new(manager())
            .execute(json!({"skill": "essay", "task": "write"}), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert_eq!(out.for_llm, "Error: Unknown skill: essay");
    }

    #[tokio::test]
    async fn test_resume_when_not_waiting() {
        let m = manager();
        let ctx = ToolContext::new().with_session("alice");
        let id = m.spawn("alice", "deck", "slides", None, None).unwrap().id;
        let out = ResumeSubAgentTool::new(m)
            .execute(json!({"task_id": id, "answer": "blue"}), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.for_llm.contains("not waiting"));
    }
}
