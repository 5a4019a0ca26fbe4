//! Owner question tool.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ClawError, Result};

use super::{Tool, ToolContext, ToolOutput};

/// Name of the question tool.
pub const ASK_TOOL_NAME: &str = "ask_user_question";

/// Pauses the conversation until the owner answers a question.
///
/// Only works where the tool context carries an owner back channel, i.e.
/// inside a background sub-agent.
pub struct AskUserQuestionTool;

#[async_trait]
impl Tool for AskUserQuestionTool {
    fn name(&self) -> &str {
        ASK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ask the owner a question and wait for the reply. Use it when a decision \
         cannot be made without them."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question, in plain language"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ClawError::Tool("'question' must be a non-empty string".into()))?;

        let Some(inquiry) = &ctx.inquiry else {
            return Ok(ToolOutput::error(
                "Error: no owner channel is available to ask questions here",
            ));
        };

        info!(question = question, "Asking owner");
        let answer = inquiry.ask(question).await?;
        Ok(ToolOutput::llm_only(format!("Owner replied: {}", answer)))
    }
}
