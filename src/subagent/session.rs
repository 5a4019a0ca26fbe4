//! One background sub-agent.
//!
//! A [`SubAgentSession`] owns a private transcript and runs its own
//! [`ConversationRunner`] with the task's skill active. The owner can stop
//! it at any time; the sub-agent can pause itself to ask the owner a
//! question and resumes once the answer arrives.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::agent::{ConversationRunner, RunOutcome, RunnerObserver, RunnerOptions};
use crate::channels::{file_name_of, OwnerChannel};
use crate::config::{CompactionConfig, SubAgentConfig};
use crate::error::{ClawError, Result};
use crate::providers::LLMProvider;
use crate::session::Message;
use crate::skills::{self, Skill, SkillInvocation};
use crate::tools::{OwnerInquiry, ToolContext, ToolExecutor, ToolResult};

use super::retry;

/// Tools a sub-agent may never use.
pub const SUBAGENT_TOOLS: &[&str] = &[
    "spawn_subagent",
    "check_subagent",
    "stop_subagent",
    "resume_subagent",
];

/// Answer handed to a pending question when the task is stopped.
pub const STOPPED_ANSWER: &str = "[task stopped by owner]";

/// Lifecycle state of a sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentStatus {
    Running,
    WaitingForInput,
    Completed,
    Failed,
    Stopped,
}

impl SubAgentStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WaitingForInput => "waiting_for_input",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Returns `true` while the task has not finished.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::WaitingForInput)
    }
}

impl std::fmt::Display for SubAgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a sub-agent for queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubAgentInfo {
    pub id: String,
    pub owner: String,
    pub skill_name: String,
    pub task_description: String,
    pub status: SubAgentStatus,
    pub progress_log: Vec<String>,
    pub result_summary: Option<String>,
    pub pending_question: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Collaborators a run needs, supplied by the manager.
#[derive(Clone)]
pub struct SubAgentDeps {
    pub provider: Arc<dyn LLMProvider>,
    pub tools: Arc<dyn ToolExecutor>,
    pub skill: Skill,
    pub config: SubAgentConfig,
    pub compaction: CompactionConfig,
    pub model: Option<String>,
}

struct SessionState {
    status: SubAgentStatus,
    progress_log: Vec<String>,
    result_summary: Option<String>,
    pending_question: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    waiter: Option<oneshot::Sender<String>>,
}

/// A detached background conversation working on one task.
pub struct SubAgentSession {
    id: String,
    owner: String,
    skill_name: String,
    task_description: String,
    user_message: String,
    working_dir: Option<String>,
    created_at: DateTime<Utc>,
    channel: Option<Arc<dyn OwnerChannel>>,
    state: Mutex<SessionState>,
    stop_tx: watch::Sender<bool>,
}

impl SubAgentSession {
    /// Create a session in the `running` state.
    pub fn new(
        id: &str,
        owner: &str,
        skill_name: &str,
        task_description: &str,
        user_message: Option<&str>,
        working_dir: Option<&str>,
        channel: Option<Arc<dyn OwnerChannel>>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            skill_name: skill_name.to_string(),
            task_description: task_description.to_string(),
            user_message: user_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(task_description)
                .to_string(),
            working_dir: working_dir.map(str::to_string),
            created_at: Utc::now(),
            channel,
            state: Mutex::new(SessionState {
                status: SubAgentStatus::Running,
                progress_log: Vec::new(),
                result_summary: None,
                pending_question: None,
                completed_at: None,
                waiter: None,
            }),
            stop_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current status.
    pub fn status(&self) -> SubAgentStatus {
        self.state().status
    }

    /// Returns `true` once the owner has stopped the task.
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Snapshot for queries.
    pub fn info(&self) -> SubAgentInfo {
        let state = self.state();
        SubAgentInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            skill_name: self.skill_name.clone(),
            task_description: self.task_description.clone(),
            status: state.status,
            progress_log: state.progress_log.clone(),
            result_summary: state.result_summary.clone(),
            pending_question: state.pending_question.clone(),
            created_at: self.created_at,
            completed_at: state.completed_at,
        }
    }

    /// Append a progress entry.
    pub fn log(&self, entry: impl Into<String>) {
        self.state().progress_log.push(entry.into());
    }

    /// Stop the task. Returns `false` if it already finished.
    ///
    /// A pending question is answered with [`STOPPED_ANSWER`] so the run can
    /// unwind; a pending backoff wait is woken.
    pub fn stop(&self) -> bool {
        {
            let mut state = self.state();
            if !state.status.is_active() {
                return false;
            }
            state.status = SubAgentStatus::Stopped;
            state.completed_at = Some(Utc::now());
            state.pending_question = None;
            state.progress_log.push("Stopped by owner".to_string());
            if let Some(waiter) = state.waiter.take() {
                let _ = waiter.send(STOPPED_ANSWER.to_string());
            }
        }
        self.stop_tx.send_replace(true);
        info!(subagent = %self.id, "Sub-agent stopped");
        true
    }

    /// Deliver the owner's answer. Returns `false` unless a question is pending.
    pub fn resume(&self, answer: &str) -> bool {
        let mut state = self.state();
        if state.status != SubAgentStatus::WaitingForInput {
            return false;
        }
        let Some(waiter) = state.waiter.take() else {
            return false;
        };
        state.status = SubAgentStatus::Running;
        state.pending_question = None;
        state.progress_log.push("Owner replied, continuing".to_string());
        // The receiver only disappears if the run already unwound.
        waiter.send(answer.to_string()).is_ok()
    }

    fn system_prompt(&self, config: &SubAgentConfig) -> String {
        let mut prompt = config.system_prompt.clone();
        if let Some(dir) = &self.working_dir {
            prompt.push_str(&format!("\n\nWorking directory: {}", dir));
        }
        prompt
    }

    /// Run to completion with session-level retries. Returns the final status.
    pub async fn run(self: Arc<Self>, deps: SubAgentDeps) -> SubAgentStatus {
        self.log(format!("Started: {}", self.task_description));
        let mut stop_rx = self.stop_tx.subscribe();
        let mut attempt: u32 = 0;

        let result = loop {
            if self.is_stopped() {
                break None;
            }
            let observer = Arc::new(ProgressObserver::new(Arc::clone(&self)));
            match self.execute_once(&deps, Arc::clone(&observer)).await {
                Ok(outcome) => break Some(Ok((outcome, observer.written()))),
                Err(e) => {
                    self.log(format!("Attempt {} failed: {}", attempt + 1, e));
                    warn!(subagent = %self.id, attempt = attempt + 1, error = %e, "Sub-agent attempt failed");
                    if self.is_stopped() {
                        break None;
                    }
                    if !retry::is_retryable(&e) || attempt >= deps.config.max_retries {
                        break Some(Err(e));
                    }
                    attempt += 1;
                    let delay = retry::backoff(attempt, deps.config.retry_base_delay_ms);
                    self.log(format!("Retry {} in {} ms", attempt, delay.as_millis()));
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop_rx.changed() => break None,
                    }
                }
            }
        };

        match result {
            None => SubAgentStatus::Stopped,
            Some(Ok((outcome, written))) => {
                let status = self.complete(&outcome);
                if status == SubAgentStatus::Completed {
                    self.deliver(&written, &deps.config).await;
                }
                status
            }
            Some(Err(e)) => self.fail(&e),
        }
    }

    /// Record a successful run. A stop that landed first wins.
    fn complete(&self, outcome: &RunOutcome) -> SubAgentStatus {
        let mut state = self.state();
        if !state.status.is_active() {
            return state.status;
        }
        state.status = SubAgentStatus::Completed;
        state.completed_at = Some(Utc::now());
        state.result_summary = Some(outcome.response.clone());
        state.progress_log.push(format!("Completed in {} turns", outcome.turns));
        info!(subagent = %self.id, turns = outcome.turns, "Sub-agent completed");
        SubAgentStatus::Completed
    }

    /// Record a failed run. A stop that landed first wins.
    fn fail(&self, err: &ClawError) -> SubAgentStatus {
        let mut state = self.state();
        if !state.status.is_active() {
            return state.status;
        }
        state.status = SubAgentStatus::Failed;
        state.completed_at = Some(Utc::now());
        state.result_summary = Some(format!("Failed: {}", err));
        error!(subagent = %self.id, error = %err, "Sub-agent failed");
        SubAgentStatus::Failed
    }

    async fn execute_once(
        self: &Arc<Self>,
        deps: &SubAgentDeps,
        observer: Arc<ProgressObserver>,
    ) -> Result<RunOutcome> {
        let mut messages = vec![Message::system(&self.system_prompt(&deps.config))];
        let invocation = SkillInvocation::from_raw("").with_user_message(&self.user_message);
        let signal = skills::build(&deps.skill, &invocation);
        skills::upsert(&mut messages, &signal);
        messages.push(Message::user(&self.user_message));

        let session = Arc::clone(self);
        let options = RunnerOptions::new()
            .with_max_turns(deps.skill.max_turns.unwrap_or(deps.config.default_max_turns))
            .with_compaction(true)
            .with_compaction_config(deps.compaction.clone())
            .with_active_skill(&deps.skill.name, signal.tool_policy.clone())
            .with_disabled_tools(SUBAGENT_TOOLS)
            .with_model(deps.model.clone())
            .with_should_continue(Arc::new(move || !session.is_stopped()));

        let mut ctx = ToolContext::new()
            .with_session(&format!("subagent:{}", self.id))
            .with_inquiry(Arc::clone(self) as Arc<dyn OwnerInquiry>);
        if let Some(dir) = &self.working_dir {
            ctx = ctx.with_working_dir(dir);
        }

        ConversationRunner::new(Arc::clone(&deps.provider), Arc::clone(&deps.tools), options)
            .with_context(ctx)
            .with_observer(observer)
            .run(messages)
            .await
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        match &self.working_dir {
            Some(dir) if p.is_relative() => Path::new(dir).join(p),
            _ => p.to_path_buf(),
        }
    }

    /// Forward finished deliverables to the owner. Failures are logged only.
    async fn deliver(&self, written: &[String], config: &SubAgentConfig) {
        let Some(channel) = &self.channel else {
            return;
        };
        for path in written {
            let is_deliverable = Path::new(path)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|ext| config.deliverable_extensions.iter().any(|d| d.eq_ignore_ascii_case(&ext)));
            if !is_deliverable {
                continue;
            }

            let abs = self.resolve(path);
            if !abs.exists() {
                warn!(subagent = %self.id, path = %abs.display(), "Deliverable missing, skipping");
                continue;
            }
            let abs = abs.to_string_lossy().into_owned();
            let name = file_name_of(&abs);
            match channel.deliver_file(&abs, &name).await {
                Ok(()) => {
                    info!(subagent = %self.id, file = %name, "Deliverable sent");
                    self.log(format!("Delivered {}", name));
                }
                Err(e) => warn!(subagent = %self.id, file = %name, error = %e, "Deliverable send failed"),
            }
        }
    }
}

#[async_trait]
impl OwnerInquiry for SubAgentSession {
    async fn ask(&self, question: &str) -> Result<String> {
        // The waiter exists before the owner hears about the question, so an
        // immediate resume cannot be lost.
        let rx = {
            let mut state = self.state();
            if state.status != SubAgentStatus::Running {
                return Err(ClawError::SubAgent(format!(
                    "cannot ask while {}",
                    state.status
                )));
            }
            let (tx, rx) = oneshot::channel();
            state.status = SubAgentStatus::WaitingForInput;
            state.pending_question = Some(question.to_string());
            state.waiter = Some(tx);
            state.progress_log.push(format!("Waiting for owner: {}", question));
            rx
        };
        info!(subagent = %self.id, "Sub-agent waiting for owner input");

        if let Some(channel) = &self.channel {
            let notice = format!(
                "[Sub-agent {} needs input]\nTask: {}\nQuestion: {}",
                self.id, self.task_description, question
            );
            if let Err(e) = channel.notify(&notice).await {
                warn!(subagent = %self.id, error = %e, "Failed to notify owner of question");
            }
        }

        rx.await
            .map_err(|_| ClawError::SubAgent("question abandoned".to_string()))
    }
}

/// Records files written during a run and reports them as progress.
struct ProgressObserver {
    session: Arc<SubAgentSession>,
    written: Mutex<Vec<String>>,
}

impl ProgressObserver {
    fn new(session: Arc<SubAgentSession>) -> Self {
        Self {
            session,
            written: Mutex::new(Vec::new()),
        }
    }

    fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl RunnerObserver for ProgressObserver {
    fn on_tool_end(&self, result: &ToolResult) {
        let Some(path) = result.written_path.as_ref().filter(|_| result.ok) else {
            return;
        };
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if !written.contains(path) {
            written.push(path.clone());
            drop(written);
            self.session.log(format!("Wrote {}", path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<SubAgentSession> {
        Arc::new(SubAgentSession::new(
            "sub-1",
            "cli:owner",
            "deck",
            "Make slides",
            None,
            None,
            None,
        ))
    }

    #[test]
    fn test_new_session_defaults_user_message_to_task() {
        let s = session();
        assert_eq!(s.user_message, "Make slides");
        let info = s.info();
        assert_eq!(info.status, SubAgentStatus::Running);
        assert!(info.completed_at.is_none());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&SubAgentStatus::WaitingForInput).unwrap();
        assert_eq!(json, "\"waiting_for_input\"");
        assert!(SubAgentStatus::WaitingForInput.is_active());
        assert!(!SubAgentStatus::Stopped.is_active());
    }

    #[test]
    fn test_stop_only_once() {
        let s = session();
        assert!(s.stop());
        assert!(s.is_stopped());
        assert!(!s.stop());
        assert_eq!(s.status(), SubAgentStatus::Stopped);
    }

    #[test]
    fn test_resume_requires_pending_question() {
        let s = session();
        assert!(!s.resume("hello"));
    }

    #[tokio::test]
    async fn test_ask_then_resume() {
        let s = session();
        let asker = Arc::clone(&s);
        let handle = tokio::spawn(async move { asker.ask("Which theme?").await });

        for _ in 0..100 {
            if s.status() == SubAgentStatus::WaitingForInput {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(s.info().pending_question.as_deref(), Some("Which theme?"));
        assert!(s.resume("dark"));
        assert_eq!(handle.await.unwrap().unwrap(), "dark");
        assert_eq!(s.status(), SubAgentStatus::Running);
        assert!(s.info().pending_question.is_none());
    }

    #[tokio::test]
    async fn test_stop_releases_pending_question() {
        let s = session();
        let asker = Arc::clone(&s);
        let handle = tokio::spawn(async move { asker.ask("Continue?").await });
        for _ in 0..100 {
            if s.status() == SubAgentStatus::WaitingForInput {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(s.stop());
        assert_eq!(handle.await.unwrap().unwrap(), STOPPED_ANSWER);
    }

    #[tokio::test]
    async fn test_ask_after_stop_fails() {
        let s = session();
        s.stop();
        assert!(s.ask("anything?").await.is_err());
    }

    fn outcome(response: &str) -> RunOutcome {
        RunOutcome {
            response: response.to_string(),
            messages: Vec::new(),
            new_messages: Vec::new(),
            turns: 2,
            active_skill: None,
            tool_policy: None,
            stopped: false,
        }
    }

    #[test]
    fn test_completion_after_stop_keeps_stopped() {
        let s = session();
        assert!(s.stop());
        assert_eq!(s.complete(&outcome("deck done")), SubAgentStatus::Stopped);

        let info = s.info();
        assert_eq!(info.status, SubAgentStatus::Stopped);
        assert!(info.result_summary.is_none());
        assert!(!info.progress_log.iter().any(|l| l.starts_with("Completed")));
    }

    #[test]
    fn test_failure_after_stop_keeps_stopped() {
        let s = session();
        assert!(s.stop());
        let err = ClawError::SubAgent("model went away".into());
        assert_eq!(s.fail(&err), SubAgentStatus::Stopped);
        assert_eq!(s.status(), SubAgentStatus::Stopped);
        assert!(s.info().result_summary.is_none());
    }

    #[test]
    fn test_complete_then_stop_is_refused() {
        let s = session();
        assert_eq!(s.complete(&outcome("deck done")), SubAgentStatus::Completed);
        assert!(!s.stop());
        assert_eq!(s.info().result_summary.as_deref(), Some("deck done"));
    }

    #[test]
    fn test_observer_records_successful_writes_once() {
        let s = session();
        let observer = ProgressObserver::new(Arc::clone(&s));
        let call = crate::session::ToolCall::new("c", "write_file", "{}");
        let mut ok = ToolResult::success(&call, "done");
        ok.written_path = Some("out/deck.pptx".into());
        observer.on_tool_end(&ok);
        observer.on_tool_end(&ok);
        assert_eq!(observer.written(), vec!["out/deck.pptx".to_string()]);
        assert_eq!(s.info().progress_log, vec!["Wrote out/deck.pptx".to_string()]);
    }
}
