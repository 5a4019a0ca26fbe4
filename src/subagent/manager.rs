//! Registry and lifecycle control of background sub-agents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::channels::OwnerChannel;
use crate::config::{CompactionConfig, SubAgentConfig};
use crate::providers::LLMProvider;
use crate::skills::SkillRegistry;
use crate::tools::ToolExecutor;
use crate::utils::string::{prefix_chars, preview};

use super::session::{SubAgentDeps, SubAgentInfo, SubAgentSession, SubAgentStatus};

/// Characters of the result quoted in a completion notice.
const NOTICE_RESULT_CHARS: usize = 500;

// ============================================================================
// Outcomes
// ============================================================================

/// Why a spawn was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("Too many running sub-agents ({running}/{limit}); wait for one to finish or stop one")]
    ConcurrencyLimit { limit: usize, running: usize },

    #[error("Unknown skill: {0}")]
    UnknownSkill(String),
}

/// Why a task query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskAccessError {
    #[error("task not found")]
    NotFound,

    #[error("task belongs to another owner")]
    Forbidden,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotFound,
    Forbidden,
    NotRunning,
}

/// Result of a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    NotFound,
    Forbidden,
    NotWaiting,
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Default)]
struct Registry {
    tasks: HashMap<String, Arc<SubAgentSession>>,
    /// task id -> owner
    owners: HashMap<String, String>,
    channels: HashMap<String, Arc<dyn OwnerChannel>>,
}

impl Registry {
    fn lookup(&self, owner: &str, id: &str) -> Result<Arc<SubAgentSession>, TaskAccessError> {
        match self.owners.get(id) {
            None => Err(TaskAccessError::NotFound),
            Some(o) if o != owner => Err(TaskAccessError::Forbidden),
            Some(_) => self.tasks.get(id).cloned().ok_or(TaskAccessError::NotFound),
        }
    }

    fn running_for(&self, owner: &str) -> usize {
        self.tasks
            .values()
            .filter(|t| t.owner() == owner && t.status() == SubAgentStatus::Running)
            .count()
    }
}

/// Spawns background sub-agents and answers owner queries about them.
///
/// One manager is shared through `Arc` by every conversation that may
/// delegate work. Tasks are keyed by id and indexed by owner; every query
/// checks ownership before touching the task.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use skillclaw::config::SubAgentConfig;
/// use skillclaw::error::Result;
/// use skillclaw::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
/// use skillclaw::session::Message;
/// use skillclaw::skills::{Skill, SkillRegistry};
/// use skillclaw::subagent::{SpawnError, SubAgentManager};
/// use skillclaw::tools::ToolRegistry;
///
/// struct Done;
///
/// #[async_trait]
/// impl LLMProvider for Done {
///     async fn chat(
///         &self,
///         _messages: Vec<Message>,
///         _tools: Vec<ToolDefinition>,
///         _model: Option<&str>,
///         _options: ChatOptions,
///     ) -> Result<LLMResponse> {
///         Ok(LLMResponse::text("done"))
///     }
///     fn default_model(&self) -> &str { "done" }
///     fn name(&self) -> &str { "done" }
/// }
///
/// # tokio_test::block_on(async {
/// let skills = Arc::new(SkillRegistry::with_skills([Skill::new("deck", "Slides", "Build slides")]));
/// let manager = Arc::new(SubAgentManager::new(
///     Arc::new(Done),
///     Arc::new(ToolRegistry::new()),
///     skills,
///     SubAgentConfig::default(),
/// ));
///
/// let err = manager.spawn("cli:alice", "essay", "Write", None, None).unwrap_err();
/// assert_eq!(err, SpawnError::UnknownSkill("essay".into()));
/// # });
/// ```
pub struct SubAgentManager {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    skills: Arc<SkillRegistry>,
    config: SubAgentConfig,
    compaction: CompactionConfig,
    model: Option<String>,
    registry: Mutex<Registry>,
}

impl SubAgentManager {
    /// Create a manager.
    ///
    /// `tools` is the executor sub-agents use. It should not contain the
    /// sub-agent tools themselves; they are excluded from every sub-agent
    /// catalog either way.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<dyn ToolExecutor>,
        skills: Arc<SkillRegistry>,
        config: SubAgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            skills,
            config,
            compaction: CompactionConfig::default(),
            model: None,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Compaction settings for sub-agent runs.
    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    /// Model override for sub-agent runs.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn config(&self) -> &SubAgentConfig {
        &self.config
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register where an owner's notices and deliverables go.
    pub fn register_channel(&self, owner: &str, channel: Arc<dyn OwnerChannel>) {
        self.registry().channels.insert(owner.to_string(), channel);
    }

    /// Start a background task for `owner`. Returns as soon as it is launched.
    pub fn spawn(
        self: &Arc<Self>,
        owner: &str,
        skill_name: &str,
        task_description: &str,
        user_message: Option<&str>,
        working_dir: Option<&str>,
    ) -> Result<SubAgentInfo, SpawnError> {
        let (session, channel, skill) = {
            let mut registry = self.registry();
            let running = registry.running_for(owner);
            if running >= self.config.max_concurrent {
                warn!(owner = %owner, running, "Sub-agent spawn rejected: concurrency limit");
                return Err(SpawnError::ConcurrencyLimit {
                    limit: self.config.max_concurrent,
                    running,
                });
            }
            let skill = self
                .skills
                .get(skill_name)
                .cloned()
                .ok_or_else(|| SpawnError::UnknownSkill(skill_name.to_string()))?;

            let id = format!("sub-{}", prefix_chars(&uuid::Uuid::new_v4().simple().to_string(), 8));
            let channel = registry.channels.get(owner).cloned();
            let session = Arc::new(SubAgentSession::new(
                &id,
                owner,
                skill_name,
                task_description,
                user_message,
                working_dir,
                channel.clone(),
            ));
            registry.tasks.insert(id.clone(), Arc::clone(&session));
            registry.owners.insert(id, owner.to_string());
            (session, channel, skill)
        };

        let info = session.info();
        crate::log_component!(
            info,
            "subagent",
            "Sub-agent spawned",
            id = info.id.as_str(),
            owner = owner,
            skill = skill_name
        );

        let deps = SubAgentDeps {
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            skill,
            config: self.config.clone(),
            compaction: self.compaction.clone(),
            model: self.model.clone(),
        };
        let retention = Duration::from_secs(self.config.retention_secs);
        let manager = Arc::downgrade(self);
        tokio::spawn(drive(session, deps, channel, retention, manager));

        Ok(info)
    }

    /// Snapshot of one of `owner`'s tasks.
    pub fn get_info_for_owner(&self, owner: &str, id: &str) -> Result<SubAgentInfo, TaskAccessError> {
        self.registry().lookup(owner, id).map(|t| t.info())
    }

    /// All of `owner`'s retained tasks, oldest first.
    pub fn list_by_owner(&self, owner: &str) -> Vec<SubAgentInfo> {
        let mut tasks: Vec<SubAgentInfo> = self
            .registry()
            .tasks
            .values()
            .filter(|t| t.owner() == owner)
            .map(|t| t.info())
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Stop one of `owner`'s tasks.
    pub fn stop_for_owner(&self, owner: &str, id: &str) -> StopOutcome {
        let task = match self.registry().lookup(owner, id) {
            Ok(task) => task,
            Err(TaskAccessError::NotFound) => return StopOutcome::NotFound,
            Err(TaskAccessError::Forbidden) => {
                warn!(subagent = %id, owner = %owner, "Stop refused: not the owner");
                return StopOutcome::Forbidden;
            }
        };
        if task.stop() {
            StopOutcome::Stopped
        } else {
            StopOutcome::NotRunning
        }
    }

    /// Answer a question one of `owner`'s tasks is waiting on.
    pub fn resume_for_owner(&self, owner: &str, id: &str, answer: &str) -> ResumeOutcome {
        let task = match self.registry().lookup(owner, id) {
            Ok(task) => task,
            Err(TaskAccessError::NotFound) => return ResumeOutcome::NotFound,
            Err(TaskAccessError::Forbidden) => return ResumeOutcome::Forbidden,
        };
        if task.resume(answer) {
            info!(subagent = %id, "Sub-agent resumed");
            ResumeOutcome::Resumed
        } else {
            ResumeOutcome::NotWaiting
        }
    }

    /// Tasks of `owner` currently in the `running` state.
    pub fn running_count(&self, owner: &str) -> usize {
        self.registry().running_for(owner)
    }

    /// One line per retained task of `owner`, or `None` if there are none.
    pub fn status_summary(&self, owner: &str) -> Option<String> {
        let tasks = self.list_by_owner(owner);
        if tasks.is_empty() {
            return None;
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let mut line = format!("- {} [{}] {}", t.id, t.status, preview(&t.task_description, 80));
                if let Some(q) = &t.pending_question {
                    line.push_str(&format!(" (waiting: {})", q));
                }
                line
            })
            .collect();
        Some(lines.join("\n"))
    }

    fn remove(&self, id: &str) {
        let mut registry = self.registry();
        registry.tasks.remove(id);
        registry.owners.remove(id);
    }
}

/// Body of a detached task: run, report once, then expire the record.
async fn drive(
    session: Arc<SubAgentSession>,
    deps: SubAgentDeps,
    channel: Option<Arc<dyn OwnerChannel>>,
    retention: Duration,
    manager: Weak<SubAgentManager>,
) {
    let status = Arc::clone(&session).run(deps).await;

    if let (Some(channel), Some(notice)) = (channel, terminal_notice(&session.info(), status)) {
        if let Err(e) = channel.notify(&notice).await {
            warn!(subagent = %session.id(), error = %e, "Failed to send completion notice");
        }
    }

    tokio::time::sleep(retention).await;
    if let Some(manager) = manager.upgrade() {
        manager.remove(session.id());
        info!(subagent = %session.id(), "Sub-agent record expired");
    }
}

fn terminal_notice(info: &SubAgentInfo, status: SubAgentStatus) -> Option<String> {
    let verb = match status {
        SubAgentStatus::Completed => "completed",
        SubAgentStatus::Failed => "failed",
        _ => return None,
    };
    let result = info.result_summary.as_deref().unwrap_or("(no result)");
    Some(format!(
        "[Sub-agent {} {}]\nTask: {}\nResult: {}",
        info.id,
        verb,
        info.task_description,
        preview(result, NOTICE_RESULT_CHARS)
    ))
}
