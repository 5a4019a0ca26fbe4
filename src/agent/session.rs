//! Per-conversation session.
//!
//! An [`AgentSession`] owns one durable transcript and drives a fresh
//! [`ConversationRunner`] for every owner message. It handles slash
//! commands, injects transient context (recalled memory, background task
//! status) that never reaches the durable transcript, and writes a summary
//! to memory when the conversation ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, CompactionConfig};
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::providers::{ChatOptions, LLMProvider};
use crate::session::{Message, Role};
use crate::skills::{self, latest_tagged_skill, Skill, SkillActivationSignal, SkillInvocation, SkillRegistry, ToolPolicy};
use crate::subagent::SubAgentManager;
use crate::tools::{ToolContext, ToolExecutor, ToolFilter};
use crate::utils::string::preview;

use super::runner::{ConversationRunner, RunnerObserver, RunnerOptions};

/// Reply while a previous message is still being processed.
pub const BUSY_MESSAGE: &str = "Still working on the previous message, please wait...";

/// Tag of the session identity message added on first use.
pub const SESSION_CONTEXT_PREFIX: &str = "[session_context]";
/// Tag of recalled memory; present only in the copy sent to the model.
pub const LONG_TERM_MEMORY_PREFIX: &str = "[long_term_memory]";
/// Tag of the background task list; present only in the copy sent to the model.
pub const SUBAGENT_STATUS_PREFIX: &str = "[transient_subagent_status]";

const TRANSIENT_PREFIXES: &[&str] = &[LONG_TERM_MEMORY_PREFIX, SUBAGENT_STATUS_PREFIX];

/// Messages quoted in the end-of-conversation digest.
const DIGEST_MESSAGES: usize = 20;
/// Characters kept of each quoted message.
const DIGEST_MESSAGE_CHARS: usize = 200;

const SUMMARY_INSTRUCTION: &str = "Summarize this conversation for long-term memory. Keep \
facts about the owner, decisions made and open tasks. Answer with the summary only.";

/// Result of a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was recognized
    pub handled: bool,
    /// Text to show the owner
    pub reply: Option<String>,
}

impl CommandResult {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            handled: true,
            reply: Some(text.into()),
        }
    }

    fn unhandled() -> Self {
        Self {
            handled: false,
            reply: None,
        }
    }
}

/// What `summarize_and_destroy` did before clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// A summary was written to memory
    Remembered,
    /// The transcript was cleared without a memory write
    Cleared,
    /// There was nothing to clear
    Empty,
}

#[derive(Default)]
struct Conversation {
    messages: Vec<Message>,
    active_skill: Option<String>,
    tool_policy: Option<ToolPolicy>,
    max_turns: Option<u32>,
}

impl Conversation {
    fn apply(&mut self, signal: &SkillActivationSignal) {
        skills::upsert(&mut self.messages, signal);
        self.active_skill = Some(signal.skill_name.clone());
        self.tool_policy = signal.tool_policy.clone();
        self.max_turns = signal.max_turns;
    }

    fn adopt(&mut self, skill: Option<&Skill>, name: &str) {
        self.active_skill = Some(name.to_string());
        self.tool_policy = skill.and_then(|s| s.tool_policy.clone());
        self.max_turns = skill.and_then(|s| s.max_turns);
    }
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn is_transient(msg: &Message) -> bool {
    msg.role == Role::System && TRANSIENT_PREFIXES.iter().any(|p| msg.is_system_with_prefix(p))
}

/// One owner conversation.
///
/// At most one message is processed at a time; a message arriving while
/// another is in flight gets [`BUSY_MESSAGE`] back instead of queueing.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use skillclaw::agent::AgentSession;
/// use skillclaw::error::Result;
/// use skillclaw::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
/// use skillclaw::session::Message;
/// use skillclaw::skills::SkillRegistry;
/// use skillclaw::tools::ToolRegistry;
///
/// struct Hello;
///
/// #[async_trait]
/// impl LLMProvider for Hello {
///     async fn chat(
///         &self,
///         _messages: Vec<Message>,
///         _tools: Vec<ToolDefinition>,
///         _model: Option<&str>,
///         _options: ChatOptions,
///     ) -> Result<LLMResponse> {
///         Ok(LLMResponse::text("Hello!"))
///     }
///     fn default_model(&self) -> &str { "hello" }
///     fn name(&self) -> &str { "hello" }
/// }
///
/// # tokio_test::block_on(async {
/// let session = AgentSession::new(
///     "cli:alice",
///     Arc::new(Hello),
///     Arc::new(ToolRegistry::new()),
///     Arc::new(SkillRegistry::new()),
/// );
/// assert_eq!(session.handle_message("hi").await, "Hello!");
/// assert_eq!(session.history_len().await, 4); // system, context, user, assistant
/// # });
/// ```
pub struct AgentSession {
    key: String,
    provider: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    skills: Arc<SkillRegistry>,
    agent: AgentConfig,
    compaction: CompactionConfig,
    working_dir: Option<String>,
    memory: Option<Arc<dyn MemoryStore>>,
    subagents: Option<Arc<SubAgentManager>>,
    observer: Option<Arc<dyn RunnerObserver>>,
    state: Mutex<Conversation>,
    busy: AtomicBool,
}

impl AgentSession {
    /// Create a session. `key` identifies the conversation and owns the
    /// background tasks it spawns.
    pub fn new(
        key: &str,
        provider: Arc<dyn LLMProvider>,
        tools: Arc<dyn ToolExecutor>,
        skills: Arc<SkillRegistry>,
    ) -> Self {
        Self {
            key: key.to_string(),
            provider,
            tools,
            skills,
            agent: AgentConfig::default(),
            compaction: CompactionConfig::default(),
            working_dir: None,
            memory: None,
            subagents: None,
            observer: None,
            state: Mutex::new(Conversation::default()),
            busy: AtomicBool::new(false),
        }
    }

    /// Conversation defaults.
    pub fn with_agent_config(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    /// Compaction settings for every run.
    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    /// Working directory handed to tools.
    pub fn with_working_dir(mut self, dir: &str) -> Self {
        self.working_dir = Some(dir.to_string());
        self
    }

    /// Long-term memory consulted before each message.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Background task manager whose status is shown to the model.
    pub fn with_subagents(mut self, manager: Arc<SubAgentManager>) -> Self {
        self.subagents = Some(manager);
        self
    }

    /// Observer attached to every run.
    pub fn with_observer(mut self, observer: Arc<dyn RunnerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` while a message is being processed.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the durable transcript.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    /// Number of messages in the durable transcript.
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Name of the active skill, if any.
    pub async fn active_skill(&self) -> Option<String> {
        self.state.lock().await.active_skill.clone()
    }

    fn system_prompt(&self) -> String {
        let mut prompt = self.agent.system_prompt.clone();

        let skills = self.skills.list();
        if !skills.is_empty() {
            prompt.push_str("\n\n## Available Skills\n");
            for skill in skills {
                prompt.push_str(&format!("\n- {}: {}", skill.name, skill.description));
            }
        }

        let tools: Vec<String> = self
            .tools
            .catalog(&ToolFilter::open())
            .into_iter()
            .map(|t| t.name)
            .collect();
        if !tools.is_empty() {
            prompt.push_str(&format!("\n\n## Available Tools\n\n{}", tools.join(", ")));
        }
        prompt
    }

    /// Add the system prompt and session identity on first use.
    fn init(&self, conv: &mut Conversation) {
        if !conv.messages.is_empty() {
            return;
        }
        conv.messages.push(Message::system(&self.system_prompt()));
        conv.messages.push(Message::system(&format!(
            "{}\nsession: {}",
            SESSION_CONTEXT_PREFIX, self.key
        )));
        debug!(session = %self.key, "Session initialized");
    }

    /// Activate a skill before the first message. Returns `false` if the
    /// skill does not exist.
    pub async fn activate_skill(&self, name: &str) -> bool {
        let Some(skill) = self.skills.get(name) else {
            warn!(session = %self.key, skill = %name, "Skill not found");
            return false;
        };
        let signal = skills::build(skill, &SkillInvocation::from_raw(""));
        let mut conv = self.state.lock().await;
        self.init(&mut conv);
        conv.apply(&signal);
        info!(session = %self.key, skill = %name, max_turns = ?signal.max_turns, "Skill activated");
        true
    }

    fn try_auto_activate(&self, conv: &mut Conversation, text: &str) {
        let input = text.trim();
        if input.is_empty() || input.starts_with('/') || conv.active_skill.is_some() {
            return;
        }
        let Some(skill) = self.skills.find_auto_invocable_by_text(input) else {
            return;
        };
        let invocation = SkillInvocation::from_raw("").with_user_message(input);
        conv.apply(&skills::build(skill, &invocation));
        info!(session = %self.key, skill = %skill.name, "Skill auto-activated");
    }

    /// Process one owner message and return the reply.
    ///
    /// Never fails: errors are rolled back and reported in the reply text.
    pub async fn handle_message(&self, text: &str) -> String {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(session = %self.key, "Message rejected: session busy");
            return BUSY_MESSAGE.to_string();
        };

        let mut conv = self.state.lock().await;
        self.init(&mut conv);
        self.try_auto_activate(&mut conv, text);
        conv.messages.push(Message::user(text));

        match self.run_turn(&mut conv, text).await {
            Ok(reply) => reply,
            Err(e) => {
                if conv.messages.last().is_some_and(|m| m.role == Role::User) {
                    conv.messages.pop();
                }
                error!(session = %self.key, error = %e, "Message processing failed");
                format!("Error processing message: {}", e)
            }
        }
    }

    async fn transient_context(&self, text: &str) -> Vec<Message> {
        let mut extra = Vec::new();
        if let Some(memory) = &self.memory {
            match memory.recall(text).await {
                Ok(Some(recalled)) => extra.push(Message::system(&format!(
                    "{}\nLong-term memory relevant to this conversation:\n\n{}",
                    LONG_TERM_MEMORY_PREFIX, recalled
                ))),
                Ok(None) => {}
                Err(e) => warn!(session = %self.key, error = %e, "Memory recall failed"),
            }
        }
        if let Some(status) = self.subagents.as_ref().and_then(|m| m.status_summary(&self.key)) {
            extra.push(Message::system(&format!(
                "{}\nBackground tasks of this conversation:\n{}\n\nAnswer progress questions from this list. Use stop_subagent to stop a task.",
                SUBAGENT_STATUS_PREFIX, status
            )));
        }
        extra
    }

    async fn run_turn(&self, conv: &mut Conversation, text: &str) -> Result<String> {
        let mut context = conv.messages.clone();
        let user_at = context.len() - 1;
        let extra = self.transient_context(text).await;
        context.splice(user_at..user_at, extra);

        if conv.active_skill.is_none() {
            if let Some(name) = latest_tagged_skill(&conv.messages).map(str::to_string) {
                conv.adopt(self.skills.get(&name), &name);
            }
        }

        let max_turns = conv.max_turns.unwrap_or(self.agent.max_turns);
        let mut options = RunnerOptions::new()
            .with_max_turns(max_turns)
            .with_compaction(self.compaction.enabled)
            .with_compaction_config(self.compaction.clone())
            .with_stream(self.agent.stream)
            .with_model(self.agent.model.clone());
        if let Some(skill) = &conv.active_skill {
            options = options.with_active_skill(skill, conv.tool_policy.clone());
        }

        let mut ctx = ToolContext::new().with_session(&self.key);
        if let Some(dir) = &self.working_dir {
            ctx = ctx.with_working_dir(dir);
        }
        let mut runner = ConversationRunner::new(Arc::clone(&self.provider), Arc::clone(&self.tools), options)
            .with_context(ctx);
        if let Some(observer) = &self.observer {
            runner = runner.with_observer(Arc::clone(observer));
        }

        let outcome = runner.run(context).await?;

        conv.messages = outcome
            .messages
            .into_iter()
            .filter(|m| !is_transient(m))
            .collect();
        if outcome.active_skill != conv.active_skill {
            if let Some(name) = &outcome.active_skill {
                conv.adopt(self.skills.get(name), name);
                conv.tool_policy = outcome.tool_policy.clone();
            }
        }
        let answered = conv
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && !m.has_tool_calls() && m.text() == outcome.response);
        if !answered {
            conv.messages.push(Message::assistant(&outcome.response));
        }

        info!(
            session = %self.key,
            turns = outcome.turns,
            history = conv.messages.len(),
            "Message processed"
        );
        Ok(outcome.response)
    }

    /// Dispatch `/name args` to [`handle_command`](Self::handle_command) and
    /// anything else to [`handle_message`](Self::handle_message).
    pub async fn handle_input(&self, text: &str) -> String {
        let trimmed = text.trim();
        if let Some(command) = trimmed.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            if let Some(name) = parts.next() {
                let args: Vec<&str> = parts.collect();
                let result = self.handle_command(name, &args).await;
                if result.handled {
                    return result.reply.unwrap_or_default();
                }
            }
        }
        self.handle_message(text).await
    }

    /// Run a built-in command or activate a skill by name.
    pub async fn handle_command(&self, name: &str, args: &[&str]) -> CommandResult {
        let name = name.to_lowercase();
        match name.as_str() {
            "clear" => {
                self.clear().await;
                CommandResult::reply("Conversation cleared.")
            }
            "skills" => CommandResult::reply(self.skills_listing()),
            "history" => CommandResult::reply(format!(
                "Conversation history: {} messages\nContext compaction is managed automatically.",
                self.history_len().await
            )),
            "exit" => {
                self.summarize_and_destroy().await;
                CommandResult::reply("Goodbye!")
            }
            _ => self.skill_command(&name, args).await,
        }
    }

    fn skills_listing(&self) -> String {
        let skills = self.skills.user_invocable();
        if skills.is_empty() {
            return "No skills available.".to_string();
        }
        let lines: Vec<String> = skills
            .iter()
            .map(|s| {
                let hint = s
                    .argument_hint
                    .as_deref()
                    .map(|h| format!(" {}", h))
                    .unwrap_or_default();
                format!("/{}{}\n  {}", s.name, hint, s.description)
            })
            .collect();
        format!("Available skills:\n\n{}", lines.join("\n\n"))
    }

    async fn skill_command(&self, name: &str, args: &[&str]) -> CommandResult {
        let Some(skill) = self.skills.get(name) else {
            return CommandResult::unhandled();
        };
        if !skill.user_invocable {
            return CommandResult::reply(format!("Skill \"{}\" cannot be invoked directly", name));
        }

        let raw = args.join(" ");
        let invocation =
            SkillInvocation::from_raw(&raw).with_user_message(format!("/{} {}", name, raw).trim());
        let signal = skills::build(skill, &invocation);
        {
            let mut conv = self.state.lock().await;
            self.init(&mut conv);
            conv.apply(&signal);
        }
        info!(session = %self.key, skill = %name, max_turns = ?signal.max_turns, "Skill activated by command");

        if raw.is_empty() {
            CommandResult::reply(format!("Skill \"{}\" activated", skill.name))
        } else {
            CommandResult::reply(self.handle_message(&raw).await)
        }
    }

    /// Empty the transcript and forget the active skill.
    pub async fn clear(&self) {
        *self.state.lock().await = Conversation::default();
        debug!(session = %self.key, "Session cleared");
    }

    /// Write a summary of the conversation to memory, then clear it.
    ///
    /// The summary is asked of the model; if that fails a plain digest of
    /// the conversation is stored instead. A failed memory write is logged
    /// and reported as [`DestroyOutcome::Cleared`].
    pub async fn summarize_and_destroy(&self) -> DestroyOutcome {
        let mut conv = self.state.lock().await;
        if conv.messages.is_empty() {
            return DestroyOutcome::Empty;
        }
        let messages = std::mem::take(&mut conv.messages);
        *conv = Conversation::default();
        drop(conv);

        let has_user = messages.iter().any(|m| m.role == Role::User);
        let Some(memory) = self.memory.as_ref().filter(|_| has_user) else {
            return DestroyOutcome::Cleared;
        };

        let digest = conversation_digest(&messages);
        let summary = self.summarize(&digest).await.unwrap_or(digest);
        match memory.write(&summary, &self.key).await {
            Ok(()) => {
                info!(session = %self.key, chars = summary.chars().count(), "Conversation summary stored");
                DestroyOutcome::Remembered
            }
            Err(e) => {
                warn!(session = %self.key, error = %e, "Failed to store conversation summary");
                DestroyOutcome::Cleared
            }
        }
    }

    async fn summarize(&self, digest: &str) -> Option<String> {
        let request = vec![Message::system(SUMMARY_INSTRUCTION), Message::user(digest)];
        match self
            .provider
            .chat(request, Vec::new(), self.agent.model.as_deref(), ChatOptions::new())
            .await
        {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(session = %self.key, error = %e, "Summary request failed, storing digest");
                None
            }
        }
    }
}

/// Plain-text digest of the owner/assistant exchange, newest messages last.
fn conversation_digest(messages: &[Message]) -> String {
    let lines: Vec<String> = messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .filter(|m| !m.text().trim().is_empty())
        .map(|m| {
            let who = if m.role == Role::User { "Owner" } else { "Assistant" };
            format!("{}: {}", who, preview(m.text().trim(), DIGEST_MESSAGE_CHARS))
        })
        .collect();
    let skip = lines.len().saturating_sub(DIGEST_MESSAGES);
    lines[skip..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClawError;
    use crate::memory::InMemoryStore;
    use crate::providers::{LLMResponse, ToolDefinition};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    /// Replays scripted responses and records the message lists it saw.
    struct Scripted {
        responses: StdMutex<Vec<Result<LLMResponse>>>,
        seen: StdMutex<Vec<Vec<Message>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut responses: Vec<Result<LLMResponse>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: StdMutex::new(responses),
                seen: StdMutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn last_seen(&self) -> Vec<Message> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(LLMResponse::text("ok")))
        }
        fn default_model(&self) -> &str {
            "scripted"
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct BrokenMemory;

    #[async_trait]
    impl MemoryStore for BrokenMemory {
        async fn recall(&self, _query: &str) -> Result<Option<String>> {
            Err(ClawError::Session("offline".into()))
        }
        async fn write(&self, _text: &str, _speaker: &str) -> Result<()> {
            Err(ClawError::Session("offline".into()))
        }
    }

    fn skills() -> Arc<SkillRegistry> {
        Arc::new(SkillRegistry::with_skills([
            Skill::new("deck", "Build slide decks", "Make slides about $ARGUMENTS").with_max_turns(40),
            Skill::new("secret", "Internal", "hidden").manual_only(),
        ]))
    }

    fn session(provider: Arc<Scripted>) -> AgentSession {
        AgentSession::new(
            "cli:alice",
            provider,
            Arc::new(crate::tools::ToolRegistry::new()),
            skills(),
        )
    }

    #[tokio::test]
    async fn test_first_message_initializes_once() {
        let s = session(Scripted::new(vec![]));
        s.handle_message("one").await;
        s.handle_message("two").await;
        let msgs = s.messages().await;
        let system: Vec<_> = msgs.iter().filter(|m| m.role == Role::System).collect();
        assert_eq!(system.len(), 2);
        assert!(system[0].text().contains("## Available Skills"));
        assert!(system[1].is_system_with_prefix(SESSION_CONTEXT_PREFIX));
        assert_eq!(msgs.len(), 6);
    }

    #[tokio::test]
    async fn test_busy_flag_rejects_concurrent_message() {
        let s = session(Scripted::new(vec![]));
        s.busy.store(true, Ordering::SeqCst);
        assert_eq!(s.handle_message("hi").await, BUSY_MESSAGE);
        s.busy.store(false, Ordering::SeqCst);
        assert_eq!(s.handle_message("hi").await, "ok");
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_user_message() {
        let s = session(Scripted::new(vec![Err(ClawError::Provider("Invalid API key".into()))]));
        let reply = s.handle_message("hello").await;
        assert!(reply.starts_with("Error processing message:"));
        assert!(reply.contains("Invalid API key"));
        let msgs = s.messages().await;
        assert!(msgs.iter().all(|m| m.role != Role::User));
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn test_memory_is_transient() {
        let memory = Arc::new(InMemoryStore::new());
        memory.write("Owner likes dark slide themes", "cli:alice").await.unwrap();
        let provider = Scripted::new(vec![]);
        let s = session(Arc::clone(&provider)).with_memory(memory);

        s.handle_message("draft the slide outline").await;
        let seen = provider.last_seen();
        let n = seen.len();
        assert!(seen[n - 2].is_system_with_prefix(LONG_TERM_MEMORY_PREFIX));
        assert_eq!(seen[n - 1].text(), "draft the slide outline");

        let durable = s.messages().await;
        assert!(durable.iter().all(|m| !is_transient(m)));
    }

    #[tokio::test]
    async fn test_memory_failure_is_not_fatal() {
        let s = session(Scripted::new(vec![])).with_memory(Arc::new(BrokenMemory));
        assert_eq!(s.handle_message("hi").await, "ok");
        assert_eq!(s.summarize_and_destroy().await, DestroyOutcome::Cleared);
        assert_eq!(s.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_auto_activation_by_skill_name() {
        let s = session(Scripted::new(vec![]));
        s.handle_message("use deck for the launch").await;
        assert_eq!(s.active_skill().await.as_deref(), Some("deck"));
        let msgs = s.messages().await;
        assert_eq!(latest_tagged_skill(&msgs), Some("deck"));
    }

    #[tokio::test]
    async fn test_manual_only_skill_not_auto_activated() {
        let s = session(Scripted::new(vec![]));
        s.handle_message("tell me a secret").await;
        assert!(s.active_skill().await.is_none());
    }

    #[tokio::test]
    async fn test_skill_command_replaces_tagged_message() {
        let provider = Scripted::new(vec![]);
        let s = session(Arc::clone(&provider));
        let first = s.handle_command("deck", &[]).await;
        assert_eq!(first.reply.as_deref(), Some("Skill \"deck\" activated"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let second = s.handle_command("DECK", &["pricing"]).await;
        assert_eq!(second.reply.as_deref(), Some("ok"));

        let msgs = s.messages().await;
        let tagged: Vec<_> = msgs
            .iter()
            .filter(|m| skills::tagged_skill_name(m) == Some("deck"))
            .collect();
        assert_eq!(tagged.len(), 1);
        assert!(tagged[0].text().ends_with("Make slides about pricing"));
    }

    #[tokio::test]
    async fn test_unknown_command_not_handled() {
        let s = session(Scripted::new(vec![]));
        let result = s.handle_command("nope", &[]).await;
        assert_eq!(result, CommandResult::unhandled());
        let hidden = s.handle_command("secret", &[]).await;
        assert!(hidden.handled);
        assert!(s.active_skill().await.is_none());
    }

    #[tokio::test]
    async fn test_builtin_commands() {
        let s = session(Scripted::new(vec![]));
        s.handle_message("hi").await;
        let history = s.handle_command("history", &[]).await;
        assert!(history.reply.unwrap().starts_with("Conversation history: 4 messages"));

        let listing = s.handle_command("skills", &[]).await.reply.unwrap();
        assert!(listing.contains("/deck\n  Build slide decks"));
        assert!(!listing.contains("/secret"));

        s.handle_command("clear", &[]).await;
        assert_eq!(s.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_handle_input_falls_back_to_message() {
        let s = session(Scripted::new(vec![Ok(LLMResponse::text("path reply"))]));
        assert_eq!(s.handle_input("/usr/bin is a path").await, "path reply");
        assert_eq!(s.handle_input("/clear").await, "Conversation cleared.");
    }

    #[tokio::test]
    async fn test_activate_skill_at_startup() {
        let s = session(Scripted::new(vec![]));
        assert!(!s.activate_skill("missing").await);
        assert!(s.activate_skill("deck").await);
        assert_eq!(s.active_skill().await.as_deref(), Some("deck"));
    }

    #[tokio::test]
    async fn test_summarize_and_destroy_remembers() {
        let memory = Arc::new(InMemoryStore::new());
        let provider = Scripted::new(vec![
            Ok(LLMResponse::text("hi there")),
            Ok(LLMResponse::text("Owner greeted the assistant.")),
        ]);
        let s = session(provider).with_memory(Arc::clone(&memory) as Arc<dyn MemoryStore>);

        assert_eq!(s.summarize_and_destroy().await, DestroyOutcome::Empty);
        s.handle_message("hello").await;
        assert_eq!(s.summarize_and_destroy().await, DestroyOutcome::Remembered);
        assert_eq!(s.history_len().await, 0);

        let entries = memory.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Owner greeted the assistant.");
        assert_eq!(entries[0].speaker, "cli:alice");
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_digest() {
        let memory = Arc::new(InMemoryStore::new());
        let provider = Scripted::new(vec![
            Ok(LLMResponse::text("sure")),
            Err(ClawError::Provider("overloaded".into())),
        ]);
        let s = session(provider).with_memory(Arc::clone(&memory) as Arc<dyn MemoryStore>);
        s.handle_message("remember the budget is 5k").await;
        assert_eq!(s.summarize_and_destroy().await, DestroyOutcome::Remembered);
        assert_eq!(
            memory.entries()[0].text,
            "Owner: remember the budget is 5k\nAssistant: sure"
        );
    }

    #[test]
    fn test_digest_keeps_latest_messages() {
        let msgs: Vec<Message> = (0..30).map(|i| Message::user(&format!("m{}", i))).collect();
        let digest = conversation_digest(&msgs);
        assert_eq!(digest.lines().count(), DIGEST_MESSAGES);
        assert!(digest.starts_with("Owner: m10"));
    }
}
