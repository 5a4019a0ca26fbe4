//! The turn loop.
//!
//! A [`ConversationRunner`] drives one run: request a model turn, execute
//! the requested tools in order, feed the results back, and repeat until
//! the model answers without tool calls or the turn budget is spent.
//! Tool failures never abort a run; only model failures do.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CompactionConfig;
use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
use crate::session::{Message, ToolCall};
use crate::skills::{self, tagged_skill_name, ToolPolicy};
use crate::tools::{ToolContext, ToolExecutor, ToolFilter, ToolResult, SKILL_TOOL_NAME};

use super::compaction::ContextCompressor;
use super::tokens::TokenEstimator;

/// Response returned when the turn budget runs out.
pub const MAX_TURNS_SENTINEL: &str = "[max turns reached, please continue the conversation]";

/// Consecutive failures after which a tool is dropped for the rest of the run.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Error phrasing of tools that predate structured outcomes.
const LEGACY_FAILURE_PREFIXES: &[&str] = &["error:", "error ", "failed", "exception", "traceback"];

/// Callbacks fired while a run progresses. All methods default to no-ops.
pub trait RunnerObserver: Send + Sync {
    /// Incremental model text (streaming) or the whole text (non-streaming).
    fn on_text(&self, _text: &str) {}
    /// A tool call is about to execute.
    fn on_tool_start(&self, _call: &ToolCall) {}
    /// A tool call finished.
    fn on_tool_end(&self, _result: &ToolResult) {}
}

/// Checked at the top of every iteration; `false` ends the run.
pub type ContinueCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Options of one run.
#[derive(Clone)]
pub struct RunnerOptions {
    /// Turn ceiling (may grow when a skill with its own budget activates)
    pub max_turns: u32,
    /// Compact the transcript when it nears the window
    pub enable_compaction: bool,
    /// Compaction settings
    pub compaction: CompactionConfig,
    /// Skill already active when the run starts
    pub active_skill: Option<String>,
    /// Policy of that skill
    pub tool_policy: Option<ToolPolicy>,
    /// Tools excluded from the catalog from the start
    pub pre_disabled_tools: Vec<String>,
    /// Use the streaming model call
    pub stream: bool,
    /// Model override
    pub model: Option<String>,
    /// Request options
    pub chat_options: ChatOptions,
    /// Cooperative cancellation
    pub should_continue: Option<ContinueCheck>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_turns: 150,
            enable_compaction: true,
            compaction: CompactionConfig::default(),
            active_skill: None,
            tool_policy: None,
            pre_disabled_tools: Vec::new(),
            stream: false,
            model: None,
            chat_options: ChatOptions::default(),
            should_continue: None,
        }
    }
}

impl RunnerOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the turn ceiling.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Enable or disable compaction.
    pub fn with_compaction(mut self, enabled: bool) -> Self {
        self.enable_compaction = enabled;
        self
    }

    /// Use a specific compaction config.
    pub fn with_compaction_config(mut self, config: CompactionConfig) -> Self {
        self.compaction = config;
        self
    }

    /// Start with a skill already active.
    pub fn with_active_skill(mut self, name: &str, policy: Option<ToolPolicy>) -> Self {
        self.active_skill = Some(name.to_string());
        self.tool_policy = policy;
        self
    }

    /// Exclude tools from the catalog for the whole run.
    pub fn with_disabled_tools(mut self, names: &[&str]) -> Self {
        self.pre_disabled_tools = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Stream model text to the observer.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set the cooperative cancellation check.
    pub fn with_should_continue(mut self, check: ContinueCheck) -> Self {
        self.should_continue = Some(check);
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final model text or [`MAX_TURNS_SENTINEL`]
    pub response: String,
    /// The whole transcript after the run (compaction applied)
    pub messages: Vec<Message>,
    /// Messages appended during the run, final answer excluded
    pub new_messages: Vec<Message>,
    /// Model turns taken
    pub turns: u32,
    /// Skill active when the run ended
    pub active_skill: Option<String>,
    /// Policy active when the run ended
    pub tool_policy: Option<ToolPolicy>,
    /// Whether the run ended through `should_continue`
    pub stopped: bool,
}

impl RunOutcome {
    /// Returns `true` if the run ran out of turns.
    pub fn hit_turn_limit(&self) -> bool {
        self.response == MAX_TURNS_SENTINEL
    }
}

/// Mutable state of one run.
struct RunState {
    max_turns: u32,
    active_skill: Option<String>,
    policy: Option<ToolPolicy>,
    failures: HashMap<String, u32>,
    disabled: HashSet<String>,
    new_messages: Vec<Message>,
    overflow_recovered: bool,
}

impl RunState {
    fn filter(&self) -> ToolFilter {
        ToolFilter::from_policy(self.policy.as_ref()).deny_also(self.disabled.iter())
    }

    fn push(&mut self, messages: &mut Vec<Message>, msg: Message) {
        messages.push(msg.clone());
        self.new_messages.push(msg);
    }

    /// Count a result toward the per-tool circuit breaker.
    fn track(&mut self, result: &ToolResult) {
        if result.is_blocked() {
            if self.disabled.insert(result.name.clone()) {
                warn!(tool = %result.name, "Tool blocked by policy, removed for this run");
            }
            return;
        }
        if !is_failure(result) {
            self.failures.remove(&result.name);
            return;
        }
        let count = self.failures.entry(result.name.clone()).or_insert(0);
        *count += 1;
        if *count >= FAILURE_THRESHOLD && self.disabled.insert(result.name.clone()) {
            warn!(
                tool = %result.name,
                failures = *count,
                "Tool failed repeatedly, removed for this run"
            );
        }
    }
}

/// Returns `true` if a tool result counts as a failure.
pub fn is_failure(result: &ToolResult) -> bool {
    if !result.ok || result.error_code.is_some() {
        return true;
    }
    let head = result.content.trim_start().to_lowercase();
    LEGACY_FAILURE_PREFIXES.iter().any(|p| head.starts_with(p))
}

/// Drives the request → inspect → act loop of one run.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use skillclaw::agent::{ConversationRunner, RunnerOptions};
/// use skillclaw::error::Result;
/// use skillclaw::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
/// use skillclaw::session::Message;
/// use skillclaw::tools::ToolRegistry;
///
/// struct Hello;
///
/// #[async_trait]
/// impl LLMProvider for Hello {
///     async fn chat(&self, _: Vec<Message>, _: Vec<ToolDefinition>, _: Option<&str>, _: ChatOptions)
///         -> Result<LLMResponse> {
///         Ok(LLMResponse::text("hello"))
///     }
///     fn default_model(&self) -> &str { "m" }
///     fn name(&self) -> &str { "hello" }
/// }
///
/// # tokio_test::block_on(async {
/// let runner = ConversationRunner::new(Arc::new(Hello), Arc::new(ToolRegistry::new()), RunnerOptions::new());
/// let outcome = runner.run(vec![Message::user("hi")]).await.unwrap();
/// assert_eq!(outcome.response, "hello");
/// assert_eq!(outcome.turns, 1);
/// # });
/// ```
pub struct ConversationRunner {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    compressor: ContextCompressor,
    options: RunnerOptions,
    context: ToolContext,
    observer: Option<Arc<dyn RunnerObserver>>,
}

impl ConversationRunner {
    /// Create a runner.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<dyn ToolExecutor>,
        options: RunnerOptions,
    ) -> Self {
        let compressor = ContextCompressor::new(options.compaction.clone());
        Self {
            provider,
            tools,
            compressor,
            options,
            context: ToolContext::new(),
            observer: None,
        }
    }

    /// Context handed to every tool call.
    pub fn with_context(mut self, context: ToolContext) -> Self {
        self.context = context;
        self
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunnerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run until a final answer, the turn ceiling, or cancellation.
    ///
    /// # Errors
    /// Returns the model error if a request fails, except for one context
    /// overflow, which is answered by shrinking the transcript and a retry.
    pub async fn run(&self, mut messages: Vec<Message>) -> Result<RunOutcome> {
        let mut state = RunState {
            max_turns: self.options.max_turns,
            active_skill: self.options.active_skill.clone(),
            policy: self.options.tool_policy.clone(),
            failures: HashMap::new(),
            disabled: self.options.pre_disabled_tools.iter().cloned().collect(),
            new_messages: Vec::new(),
            overflow_recovered: false,
        };
        let mut turns = 0u32;
        let mut stopped = false;

        while turns < state.max_turns {
            if let Some(check) = &self.options.should_continue {
                if !check() {
                    info!(turns, "Run stopped by caller");
                    stopped = true;
                    break;
                }
            }
            turns += 1;

            if self.options.enable_compaction && self.compressor.needs_compaction(&messages) {
                let usage = self.compressor.usage(&messages);
                info!(percent = usage.percent, used = usage.used_tokens, "Context near limit, compacting");
                messages = self.compressor.compact(std::mem::take(&mut messages));
            }

            let catalog = self.tools.catalog(&state.filter());
            let catalog_tokens = TokenEstimator::estimate_tool_catalog(&catalog);
            let budget = self.compressor.message_budget(catalog_tokens);
            messages = self.compressor.fit_to_budget(std::mem::take(&mut messages), budget);
            debug!(
                turn = turns,
                max_turns = state.max_turns,
                tools = catalog.len(),
                catalog_tokens,
                budget,
                "Requesting model turn"
            );

            let response = match self.request(&messages, catalog.clone()).await {
                Ok(r) => r,
                Err(e) if e.is_context_overflow() && !state.overflow_recovered => {
                    warn!(error = %e, "Prompt too large, shrinking transcript and retrying once");
                    state.overflow_recovered = true;
                    messages = self.compressor.shrink_for_overflow(std::mem::take(&mut messages));
                    messages = self.compressor.fit_to_budget(std::mem::take(&mut messages), budget);
                    self.request(&messages, catalog).await?
                }
                Err(e) => return Err(e),
            };

            if !response.has_tool_calls() {
                let text = response.content;
                messages.push(Message::assistant(&text));
                return Ok(self.finish(text, messages, state, turns, false));
            }

            let calls: Vec<ToolCall> = response.tool_calls.iter().map(ToolCall::from).collect();
            state.push(
                &mut messages,
                Message::assistant_with_tools(&response.content, calls.clone()),
            );

            for call in &calls {
                let result = self.execute(call, &mut messages, &mut state, turns).await;
                state.push(&mut messages, result.to_message());
            }
        }

        if !stopped {
            warn!(max_turns = state.max_turns, "Reached maximum turns");
        }
        Ok(self.finish(MAX_TURNS_SENTINEL.to_string(), messages, state, turns, stopped))
    }

    async fn request(&self, messages: &[Message], tools: Vec<ToolDefinition>) -> Result<LLMResponse> {
        let model = self.options.model.as_deref();
        let options = self.options.chat_options.clone();
        if self.options.stream {
            let observer = self.observer.clone();
            let sink = move |text: &str| {
                if let Some(o) = &observer {
                    o.on_text(text);
                }
            };
            self.provider
                .chat_stream(messages.to_vec(), tools, model, options, &sink)
                .await
        } else {
            let response = self.provider.chat(messages.to_vec(), tools, model, options).await?;
            if let (Some(o), false) = (&self.observer, response.content.is_empty()) {
                o.on_text(&response.content);
            }
            Ok(response)
        }
    }

    /// Execute one call, folding a skill activation into the transcript.
    async fn execute(
        &self,
        call: &ToolCall,
        messages: &mut Vec<Message>,
        state: &mut RunState,
        turns: u32,
    ) -> ToolResult {
        if let Some(o) = &self.observer {
            o.on_tool_start(call);
        }

        // Recomputed per call so an activation earlier in the same turn applies.
        let filter = state.filter();
        let mut ctx = self.context.clone();
        ctx.active_skill = state.active_skill.clone();

        let mut result = self.tools.invoke(call, messages, &filter, &ctx).await;

        if call.name == SKILL_TOOL_NAME && result.ok {
            if let Some(signal) = skills::parse(&result.content) {
                let tagged = skills::upsert(messages, &signal);
                state
                    .new_messages
                    .retain(|m| tagged_skill_name(m) != Some(signal.skill_name.as_str()));
                state.new_messages.push(tagged);

                state.active_skill = Some(signal.skill_name.clone());
                state.policy = signal.tool_policy.clone();
                if let Some(extra) = signal.max_turns.filter(|n| *n > 0) {
                    state.max_turns = state.max_turns.max(turns + extra);
                }
                info!(
                    skill = %signal.skill_name,
                    max_turns = state.max_turns,
                    restricted = state.policy.is_some(),
                    "Skill activated"
                );
                result.content = format!("Skill \"{}\" activated", signal.skill_name);
            }
        }

        state.track(&result);
        if let Some(o) = &self.observer {
            o.on_tool_end(&result);
        }
        result
    }

    fn finish(
        &self,
        response: String,
        messages: Vec<Message>,
        state: RunState,
        turns: u32,
        stopped: bool,
    ) -> RunOutcome {
        debug!(turns, new_messages = state.new_messages.len(), "Run finished");
        RunOutcome {
            response,
            messages,
            new_messages: state.new_messages,
            turns,
            active_skill: state.active_skill,
            tool_policy: state.policy,
            stopped,
        }
    }
}
