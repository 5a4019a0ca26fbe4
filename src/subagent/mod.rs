//! Background sub-agents.
//!
//! A conversation can hand a long task to a detached sub-agent and keep
//! talking to its owner. Each sub-agent runs its own [`ConversationRunner`]
//! with one skill active and reports back through the owner's
//! [`OwnerChannel`]:
//!
//! ```text
//! spawn ──> running ──┬──> completed ──> notice + deliverables
//!              ▲      ├──> failed    ──> notice
//!              │      ├──> stopped        (silent)
//!       resume │      │
//!              └── waiting_for_input <── ask_user_question
//! ```
//!
//! Finished records stay queryable for `retention_secs`, then expire.
//!
//! [`ConversationRunner`]: crate::agent::ConversationRunner
//! [`OwnerChannel`]: crate::channels::OwnerChannel

mod manager;
pub mod retry;
mod session;

pub use manager::{ResumeOutcome, SpawnError, StopOutcome, SubAgentManager, TaskAccessError};
pub use session::{
    SubAgentDeps, SubAgentInfo, SubAgentSession, SubAgentStatus, STOPPED_ANSWER, SUBAGENT_TOOLS,
};
