//! Skills - named prompt templates that narrow or widen the agent's tools.
//!
//! A [`Skill`] carries a template, an optional turn budget and an optional
//! [`ToolPolicy`]. Activating one produces a [`SkillActivationSignal`]
//! (see [`activation`]), which the runner folds into the transcript.

pub mod activation;
mod registry;
mod types;

pub use activation::{
    build, latest_tagged_skill, parse, render_template, skill_marker, tagged_skill_name, upsert,
    SkillActivationSignal,
};
pub use registry::SkillRegistry;
pub use types::{Skill, SkillInvocation, ToolPolicy};
