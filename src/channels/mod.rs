//! Channels module - owner-facing notification and delivery
//!
//! Chat-platform adapters live outside this crate. The runtime only needs
//! to push short notices and finished files to the owner of a conversation,
//! which it does through the [`OwnerChannel`] trait.

mod types;

pub use types::{file_name_of, OwnerChannel};
