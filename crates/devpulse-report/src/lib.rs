//! Report orchestration and delivery for devpulse.
//!
//! Provides the staged report pipeline, LLM-backed and offline narration,
//! and Slack delivery.

pub mod llm;
pub mod narrator;
pub mod pipeline;
pub mod prompt;
pub mod slack;
