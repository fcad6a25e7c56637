//! Image rendering for devpulse reports.
//!
//! Produces SVG documents wrapped in [`devpulse_core::RenderedImage`]:
//! - [`chart`]: per-author churn bar chart
//! - [`influence`]: reviewer → author graph built on petgraph, with DOT export

pub mod chart;
pub mod influence;
pub mod svg;
