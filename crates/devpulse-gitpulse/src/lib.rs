//! Commit and review data sources.
//!
//! - [`github`]: GitHub REST commits and pull request reviews via octocrab
//! - [`mining`]: local clone history via git2
//! - [`seed`]: JSON seed files and offline demo data

pub mod github;
pub mod mining;
pub mod seed;
