//! Commit churn analysis and forecasting.
//!
//! Pure transformations over commit records: per-author churn totals,
//! risk flags for oversized commits, weekly churn history, and a naive
//! least-squares trend forecast for the next week.

pub mod churn;
pub mod forecast;
pub mod history;
