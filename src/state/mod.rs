//! State management module
//!
//! This module handles all application state, including:
//! - Shared data structures (data.rs)
//! - The in-memory editing timeline (edit.rs)
//! - The persisted, bounded history gallery (history.rs)

pub mod data;
pub mod edit;
pub mod history;
