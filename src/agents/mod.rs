//! Agents shipped with the crate.
//!
//! Each agent exposes a `register` function that installs its factory in an
//! [`AgentRegistry`](crate::AgentRegistry) under its `NAME`.

pub mod console;
pub mod history;
