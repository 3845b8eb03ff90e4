//! I/O helpers for agent commands.

pub mod config;
pub mod git;
pub mod isolation;
pub mod launcher;
pub mod paths;
pub mod personas;
pub mod process;
pub mod signals;
pub mod store;
