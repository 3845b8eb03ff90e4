//! Deterministic, pure logic shared by the agent commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod age;
pub mod instructions;
pub mod lifecycle;
pub mod models;
pub mod naming;
pub mod output;
pub mod persona;
pub mod types;
