//! Detached coding-agent runs with durable, supervisor-free lifecycle tracking.
//!
//! Each run gets its own directory, isolated home and (optionally) git
//! worktree, and an agent process that nothing waits on. Its state is
//! re-derived on demand from files and process liveness. The crate keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (state decisions, output parsing,
//!   naming, model table). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, locks, git, signals,
//!   process spawning). Behind traits where tests need fakes.
//!
//! Orchestration modules ([`launch`], [`status`], [`kill`], [`clean`], [`ps`],
//! [`inspect`]) coordinate core logic with I/O to implement CLI commands.

pub mod clean;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod inspect;
pub mod io;
pub mod kill;
pub mod launch;
pub mod logging;
pub mod ps;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
