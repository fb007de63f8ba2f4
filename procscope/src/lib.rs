//! **procscope** is a diagnostic library to inspect running processes: it
//! enumerates them, resolves the identity of the application image behind
//! each one, and dumps loaded modules together with the memory-permission
//! bits of their base page.
//!
//! The platform operations sit behind the [`service::ProcessInfo`] and
//! [`service::ModuleInfo`] traits; the interactive frame logic on top of them
//! ([`state`] and [`report`]) is pure and can be driven by any input source
//! and output sink.
//!
//! ```no_run
//! use procscope::service::{ProcessInfo, ProcessInfoSession};
//!
//! let mut session = ProcessInfoSession::initialize()?;
//! let processes = session.list_processes(64)?;
//! for (slot, pid) in processes.iter().enumerate() {
//!     println!("#{slot}: pid {pid}");
//! }
//! # Ok::<(), procscope::ServiceError>(())
//! ```

pub mod error;
pub mod perm;
pub mod report;
pub mod service;
pub mod state;

pub use error::ServiceError;
pub use perm::MemoryPermission;
