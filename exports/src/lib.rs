//! Double-fetch protection for code that copies untrusted memory.
//!
//! The host calls [`Engine::on_fetch`] after every copy from user memory and
//! [`Engine::clear`] when the syscall that made the copies ends.

pub mod address {
    pub use fetchguard_address::*;
}

pub mod syscalls {
    pub use fetchguard_syscalls::*;
}

pub mod tracker {
    pub use fetchguard_tracker::*;
}

pub mod logging {
    pub use fetchguard_logging::*;
}

pub mod fetchlog {
    pub use fetchguard_fetchlog::*;
}

mod engine;
mod context;
mod observer;
mod profile;

pub use engine::{Engine, SkipReason, Verdict};
pub use context::{ContextState, FetchContext};
pub use observer::FetchObserver;
pub use profile::{read_engine_profile, EngineProfile, ProfileError, PROFILE_ENV_VAR};
pub use fetchguard_address::Address;
pub use fetchguard_syscalls::SyscallNr;
pub use fetchguard_tracker::ContextId;
