//! OS resource limits for the sandbox child
//!
//! Applied between fork and exec, so they bind the interpreter and anything
//! it might start.

use crate::budget::ResourceBudget;

/// Limits applied to one child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildLimits {
    /// CPU seconds (`RLIMIT_CPU`)
    pub cpu_secs: u64,
    /// Address space in bytes (`RLIMIT_AS`)
    pub memory_bytes: u64,
    /// Open file descriptors (`RLIMIT_NOFILE`)
    pub open_files: u64,
    /// Processes for the user (`RLIMIT_NPROC`)
    pub processes: u64,
}

impl ChildLimits {
    /// Limits for a budget
    #[must_use]
    pub fn for_budget(budget: &ResourceBudget, open_files: u64, processes: u64) -> Self {
        Self {
            cpu_secs: budget.cpu_limit_secs(),
            memory_bytes: budget.memory_bytes,
            open_files,
            processes,
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn set_limit(resource: libc::c_int, value: u64) -> std::io::Result<()> {
    #[allow(clippy::useless_conversion)]
    let value = libc::rlim_t::try_from(value).unwrap_or(libc::RLIM_INFINITY);
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    // SAFETY: setrlimit only reads the struct we pass and is async-signal-safe.
    let rc = unsafe { libc::setrlimit(resource as _, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Apply limits to the calling process
///
/// Meant for a `pre_exec` hook: allocation-free, no locks.
///
/// # Errors
/// Returns the OS error if any `setrlimit` call fails.
#[cfg(unix)]
pub fn apply_rlimits(limits: &ChildLimits) -> std::io::Result<()> {
    set_limit(libc::RLIMIT_CPU as _, limits.cpu_secs)?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    set_limit(libc::RLIMIT_AS as _, limits.memory_bytes)?;

    set_limit(libc::RLIMIT_NOFILE as _, limits.open_files)?;

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
    set_limit(libc::RLIMIT_NPROC as _, limits.processes)?;

    set_limit(libc::RLIMIT_CORE as _, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backstop_follows_budget() {
        let budget = ResourceBudget::new()
            .with_timeout_secs(4)
            .with_memory_bytes(1 << 28);
        let limits = ChildLimits::for_budget(&budget, 64, 32);
        assert_eq!(limits.cpu_secs, 5);
        assert_eq!(limits.memory_bytes, 1 << 28);
        assert_eq!(limits.open_files, 64);
        assert_eq!(limits.processes, 32);
    }
}
