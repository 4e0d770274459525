//! Runtime guard prelude
//!
//! Python script staged next to the candidate and run in its place. It
//! installs an audit hook, then runs the candidate (or harness) as
//! `__main__`.

/// Guard script source
pub const GUARD_PRELUDE: &str = include_str!("../assets/guard.py");

/// File name the guard is staged under
pub const GUARD_FILE: &str = "_codegate_guard.py";

/// Exit code the guard uses for `MemoryError`
pub const MEMORY_EXIT_CODE: i32 = 86;

/// Exit code the guard uses for a blocked operation
pub const BLOCKED_EXIT_CODE: i32 = 87;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_agrees_on_exit_codes() {
        assert!(GUARD_PRELUDE.contains(&format!("MEMORY_EXIT = {MEMORY_EXIT_CODE}")));
        assert!(GUARD_PRELUDE.contains(&format!("BLOCKED_EXIT = {BLOCKED_EXIT_CODE}")));
    }

    #[test]
    fn prelude_installs_audit_hook() {
        assert!(GUARD_PRELUDE.contains("sys.addaudithook(_audit)"));
    }

    #[test]
    fn prelude_makes_blocks_sticky() {
        assert!(GUARD_PRELUDE.contains("os._exit = _guarded_exit"));
        assert!(GUARD_PRELUDE.matches("_fail_if_blocked()").count() >= 3);
    }
}
