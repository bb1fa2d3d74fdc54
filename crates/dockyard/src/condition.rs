//! Run-if predicates for skipping tests
//!
//! Tests that need an engine can bail out early when none is configured:
//!
//! ```no_run
//! use dockyard::{skip_unless, DockerAvailable};
//!
//! fn test_needs_docker() {
//!     skip_unless!(DockerAvailable);
//!     // ...
//! }
//! ```

use dockyard_engine::EngineConfig;
use tracing::info;

/// Predicate deciding whether a test should run
pub trait Condition {
    /// Check if the condition holds
    fn holds(&self) -> bool;
}

impl<F> Condition for F
where
    F: Fn() -> bool,
{
    fn holds(&self) -> bool {
        self()
    }
}

/// Holds when an engine connection is configured in the environment
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerAvailable;

impl Condition for DockerAvailable {
    fn holds(&self) -> bool {
        match EngineConfig::from_env() {
            Ok(_) => true,
            Err(e) => {
                info!("Docker is not available: {}", e);
                false
            }
        }
    }
}

/// Holds when an environment variable is set to a non-empty value
#[derive(Debug, Clone, Copy)]
pub struct EnvVar(pub &'static str);

impl Condition for EnvVar {
    fn holds(&self) -> bool {
        std::env::var(self.0).is_ok_and(|v| !v.trim().is_empty())
    }
}

/// Evaluate `condition`, logging when the test is skipped
pub fn should_run<C: Condition + ?Sized>(condition: &C) -> bool {
    let holds = condition.holds();
    if !holds {
        info!("Skipping test: run condition {} does not hold", std::any::type_name::<C>());
    }
    holds
}

/// Return early from the enclosing test unless `condition` holds.
///
/// The second form returns the given value, for tests returning `Result`.
#[macro_export]
macro_rules! skip_unless {
    ($condition:expr) => {
        if !$crate::condition::should_run(&$condition) {
            return;
        }
    };
    ($condition:expr, $ret:expr) => {
        if !$crate::condition::should_run(&$condition) {
            return $ret;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl Condition for Never {
        fn holds(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_closure_condition() {
        assert!(should_run(&|| true));
        assert!(!should_run(&|| false));
    }

    #[test]
    fn test_custom_condition() {
        assert!(!should_run(&Never));
        let boxed: Box<dyn Condition> = Box::new(|| true);
        assert!(should_run(boxed.as_ref()));
    }

    #[test]
    fn test_env_var_condition() {
        assert!(EnvVar("PATH").holds());
        assert!(!EnvVar("DOCKYARD_TEST_SURELY_UNSET_VARIABLE").holds());
    }

    fn guarded(run: bool) -> u32 {
        skip_unless!(move || run, 0);
        1
    }

    #[test]
    fn test_skip_unless_returns_early() {
        assert_eq!(guarded(true), 1);
        assert_eq!(guarded(false), 0);
    }

    #[test]
    fn test_skip_unless_unit() {
        let mut reached = false;
        (|| {
            skip_unless!(Never);
            reached = true;
        })();
        assert!(!reached);
    }
}
