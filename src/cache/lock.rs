use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock the orchestrator state, recovering the guard if another task
/// panicked while holding it.
///
/// Every critical section in the cache is a handful of map operations with
/// no `.await`, so a poisoned lock still guards a consistent map pair; the
/// worst case is an entry that was about to be written and was not.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "a producer or caller panicked while the cache state was locked",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn recovers_guard_after_panic() {
        let lock = Mutex::new(vec![1_u32]);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock.lock().expect("lock should be acquired");
            guard.push(2);
            panic!("poison the lock");
        }));

        assert!(lock.is_poisoned());
        let guard = mutex_lock(&lock, "cache::lock::tests", "recover");
        assert_eq!(*guard, vec![1, 2]);
    }
}
