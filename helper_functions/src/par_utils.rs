use core::num::NonZeroUsize;

use anyhow::Result;
use once_cell::sync::Lazy;
use rayon::{
    iter::{IntoParallelRefIterator as _, ParallelIterator as _},
    ThreadPool, ThreadPoolBuilder,
};

static GLOBAL_VERIFICATION_POOL: Lazy<VerificationPool> = Lazy::new(|| {
    VerificationPool::new(VerificationPool::default_thread_count())
        .expect("building a thread pool with a nonzero thread count only fails on OS errors")
});

/// Thread pool dedicated to signature verification.
///
/// The global pool has one thread fewer than the available parallelism, but at least one.
pub struct VerificationPool {
    pool: ThreadPool,
}

impl core::fmt::Debug for VerificationPool {
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        formatter
            .debug_struct("VerificationPool")
            .field("thread_count", &self.thread_count())
            .finish()
    }
}

impl VerificationPool {
    pub fn new(thread_count: NonZeroUsize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count.get())
            .thread_name(|index| format!("verifier-{index}"))
            .build()?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_VERIFICATION_POOL
    }

    #[must_use]
    pub fn default_thread_count() -> NonZeroUsize {
        let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        NonZeroUsize::new(available.saturating_sub(1)).unwrap_or(NonZeroUsize::MIN)
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `check` on every item in the pool.
    ///
    /// Stops scheduling new items after the first failure and returns it.
    pub fn try_for_each<T: Sync, E: Send>(
        &self,
        items: &[T],
        check: impl Fn(&T) -> Result<(), E> + Sync + Send,
    ) -> Result<(), E> {
        self.pool.install(|| items.par_iter().try_for_each(&check))
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use nonzero_ext::nonzero;

    use super::*;

    #[test]
    fn default_thread_count_leaves_a_core_free() {
        let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let expected = available.saturating_sub(1).max(1);

        assert_eq!(VerificationPool::default_thread_count().get(), expected);
    }

    #[test]
    fn try_for_each_visits_every_item_on_success() -> Result<()> {
        let pool = VerificationPool::new(nonzero!(2_usize))?;
        let visited = AtomicUsize::new(0);
        let items = (0..100).collect::<Vec<u32>>();

        pool.try_for_each(&items, |_| {
            visited.fetch_add(1, Ordering::Relaxed);
            Ok::<_, ()>(())
        })
        .map_err(|()| anyhow::anyhow!("no item fails"))?;

        assert_eq!(visited.into_inner(), items.len());
        assert_eq!(pool.thread_count(), 2);

        Ok(())
    }

    #[test]
    fn try_for_each_reports_a_failure() {
        let items = (0..64).collect::<Vec<u32>>();

        let result = VerificationPool::global().try_for_each(&items, |item| {
            if *item == 40 {
                Err(*item)
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err(40));
    }
}
