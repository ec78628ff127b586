use thiserror::Error;

use crate::filter::span::{PassStats, Span, SpanContext, SpanTask, SplitPolicy};

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// Input and output sizes do not match.
    #[error("source ({0}) and destination ({1}) slices must have the same length")]
    SizeMismatch(usize, usize),
}

/// Controls how filter passes are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Split the work across the global Rayon thread pool.
    #[default]
    Global,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small images, debugging, or as the reference for the
    /// parallel strategies.
    Serial,

    /// Split the work across a dedicated thread pool with `n` threads.
    ///
    /// The pool is created once per filter run and reused by every pass.
    Fixed(usize),
}

/// The worker pool executing the span tasks of a pass.
pub struct WorkerPool {
    strategy: ExecutionStrategy,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("strategy", &self.strategy)
            .field("num_workers", &self.num_workers())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with exactly `num_threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ParallelError::InvalidThreadCount`] if `num_threads` is zero and
    /// [`ParallelError::BuildError`] if the host refuses to spawn the threads.
    pub fn new(num_threads: usize) -> Result<Self, ParallelError> {
        Self::with_strategy(ExecutionStrategy::Fixed(num_threads))
    }

    /// Create the pool backing the given strategy.
    ///
    /// Only [`ExecutionStrategy::Fixed`] spawns threads.
    pub fn with_strategy(strategy: ExecutionStrategy) -> Result<Self, ParallelError> {
        let pool = match strategy {
            ExecutionStrategy::Global | ExecutionStrategy::Serial => None,
            ExecutionStrategy::Fixed(n) => {
                if n == 0 {
                    return Err(ParallelError::InvalidThreadCount(n));
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("forkblur-worker-{i}"))
                    .build()
                    .map_err(|e| ParallelError::BuildError(e.to_string()))?;
                log::debug!("built worker pool with {n} threads");
                Some(pool)
            }
        };

        Ok(Self { strategy, pool })
    }

    /// The strategy the pool was created with.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// The number of threads running span tasks.
    pub fn num_workers(&self) -> usize {
        match (&self.pool, self.strategy) {
            (Some(pool), _) => pool.current_num_threads(),
            (None, ExecutionStrategy::Serial) => 1,
            (None, _) => rayon::current_num_threads(),
        }
    }

    /// Run `leaf` over a span partition of `dst` and wait for quiescence.
    ///
    /// The root span covers the whole buffer and is split following `policy`.
    /// The call blocks until every task of the tree has completed, so all writes
    /// into `dst` are visible to the caller once it returns.
    ///
    /// # Arguments
    ///
    /// * `dst` - The buffer partitioned across the tasks.
    /// * `policy` - The split policy.
    /// * `leaf` - The sequential work for a span and its destination slice.
    pub fn for_each_span<T, F>(&self, dst: &mut [T], policy: SplitPolicy, leaf: F) -> PassStats
    where
        T: Send,
        F: Fn(Span, &mut [T]) + Sync,
    {
        if self.strategy == ExecutionStrategy::Serial {
            leaf(Span::new(0, dst.len()), dst);
            return PassStats {
                leaves: 1,
                max_depth: 0,
            };
        }

        let ctx = SpanContext::new(policy, self.num_workers());
        let root = SpanTask::root(dst);
        let stats = match &self.pool {
            Some(pool) => pool.install(|| root.run(&ctx, &leaf)),
            None => root.run(&ctx, &leaf),
        };

        debug_assert_eq!(ctx.queued(), 0, "pool not quiescent after the pass");
        stats
    }
}
