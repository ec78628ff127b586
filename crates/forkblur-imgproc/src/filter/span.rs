use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A half-open range `[start, start + length)` of flat indices into a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// The first index of the span.
    pub start: usize,
    /// The number of indices in the span.
    pub length: usize,
}

impl Span {
    /// Create a new span.
    pub const fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// One past the last index of the span.
    pub const fn end(&self) -> usize {
        self.start + self.length
    }

    /// Check if the span covers no index.
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The span as an index range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Split the span at its midpoint.
    ///
    /// The left half gets `length / 2` indices and the right half the rest.
    pub const fn split_half(&self) -> (Span, Span) {
        let half = self.length / 2;
        (
            Span::new(self.start, half),
            Span::new(self.start + half, self.length - half),
        )
    }
}

/// Controls when a span task stops splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPolicy {
    /// Spans at or below this length are processed sequentially.
    pub threshold: usize,
    /// Spans stop splitting once the queued backlog exceeds this count.
    pub max_surplus: usize,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            threshold: 100_000,
            max_surplus: 3,
        }
    }
}

impl SplitPolicy {
    /// Set the sequential threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum backlog under which spans still split.
    pub fn with_max_surplus(mut self, max_surplus: usize) -> Self {
        self.max_surplus = max_surplus;
        self
    }

    /// Decide whether a span of `length` should be split given the current backlog.
    ///
    /// Spans shorter than two are never split so both halves are non-empty.
    pub fn should_split(&self, length: usize, surplus: usize) -> bool {
        length > self.threshold && length >= 2 && surplus <= self.max_surplus
    }
}

/// Statistics about the task tree of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    /// Number of spans processed sequentially.
    pub leaves: usize,
    /// Depth of the deepest leaf, the root being at depth 0.
    pub max_depth: usize,
}

impl PassStats {
    fn leaf(depth: usize) -> Self {
        Self {
            leaves: 1,
            max_depth: depth,
        }
    }

    fn merge(self, other: PassStats) -> Self {
        Self {
            leaves: self.leaves + other.leaves,
            max_depth: self.max_depth.max(other.max_depth),
        }
    }
}

/// Shared state of the task tree of one pass.
///
/// Tracks the number of forked tasks that no worker has started yet. The
/// backlog beyond one task per worker is the surplus consulted before splitting.
#[derive(Debug)]
pub struct SpanContext {
    policy: SplitPolicy,
    workers: usize,
    queued: AtomicUsize,
}

impl SpanContext {
    /// Create the context for a pass running on `workers` threads.
    pub fn new(policy: SplitPolicy, workers: usize) -> Self {
        Self {
            policy,
            workers,
            queued: AtomicUsize::new(0),
        }
    }

    /// The split policy of the pass.
    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    /// Number of forked tasks not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Estimate of queued tasks beyond what the workers can absorb.
    pub fn surplus(&self) -> usize {
        self.queued().saturating_sub(self.workers)
    }
}

/// A unit of work over a span and the slice of the destination it owns.
///
/// Sibling tasks own disjoint sub-slices of the destination, so they run in
/// parallel without any synchronization on the pixel writes.
pub struct SpanTask<'a, T> {
    span: Span,
    dst: &'a mut [T],
}

impl<'a, T: Send> SpanTask<'a, T> {
    /// Create the root task covering the whole destination buffer.
    pub fn root(dst: &'a mut [T]) -> Self {
        Self {
            span: Span::new(0, dst.len()),
            dst,
        }
    }

    /// The span covered by the task.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Run the task to completion.
    ///
    /// Either calls `leaf` on the whole span or splits it at the midpoint and
    /// runs both halves through the current rayon pool. Returns once every
    /// descendant task has finished.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The shared context of the pass.
    /// * `leaf` - The sequential work for a span and its destination slice.
    pub fn run<F>(self, ctx: &SpanContext, leaf: &F) -> PassStats
    where
        F: Fn(Span, &mut [T]) + Sync,
    {
        self.run_at(ctx, leaf, 0)
    }

    fn run_at<F>(self, ctx: &SpanContext, leaf: &F, depth: usize) -> PassStats
    where
        F: Fn(Span, &mut [T]) + Sync,
    {
        if !ctx.policy.should_split(self.span.length, ctx.surplus()) {
            leaf(self.span, self.dst);
            return PassStats::leaf(depth);
        }

        let (left_span, right_span) = self.span.split_half();
        let (left_dst, right_dst) = self.dst.split_at_mut(left_span.length);

        let left = SpanTask {
            span: left_span,
            dst: left_dst,
        };
        let right = SpanTask {
            span: right_span,
            dst: right_dst,
        };

        // the right half waits in the deque until a worker picks it up
        ctx.queued.fetch_add(1, Ordering::Relaxed);
        let (left_stats, right_stats) = rayon::join(
            || left.run_at(ctx, leaf, depth + 1),
            || {
                ctx.queued.fetch_sub(1, Ordering::Relaxed);
                right.run_at(ctx, leaf, depth + 1)
            },
        );

        left_stats.merge(right_stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn collect_leaves(len: usize, policy: SplitPolicy, workers: usize) -> (Vec<Span>, PassStats) {
        let mut dst = vec![0u8; len];
        let leaves = Mutex::new(Vec::new());
        let ctx = SpanContext::new(policy, workers);

        let stats = SpanTask::root(&mut dst).run(&ctx, &|span, slice: &mut [u8]| {
            assert_eq!(slice.len(), span.length);
            slice.iter_mut().for_each(|v| *v += 1);
            leaves.lock().unwrap().push(span);
        });

        assert_eq!(ctx.queued(), 0);
        assert!(dst.iter().all(|&v| v == 1), "every index written once");

        let mut leaves = leaves.into_inner().unwrap();
        leaves.sort();
        (leaves, stats)
    }

    #[test]
    fn test_split_half() {
        assert_eq!(
            Span::new(10, 7).split_half(),
            (Span::new(10, 3), Span::new(13, 4))
        );
        assert_eq!(Span::new(0, 7).end(), 7);
        assert!(Span::new(3, 0).is_empty());
    }

    #[test]
    fn test_should_split() {
        let policy = SplitPolicy::default();
        assert!(policy.should_split(200_000, 0));
        assert!(policy.should_split(200_000, 3));
        assert!(!policy.should_split(200_000, 4));
        assert!(!policy.should_split(100_000, 0));

        let policy = SplitPolicy::default().with_threshold(0);
        assert!(!policy.should_split(1, 0));
        assert!(policy.should_split(2, 0));
    }

    #[test]
    fn test_leaves_without_backlog_limit() {
        let policy = SplitPolicy::default()
            .with_threshold(100)
            .with_max_surplus(usize::MAX);
        let (leaves, stats) = collect_leaves(800, policy, 4);

        let expected: Vec<Span> = (0..8).map(|i| Span::new(i * 100, 100)).collect();
        assert_eq!(leaves, expected);
        assert_eq!(stats.leaves, 8);
        assert_eq!(stats.max_depth, 3);
    }

    #[test]
    fn test_below_threshold_single_leaf() {
        let (leaves, stats) = collect_leaves(1000, SplitPolicy::default(), 4);
        assert_eq!(leaves, vec![Span::new(0, 1000)]);
        assert_eq!(stats, PassStats::leaf(0));
    }

    #[test]
    fn test_leaves_partition_range() {
        let len = 1_000_003;
        let policy = SplitPolicy::default().with_threshold(1000);
        let (leaves, stats) = collect_leaves(len, policy, 4);

        assert_eq!(stats.leaves, leaves.len());
        let mut next = 0;
        for span in &leaves {
            assert_eq!(span.start, next, "no gap and no overlap");
            assert!(!span.is_empty());
            next = span.end();
        }
        assert_eq!(next, len);
    }

    #[test]
    fn test_backlog_stops_splitting() {
        let len = 65_536;
        let policy = SplitPolicy::default()
            .with_threshold(1)
            .with_max_surplus(0);

        // a single worker never steals, so the backlog only grows
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let (leaves, stats) = pool.install(|| collect_leaves(len, policy, 1));

        assert_eq!(stats.leaves, leaves.len());
        assert!(
            stats.leaves < len / 100,
            "backlog did not limit splitting: {} leaves",
            stats.leaves
        );
        assert!(leaves.iter().any(|span| span.length > 1));

        let mut next = 0;
        for span in &leaves {
            assert_eq!(span.start, next, "no gap and no overlap");
            next = span.end();
        }
        assert_eq!(next, len);
    }

    #[test]
    fn test_empty_buffer() {
        let (leaves, stats) = collect_leaves(0, SplitPolicy::default().with_threshold(0), 1);
        assert_eq!(leaves, vec![Span::new(0, 0)]);
        assert_eq!(stats.leaves, 1);
    }
}
