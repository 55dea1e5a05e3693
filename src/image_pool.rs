use crate::breeds::Round;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Image resolution errors. Every one of them is recoverable: the caller
/// substitutes a placeholder and the game carries on.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("network error: {0}")]
    Network(String),

    #[error("image service returned HTTP {0}")]
    Status(u16),

    #[error("no image available for {0}")]
    NotFound(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("image request timed out")]
    Timeout,
}

/// Downscaled RGB raster small enough to paint into a terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 3]>,
}

impl Thumbnail {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// A displayable image, shared cheaply between the pool and the screen
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub key: String,
    pub source: String,
    pub thumbnail: Arc<Thumbnail>,
}

impl ImageHandle {
    pub fn new(key: impl Into<String>, source: impl Into<String>, thumbnail: Thumbnail) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            thumbnail: Arc::new(thumbnail),
        }
    }

    /// A handle whose raster came back empty cannot be shown
    pub fn is_displayable(&self) -> bool {
        !self.thumbnail.is_empty()
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Resolves one image for a breed. Failures are never retried by the caller.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, breed: &str) -> impl Future<Output = Result<ImageHandle, ImageError>> + Send;
}

/// Progress of a bulk population, reported after every settled request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadProgress {
    pub round: Round,
    pub loaded: usize,
    pub total: usize,
}

impl PreloadProgress {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.loaded as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }
}

/// Outcome of [`ImagePool::populate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadReport {
    pub requested: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// How many images to preload for a round and how far apart to dispatch them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreloadSettings {
    pub count: usize,
    pub dispatch_gap_ms: u64,
}

impl PreloadSettings {
    pub fn dispatch_gap(&self) -> Duration {
        Duration::from_millis(self.dispatch_gap_ms)
    }
}

/// Per-round preload sizes; later rounds burn through images faster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreloadPlan {
    pub rounds: [PreloadSettings; 3],
}

impl Default for PreloadPlan {
    fn default() -> Self {
        Self {
            rounds: [
                PreloadSettings {
                    count: 25,
                    dispatch_gap_ms: 100,
                },
                PreloadSettings {
                    count: 50,
                    dispatch_gap_ms: 80,
                },
                PreloadSettings {
                    count: 150,
                    dispatch_gap_ms: 50,
                },
            ],
        }
    }
}

impl PreloadPlan {
    pub fn for_round(&self, round: Round) -> PreloadSettings {
        self.rounds[round.index()]
    }
}

#[derive(Debug, Clone)]
struct PoolEntry {
    handle: ImageHandle,
    breed: String,
}

/// Batch of pre-resolved images for one round, consumed round-robin
#[derive(Debug, Clone, Default)]
pub struct ImagePool {
    entries: Vec<PoolEntry>,
    cursor: usize,
}

impl ImagePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(ImageHandle, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(handle, breed)| PoolEntry { handle, breed })
                .collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn breeds(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.breed.as_str())
    }

    /// Replace the pool with `count` freshly resolved images, cycling through
    /// `breeds`. Requests are dispatched `dispatch_gap` apart and run
    /// concurrently; failed slots are logged, counted as loaded and dropped.
    pub async fn populate<R, F>(
        &mut self,
        resolver: &R,
        round: Round,
        breeds: &[String],
        count: usize,
        dispatch_gap: Duration,
        mut on_progress: F,
    ) -> PreloadReport
    where
        R: ImageResolver,
        F: FnMut(PreloadProgress),
    {
        self.entries.clear();
        self.cursor = 0;

        let mut report = PreloadReport {
            requested: count,
            ..Default::default()
        };
        let mut progress = PreloadProgress {
            round,
            loaded: 0,
            total: count,
        };

        if breeds.is_empty() || count == 0 {
            on_progress(progress);
            return report;
        }

        let mut pending = FuturesUnordered::new();
        let mut dispatched = 0;

        while dispatched < count || !pending.is_empty() {
            if dispatched < count {
                let slot = dispatched;
                let breed = breeds[slot % breeds.len()].clone();
                pending.push(async move {
                    let result = resolver.resolve(&breed).await;
                    (slot, breed, result)
                });
                dispatched += 1;

                if dispatched == count {
                    continue;
                }

                // keep draining completions while waiting for the next dispatch slot
                let gap = tokio::time::sleep(dispatch_gap);
                tokio::pin!(gap);
                loop {
                    tokio::select! {
                        _ = &mut gap => break,
                        Some(done) = pending.next() => {
                            self.settle(done, &mut report, &mut progress, &mut on_progress);
                        }
                    }
                }
            } else if let Some(done) = pending.next().await {
                self.settle(done, &mut report, &mut progress, &mut on_progress);
            }
        }

        info!(
            %round,
            resolved = report.resolved,
            failed = report.failed,
            "image pool populated"
        );
        report
    }

    fn settle<F: FnMut(PreloadProgress)>(
        &mut self,
        (slot, breed, result): (usize, String, Result<ImageHandle, ImageError>),
        report: &mut PreloadReport,
        progress: &mut PreloadProgress,
        on_progress: &mut F,
    ) {
        match result {
            Ok(handle) => {
                report.resolved += 1;
                self.entries.push(PoolEntry { handle, breed });
            }
            Err(err) => {
                report.failed += 1;
                warn!(slot, %breed, error = %err, "failed to preload image");
            }
        }
        progress.loaded += 1;
        on_progress(*progress);
    }

    /// Next displayable image whose breed is in `active_pool`, scanning from
    /// the persistent cursor and wrapping around. The cursor moves past the
    /// returned entry; nothing moves when no entry qualifies.
    pub fn take(&mut self, active_pool: &[String]) -> Option<(ImageHandle, String)> {
        let len = self.entries.len();
        for attempt in 0..len {
            let idx = (self.cursor + attempt) % len;
            let entry = &self.entries[idx];
            if !active_pool.contains(&entry.breed) || !entry.handle.is_displayable() {
                continue;
            }
            self.cursor = (idx + 1) % len;
            debug!(key = %entry.handle.key, breed = %entry.breed, "drew preloaded image");
            return Some((entry.handle.clone(), entry.breed.clone()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tiny(key: &str) -> ImageHandle {
        ImageHandle::new(key, format!("test://{key}"), Thumbnail::new(1, 1, vec![[1, 2, 3]]))
    }

    fn names(breeds: &[&str]) -> Vec<String> {
        breeds.iter().map(|b| b.to_string()).collect()
    }

    /// Fails every breed listed in `failing`, succeeds otherwise
    struct ScriptedResolver {
        failing: HashSet<String>,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|b| b.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ImageResolver for ScriptedResolver {
        async fn resolve(&self, breed: &str) -> Result<ImageHandle, ImageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            if self.failing.contains(breed) {
                Err(ImageError::NotFound(breed.to_string()))
            } else {
                Ok(tiny(&format!("{breed}-{n}")))
            }
        }
    }

    #[test]
    fn take_round_robins_over_matching_entries() {
        let mut pool = ImagePool::from_entries(vec![
            (tiny("a1"), "A".into()),
            (tiny("b1"), "B".into()),
            (tiny("a2"), "A".into()),
            (tiny("c1"), "C".into()),
        ]);
        let active = names(&["A", "C"]);

        let (h, b) = pool.take(&active).unwrap();
        assert_eq!((h.key.as_str(), b.as_str()), ("a1", "A"));
        let (h, _) = pool.take(&active).unwrap();
        assert_eq!(h.key, "a2");
        let (h, b) = pool.take(&active).unwrap();
        assert_eq!((h.key.as_str(), b.as_str()), ("c1", "C"));
        // wraps around to the start
        let (h, _) = pool.take(&active).unwrap();
        assert_eq!(h.key, "a1");
    }

    #[test]
    fn take_never_returns_breeds_outside_the_active_pool() {
        let mut pool = ImagePool::from_entries(vec![
            (tiny("a"), "A".into()),
            (tiny("b"), "B".into()),
        ]);
        for _ in 0..10 {
            let (_, breed) = pool.take(&names(&["B"])).unwrap();
            assert_eq!(breed, "B");
        }
        assert_matches!(pool.take(&names(&["Z"])), None);
    }

    #[test]
    fn two_entry_pool_visits_both_before_repeating() {
        let mut pool = ImagePool::from_entries(vec![
            (tiny("first"), "A".into()),
            (tiny("second"), "B".into()),
        ]);
        let active = names(&["A", "B"]);
        let first = pool.take(&active).unwrap().0.key;
        let second = pool.take(&active).unwrap().0.key;
        assert_ne!(first, second);
    }

    #[test]
    fn take_skips_undisplayable_handles() {
        let blank = ImageHandle::new("blank", "test://blank", Thumbnail::new(0, 0, vec![]));
        let mut pool = ImagePool::from_entries(vec![(blank, "A".into()), (tiny("ok"), "A".into())]);
        assert_eq!(pool.take(&names(&["A"])).unwrap().0.key, "ok");
        assert_eq!(pool.take(&names(&["A"])).unwrap().0.key, "ok");
    }

    #[test]
    fn take_on_empty_pool_is_none() {
        let mut pool = ImagePool::new();
        assert!(pool.take(&names(&["A"])).is_none());
        assert_eq!(pool.cursor(), 0);
    }

    #[tokio::test]
    async fn populate_cycles_breeds_and_reports_progress() {
        let resolver = ScriptedResolver::new(&[]);
        let breeds = names(&["A", "B", "C"]);
        let mut pool = ImagePool::new();
        let mut seen = Vec::new();

        let report = pool
            .populate(&resolver, Round::One, &breeds, 7, Duration::from_millis(1), |p| {
                seen.push(p)
            })
            .await;

        assert_eq!(
            report,
            PreloadReport {
                requested: 7,
                resolved: 7,
                failed: 0
            }
        );
        assert_eq!(pool.len(), 7);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 7);
        assert_eq!(pool.breeds().filter(|b| *b == "A").count(), 3);
        assert_eq!(pool.breeds().filter(|b| *b == "C").count(), 2);
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0].loaded + 1 == w[1].loaded));
        assert!(seen.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn populate_tolerates_failures() {
        let resolver = ScriptedResolver::new(&["B"]);
        let breeds = names(&["A", "B"]);
        let mut pool = ImagePool::from_entries(vec![(tiny("old"), "A".into())]);
        pool.take(&names(&["A"]));
        let mut last = None;

        let report = pool
            .populate(&resolver, Round::Two, &breeds, 6, Duration::ZERO, |p| last = Some(p))
            .await;

        assert_eq!(report.resolved, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.cursor(), 0);
        assert!(pool.breeds().all(|b| b == "A"));
        assert_eq!(
            last,
            Some(PreloadProgress {
                round: Round::Two,
                loaded: 6,
                total: 6
            })
        );
    }

    #[tokio::test]
    async fn populate_with_no_breeds_is_empty() {
        let resolver = ScriptedResolver::new(&[]);
        let mut pool = ImagePool::new();
        let report = pool
            .populate(&resolver, Round::Three, &[], 10, Duration::ZERO, |_| {})
            .await;
        assert_eq!(report.resolved, 0);
        assert!(pool.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn preload_plan_defaults() {
        let plan = PreloadPlan::default();
        assert_eq!(plan.for_round(Round::One).count, 25);
        assert_eq!(plan.for_round(Round::Two).count, 50);
        assert_eq!(plan.for_round(Round::Three).count, 150);
        assert_eq!(plan.for_round(Round::Three).dispatch_gap(), Duration::from_millis(50));
    }

    #[test]
    fn progress_ratio() {
        let p = PreloadProgress {
            round: Round::One,
            loaded: 5,
            total: 20,
        };
        assert_eq!(p.ratio(), 0.25);
        assert!(!p.is_complete());
    }
}
