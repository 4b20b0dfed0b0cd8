//! Per-image pipeline controller.
//!
//! Parameter edits do not render immediately. Each edit arms a debounce
//! timer for its item; only when the timer expires without a newer edit does
//! the pipeline run:
//!
//! ```text
//! edit ─► Pending ──(debounce expires)──► Computing ──► Idle
//!           ▲   │                              │
//!           └───┘ newer edit re-arms           └─ publish if still current
//! ```
//!
//! ## Sequence guard
//!
//! Every request bumps a per-item sequence number and a render job carries
//! the number it was started for. A finished job is published only if
//!
//! - its item is still in the collection, and
//! - no newer request was issued after the job started.
//!
//! Otherwise the result is dropped ([`PublishOutcome::Removed`] /
//! [`PublishOutcome::Stale`]). A slow render can therefore never overwrite
//! the result of a newer one.
//!
//! ## Time
//!
//! The controller never reads the clock. Callers pass `now` into
//! [`Controller::edit`] and [`Controller::poll`], which keeps debounce
//! behavior deterministic under test.

use crate::acquire::SourceFile;
use crate::collection::{Admission, Collection};
use crate::imaging::{
    BackendError, ImageBackend, composite, encode, remove_background, resolve_dimensions,
};
use crate::item::{ImageItem, ItemId, ItemParams, RenderResult};
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default debounce window between the last edit and the render.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(180);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Rendered size {actual:?} does not match resolved size {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Where an item is in the render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Pending,
    Computing,
}

/// What happened to a finished render job.
#[derive(Debug)]
pub enum PublishOutcome {
    Published { id: ItemId, sequence: u64 },
    /// A newer request was issued while this job ran.
    Stale { id: ItemId, sequence: u64, latest: u64 },
    /// The item left the collection before the job finished.
    Removed { id: ItemId },
    /// The pipeline failed; the previous result is kept.
    Failed { id: ItemId, error: RenderError },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Cancellable timers keyed by item.
///
/// Scheduling a key that already has a deadline replaces it, so only the
/// most recent request inside the window survives.
#[derive(Debug)]
pub struct Debouncer<K> {
    delay: Duration,
    deadlines: BTreeMap<K, Instant>,
}

impl<K: Ord + Copy> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadlines: BTreeMap::new(),
        }
    }

    pub fn schedule(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.delay);
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// Earliest armed deadline, for callers that sleep until the next event.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Disarm and return every key whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

/// Snapshot of everything one render needs. Independent of the collection.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: ItemId,
    pub sequence: u64,
    source: Arc<RgbaImage>,
    params: ItemParams,
    filename: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Sequence {
    issued: u64,
    computing: Option<u64>,
}

/// Run the full per-image pipeline for a job.
///
/// Resolve geometry → resample → remove background (optional) → composite
/// onto the background color → encode. Pure with respect to the job.
pub fn render_job(backend: &impl ImageBackend, job: &RenderJob) -> Result<RenderResult, RenderError> {
    let params = &job.params;
    let expected = resolve_dimensions(job.source.dimensions(), &params.sizing());
    let mut pixels = backend.resize(&job.source, expected.0, expected.1)?;

    if params.remove_background {
        remove_background(&mut pixels, params.tolerance);
    }
    let surface = composite(&pixels, params.background);
    let preview = encode(backend, &surface, params.format, params.quality)?;

    let actual = (preview.width, preview.height);
    if actual != expected {
        return Err(RenderError::SizeMismatch { expected, actual });
    }

    tracing::debug!(
        item = %job.id,
        sequence = job.sequence,
        width = actual.0,
        height = actual.1,
        size = preview.estimated_size,
        format = %params.format,
        "rendered"
    );

    Ok(RenderResult {
        width: actual.0,
        height: actual.1,
        encoded_size: preview.estimated_size,
        filename: job.filename.clone(),
        sequence: job.sequence,
        preview,
    })
}

/// Tuning for a [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub debounce: Duration,
    pub capacity: usize,
    /// Parameters given to newly admitted items.
    pub defaults: ItemParams,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            capacity: crate::collection::MAX_ITEMS,
            defaults: ItemParams::default(),
        }
    }
}

/// Owns the collection and drives renders for every item in it.
pub struct Controller<B: ImageBackend> {
    backend: B,
    collection: Collection,
    debouncer: Debouncer<ItemId>,
    sequences: HashMap<ItemId, Sequence>,
    defaults: ItemParams,
}

impl<B: ImageBackend> Controller<B> {
    pub fn new(backend: B, settings: ControllerSettings) -> Self {
        Self {
            backend,
            collection: Collection::with_capacity(settings.capacity),
            debouncer: Debouncer::new(settings.debounce),
            sequences: HashMap::new(),
            defaults: settings.defaults,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn item(&self, id: ItemId) -> Option<&ImageItem> {
        self.collection.get(id)
    }

    /// Admit inputs and render the accepted items right away, in parallel.
    pub fn admit(&mut self, files: Vec<SourceFile>) -> Admission {
        let admission = self.collection.admit(&self.backend, files, &self.defaults);
        for &id in &admission.accepted {
            self.sequences.insert(id, Sequence::default());
        }
        self.render_batch(admission.accepted.clone());
        admission
    }

    /// Apply an edit to an item's parameters and arm its debounce timer.
    ///
    /// Returns `None` if the item does not exist.
    pub fn edit<R>(
        &mut self,
        id: ItemId,
        now: Instant,
        change: impl FnOnce(&mut ItemParams) -> R,
    ) -> Option<R> {
        let item = self.collection.get_mut(id)?;
        let out = change(&mut item.params);
        self.request(id, now);
        Some(out)
    }

    /// Change the name hint. Only the filename is re-derived; no re-encode.
    pub fn rename(&mut self, id: ItemId, hint: &str) -> Option<String> {
        let item = self.collection.get_mut(id)?;
        item.params.name_hint = hint.to_string();
        item.refresh_filename();
        Some(item.filename())
    }

    /// Record a new request for `id` and (re)arm its timer.
    fn request(&mut self, id: ItemId, now: Instant) -> u64 {
        let seq = self.sequences.entry(id).or_default();
        seq.issued += 1;
        self.debouncer.schedule(id, now);
        seq.issued
    }

    pub fn state(&self, id: ItemId) -> Option<PipelineState> {
        if !self.collection.contains(id) {
            return None;
        }
        if self.debouncer.is_pending(id) {
            return Some(PipelineState::Pending);
        }
        let computing = self.sequences.get(&id).and_then(|s| s.computing).is_some();
        Some(if computing {
            PipelineState::Computing
        } else {
            PipelineState::Idle
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Snapshot an item into a job tagged with the latest request number.
    pub fn begin(&mut self, id: ItemId) -> Option<RenderJob> {
        let item = self.collection.get(id)?;
        let job = RenderJob {
            id,
            sequence: 0,
            source: Arc::clone(item.source()),
            params: item.params.clone(),
            filename: item.filename(),
        };
        let seq = self.sequences.entry(id).or_default();
        seq.computing = Some(seq.issued);
        Some(RenderJob {
            sequence: seq.issued,
            ..job
        })
    }

    /// Publish a finished job if it is still the latest for a live item.
    pub fn publish(
        &mut self,
        job: RenderJob,
        result: Result<RenderResult, RenderError>,
    ) -> PublishOutcome {
        let id = job.id;
        let Some(item) = self.collection.get_mut(id) else {
            return PublishOutcome::Removed { id };
        };
        let seq = self.sequences.entry(id).or_default();
        if seq.computing == Some(job.sequence) {
            seq.computing = None;
        }
        if job.sequence < seq.issued {
            return PublishOutcome::Stale {
                id,
                sequence: job.sequence,
                latest: seq.issued,
            };
        }
        match result {
            Ok(mut rendered) => {
                // The name may have changed while the job was running
                rendered.filename = item.filename();
                item.publish(rendered);
                PublishOutcome::Published {
                    id,
                    sequence: job.sequence,
                }
            }
            Err(error) => PublishOutcome::Failed { id, error },
        }
    }

    /// Render every item whose debounce window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::new();
        for id in self.debouncer.take_due(now) {
            let Some(job) = self.begin(id) else { continue };
            let result = render_job(&self.backend, &job);
            let outcome = self.publish(job, result);
            log_outcome(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Render immediately, bypassing and cancelling any armed timer.
    pub fn render_now(&mut self, id: ItemId) -> Option<PublishOutcome> {
        if !self.collection.contains(id) {
            return None;
        }
        self.debouncer.cancel(id);
        self.sequences.entry(id).or_default().issued += 1;
        let job = self.begin(id)?;
        let result = render_job(&self.backend, &job);
        Some(self.publish(job, result))
    }

    /// Make sure the published result reflects the latest request.
    ///
    /// Reuses the current result when nothing was requested since it was
    /// rendered. Otherwise renders now, like [`render_now`](Self::render_now).
    pub fn ensure_current(&mut self, id: ItemId) -> Option<PublishOutcome> {
        let item = self.collection.get(id)?;
        let seq = self.sequences.get(&id).copied().unwrap_or_default();
        let current = !self.debouncer.is_pending(id)
            && seq.computing.is_none()
            && item.rendered().is_some_and(|r| r.sequence == seq.issued);
        if current {
            return Some(PublishOutcome::Published {
                id,
                sequence: seq.issued,
            });
        }
        self.render_now(id)
    }

    /// Render every item now, in parallel across items.
    ///
    /// Items own their buffers, so concurrent renders cannot observe each
    /// other. Outcomes are returned in collection order.
    pub fn render_all(&mut self) -> Vec<PublishOutcome> {
        let ids = self.collection.ids();
        self.render_batch(ids)
    }

    fn render_batch(&mut self, ids: Vec<ItemId>) -> Vec<PublishOutcome> {
        for &id in &ids {
            self.debouncer.cancel(id);
            self.sequences.entry(id).or_default().issued += 1;
        }
        let jobs: Vec<RenderJob> = ids.into_iter().filter_map(|id| self.begin(id)).collect();
        let backend = &self.backend;
        let results: Vec<_> = jobs
            .par_iter()
            .map(|job| render_job(backend, job))
            .collect();
        jobs.into_iter()
            .zip(results)
            .map(|(job, result)| {
                let outcome = self.publish(job, result);
                log_outcome(&outcome);
                outcome
            })
            .collect()
    }

    /// Remove an item. In-flight jobs for it will report [`PublishOutcome::Removed`].
    pub fn remove(&mut self, id: ItemId) -> Option<ImageItem> {
        self.debouncer.cancel(id);
        self.sequences.remove(&id);
        self.collection.remove(id)
    }

    /// Remove every item and disarm every timer.
    pub fn reset(&mut self) {
        self.debouncer.clear();
        self.sequences.clear();
        self.collection.clear();
    }
}

fn log_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Published { .. } => {}
        PublishOutcome::Stale {
            id,
            sequence,
            latest,
        } => tracing::debug!(item = %id, sequence, latest, "discarded stale render"),
        PublishOutcome::Removed { id } => {
            tracing::debug!(item = %id, "discarded render of removed item")
        }
        PublishOutcome::Failed { id, error } => {
            tracing::warn!(item = %id, error = %error, "render failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{OutputFormat, SizeMode};
    use crate::test_helpers::mock_file;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller_with(n: usize) -> (Controller<MockBackend>, Vec<ItemId>) {
        let mut c = Controller::new(MockBackend::new(), ControllerSettings::default());
        let files = (0..n).map(|i| mock_file(&format!("p{i}.png"), 80, 60)).collect();
        let ids = c.admit(files).accepted;
        (c, ids)
    }

    // =========================================================================
    // Debouncer
    // =========================================================================

    #[test]
    fn debouncer_fires_after_delay() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(100));
        d.schedule(1, t0);
        assert!(d.take_due(t0 + ms(99)).is_empty());
        assert_eq!(d.take_due(t0 + ms(100)), vec![1]);
        assert!(!d.is_pending(1));
    }

    #[test]
    fn debouncer_reschedule_replaces_deadline() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(100));
        d.schedule(1, t0);
        d.schedule(1, t0 + ms(80));
        assert!(d.take_due(t0 + ms(150)).is_empty());
        assert_eq!(d.take_due(t0 + ms(180)), vec![1]);
    }

    #[test]
    fn debouncer_keys_are_independent() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(50));
        d.schedule(2, t0 + ms(10));
        d.schedule(1, t0);
        assert_eq!(d.next_deadline(), Some(t0 + ms(50)));
        assert_eq!(d.take_due(t0 + ms(55)), vec![1]);
        assert!(d.cancel(2));
        assert!(d.take_due(t0 + ms(1000)).is_empty());
    }

    // =========================================================================
    // Controller
    // =========================================================================

    #[test]
    fn admission_renders_immediately() {
        let (c, ids) = controller_with(2);
        for id in ids {
            let item = c.item(id).unwrap();
            let rendered = item.rendered().unwrap();
            assert_eq!((rendered.width, rendered.height), (80, 60));
            assert_eq!(rendered.filename, format!("{}.webp", item.base_name()));
            assert_eq!(c.state(id), Some(PipelineState::Idle));
        }
    }

    #[test]
    fn edits_collapse_into_one_render() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let before = c.backend().encode_count();
        let t0 = Instant::now();

        c.edit(id, t0, |p| p.set_percent(90));
        c.edit(id, t0 + ms(50), |p| p.set_percent(70));
        c.edit(id, t0 + ms(100), |p| p.set_percent(50));
        assert_eq!(c.state(id), Some(PipelineState::Pending));

        assert!(c.poll(t0 + ms(200)).is_empty(), "window restarted by last edit");
        let outcomes = c.poll(t0 + ms(280));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_published());
        assert_eq!(c.backend().encode_count(), before + 1);

        let rendered = c.item(id).unwrap().rendered().unwrap();
        assert_eq!((rendered.width, rendered.height), (40, 30));
        assert_eq!(c.state(id), Some(PipelineState::Idle));
    }

    #[test]
    fn stale_result_is_discarded() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let t0 = Instant::now();

        c.edit(id, t0, |p| p.set_percent(50));
        c.poll(t0 + DEFAULT_DEBOUNCE);
        let published = c.item(id).unwrap().rendered().unwrap().clone();

        // A slow job starts, then the user edits again
        let slow = c.begin(id).unwrap();
        assert_eq!(c.state(id), Some(PipelineState::Computing));
        c.edit(id, t0 + ms(500), |p| p.set_percent(25));

        let result = render_job(c.backend(), &slow);
        let outcome = c.publish(slow, result);
        assert!(matches!(outcome, PublishOutcome::Stale { .. }));
        assert_eq!(c.item(id).unwrap().rendered(), Some(&published));

        c.poll(t0 + ms(500) + DEFAULT_DEBOUNCE);
        let latest = c.item(id).unwrap().rendered().unwrap();
        assert_eq!((latest.width, latest.height), (20, 15));
    }

    #[test]
    fn newer_job_finishing_first_wins() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let t0 = Instant::now();

        c.edit(id, t0, |p| p.set_percent(50));
        let older = c.begin(id).unwrap();
        c.edit(id, t0, |p| p.set_percent(10));
        let newer = c.begin(id).unwrap();

        let newer_result = render_job(c.backend(), &newer);
        assert!(c.publish(newer, newer_result).is_published());
        let older_result = render_job(c.backend(), &older);
        assert!(matches!(c.publish(older, older_result), PublishOutcome::Stale { .. }));

        let rendered = c.item(id).unwrap().rendered().unwrap();
        assert_eq!((rendered.width, rendered.height), (8, 6));
    }

    #[test]
    fn removed_item_is_not_published() {
        let (mut c, ids) = controller_with(2);
        let job = c.begin(ids[0]).unwrap();
        c.remove(ids[0]).unwrap();

        let result = render_job(c.backend(), &job);
        assert!(matches!(c.publish(job, result), PublishOutcome::Removed { .. }));
        assert!(c.item(ids[0]).is_none());
        assert_eq!(c.state(ids[0]), None);
    }

    #[test]
    fn remove_cancels_pending_timer() {
        let (mut c, ids) = controller_with(1);
        let t0 = Instant::now();
        c.edit(ids[0], t0, |p| p.set_percent(50));
        c.remove(ids[0]);
        assert!(c.poll(t0 + ms(1000)).is_empty());
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn failed_render_keeps_previous_result() {
        let mut c = Controller::new(MockBackend::new(), ControllerSettings::default());
        let id = c.admit(vec![mock_file("a.png", 10, 10)]).accepted[0];
        let before = c.item(id).unwrap().rendered().cloned();

        let job = c.begin(id).unwrap();
        let failing = MockBackend::failing_encode("disk full");
        let result = render_job(&failing, &job);
        assert!(matches!(c.publish(job, result), PublishOutcome::Failed { .. }));
        assert_eq!(c.item(id).unwrap().rendered().cloned(), before);
    }

    #[test]
    fn pixel_mode_edit_renders_resolved_geometry() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let t0 = Instant::now();
        c.edit(id, t0, |p| {
            p.size_mode = SizeMode::Pixels;
            p.set_target_width(Some(1000));
            p.format = OutputFormat::Png;
        });
        c.poll(t0 + DEFAULT_DEBOUNCE);
        let rendered = c.item(id).unwrap().rendered().unwrap();
        assert_eq!((rendered.width, rendered.height), (80, 60), "no upscaling");
        assert_eq!(rendered.filename, "p0.png");
    }

    #[test]
    fn rename_updates_filename_without_rendering() {
        let (mut c, ids) = controller_with(1);
        let before = c.backend().encode_count();
        let name = c.rename(ids[0], "cover: final?").unwrap();
        assert_eq!(name, "cover final.webp");
        assert_eq!(c.item(ids[0]).unwrap().rendered().unwrap().filename, name);
        assert_eq!(c.backend().encode_count(), before);
    }

    #[test]
    fn rename_during_render_survives_publish() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let job = c.begin(id).unwrap();
        assert_eq!(c.rename(id, "cover").as_deref(), Some("cover.webp"));

        let result = render_job(c.backend(), &job);
        assert!(c.publish(job, result).is_published());
        let item = c.item(id).unwrap();
        assert_eq!(item.rendered().unwrap().filename, "cover.webp");
        assert_eq!(item.filename(), "cover.webp");
    }

    #[test]
    fn ensure_current_reuses_fresh_result() {
        let (mut c, ids) = controller_with(1);
        let id = ids[0];
        let before = c.backend().encode_count();
        assert!(c.ensure_current(id).unwrap().is_published());
        assert_eq!(c.backend().encode_count(), before);

        c.edit(id, Instant::now(), |p| p.set_percent(50));
        assert!(c.ensure_current(id).unwrap().is_published());
        assert_eq!(c.backend().encode_count(), before + 1);
        assert_eq!(c.item(id).unwrap().rendered().unwrap().width, 40);
        assert_eq!(c.next_deadline(), None);
        assert!(c.ensure_current(ItemId(99)).is_none());
    }

    #[test]
    fn ensure_current_retries_failed_render() {
        let mut c = Controller::new(MockBackend::failing_encode("boom"), ControllerSettings::default());
        let id = c.admit(vec![mock_file("a.png", 4, 4)]).accepted[0];
        assert!(c.item(id).unwrap().rendered().is_none());
        let before = c.backend().encode_count();
        assert!(matches!(c.ensure_current(id), Some(PublishOutcome::Failed { .. })));
        assert_eq!(c.backend().encode_count(), before + 1);
    }

    #[test]
    fn render_all_returns_outcomes_in_order() {
        let (mut c, ids) = controller_with(4);
        c.edit(ids[1], Instant::now(), |p| p.set_percent(50));
        let outcomes = c.render_all();
        let published: Vec<ItemId> = outcomes
            .iter()
            .map(|o| match o {
                PublishOutcome::Published { id, .. } => *id,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(published, ids);
        assert_eq!(c.next_deadline(), None);
        assert_eq!(c.item(ids[1]).unwrap().rendered().unwrap().width, 40);
    }

    #[test]
    fn reset_clears_everything() {
        let (mut c, _) = controller_with(3);
        c.reset();
        assert!(c.collection().is_empty());
        assert_eq!(c.next_deadline(), None);
    }
}
