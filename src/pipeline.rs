use crate::background::{BackgroundImage, BackgroundLayer};
use crate::capture::{CaptureSource, FrameGate};
use crate::compositor::{Compositor, WorkingSurface};
use crate::output::OutputSink;
use crate::scheduler::Scheduler;
use crate::segmentation::{BoxedModel, LoadStatus, ModelLoader, Preprocessor, SegmentationModel};
use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::time::{Duration, Instant};

const STATS_INTERVAL: u64 = 30;
const MIN_TIMESTAMP_STEP: Duration = Duration::from_millis(1);

/// What the working surface shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorMode {
    /// No segmentation available; the raw camera frame goes out
    Passthrough,
    /// Camera frame composited over the background
    Composited,
}

/// Result of a single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The camera had no new frame; nothing was drawn or sent
    Idle,
    Passthrough,
    Composited,
    /// The mask itself was sent, for debugging the model
    MaskPreview,
}

enum Segmenter {
    Loading(ModelLoader),
    Unavailable,
    Ready(BoxedModel),
}

/// Accumulated per-stage time over all passes that drew a frame
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub frames: u64,
    pub capture: Duration,
    pub segment: Duration,
    pub composite: Duration,
    pub output: Duration,
}

impl PassStats {
    fn average_ms(&self, total: Duration) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        total.as_secs_f64() * 1000.0 / self.frames as f64
    }

    fn log(&self, mode: CompositorMode) {
        let capture_ms = self.average_ms(self.capture);
        let segment_ms = self.average_ms(self.segment);
        let composite_ms = self.average_ms(self.composite);
        let output_ms = self.average_ms(self.output);
        let total_ms = capture_ms + segment_ms + composite_ms + output_ms;
        let fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };

        match mode {
            CompositorMode::Composited => tracing::info!(
                "Frame {}: capture={:.1}ms, segment={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
                self.frames,
                capture_ms,
                segment_ms,
                composite_ms,
                output_ms,
                total_ms,
                fps
            ),
            CompositorMode::Passthrough => tracing::info!(
                "Frame {}: capture={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
                self.frames,
                capture_ms,
                output_ms,
                total_ms,
                fps
            ),
        }
    }
}

/// Owns everything a pass touches. Passes are run by whoever owns the
/// [`Scheduler`], see [`run`].
pub struct Pipeline<C, O> {
    capture: C,
    output: O,
    gate: FrameGate,
    surface: WorkingSurface,
    compositor: Compositor,
    background: BackgroundLayer,
    background_updates: Option<Receiver<BackgroundImage>>,
    segmenter: Segmenter,
    show_mask: bool,
    last_segment_timestamp: Option<Duration>,
    stats: PassStats,
}

impl<C, O> Pipeline<C, O>
where
    C: CaptureSource,
    O: OutputSink,
{
    pub fn new(capture: C, output: O, background: BackgroundLayer) -> Self {
        let (capture_size, output_size) = (capture.resolution(), output.resolution());
        if aspect_ratios_differ(capture_size, output_size) {
            tracing::warn!(
                "Capture {:?} and output {:?} differ in aspect ratio, frames will be stretched",
                capture_size,
                output_size
            );
        }

        Self {
            capture,
            output,
            gate: FrameGate::new(),
            surface: WorkingSurface::new(),
            compositor: Compositor::new(),
            background,
            background_updates: None,
            segmenter: Segmenter::Unavailable,
            show_mask: false,
            last_segment_timestamp: None,
            stats: PassStats::default(),
        }
    }

    /// Composite once `loader` delivers a model
    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.segmenter = Segmenter::Loading(loader);
        self
    }

    pub fn with_model(mut self, model: BoxedModel) -> Self {
        log_model_ready(model.as_ref());
        self.segmenter = Segmenter::Ready(model);
        self
    }

    /// Backgrounds received here replace the current one at the start of
    /// the next pass
    pub fn with_background_updates(mut self, updates: Receiver<BackgroundImage>) -> Self {
        self.background_updates = Some(updates);
        self
    }

    pub fn with_mask_preview(mut self, show_mask: bool) -> Self {
        self.show_mask = show_mask;
        self
    }

    pub fn mode(&self) -> CompositorMode {
        match self.segmenter {
            Segmenter::Ready(_) => CompositorMode::Composited,
            Segmenter::Loading(_) | Segmenter::Unavailable => CompositorMode::Passthrough,
        }
    }

    pub fn surface(&self) -> &WorkingSurface {
        &self.surface
    }

    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Run one compositing pass for the scheduler tick at `tick`
    pub fn run_pass(&mut self, tick: Duration) -> Result<PassOutcome> {
        self.poll_segmenter();
        self.poll_background_updates();

        let capture_start = Instant::now();
        let frame = self
            .capture
            .capture_frame()
            .context("Failed to capture frame")?;
        let capture_time = capture_start.elapsed();

        if !self.gate.admit(frame.timestamp) {
            return Ok(PassOutcome::Idle);
        }
        self.stats.capture += capture_time;

        if self.surface.draw_frame(&frame.image) {
            if let Segmenter::Ready(model) = &mut self.segmenter {
                model.reset_state();
            }
        }

        let outcome = match &mut self.segmenter {
            Segmenter::Ready(model) => {
                let timestamp = next_timestamp(&mut self.last_segment_timestamp, tick);

                let segment_start = Instant::now();
                let segmented = model.segment(&frame.image, timestamp);
                self.stats.segment += segment_start.elapsed();

                match segmented {
                    Ok(mask) => self.apply_mask(&mask),
                    Err(err) => {
                        tracing::warn!("Segmentation failed, sending the raw frame: {err:#}");
                        PassOutcome::Passthrough
                    }
                }
            }
            Segmenter::Loading(_) | Segmenter::Unavailable => PassOutcome::Passthrough,
        };

        let output_start = Instant::now();
        self.output
            .write_frame(self.surface.image())
            .context("Failed to write frame")?;
        self.stats.output += output_start.elapsed();
        self.stats.frames += 1;

        Ok(outcome)
    }

    /// Replace the raw frame on the surface with the composite (or the mask
    /// itself in preview mode)
    fn apply_mask(&mut self, mask: &[f32]) -> PassOutcome {
        let composite_start = Instant::now();
        let (width, height) = self.surface.dimensions();
        let outcome = if self.show_mask {
            self.surface
                .put(&Preprocessor::mask_to_rgba(mask, width, height));
            PassOutcome::MaskPreview
        } else {
            let background = self.background.rendered(width, height);
            match self
                .compositor
                .composite(self.surface.image(), background, mask)
            {
                Ok(composited) => {
                    self.surface.put(composited);
                    PassOutcome::Composited
                }
                Err(err) => {
                    tracing::warn!("Skipping composite for this frame: {err}");
                    PassOutcome::Passthrough
                }
            }
        };
        self.stats.composite += composite_start.elapsed();
        outcome
    }

    fn poll_segmenter(&mut self) {
        let Segmenter::Loading(loader) = &self.segmenter else {
            return;
        };

        match loader.poll() {
            LoadStatus::Pending => {}
            LoadStatus::Ready(model) => {
                log_model_ready(model.as_ref());
                self.segmenter = Segmenter::Ready(model);
            }
            LoadStatus::Failed(err) => {
                tracing::error!("Segmentation model failed to load, staying in passthrough: {err:#}");
                self.segmenter = Segmenter::Unavailable;
            }
        }
    }

    fn poll_background_updates(&mut self) {
        let Some(updates) = &self.background_updates else {
            return;
        };

        if let Some(latest) = updates.try_iter().last() {
            self.background.replace(latest);
        }
    }
}

fn log_model_ready(model: &(dyn SegmentationModel + Send)) {
    let (width, height) = model.input_size();
    tracing::info!(
        "Segmentation model ready ({}x{} input), compositing enabled",
        width,
        height
    );
}

/// `true` when both sizes are known and their width:height ratios differ
fn aspect_ratios_differ(a: (u32, u32), b: (u32, u32)) -> bool {
    if a.0 == 0 || a.1 == 0 || b.0 == 0 || b.1 == 0 {
        return false;
    }
    u64::from(a.0) * u64::from(b.1) != u64::from(b.0) * u64::from(a.1)
}

/// Segmentation timestamps must strictly increase even if ticks repeat
fn next_timestamp(last: &mut Option<Duration>, tick: Duration) -> Duration {
    let timestamp = match *last {
        Some(previous) if tick <= previous => previous + MIN_TIMESTAMP_STEP,
        _ => tick,
    };
    *last = Some(timestamp);
    timestamp
}

/// Drive `pipeline` from `scheduler` until the scheduler stops.
///
/// Returns the number of frames written.
pub fn run<C, O, S>(pipeline: &mut Pipeline<C, O>, scheduler: &mut S) -> Result<u64>
where
    C: CaptureSource,
    O: OutputSink,
    S: Scheduler,
{
    tracing::info!("Starting main pipeline loop in {:?} mode", pipeline.mode());

    let mut last_mode = pipeline.mode();
    let mut last_logged = 0;

    while let Some(tick) = scheduler.next_tick() {
        pipeline.run_pass(tick)?;

        let mode = pipeline.mode();
        if mode != last_mode {
            tracing::info!("Compositor mode changed from {:?} to {:?}", last_mode, mode);
            last_mode = mode;
        }

        let stats = pipeline.stats();
        if stats.frames != last_logged && stats.frames % STATS_INTERVAL == 0 {
            stats.log(mode);
            last_logged = stats.frames;
        }
    }

    Ok(pipeline.stats().frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedFrame;
    use crate::segmentation::Mask;
    use anyhow::anyhow;
    use crossbeam_channel::{bounded, unbounded};
    use image::{Rgba, RgbaImage};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Replays queued frames, then keeps returning the last one
    struct ScriptedCapture {
        frames: VecDeque<CapturedFrame>,
        last: Option<CapturedFrame>,
    }

    impl ScriptedCapture {
        fn new(images: Vec<RgbaImage>) -> Self {
            let frames = images
                .into_iter()
                .enumerate()
                .map(|(i, image)| CapturedFrame {
                    image,
                    timestamp: Duration::from_millis(33 * i as u64),
                })
                .collect();
            Self {
                frames,
                last: None,
            }
        }

        fn from_frames(frames: Vec<CapturedFrame>) -> Self {
            Self {
                frames: frames.into(),
                last: None,
            }
        }
    }

    impl CaptureSource for ScriptedCapture {
        fn capture_frame(&mut self) -> Result<CapturedFrame> {
            if let Some(frame) = self.frames.pop_front() {
                self.last = Some(frame);
            }
            self.last.clone().ok_or_else(|| anyhow!("no frames scripted"))
        }

        fn resolution(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<RgbaImage>>>,
    }

    impl RecordingSink {
        fn written(&self) -> Vec<RgbaImage> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl OutputSink for RecordingSink {
        fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    /// Returns the same mask for every frame and records what it saw
    #[derive(Clone)]
    struct FixedMask {
        mask: Mask,
        timestamps: Arc<Mutex<Vec<Duration>>>,
        resets: Arc<AtomicUsize>,
    }

    impl FixedMask {
        fn new(mask: Mask) -> Self {
            Self {
                mask,
                timestamps: Arc::default(),
                resets: Arc::default(),
            }
        }
    }

    impl SegmentationModel for FixedMask {
        fn segment(&mut self, _frame: &RgbaImage, timestamp: Duration) -> Result<Mask> {
            self.timestamps.lock().unwrap().push(timestamp);
            Ok(self.mask.clone())
        }

        fn reset_state(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn input_size(&self) -> (u32, u32) {
            (2, 1)
        }
    }

    struct CountedTicks {
        remaining: u32,
        next: Duration,
    }

    impl CountedTicks {
        fn new(count: u32) -> Self {
            Self {
                remaining: count,
                next: Duration::ZERO,
            }
        }
    }

    impl Scheduler for CountedTicks {
        fn next_tick(&mut self) -> Option<Duration> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            let tick = self.next;
            self.next += Duration::from_millis(16);
            Some(tick)
        }
    }

    fn row(pixels: &[[u8; 4]]) -> RgbaImage {
        let raw = pixels.iter().flatten().copied().collect();
        RgbaImage::from_raw(pixels.len() as u32, 1, raw).unwrap()
    }

    fn foreground() -> RgbaImage {
        row(&[[10, 10, 10, 255], [200, 200, 200, 255]])
    }

    fn background() -> BackgroundLayer {
        BackgroundLayer::new(Some(BackgroundImage::from_image(
            "test",
            row(&[[0, 0, 0, 255], [50, 50, 50, 255]]),
        )))
    }

    fn distinct_frames(count: u8) -> Vec<RgbaImage> {
        (0..count)
            .map(|i| row(&[[i, i, i, 255], [i, 0, 0, 255]]))
            .collect()
    }

    fn tick(i: u64) -> Duration {
        Duration::from_millis(16 * i)
    }

    #[test]
    fn passthrough_without_model_sends_raw_frames() {
        let frames = distinct_frames(6);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(frames.clone()),
            sink.clone(),
            background(),
        );

        for i in 0..frames.len() as u64 {
            assert_eq!(pipeline.run_pass(tick(i)).unwrap(), PassOutcome::Passthrough);
            assert_eq!(pipeline.mode(), CompositorMode::Passthrough);
        }

        assert_eq!(sink.written(), frames);
    }

    #[test]
    fn composites_once_model_is_present() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground()]),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FixedMask::new(vec![0.0, 1.0])));

        assert_eq!(pipeline.mode(), CompositorMode::Composited);
        assert_eq!(pipeline.run_pass(tick(0)).unwrap(), PassOutcome::Composited);

        let expected = row(&[[10, 10, 10, 255], [50, 50, 50, 255]]);
        assert_eq!(sink.written(), vec![expected.clone()]);
        assert_eq!(pipeline.surface().image(), &expected);
    }

    #[test]
    fn repeated_frame_timestamp_is_idle() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground()]),
            sink.clone(),
            background(),
        );

        assert_eq!(pipeline.run_pass(tick(0)).unwrap(), PassOutcome::Passthrough);
        assert_eq!(pipeline.run_pass(tick(1)).unwrap(), PassOutcome::Idle);
        assert_eq!(pipeline.run_pass(tick(2)).unwrap(), PassOutcome::Idle);
        assert_eq!(sink.written().len(), 1);
        assert_eq!(pipeline.stats().frames, 1);
    }

    #[test]
    fn stays_passthrough_until_loader_finishes() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let loader = ModelLoader::spawn(move || {
            release_rx.recv()?;
            Ok(Box::new(FixedMask::new(vec![1.0, 1.0])) as BoxedModel)
        });

        let frames = distinct_frames(200);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(frames.clone()),
            sink.clone(),
            background(),
        )
        .with_loader(loader);

        for i in 0..3 {
            assert_eq!(pipeline.run_pass(tick(i)).unwrap(), PassOutcome::Passthrough);
        }
        assert_eq!(sink.written(), frames[..3].to_vec());

        release_tx.send(()).unwrap();

        let mut pass = 3;
        let outcome = loop {
            let outcome = pipeline.run_pass(tick(pass)).unwrap();
            pass += 1;
            if outcome != PassOutcome::Passthrough || pass as usize >= frames.len() {
                break outcome;
            }
            thread::sleep(Duration::from_millis(5));
        };

        assert_eq!(outcome, PassOutcome::Composited);
        assert_eq!(pipeline.mode(), CompositorMode::Composited);
        let last = sink.written().pop().unwrap();
        assert_eq!(last, row(&[[0, 0, 0, 255], [50, 50, 50, 255]]));
    }

    #[test]
    fn failed_load_keeps_passthrough() {
        let loader = ModelLoader::spawn(|| Err(anyhow!("model file missing")));
        let frames = distinct_frames(20);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(frames.clone()),
            sink.clone(),
            background(),
        )
        .with_loader(loader);

        for i in 0..frames.len() as u64 {
            assert_eq!(pipeline.run_pass(tick(i)).unwrap(), PassOutcome::Passthrough);
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(pipeline.mode(), CompositorMode::Passthrough);
        assert_eq!(sink.written(), frames);
    }

    #[test]
    fn new_background_applies_on_next_pass() {
        let (updates_tx, updates_rx) = unbounded();
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground(), foreground()]),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FixedMask::new(vec![1.0, 1.0])))
        .with_background_updates(updates_rx);

        pipeline.run_pass(tick(0)).unwrap();
        updates_tx
            .send(BackgroundImage::from_image(
                "generated",
                row(&[[7, 7, 7, 255], [8, 8, 8, 255]]),
            ))
            .unwrap();

        // Same image, new timestamp
        pipeline.run_pass(tick(1)).unwrap();

        let written = sink.written();
        assert_eq!(written[0], row(&[[0, 0, 0, 255], [50, 50, 50, 255]]));
        assert_eq!(written[1], row(&[[7, 7, 7, 255], [8, 8, 8, 255]]));
    }

    #[test]
    fn mismatched_mask_falls_back_to_raw_frame() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground()]),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FixedMask::new(vec![1.0, 1.0, 1.0])));

        assert_eq!(pipeline.run_pass(tick(0)).unwrap(), PassOutcome::Passthrough);
        assert_eq!(sink.written(), vec![foreground()]);
    }

    #[test]
    fn segmentation_timestamps_strictly_increase() {
        let model = FixedMask::new(vec![0.0, 0.0]);
        let timestamps = model.timestamps.clone();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(distinct_frames(3)),
            RecordingSink::default(),
            background(),
        )
        .with_model(Box::new(model));

        for _ in 0..3 {
            pipeline.run_pass(Duration::from_millis(100)).unwrap();
        }

        assert_eq!(
            *timestamps.lock().unwrap(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(101),
                Duration::from_millis(102)
            ]
        );
    }

    #[test]
    fn resolution_change_resets_model_state() {
        let model = FixedMask::new(vec![0.0, 0.0]);
        let resets = model.resets.clone();
        let frames = vec![
            CapturedFrame {
                image: foreground(),
                timestamp: Duration::from_millis(0),
            },
            CapturedFrame {
                image: foreground(),
                timestamp: Duration::from_millis(33),
            },
            CapturedFrame {
                image: RgbaImage::new(2, 2),
                timestamp: Duration::from_millis(66),
            },
        ];
        let mut pipeline = Pipeline::new(
            ScriptedCapture::from_frames(frames),
            RecordingSink::default(),
            background(),
        )
        .with_model(Box::new(model));

        pipeline.run_pass(tick(0)).unwrap();
        pipeline.run_pass(tick(1)).unwrap();
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        // 2x2 frame but the model still answers with two values
        assert_eq!(pipeline.run_pass(tick(2)).unwrap(), PassOutcome::Passthrough);
        assert_eq!(resets.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.surface().dimensions(), (2, 2));
    }

    #[test]
    fn mask_preview_sends_grayscale_mask() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground()]),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FixedMask::new(vec![0.0, 1.0])))
        .with_mask_preview(true);

        assert_eq!(pipeline.run_pass(tick(0)).unwrap(), PassOutcome::MaskPreview);
        assert_eq!(
            sink.written(),
            vec![row(&[[0, 0, 0, 255], [255, 255, 255, 255]])]
        );
    }

    /// Fails every call listed in `failing`, counting from 1
    struct FlakyModel {
        calls: usize,
        failing: Vec<usize>,
    }

    impl SegmentationModel for FlakyModel {
        fn segment(&mut self, frame: &RgbaImage, _timestamp: Duration) -> Result<Mask> {
            self.calls += 1;
            if self.failing.contains(&self.calls) {
                return Err(anyhow!("transient inference error"));
            }
            Ok(vec![1.0; (frame.width() * frame.height()) as usize])
        }

        fn input_size(&self) -> (u32, u32) {
            (2, 1)
        }
    }

    #[test]
    fn failed_inference_sends_raw_frame() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(vec![foreground(), foreground()]),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FlakyModel {
            calls: 0,
            failing: vec![1],
        }));

        assert_eq!(pipeline.run_pass(tick(0)).unwrap(), PassOutcome::Passthrough);
        assert_eq!(pipeline.mode(), CompositorMode::Composited);
        assert_eq!(pipeline.run_pass(tick(1)).unwrap(), PassOutcome::Composited);

        let written = sink.written();
        assert_eq!(written[0], foreground());
        assert_eq!(written[1], row(&[[0, 0, 0, 255], [50, 50, 50, 255]]));
    }

    #[test]
    fn run_survives_inference_errors() {
        let frames = distinct_frames(10);
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(frames.clone()),
            sink.clone(),
            background(),
        )
        .with_model(Box::new(FlakyModel {
            calls: 0,
            failing: vec![2, 5, 6],
        }));

        let written_count = run(&mut pipeline, &mut CountedTicks::new(10)).unwrap();
        assert_eq!(written_count, 10);

        let written = sink.written();
        let composited = row(&[[0, 0, 0, 255], [50, 50, 50, 255]]);
        for (i, frame) in written.iter().enumerate() {
            if [1, 4, 5].contains(&i) {
                assert_eq!(frame, &frames[i], "frame {i} should be raw");
            } else {
                assert_eq!(frame, &composited, "frame {i} should be composited");
            }
        }
    }

    #[test]
    fn aspect_ratio_comparison() {
        assert!(!aspect_ratios_differ((1920, 1080), (1280, 720)));
        assert!(aspect_ratios_differ((640, 480), (1280, 720)));
        assert!(!aspect_ratios_differ((0, 0), (1280, 720)));
    }

    #[test]
    fn run_stops_with_scheduler() {
        let sink = RecordingSink::default();
        let mut pipeline = Pipeline::new(
            ScriptedCapture::new(distinct_frames(4)),
            sink.clone(),
            background(),
        );

        // The fifth and sixth ticks see the fourth frame again
        let frames = run(&mut pipeline, &mut CountedTicks::new(6)).unwrap();

        assert_eq!(frames, 4);
        assert_eq!(sink.written(), distinct_frames(4));
    }

    #[test]
    fn timestamps_follow_ticks_when_increasing() {
        let mut last = None;
        assert_eq!(next_timestamp(&mut last, tick(1)), tick(1));
        assert_eq!(next_timestamp(&mut last, tick(3)), tick(3));
        assert_eq!(next_timestamp(&mut last, tick(2)), tick(3) + MIN_TIMESTAMP_STEP);
    }
}
