use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::detector::Detector;
use crate::detection::domain::player_assembler::PlayerAssembler;

use super::frame_sink::FrameSink;
use super::pipeline_logger::PipelineLogger;
use super::pipeline_run::{PipelineConfig, PipelineError, PipelineState, RunSummary};

/// Orchestrates the capture → detect → assemble → present loop.
///
/// Wires domain components together and drives them tick by tick on
/// the calling thread. This is a single-use struct: `execute` consumes
/// the owned components, so calling it twice will fail.
///
/// However the loop exits (bounded run finished, cancelled, or a stage
/// failed), the frame source is closed exactly once before `execute`
/// returns.
pub struct DetectPlayersUseCase {
    source: Option<Box<dyn FrameSource>>,
    detector: Option<Box<dyn Detector>>,
    sink: Option<Box<dyn FrameSink>>,
    logger: Option<Box<dyn PipelineLogger>>,
    assembler: PlayerAssembler,
    config: PipelineConfig,
    state: PipelineState,
}

impl DetectPlayersUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        sink: Box<dyn FrameSink>,
        logger: Box<dyn PipelineLogger>,
        assembler: PlayerAssembler,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source: Some(source),
            detector: Some(detector),
            sink: Some(sink),
            logger: Some(logger),
            assembler,
            config,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn execute(&mut self) -> Result<RunSummary, PipelineError> {
        let mut source = self.source.take().ok_or(PipelineError::AlreadyExecuted)?;
        let mut detector = self.detector.take().ok_or(PipelineError::AlreadyExecuted)?;
        let mut sink = self.sink.take().ok_or(PipelineError::AlreadyExecuted)?;
        let mut logger = self.logger.take().ok_or(PipelineError::AlreadyExecuted)?;

        let result = self.drive(
            source.as_mut(),
            detector.as_mut(),
            sink.as_mut(),
            logger.as_mut(),
        );

        source.close();
        logger.summary();

        self.state = if result.is_ok() {
            PipelineState::Closed
        } else {
            PipelineState::Failed
        };
        result
    }

    fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &mut dyn Detector,
        sink: &mut dyn FrameSink,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RunSummary, PipelineError> {
        let info = source.open().map_err(PipelineError::Open)?;
        logger.info(&format!(
            "Capturing {}x{} from {}",
            info.width, info.height, info.label
        ));

        let mut summary = RunSummary::default();
        loop {
            if self.config.cancelled.load(Ordering::Relaxed) {
                logger.info("Cancellation requested, stopping");
                break;
            }
            if let Some(max) = self.config.max_ticks {
                if summary.ticks >= max {
                    break;
                }
            }

            let tick = summary.ticks;
            let tick_started = Instant::now();

            self.state = PipelineState::Capturing;
            let frame = source
                .acquire()
                .map_err(|e| PipelineError::Acquisition { tick, source: e })?;
            logger.timing("capture", tick_started.elapsed().as_secs_f64() * 1000.0);

            self.state = PipelineState::Detecting;
            let detect_started = Instant::now();
            let detections = detector
                .detect(&frame)
                .map_err(|e| PipelineError::Detection { tick, source: e })?;
            logger.timing("detect", detect_started.elapsed().as_secs_f64() * 1000.0);

            self.state = PipelineState::Assembling;
            let assembly = self.assembler.assemble(&detections);
            for warning in &assembly.warnings {
                logger.warning(&warning.to_string());
            }
            summary.warnings += assembly.warnings.len() as u64;
            summary.players += assembly.players.len() as u64;
            logger.metric("players", assembly.players.len() as f64);

            self.state = PipelineState::Presenting;
            let present_started = Instant::now();
            sink.present(&frame, &assembly.players)
                .map_err(|e| PipelineError::Presentation { tick, source: e })?;
            logger.timing("present", present_started.elapsed().as_secs_f64() * 1000.0);

            summary.ticks += 1;
            logger.progress(summary.ticks, self.config.max_ticks);

            if let Some(min_interval) = self.config.min_tick_interval {
                let elapsed = tick_started.elapsed();
                if elapsed < min_interval {
                    thread::sleep(min_interval - elapsed);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_source::{CaptureError, SourceInfo};
    use crate::detection::domain::detector::{DetectionError, PartKind, RawDetection};
    use crate::detection::domain::player::Player;
    use crate::pipeline::frame_sink::NullFrameSink;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::Rect;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // --- Stubs ---

    struct StubSource {
        frames: Vec<Frame>,
        fail_open: bool,
        acquire_calls: Arc<Mutex<usize>>,
        close_calls: Arc<Mutex<usize>>,
    }

    impl StubSource {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames,
                fail_open: false,
                acquire_calls: Arc::new(Mutex::new(0)),
                close_calls: Arc::new(Mutex::new(0)),
            }
        }

        fn failing_open() -> Self {
            let mut source = Self::new(vec![]);
            source.fail_open = true;
            source
        }
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<SourceInfo, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::NoMonitors);
            }
            Ok(SourceInfo {
                width: 64,
                height: 64,
                label: "stub".into(),
            })
        }

        fn acquire(&mut self) -> Result<Frame, CaptureError> {
            *self.acquire_calls.lock().unwrap() += 1;
            if self.frames.is_empty() {
                return Err(CaptureError::AcquisitionFailed {
                    reason: "out of frames".into(),
                });
            }
            Ok(self.frames.remove(0))
        }

        fn close(&mut self) {
            *self.close_calls.lock().unwrap() += 1;
        }
    }

    struct StubDetector {
        results: HashMap<usize, Vec<RawDetection>>,
    }

    impl Detector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectionError> {
            Ok(self
                .results
                .get(&frame.index())
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, DetectionError> {
            Err(DetectionError::Backend("inference exploded".into()))
        }
    }

    #[allow(clippy::type_complexity)]
    struct SpySink {
        presented: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    impl SpySink {
        fn new() -> Self {
            Self {
                presented: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FrameSink for SpySink {
        fn present(
            &mut self,
            frame: &Frame,
            players: &[Player],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.presented
                .lock()
                .unwrap()
                .push((frame.index(), players.len()));
            Ok(())
        }
    }

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn present(
            &mut self,
            _frame: &Frame,
            _players: &[Player],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("sink refused the frame".into())
        }
    }

    struct CancellingSink {
        flag: Arc<AtomicBool>,
        cancel_after: usize,
        presented: Arc<Mutex<usize>>,
    }

    impl FrameSink for CancellingSink {
        fn present(
            &mut self,
            _frame: &Frame,
            _players: &[Player],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let mut count = self.presented.lock().unwrap();
            *count += 1;
            if *count >= self.cancel_after {
                self.flag.store(true, Ordering::Relaxed);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        warnings: Arc<Mutex<Vec<String>>>,
        infos: Arc<Mutex<Vec<String>>>,
        summaries: Arc<Mutex<usize>>,
    }

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, _tick: u64, _max_ticks: Option<u64>) {}
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn metric(&mut self, _name: &str, _value: f64) {}

        fn warning(&mut self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }

        fn info(&mut self, message: &str) {
            self.infos.lock().unwrap().push(message.to_string());
        }

        fn summary(&self) {
            *self.summaries.lock().unwrap() += 1;
        }
    }

    // --- Helpers ---

    fn make_frame(index: usize) -> Frame {
        Frame::new(vec![128; 64 * 64 * 3], 64, 64, 3, index)
    }

    fn make_frames(count: usize) -> Vec<Frame> {
        (0..count).map(make_frame).collect()
    }

    fn head() -> RawDetection {
        RawDetection {
            kind: PartKind::Head,
            bounds: Rect::new(20, 0, 30, 10).unwrap(),
            confidence: 0.9,
        }
    }

    fn body() -> RawDetection {
        RawDetection {
            kind: PartKind::Body,
            bounds: Rect::new(10, 10, 40, 70).unwrap(),
            confidence: 0.8,
        }
    }

    fn bounded(max_ticks: u64) -> PipelineConfig {
        PipelineConfig {
            max_ticks: Some(max_ticks),
            ..PipelineConfig::default()
        }
    }

    fn use_case(
        source: StubSource,
        detector: Box<dyn Detector>,
        sink: Box<dyn FrameSink>,
        config: PipelineConfig,
    ) -> DetectPlayersUseCase {
        DetectPlayersUseCase::new(
            Box::new(source),
            detector,
            sink,
            Box::new(NullPipelineLogger),
            PlayerAssembler::new(),
            config,
        )
    }

    fn empty_detector() -> Box<dyn Detector> {
        Box::new(StubDetector {
            results: HashMap::new(),
        })
    }

    // --- Tests ---

    #[test]
    fn test_state_starts_idle() {
        let uc = use_case(
            StubSource::new(vec![]),
            empty_detector(),
            Box::new(NullFrameSink),
            PipelineConfig::default(),
        );
        assert_eq!(uc.state(), PipelineState::Idle);
    }

    #[test]
    fn test_runs_bounded_number_of_ticks() {
        let source = StubSource::new(make_frames(5));
        let sink = SpySink::new();
        let presented = sink.presented.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(sink), bounded(3));
        let summary = uc.execute().unwrap();

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.players, 0);
        assert_eq!(summary.warnings, 0);
        let presented = presented.lock().unwrap();
        assert_eq!(presented.len(), 3);
        for (i, (index, _)) in presented.iter().enumerate() {
            assert_eq!(*index, i);
        }
        assert_eq!(uc.state(), PipelineState::Closed);
    }

    #[test]
    fn test_presents_assembled_players() {
        let mut results = HashMap::new();
        results.insert(0, vec![head(), body()]);
        let sink = SpySink::new();
        let presented = sink.presented.clone();

        let mut uc = use_case(
            StubSource::new(make_frames(1)),
            Box::new(StubDetector { results }),
            Box::new(sink),
            bounded(1),
        );
        let summary = uc.execute().unwrap();

        assert_eq!(summary.players, 1);
        assert_eq!(*presented.lock().unwrap(), vec![(0, 1)]);
    }

    #[test]
    fn test_counts_players_across_ticks() {
        let mut results = HashMap::new();
        results.insert(0, vec![head(), body()]);
        results.insert(1, vec![]);

        let mut uc = use_case(
            StubSource::new(make_frames(2)),
            Box::new(StubDetector { results }),
            Box::new(NullFrameSink),
            bounded(2),
        );
        let summary = uc.execute().unwrap();

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.players, 1);
    }

    #[test]
    fn test_close_called_exactly_once_on_success() {
        let source = StubSource::new(make_frames(2));
        let close_calls = source.close_calls.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(NullFrameSink), bounded(2));
        uc.execute().unwrap();

        assert_eq!(*close_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_acquisition_failure_is_fatal() {
        let source = StubSource::new(make_frames(1));
        let close_calls = source.close_calls.clone();
        let acquire_calls = source.acquire_calls.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(NullFrameSink), bounded(5));
        let result = uc.execute();

        assert!(matches!(
            result,
            Err(PipelineError::Acquisition { tick: 1, .. })
        ));
        // No retry after the failed acquire.
        assert_eq!(*acquire_calls.lock().unwrap(), 2);
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Failed);
    }

    #[test]
    fn test_acquisition_failure_on_first_tick() {
        let mut uc = use_case(
            StubSource::new(vec![]),
            empty_detector(),
            Box::new(NullFrameSink),
            PipelineConfig::default(),
        );
        let result = uc.execute();

        assert!(matches!(
            result,
            Err(PipelineError::Acquisition { tick: 0, .. })
        ));
    }

    #[test]
    fn test_open_failure_never_acquires() {
        let source = StubSource::failing_open();
        let close_calls = source.close_calls.clone();
        let acquire_calls = source.acquire_calls.clone();

        let mut uc = use_case(
            source,
            empty_detector(),
            Box::new(NullFrameSink),
            PipelineConfig::default(),
        );
        let result = uc.execute();

        assert!(matches!(result, Err(PipelineError::Open(_))));
        assert_eq!(*acquire_calls.lock().unwrap(), 0);
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Failed);
    }

    #[test]
    fn test_detector_failure_closes_source() {
        let source = StubSource::new(make_frames(3));
        let close_calls = source.close_calls.clone();

        let mut uc = use_case(
            source,
            Box::new(FailingDetector),
            Box::new(NullFrameSink),
            bounded(3),
        );
        let result = uc.execute();

        assert!(matches!(
            result,
            Err(PipelineError::Detection { tick: 0, .. })
        ));
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Failed);
    }

    #[test]
    fn test_sink_failure_closes_source() {
        let source = StubSource::new(make_frames(3));
        let close_calls = source.close_calls.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(FailingSink), bounded(3));
        let result = uc.execute();

        assert!(matches!(
            result,
            Err(PipelineError::Presentation { tick: 0, .. })
        ));
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Failed);
    }

    #[test]
    fn test_pre_set_cancellation_runs_zero_ticks() {
        let source = StubSource::new(make_frames(3));
        let close_calls = source.close_calls.clone();
        let acquire_calls = source.acquire_calls.clone();

        let config = PipelineConfig {
            cancelled: Arc::new(AtomicBool::new(true)),
            ..PipelineConfig::default()
        };
        let mut uc = use_case(source, empty_detector(), Box::new(NullFrameSink), config);
        let summary = uc.execute().unwrap();

        assert_eq!(summary.ticks, 0);
        assert_eq!(*acquire_calls.lock().unwrap(), 0);
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Closed);
    }

    #[test]
    fn test_cancellation_stops_at_tick_boundary() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let sink = CancellingSink {
            flag: cancelled.clone(),
            cancel_after: 2,
            presented: Arc::new(Mutex::new(0)),
        };
        let presented = sink.presented.clone();

        let config = PipelineConfig {
            cancelled,
            ..PipelineConfig::default()
        };
        let mut uc = use_case(
            StubSource::new(make_frames(10)),
            empty_detector(),
            Box::new(sink),
            config,
        );
        let summary = uc.execute().unwrap();

        assert_eq!(summary.ticks, 2);
        assert_eq!(*presented.lock().unwrap(), 2);
        assert_eq!(uc.state(), PipelineState::Closed);
    }

    #[test]
    fn test_second_execute_fails() {
        let source = StubSource::new(make_frames(1));
        let close_calls = source.close_calls.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(NullFrameSink), bounded(1));
        uc.execute().unwrap();
        let second = uc.execute();

        assert!(matches!(second, Err(PipelineError::AlreadyExecuted)));
        assert_eq!(*close_calls.lock().unwrap(), 1);
        // The terminal state from the first run is preserved.
        assert_eq!(uc.state(), PipelineState::Closed);
    }

    #[test]
    fn test_warnings_counted_and_forwarded() {
        let mut results = HashMap::new();
        results.insert(
            0,
            vec![RawDetection {
                kind: PartKind::Body,
                bounds: Rect::new(10, 10, 40, 70).unwrap(),
                confidence: 1.7,
            }],
        );
        let logger = RecordingLogger::default();
        let warnings = logger.warnings.clone();

        let mut uc = DetectPlayersUseCase::new(
            Box::new(StubSource::new(make_frames(1))),
            Box::new(StubDetector { results }),
            Box::new(NullFrameSink),
            Box::new(logger),
            PlayerAssembler::new(),
            bounded(1),
        );
        let summary = uc.execute().unwrap();

        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.players, 0);
        assert_eq!(warnings.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_logger_receives_info_and_summary() {
        let logger = RecordingLogger::default();
        let infos = logger.infos.clone();
        let summaries = logger.summaries.clone();

        let mut uc = DetectPlayersUseCase::new(
            Box::new(StubSource::new(make_frames(1))),
            empty_detector(),
            Box::new(NullFrameSink),
            Box::new(logger),
            PlayerAssembler::new(),
            bounded(1),
        );
        uc.execute().unwrap();

        assert!(!infos.lock().unwrap().is_empty());
        assert_eq!(*summaries.lock().unwrap(), 1);
    }

    #[test]
    fn test_min_tick_interval_paces_ticks() {
        let config = PipelineConfig {
            max_ticks: Some(2),
            min_tick_interval: Some(Duration::from_millis(5)),
            ..PipelineConfig::default()
        };
        let mut uc = use_case(
            StubSource::new(make_frames(2)),
            empty_detector(),
            Box::new(NullFrameSink),
            config,
        );

        let started = Instant::now();
        uc.execute().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_zero_tick_run_still_closes() {
        let source = StubSource::new(vec![]);
        let close_calls = source.close_calls.clone();
        let acquire_calls = source.acquire_calls.clone();

        let mut uc = use_case(source, empty_detector(), Box::new(NullFrameSink), bounded(0));
        let summary = uc.execute().unwrap();

        assert_eq!(summary, RunSummary::default());
        assert_eq!(*acquire_calls.lock().unwrap(), 0);
        assert_eq!(*close_calls.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Closed);
    }
}
