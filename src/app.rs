//! Scan Session
//!
//! Owns the background worker that runs capture, OCR, debounce and lookup
//! once per tick, and the channel its events travel on.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analysis::{Observation, StabilityTracker};
use crate::capture::{FieldCropper, FieldRole, FrameSource};
use crate::config::{AppConfig, Calibration};
use crate::directory::{Directory, EntityResolver};
use crate::error::{ConfigError, TickError};
use crate::lookup::run_lookup;
use crate::shared::{Disconnected, EventSender, PipelineEvent};
use crate::vision::{RecognizedPair, TextRecognizer};

/// Running scan pipeline
pub struct ScanSession {
    /// Dropped to stop the worker; also wakes a send blocked on a full channel
    stop_tx: Option<Sender<()>>,
    /// Handle to the worker thread
    worker: Option<JoinHandle<()>>,
    resolver: Arc<EntityResolver>,
    events: EventSender,
    history_window: usize,
}

impl ScanSession {
    /// Validate calibration and start the worker
    ///
    /// Calibration that does not fit the frame source fails here, before any
    /// tick runs.
    pub fn start(
        config: &AppConfig,
        calibration: Calibration,
        source: Box<dyn FrameSource>,
        recognizer: TextRecognizer,
        directory: Arc<dyn Directory>,
    ) -> Result<(Self, Receiver<PipelineEvent>), ConfigError> {
        calibration.validate()?;
        let cropper = FieldCropper::new(
            source.origin(),
            source.dimensions(),
            calibration.roi_name,
            calibration.roi_clan,
        )?;

        let (tx, rx) = bounded(config.scan.event_capacity.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let events = EventSender::with_stop(tx, stop_rx.clone());
        let resolver = Arc::new(EntityResolver::new(
            directory,
            config.scan.min_player_similarity,
        ));
        let history_window = config.analytics.history_window;

        let worker = ScanWorker {
            source,
            cropper,
            recognizer,
            tracker: StabilityTracker::new(config.scan.stability()),
            resolver: resolver.clone(),
            events: events.clone(),
            history_window,
            last_fault: None,
        };
        let interval = config.scan.interval();
        let max_ticks = config.scan.max_ticks;
        let handle = std::thread::spawn(move || worker.run(stop_rx, interval, max_ticks));
        info!("Scan session started (interval {:?})", interval);

        Ok((
            Self {
                stop_tx: Some(stop_tx),
                worker: Some(handle),
                resolver,
                events,
                history_window,
            },
            rx,
        ))
    }

    /// Look up a player by hand, outside the tick loop
    ///
    /// Shares the resolver and event channel with the worker.
    pub fn manual_lookup(&self, player_name: &str, clan_name: &str) -> JoinHandle<()> {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let window = self.history_window;
        let player = player_name.trim().to_string();
        let clan = clan_name.trim().to_string();
        std::thread::spawn(move || {
            if run_lookup(&resolver, &events, &player, &clan, window).is_err() {
                debug!("Manual lookup finished after the consumer went away");
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the worker and wait for the current tick to finish
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Scan worker panicked");
            }
            info!("Scan session stopped");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread
struct ScanWorker {
    source: Box<dyn FrameSource>,
    cropper: FieldCropper,
    recognizer: TextRecognizer,
    tracker: StabilityTracker,
    resolver: Arc<EntityResolver>,
    events: EventSender,
    history_window: usize,
    /// Last reported fault, to avoid repeating it every tick
    last_fault: Option<String>,
}

impl ScanWorker {
    fn run(mut self, stop_rx: Receiver<()>, interval: Duration, max_ticks: Option<u64>) {
        let mut ticks = 0u64;
        loop {
            if self.tick().is_err() {
                info!("Events no longer delivered, scan worker exiting");
                break;
            }
            ticks += 1;
            if max_ticks.is_some_and(|max| ticks >= max) {
                info!("Tick limit of {} reached", ticks);
                break;
            }
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                // Session stopped or dropped
                _ => break,
            }
        }
    }

    /// One capture-to-lookup pass; per-tick faults are reported, not returned
    fn tick(&mut self) -> Result<(), Disconnected> {
        let pair = match self.read_pair() {
            Ok(pair) => {
                self.last_fault = None;
                pair
            }
            Err(e) => return self.report_fault(e),
        };

        debug!("{}", pair.summary());
        self.events.send(PipelineEvent::Ocr(pair.summary()))?;

        match self.tracker.observe(&pair) {
            Observation::Stabilized(stable) => {
                info!("Stabilized: name='{}' clan='{}'", stable.name, stable.clan);
                self.events.send(PipelineEvent::Resolved {
                    name: stable.name.clone(),
                    clan: stable.clan.clone(),
                })?;
                run_lookup(
                    &self.resolver,
                    &self.events,
                    &stable.name,
                    &stable.clan,
                    self.history_window,
                )
            }
            _ => Ok(()),
        }
    }

    fn read_pair(&mut self) -> Result<RecognizedPair, TickError> {
        let frame = self.source.capture()?;
        let name_crop = self.cropper.crop(&frame.image, FieldRole::Name)?;
        let clan_crop = self.cropper.crop(&frame.image, FieldRole::Clan)?;
        let pair = RecognizedPair {
            name: self.recognizer.read_field(&name_crop, FieldRole::Name)?,
            clan: self.recognizer.read_field(&clan_crop, FieldRole::Clan)?,
        };
        debug!("Frame read in {:?}", frame.timestamp.elapsed());
        Ok(pair)
    }

    fn report_fault(&mut self, error: TickError) -> Result<(), Disconnected> {
        let message = format!("Tick skipped: {}", error);
        if self.last_fault.as_deref() == Some(message.as_str()) {
            debug!("{}", message);
            return Ok(());
        }
        warn!("{}", message);
        self.events.status(message.clone())?;
        self.last_fault = Some(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedFrame, Roi};
    use crate::directory::models::{BattleRecord, ClanMember, ClanSummary, Player};
    use crate::error::{CaptureError, NetworkError, RecognitionError};
    use crate::vision::{OcrBackend, OcrWord, SegmentationMode};
    use image::{GrayImage, RgbaImage};
    use parking_lot::Mutex;
    use std::time::Instant;

    struct StaticSource {
        fail: bool,
    }

    impl FrameSource for StaticSource {
        fn origin(&self) -> (i32, i32) {
            (100, 50)
        }

        fn dimensions(&self) -> (u32, u32) {
            (200, 100)
        }

        fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
            if self.fail {
                return Err(CaptureError::Backend("display went away".to_string()));
            }
            Ok(CapturedFrame::new(
                RgbaImage::from_pixel(200, 100, image::Rgba([240, 240, 240, 255])),
                self.origin(),
            ))
        }
    }

    /// Name passes read "Max" on psm 8, clan passes read "Drablibe" on psm 6
    struct BannerOcr;

    impl OcrBackend for BannerOcr {
        fn recognize(
            &self,
            _image: &GrayImage,
            mode: SegmentationMode,
        ) -> Result<Vec<OcrWord>, RecognitionError> {
            Ok(match mode {
                SegmentationMode::SingleWord => vec![OcrWord::new("Max", 91.0)],
                SegmentationMode::Block => vec![OcrWord::new("Drablibe", 88.0)],
                SegmentationMode::SingleLine => vec![],
            })
        }
    }

    #[derive(Default)]
    struct CountingDirectory {
        searches: Mutex<Vec<String>>,
    }

    impl Directory for CountingDirectory {
        fn search_clans(&self, name: &str, _limit: u32) -> Result<Vec<ClanSummary>, NetworkError> {
            self.searches.lock().push(name.to_string());
            Ok(vec![ClanSummary {
                tag: "#CLAN".to_string(),
                name: "Drablibe".to_string(),
                member_count: 42,
            }])
        }

        fn clan_members(&self, _clan_tag: &str) -> Result<Vec<ClanMember>, NetworkError> {
            Ok(vec![ClanMember {
                tag: "#P1".to_string(),
                name: "Max".to_string(),
                role: None,
            }])
        }

        fn player(&self, player_tag: &str) -> Result<Player, NetworkError> {
            Ok(Player {
                tag: player_tag.to_string(),
                name: "Max".to_string(),
                ..Default::default()
            })
        }

        fn battle_log(&self, _player_tag: &str) -> Result<Vec<BattleRecord>, NetworkError> {
            Ok(vec![])
        }
    }

    fn calibration() -> Calibration {
        Calibration {
            roi_name: Roi::new(110, 60, 80, 20),
            roi_clan: Roi::new(110, 90, 80, 16),
            capture_region: None,
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.scan.interval_ms = 5;
        config
    }

    /// Collect events until `pred` matches one
    fn wait_for<F: Fn(&PipelineEvent) -> bool>(
        rx: &Receiver<PipelineEvent>,
        pred: F,
    ) -> Vec<PipelineEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(50)) {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        }
        panic!("expected event not received; saw {:?}", seen);
    }

    #[test]
    fn test_out_of_bounds_calibration_fails_at_start() {
        let mut bad = calibration();
        bad.roi_clan = Roi::new(110, 140, 80, 16);
        let result = ScanSession::start(
            &config(),
            bad,
            Box::new(StaticSource { fail: false }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        );
        assert!(matches!(result, Err(ConfigError::RoiOutOfBounds { field: "clan", .. })));
    }

    #[test]
    fn test_stable_opponent_resolved_once() {
        let directory = Arc::new(CountingDirectory::default());
        let (mut session, rx) = ScanSession::start(
            &config(),
            calibration(),
            Box::new(StaticSource { fail: false }),
            TextRecognizer::new(Box::new(BannerOcr)),
            directory.clone(),
        )
        .unwrap();

        let seen = wait_for(&rx, |e| matches!(e, PipelineEvent::Deck(_)));
        assert!(seen.contains(&PipelineEvent::Ocr("[91/88] name='Max' clan='Drablibe'".to_string())));
        assert!(seen.contains(&PipelineEvent::Resolved {
            name: "Max".to_string(),
            clan: "Drablibe".to_string()
        }));

        // Several more ticks of the same opponent
        let ocr_seen = std::cell::Cell::new(0);
        let ticks_after = wait_for(&rx, |e| {
            if matches!(e, PipelineEvent::Ocr(_)) {
                ocr_seen.set(ocr_seen.get() + 1);
            }
            ocr_seen.get() >= 5
        });
        assert!(!ticks_after.iter().any(|e| matches!(e, PipelineEvent::Resolved { .. })));

        session.stop();
        assert!(!session.is_running());
        assert_eq!(*directory.searches.lock(), vec!["Drablibe".to_string()]);
    }

    #[test]
    fn test_capture_fault_reported_once_and_loop_continues() {
        let (session, rx) = ScanSession::start(
            &config(),
            calibration(),
            Box::new(StaticSource { fail: true }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        )
        .unwrap();

        let seen = wait_for(&rx, |e| matches!(e, PipelineEvent::Status(_)));
        assert!(matches!(
            seen.last(),
            Some(PipelineEvent::Status(s)) if s.contains("display went away")
        ));

        std::thread::sleep(Duration::from_millis(100));
        assert!(session.is_running());
        // Identical faults are not repeated
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn test_manual_lookup_shares_channel() {
        let (session, rx) = ScanSession::start(
            &config(),
            calibration(),
            Box::new(StaticSource { fail: true }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        )
        .unwrap();

        session.manual_lookup(" Max ", "Drablibe").join().unwrap();
        let seen = wait_for(&rx, |e| matches!(e, PipelineEvent::Deck(_)));
        assert!(seen.iter().any(|e| matches!(e, PipelineEvent::Deck(p) if p.player.name == "Max")));
    }

    #[test]
    fn test_stop_with_undrained_full_channel() {
        let mut config = config();
        config.scan.event_capacity = 1;
        let (mut session, rx) = ScanSession::start(
            &config,
            calibration(),
            Box::new(StaticSource { fail: false }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        )
        .unwrap();

        // The ocr event fills the channel, the resolved event then waits for room
        std::thread::sleep(Duration::from_millis(300));
        assert!(session.is_running());

        let (done_tx, done_rx) = bounded(1);
        let stopper = std::thread::spawn(move || {
            session.stop();
            let _ = done_tx.send(session.is_running());
        });
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(3)), Ok(false));
        stopper.join().unwrap();
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_tick_limit() {
        let mut config = config();
        config.scan.max_ticks = Some(3);
        let (session, rx) = ScanSession::start(
            &config,
            calibration(),
            Box::new(StaticSource { fail: false }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while session.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!session.is_running());
        let ocr = rx.try_iter().filter(|e| matches!(e, PipelineEvent::Ocr(_))).count();
        assert_eq!(ocr, 3);
    }

    #[test]
    fn test_dropping_receiver_ends_worker() {
        let (session, rx) = ScanSession::start(
            &config(),
            calibration(),
            Box::new(StaticSource { fail: false }),
            TextRecognizer::new(Box::new(BannerOcr)),
            Arc::new(CountingDirectory::default()),
        )
        .unwrap();
        drop(rx);

        let deadline = Instant::now() + Duration::from_secs(10);
        while session.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!session.is_running());
    }
}
