//! Run driver: the callback surface offered to the transport engine and the
//! loops that feed events through it.
//!
//! The transport engine owns the physics. For every event it calls
//! [`RunWorker::begin_event`], then [`RunWorker::process_hit`] once per
//! photon accepted by the sensitive surface, then [`RunWorker::end_event`].
//! Engines plug in through [`EventSource`]; [`photon_gun::PhotonGun`] is the
//! stand-in source used when no engine is attached.
//!
//! In multi-worker mode every thread owns its own [`RunWorker`], so nothing
//! mutable is shared. The [`DetectorGeometry`] and its calibration are
//! borrowed read-only by all of them.

pub mod photon_gun;

use std::sync::Arc;

use log::{error, info, warn};

use crate::error::{ConfigurationError, OutputError, TeststandError};
use crate::geometry::DetectorGeometry;
use crate::recording::{
    CaptureSettings, HitRecorder, OutputNaming, PhotonHit, RunSession, RunSummary,
};

pub use photon_gun::{PhotonGun, PhotonGunConfig};

/// Position of an event within the run of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventProgress {
    pub worker: usize,
    /// Zero-based index of the event being started
    pub event_index: u64,
    pub total_events: u64,
}

/// Observer notified as each event begins
pub type ProgressCallback = Arc<dyn Fn(EventProgress) + Send + Sync>;

/// Receives the photons of the event in progress
pub trait HitSink {
    fn deliver(&mut self, hit: &PhotonHit<'_>) -> Result<(), TeststandError>;
}

/// Produces the hits of one event
pub trait EventSource {
    fn generate(&mut self, event_id: u32, sink: &mut dyn HitSink) -> Result<(), TeststandError>;
}

/// One isolated recorder and output session, driven event by event
pub struct RunWorker {
    worker: usize,
    recorder: HitRecorder,
    session: RunSession,
    progress: Option<ProgressCallback>,
    total_events: u64,
    events_begun: u64,
}

impl RunWorker {
    /// Worker recording hits on the geometry's sensitive surface.
    pub fn new(geometry: &DetectorGeometry, capture: CaptureSettings, session: RunSession) -> Self {
        Self {
            worker: session.worker().unwrap_or(0),
            recorder: HitRecorder::new(geometry.sensitive_volume(), capture),
            session,
            progress: None,
            total_events: 0,
            events_begun: 0,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn recorder(&self) -> &HitRecorder {
        &self.recorder
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn begin_run(&mut self, run_id: u32, total_events: u64) -> Result<(), TeststandError> {
        self.session.begin_run(run_id)?;
        self.total_events = total_events;
        self.events_begun = 0;
        info!(
            "Worker {} starting run {} with {} events",
            self.worker, run_id, total_events
        );
        Ok(())
    }

    pub fn begin_event(&mut self, event_id: u32) -> Result<(), TeststandError> {
        self.recorder.begin_event(event_id)?;
        if let Err(e) = self.session.begin_event(event_id) {
            self.recorder.abort_event();
            return Err(e.into());
        }

        if let Some(progress) = &self.progress {
            progress(EventProgress {
                worker: self.worker,
                event_index: self.events_begun,
                total_events: self.total_events,
            });
        }
        self.events_begun += 1;
        Ok(())
    }

    /// Record one photon. Any failure discards the open event.
    pub fn process_hit(&mut self, hit: &PhotonHit<'_>) -> Result<(), TeststandError> {
        let result = self.recorder.record_hit(hit, &mut self.session);
        if result.is_err() {
            self.abort_event();
        }
        result
    }

    /// Emit the event's aggregate and commit its rows to the artifact.
    pub fn end_event(&mut self) -> Result<(), TeststandError> {
        let result = self
            .recorder
            .end_event(&mut self.session)
            .and_then(|_| self.session.commit_event().map_err(TeststandError::from));
        if result.is_err() {
            self.abort_event();
        }
        result
    }

    /// Discard the open event, if any, in both recorder and session.
    pub fn abort_event(&mut self) {
        self.recorder.abort_event();
        self.session.abort_event();
    }

    /// Finalize the artifact with every committed event.
    pub fn end_run(&mut self) -> Result<RunSummary, OutputError> {
        self.abort_event();
        self.session.end_run()
    }

    /// Drive one event from `source` through begin, hits and end.
    pub fn run_event<S: EventSource + ?Sized>(
        &mut self,
        event_id: u32,
        source: &mut S,
    ) -> Result<(), TeststandError> {
        self.begin_event(event_id)?;
        if let Err(e) = source.generate(event_id, self) {
            self.abort_event();
            return Err(e);
        }
        self.end_event()
    }
}

impl HitSink for RunWorker {
    fn deliver(&mut self, hit: &PhotonHit<'_>) -> Result<(), TeststandError> {
        self.process_hit(hit)
    }
}

/// Run every event in order on one worker.
///
/// The artifact is finalized even when an event faults, so events committed
/// before the fault remain on disk. The fault is then returned.
pub fn run_sequential<S, I>(
    worker: &mut RunWorker,
    source: &mut S,
    run_id: u32,
    event_ids: I,
) -> Result<RunSummary, TeststandError>
where
    S: EventSource + ?Sized,
    I: IntoIterator<Item = u32>,
{
    let event_ids: Vec<u32> = event_ids.into_iter().collect();
    worker.begin_run(run_id, event_ids.len() as u64)?;

    let outcome = event_ids
        .iter()
        .try_for_each(|&event_id| worker.run_event(event_id, source));
    let summary = worker.end_run();

    match outcome {
        Ok(()) => Ok(summary?),
        Err(fault) => {
            match summary {
                Ok(summary) => warn!(
                    "Run {} stopped after {} committed events: {}",
                    run_id, summary.events, fault
                ),
                Err(e) => error!("Run {run_id} could not be finalized after a fault: {e}"),
            }
            Err(fault)
        }
    }
}

/// Everything a multi-worker run needs besides the geometry and the source
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_id: u32,
    pub total_events: u32,
    pub workers: usize,
    pub capture: CaptureSettings,
    pub naming: OutputNaming,
}

impl RunPlan {
    /// Global event ids handled by `worker`, assigned round robin.
    pub fn events_for(&self, worker: usize) -> impl Iterator<Item = u32> {
        (worker as u32..self.total_events).step_by(self.workers.max(1))
    }
}

/// Result of one worker in a multi-worker run
#[derive(Debug)]
pub struct WorkerOutcome {
    pub worker: usize,
    pub result: Result<RunSummary, TeststandError>,
}

/// Run the plan on `plan.workers` scoped threads.
///
/// Each worker builds its own source with `make_source(worker)` and writes
/// its own artifact. A failing worker does not stop its siblings; every
/// outcome is returned, ordered by worker.
pub fn run_parallel<S, F>(
    geometry: &DetectorGeometry,
    plan: &RunPlan,
    progress: Option<ProgressCallback>,
    make_source: F,
) -> Result<Vec<WorkerOutcome>, ConfigurationError>
where
    S: EventSource,
    F: Fn(usize) -> S + Sync,
{
    if plan.workers == 0 {
        return Err(ConfigurationError::InvalidWorkerCount(plan.workers));
    }

    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..plan.workers)
            .map(|worker_id| {
                let progress = progress.clone();
                let make_source = &make_source;
                scope.spawn(move || {
                    let session = if plan.workers > 1 {
                        RunSession::for_worker(plan.naming.clone(), worker_id)
                    } else {
                        RunSession::new(plan.naming.clone())
                    };
                    let mut worker = RunWorker::new(geometry, plan.capture, session);
                    if let Some(progress) = progress {
                        worker = worker.with_progress(progress);
                    }

                    let mut source = make_source(worker_id);
                    let result = run_sequential(
                        &mut worker,
                        &mut source,
                        plan.run_id,
                        plan.events_for(worker_id),
                    );
                    if let Err(e) = &result {
                        error!("Worker {worker_id} failed run {}: {e}", plan.run_id);
                    }
                    WorkerOutcome {
                        worker: worker_id,
                        result,
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsistencyError;
    use crate::geometry::{LayerSpec, ShellGeometryBuilder};
    use crate::optics::{CalibrationCurve, MaterialCatalog, MaterialKind};
    use crate::recording::read_artifact;
    use crate::units::{Length, LengthExt, Time, TimeExt};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn geometry() -> DetectorGeometry {
        let calibration =
            CalibrationCurve::from_samples("test", vec![(300.0, 20.0), (500.0, 20.0)]).unwrap();
        ShellGeometryBuilder::new(Length::from_millimeters(127.0), Length::from_millimeters(-80.0))
            .layer(LayerSpec::new(
                "PMTWindow",
                MaterialKind::PyrexGlass,
                Length::from_millimeters(3.0),
            ))
            .build(MaterialCatalog::standard().unwrap(), calibration)
            .unwrap()
    }

    /// Emits `hits` photons per event on the given location
    struct FixedSource {
        location: &'static str,
        hits: u32,
    }

    impl EventSource for FixedSource {
        fn generate(
            &mut self,
            event_id: u32,
            sink: &mut dyn HitSink,
        ) -> Result<(), TeststandError> {
            for i in 0..self.hits {
                sink.deliver(&PhotonHit {
                    detector_id: i % 2,
                    location: self.location,
                    wavelength: Length::from_nanometers(400.0),
                    time: Time::from_nanoseconds(event_id as f64 + i as f64),
                })?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_sequential_run() {
        let dir = TempDir::new().unwrap();
        let geometry = geometry();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let session = RunSession::new(naming);
        let mut worker = RunWorker::new(&geometry, CaptureSettings::default(), session)
            .with_progress(Arc::new(move |p: EventProgress| seen_clone.lock().unwrap().push(p)));
        let mut source = FixedSource {
            location: "PMT_phys",
            hits: 3,
        };

        let summary = run_sequential(&mut worker, &mut source, 0, 0..4).unwrap();
        assert_eq!(summary.events, 4);
        assert_eq!(summary.photon_rows, 12);
        assert_eq!(summary.total_rows, 8);

        let progress = seen.lock().unwrap();
        assert_eq!(progress.len(), 4);
        assert_eq!(
            progress[3],
            EventProgress {
                worker: 0,
                event_index: 3,
                total_events: 4
            }
        );
    }

    #[test]
    fn test_fault_keeps_earlier_events() {
        struct FaultOnEvent(u32);
        impl EventSource for FaultOnEvent {
            fn generate(
                &mut self,
                event_id: u32,
                sink: &mut dyn HitSink,
            ) -> Result<(), TeststandError> {
                let location = if event_id == self.0 { "PMTWindow_phys" } else { "PMT_phys" };
                for detector_id in 0..2 {
                    sink.deliver(&PhotonHit {
                        detector_id,
                        location: "PMT_phys",
                        wavelength: Length::from_nanometers(400.0),
                        time: Time::from_nanoseconds(1.0),
                    })?;
                }
                sink.deliver(&PhotonHit {
                    detector_id: 0,
                    location,
                    wavelength: Length::from_nanometers(410.0),
                    time: Time::from_nanoseconds(2.0),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let geometry = geometry();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let session = RunSession::new(naming);
        let mut worker = RunWorker::new(&geometry, CaptureSettings::default(), session);

        let err = run_sequential(&mut worker, &mut FaultOnEvent(2), 1, 0..5).unwrap_err();
        assert!(matches!(
            err,
            TeststandError::Consistency(ConsistencyError::UnexpectedSurface { event_id: 2, .. })
        ));

        let tables = read_artifact(dir.path().join("output1.csv")).unwrap();
        let events: Vec<u32> = tables.total_hits.iter().map(|row| row.event_id).collect();
        assert_eq!(events, vec![0, 0, 1, 1]);
        assert!(tables.photon_hits.iter().all(|row| row.event_id < 2));
        assert_eq!(tables.photon_hits.len(), 6);
    }

    #[test]
    fn test_parallel_workers_write_distinct_artifacts() {
        let dir = TempDir::new().unwrap();
        let geometry = geometry();
        let plan = RunPlan {
            run_id: 7,
            total_events: 10,
            workers: 3,
            capture: CaptureSettings::default(),
            naming: OutputNaming::new(dir.path().join("output.csv")).unwrap(),
        };

        let outcomes = run_parallel(&geometry, &plan, None, |_| FixedSource {
            location: "PMT_phys",
            hits: 1,
        })
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        let mut all_events = Vec::new();
        for outcome in outcomes {
            let summary = outcome.result.unwrap();
            let path = summary.artifact.unwrap();
            assert_eq!(path, dir.path().join(format!("output7_w{}.csv", outcome.worker)));
            let tables = read_artifact(&path).unwrap();
            all_events.extend(tables.total_hits.iter().map(|row| row.event_id));
        }
        all_events.sort_unstable();
        assert_eq!(all_events, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_round_robin_assignment() {
        let plan = RunPlan {
            run_id: 0,
            total_events: 7,
            workers: 3,
            capture: CaptureSettings::default(),
            naming: OutputNaming::new("output.csv").unwrap(),
        };
        assert_eq!(plan.events_for(0).collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(plan.events_for(1).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(plan.events_for(2).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let geometry = geometry();
        let plan = RunPlan {
            run_id: 0,
            total_events: 1,
            workers: 0,
            capture: CaptureSettings::default(),
            naming: OutputNaming::new("output.csv").unwrap(),
        };
        let result = run_parallel(&geometry, &plan, None, |_| FixedSource {
            location: "PMT_phys",
            hits: 1,
        });
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidWorkerCount(0))
        ));
    }
}
