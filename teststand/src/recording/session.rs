//! Output artifact lifecycle of one run on one worker.
//!
//! The session owns the artifact path, creates the file when the first event
//! of the run begins and finalizes it when the run ends. A run that never
//! begins an event leaves nothing on disk.
//!
//! Rows emitted while an event is open are staged here and only reach the
//! artifact when the event commits, so an aborted event leaves no trace while
//! every event committed before it stays valid.

use std::path::{Path, PathBuf};

use log::{info, warn};

use super::artifact::ArtifactWriter;
use super::tables::{HitTables, PhotonHitRow, TableSink, TotalHitsRow};
use crate::error::{ConfigurationError, OutputError};

/// Splits the configured output name so a run token can be inserted before
/// the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    directory: PathBuf,
    stem: String,
    extension: String,
}

impl OutputNaming {
    /// Extension applied when the configured name has none
    pub const DEFAULT_EXTENSION: &'static str = "csv";

    pub fn new<P: AsRef<Path>>(configured: P) -> Result<Self, ConfigurationError> {
        let configured = configured.as_ref();
        let stem = configured
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or(ConfigurationError::EmptyOutputName)?;

        let extension = match configured.extension() {
            Some(extension) if !extension.is_empty() => extension.to_string_lossy().into_owned(),
            _ => {
                warn!(
                    "Output name {} has no extension, using .{}",
                    configured.display(),
                    Self::DEFAULT_EXTENSION
                );
                Self::DEFAULT_EXTENSION.to_string()
            }
        };

        let directory = configured
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            directory,
            stem,
            extension,
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `{stem}{run}.{ext}`, or `{stem}{run}_w{worker}.{ext}` when several
    /// workers write concurrently.
    pub fn artifact_path(&self, run_id: u32, worker: Option<usize>) -> PathBuf {
        let file_name = match worker {
            Some(worker) => format!("{}{}_w{}.{}", self.stem, run_id, worker, self.extension),
            None => format!("{}{}.{}", self.stem, run_id, self.extension),
        };
        self.directory.join(file_name)
    }
}

/// What a finished run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: u32,
    pub worker: Option<usize>,
    /// Events committed to the artifact
    pub events: u64,
    /// Events discarded after a fault
    pub aborted_events: u64,
    /// `None` when the run never began an event
    pub artifact: Option<PathBuf>,
    pub photon_rows: u64,
    pub total_rows: u64,
}

#[derive(Debug)]
struct OpenRun {
    run_id: u32,
    writer: Option<ArtifactWriter>,
    open_event: Option<u32>,
    staged: HitTables,
    events: u64,
    aborted_events: u64,
}

/// Owns the artifact of the run in progress
pub struct RunSession {
    naming: OutputNaming,
    worker: Option<usize>,
    run: Option<OpenRun>,
}

impl RunSession {
    /// Session for a single worker; artifact names carry only the run id.
    pub fn new(naming: OutputNaming) -> Self {
        Self {
            naming,
            worker: None,
            run: None,
        }
    }

    /// Session for one of several concurrent workers.
    pub fn for_worker(naming: OutputNaming, worker: usize) -> Self {
        Self {
            naming,
            worker: Some(worker),
            run: None,
        }
    }

    pub fn worker(&self) -> Option<usize> {
        self.worker
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    /// Path the artifact of `run_id` is written to.
    pub fn artifact_path(&self, run_id: u32) -> PathBuf {
        self.naming.artifact_path(run_id, self.worker)
    }

    pub fn is_run_open(&self) -> bool {
        self.run.is_some()
    }

    pub fn begin_run(&mut self, run_id: u32) -> Result<(), OutputError> {
        if let Some(run) = &self.run {
            return Err(OutputError::Lifecycle(format!(
                "run {run_id} begun while run {} is still open",
                run.run_id
            )));
        }
        self.run = Some(OpenRun {
            run_id,
            writer: None,
            open_event: None,
            staged: HitTables::new(),
            events: 0,
            aborted_events: 0,
        });
        Ok(())
    }

    fn open_run(&mut self, operation: &str) -> Result<&mut OpenRun, OutputError> {
        self.run
            .as_mut()
            .ok_or_else(|| OutputError::Lifecycle(format!("{operation} with no open run")))
    }

    /// Open an event, creating the artifact if this is the first one.
    pub fn begin_event(&mut self, event_id: u32) -> Result<(), OutputError> {
        let path = self
            .run
            .as_ref()
            .map(|run| self.naming.artifact_path(run.run_id, self.worker));
        let run = self.open_run("event begin")?;

        if let Some(open) = run.open_event {
            return Err(OutputError::Lifecycle(format!(
                "event {event_id} begun while event {open} is still open"
            )));
        }

        if run.writer.is_none() {
            if let Some(path) = path {
                run.writer = Some(ArtifactWriter::create(path)?);
            }
        }

        run.staged.clear();
        run.open_event = Some(event_id);
        Ok(())
    }

    /// Write the staged rows of the open event to the artifact.
    pub fn commit_event(&mut self) -> Result<(), OutputError> {
        let run = self.open_run("event commit")?;
        if run.open_event.take().is_none() {
            return Err(OutputError::Lifecycle(
                "event commit with no open event".to_string(),
            ));
        }

        let staged = std::mem::take(&mut run.staged);
        let writer = run
            .writer
            .as_mut()
            .ok_or_else(|| {
                OutputError::Lifecycle("event commit before artifact open".to_string())
            })?;
        writer.commit_event(&staged.photon_hits, &staged.total_hits)?;
        run.events += 1;
        Ok(())
    }

    /// Drop every row staged for the open event.
    pub fn abort_event(&mut self) {
        if let Some(run) = self.run.as_mut() {
            if let Some(event_id) = run.open_event.take() {
                warn!(
                    "Run {}: discarding {} staged rows of event {}",
                    run.run_id,
                    run.staged.photon_hits.len() + run.staged.total_hits.len(),
                    event_id
                );
                run.staged.clear();
                run.aborted_events += 1;
            }
        }
    }

    /// Finalize the artifact, if one was created, and close the run.
    pub fn end_run(&mut self) -> Result<RunSummary, OutputError> {
        self.abort_event();
        let run = self
            .run
            .take()
            .ok_or_else(|| OutputError::Lifecycle("run end with no open run".to_string()))?;

        let mut summary = RunSummary {
            run_id: run.run_id,
            worker: self.worker,
            events: run.events,
            aborted_events: run.aborted_events,
            artifact: None,
            photon_rows: 0,
            total_rows: 0,
        };

        match run.writer {
            Some(writer) => {
                let path = writer.path().to_path_buf();
                let stats = writer.finish()?;
                info!(
                    "Run {} wrote {} events to {} ({} photon rows, {} total rows)",
                    run.run_id,
                    run.events,
                    path.display(),
                    stats.photon_rows,
                    stats.total_rows
                );
                summary.artifact = Some(path);
                summary.photon_rows = stats.photon_rows;
                summary.total_rows = stats.total_rows;
            }
            None => info!("Run {} processed no events, no artifact written", run.run_id),
        }

        Ok(summary)
    }

    fn staging(&mut self, table: &str) -> Result<&mut HitTables, OutputError> {
        let run = self.open_run(table)?;
        if run.open_event.is_none() {
            return Err(OutputError::Lifecycle(format!(
                "{table} row emitted with no open event"
            )));
        }
        Ok(&mut run.staged)
    }
}

impl TableSink for RunSession {
    fn push_photon_hit(&mut self, row: PhotonHitRow) -> Result<(), OutputError> {
        self.staging(PhotonHitRow::TABLE)?.push_photon_hit(row)
    }

    fn push_total_hits(&mut self, row: TotalHitsRow) -> Result<(), OutputError> {
        self.staging(TotalHitsRow::TABLE)?.push_total_hits(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::artifact::read_artifact;
    use tempfile::TempDir;

    fn photon(event_id: u32) -> PhotonHitRow {
        PhotonHitRow {
            event_id,
            detector_id: 0,
            wavelength_nm: 400.0,
            time_ns: 5.0,
        }
    }

    fn totals(event_id: u32, hit_count: u64) -> TotalHitsRow {
        TotalHitsRow {
            event_id,
            detector_id: 0,
            hit_count,
        }
    }

    #[test]
    fn test_naming() {
        let naming = OutputNaming::new("output.csv").unwrap();
        assert_eq!(naming.artifact_path(0, None), PathBuf::from("output0.csv"));
        assert_eq!(naming.artifact_path(12, None), PathBuf::from("output12.csv"));
        assert_eq!(
            naming.artifact_path(3, Some(1)),
            PathBuf::from("output3_w1.csv")
        );

        let nested = OutputNaming::new("results/scan.dat").unwrap();
        assert_eq!(
            nested.artifact_path(2, None),
            PathBuf::from("results").join("scan2.dat")
        );
    }

    #[test]
    fn test_naming_default_extension() {
        let naming = OutputNaming::new("output").unwrap();
        assert_eq!(naming.extension(), "csv");
        assert_eq!(naming.artifact_path(0, None), PathBuf::from("output0.csv"));
    }

    #[test]
    fn test_naming_rejects_empty() {
        assert!(matches!(
            OutputNaming::new(""),
            Err(ConfigurationError::EmptyOutputName)
        ));
    }

    #[test]
    fn test_zero_event_run_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let mut session = RunSession::new(naming);

        session.begin_run(0).unwrap();
        let summary = session.end_run().unwrap();

        assert_eq!(summary.events, 0);
        assert_eq!(summary.artifact, None);
        assert!(!session.artifact_path(0).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_committed_and_aborted_events() {
        let dir = TempDir::new().unwrap();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let mut session = RunSession::new(naming);

        session.begin_run(5).unwrap();
        session.begin_event(0).unwrap();
        session.push_photon_hit(photon(0)).unwrap();
        session.push_total_hits(totals(0, 1)).unwrap();
        session.commit_event().unwrap();

        session.begin_event(1).unwrap();
        session.push_photon_hit(photon(1)).unwrap();
        session.abort_event();

        let summary = session.end_run().unwrap();
        assert_eq!(summary.run_id, 5);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.aborted_events, 1);
        assert_eq!(summary.photon_rows, 1);
        assert_eq!(summary.total_rows, 1);

        let path = summary.artifact.unwrap();
        assert_eq!(path, dir.path().join("output5.csv"));

        let tables = read_artifact(&path).unwrap();
        assert_eq!(tables.photon_hits, vec![photon(0)]);
        assert_eq!(tables.total_hits, vec![totals(0, 1)]);
    }

    #[test]
    fn test_rows_outside_event_rejected() {
        let dir = TempDir::new().unwrap();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let mut session = RunSession::new(naming);

        assert!(matches!(
            session.push_photon_hit(photon(0)),
            Err(OutputError::Lifecycle(_))
        ));
        session.begin_run(0).unwrap();
        assert!(matches!(
            session.push_total_hits(totals(0, 1)),
            Err(OutputError::Lifecycle(_))
        ));
        assert!(matches!(
            session.commit_event(),
            Err(OutputError::Lifecycle(_))
        ));
        assert!(matches!(
            session.begin_run(1),
            Err(OutputError::Lifecycle(_))
        ));
    }

    #[test]
    fn test_unfinished_event_dropped_at_run_end() {
        let dir = TempDir::new().unwrap();
        let naming = OutputNaming::new(dir.path().join("output.csv")).unwrap();
        let mut session = RunSession::for_worker(naming, 2);

        session.begin_run(1).unwrap();
        session.begin_event(0).unwrap();
        session.push_photon_hit(photon(0)).unwrap();
        let summary = session.end_run().unwrap();

        assert_eq!(summary.worker, Some(2));
        assert_eq!(summary.events, 0);
        assert_eq!(summary.aborted_events, 1);
        let path = summary.artifact.unwrap();
        assert_eq!(path, dir.path().join("output1_w2.csv"));
        assert!(read_artifact(&path).unwrap().is_empty());
        assert!(!session.is_run_open());
    }

    #[test]
    fn test_open_failure_reported() {
        let dir = TempDir::new().unwrap();
        let naming = OutputNaming::new(dir.path().join("absent").join("output.csv")).unwrap();
        let mut session = RunSession::new(naming);

        session.begin_run(0).unwrap();
        assert!(matches!(
            session.begin_event(0),
            Err(OutputError::Open { .. })
        ));
    }
}
