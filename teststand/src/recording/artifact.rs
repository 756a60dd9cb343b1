//! On-disk run artifact.
//!
//! One text file per run and worker, holding both tables as CSV sections:
//!
//! ```text
//! [PhotonHits]
//! evtID,det_uid,wavelength_in_nm,time_in_ns
//! 0,0,412.5,17.25
//!
//! [TotalHits]
//! evtID,det_uid,hit_count
//! 0,0,1
//! ```
//!
//! Rows reach disk as events commit. `PhotonHits` rows go straight into the
//! artifact, `TotalHits` rows into a sidecar file next to it (see
//! [`totals_sidecar_path`]). Both writers are flushed together at every
//! commit, so at any moment the two tables on disk cover the same committed
//! events. [`ArtifactWriter::finish`] appends the sidecar as the `TotalHits`
//! section and removes it.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use log::debug;
use serde::de::DeserializeOwned;

use super::tables::{HitTables, PhotonHitRow, TotalHitsRow};
use crate::error::OutputError;

fn section_marker(table: &str) -> String {
    format!("[{table}]")
}

/// Path of the file holding committed `TotalHits` rows of an unfinished artifact.
pub fn totals_sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().unwrap_or_default().to_os_string();
    name.push(".totals");
    artifact.with_file_name(name)
}

fn create_csv(path: &Path) -> Result<csv::Writer<File>, OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file))
}

fn write_error<'a>(
    table: &'static str,
    path: &'a Path,
) -> impl FnOnce(csv::Error) -> OutputError + 'a {
    move |source| OutputError::Write {
        table,
        path: path.to_path_buf(),
        source,
    }
}

/// Row counts of a finalized artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArtifactStats {
    pub photon_rows: u64,
    pub total_rows: u64,
}

/// Streaming writer for one run artifact
pub struct ArtifactWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    totals_path: PathBuf,
    totals: csv::Writer<File>,
    stats: ArtifactStats,
}

impl ArtifactWriter {
    /// Create the artifact with its `PhotonHits` section header, and the
    /// empty `TotalHits` sidecar.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, OutputError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = create_csv(&path)?;
        writer
            .write_record([section_marker(PhotonHitRow::TABLE)])
            .and_then(|_| writer.write_record(PhotonHitRow::COLUMNS))
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(write_error(PhotonHitRow::TABLE, &path))?;

        let totals_path = totals_sidecar_path(&path);
        let totals = create_csv(&totals_path)?;

        debug!("Opened output artifact {}", path.display());
        Ok(Self {
            path,
            writer,
            totals_path,
            totals,
            stats: ArtifactStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the rows of one committed event and flush both tables.
    pub fn commit_event(
        &mut self,
        photon_hits: &[PhotonHitRow],
        total_hits: &[TotalHitsRow],
    ) -> Result<(), OutputError> {
        for row in photon_hits {
            self.writer
                .serialize(row)
                .map_err(write_error(PhotonHitRow::TABLE, &self.path))?;
        }
        for row in total_hits {
            self.totals
                .serialize(row)
                .map_err(write_error(TotalHitsRow::TABLE, &self.totals_path))?;
        }

        self.writer
            .flush()
            .map_err(|e| write_error(PhotonHitRow::TABLE, &self.path)(e.into()))?;
        self.totals
            .flush()
            .map_err(|e| write_error(TotalHitsRow::TABLE, &self.totals_path)(e.into()))?;

        self.stats.photon_rows += photon_hits.len() as u64;
        self.stats.total_rows += total_hits.len() as u64;
        Ok(())
    }

    /// Append the `TotalHits` section from the sidecar, sync the artifact and
    /// remove the sidecar.
    pub fn finish(self) -> Result<ArtifactStats, OutputError> {
        let Self {
            path,
            mut writer,
            totals_path,
            mut totals,
            stats,
        } = self;

        // Blank separator line between the sections
        writer
            .flush()
            .map_err(csv::Error::from)
            .and_then(|_| {
                let mut file: &File = writer.get_ref();
                file.write_all(b"\n").map_err(csv::Error::from)
            })
            .and_then(|_| writer.write_record([section_marker(TotalHitsRow::TABLE)]))
            .and_then(|_| writer.write_record(TotalHitsRow::COLUMNS))
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(write_error(TotalHitsRow::TABLE, &path))?;

        let finalize = |source: io::Error| OutputError::Finalize {
            path: path.clone(),
            source,
        };
        totals.flush().map_err(finalize)?;
        drop(totals);

        let mut sidecar = File::open(&totals_path).map_err(finalize)?;
        let mut file: &File = writer.get_ref();
        io::copy(&mut sidecar, &mut file).map_err(finalize)?;
        file.sync_all().map_err(finalize)?;
        fs::remove_file(&totals_path).map_err(finalize)?;

        debug!(
            "Finalized {} with {} photon rows, {} total rows",
            path.display(),
            stats.photon_rows,
            stats.total_rows
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("path", &self.path)
            .field("totals_path", &self.totals_path)
            .field("stats", &self.stats)
            .finish()
    }
}

fn parse_section<T: DeserializeOwned>(
    path: &Path,
    table: &str,
    text: &str,
) -> Result<Vec<T>, OutputError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(index, record)| {
            record.map_err(|e| OutputError::Read {
                path: path.to_path_buf(),
                reason: format!("{table} row {}: {e}", index + 1),
            })
        })
        .collect()
}

/// Read both tables of a finalized artifact back into memory.
pub fn read_artifact<P: AsRef<Path>>(path: P) -> Result<HitTables, OutputError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| OutputError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let missing = |table: &str| OutputError::Read {
        path: path.to_path_buf(),
        reason: format!("missing {} section", section_marker(table)),
    };

    let photon_marker = section_marker(PhotonHitRow::TABLE);
    let total_marker = section_marker(TotalHitsRow::TABLE);

    let photon_start = text
        .find(&photon_marker)
        .ok_or_else(|| missing(PhotonHitRow::TABLE))?;
    let total_start = text
        .find(&total_marker)
        .filter(|&start| start > photon_start)
        .ok_or_else(|| missing(TotalHitsRow::TABLE))?;

    let photon_text = text[photon_start + photon_marker.len()..total_start].trim();
    let total_text = text[total_start + total_marker.len()..].trim();

    Ok(HitTables {
        photon_hits: parse_section(path, PhotonHitRow::TABLE, photon_text)?,
        total_hits: parse_section(path, TotalHitsRow::TABLE, total_text)?,
    })
}
