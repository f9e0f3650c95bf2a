//! The per-participant emission log.
//!
//! One semicolon-delimited line per answered trial, preceded by a header that
//! also carries both sequences so a result file can be analysed on its own.

use crate::components::pair::SequencePair;
use crate::components::selector::EmissionRecord;
use crate::error::SrttError;
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const HEADER_FIELDS: &str =
    "block;item;reaction_time;time_from_start;answer;reg_item;irreg_item;shown_item;seq_shown";

/// `result_<id>_<YYYY-MM-DD_hh-mm-ss>.txt`
pub fn participant_file_name(participant_id: u32, at: DateTime<Local>) -> String {
    format!(
        "result_{}_{}.txt",
        participant_id,
        at.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Writes emission records to any `Write` sink.
pub struct EmissionLog<W: Write> {
    writer: W,
    records: usize,
}

impl EmissionLog<BufWriter<File>> {
    /// Opens (appending) the result file for `participant_id` in `dir` and
    /// writes the header.
    pub fn create_in(
        dir: &Path,
        participant_id: u32,
        pair: &SequencePair,
    ) -> Result<(Self, PathBuf), SrttError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(participant_file_name(participant_id, Local::now()));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let log = Self::new(BufWriter::new(file), pair)?;
        Ok((log, path))
    }
}

impl<W: Write> EmissionLog<W> {
    /// Wraps `writer` and writes the header line.
    pub fn new(mut writer: W, pair: &SequencePair) -> Result<Self, SrttError> {
        writeln!(
            writer,
            "{};{};{}",
            HEADER_FIELDS,
            pair.regular().digits(),
            pair.irregular().digits()
        )?;
        writer.flush()?;
        Ok(Self { writer, records: 0 })
    }

    /// Appends one record and flushes, so a crash loses at most the trial in
    /// flight.
    pub fn write_record(&mut self, record: &EmissionRecord) -> Result<(), SrttError> {
        writeln!(self.writer, "{record}")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
