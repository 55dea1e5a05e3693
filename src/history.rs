use crate::round_session::RoundStats;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// One line of `history.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Local>,
    pub round: u8,
    pub reason: String,
    pub correct: u32,
    pub errors: u32,
    pub max_errors: u32,
    pub total_time: f64,
    pub score: f64,
    pub mean_response: Option<f64>,
    pub cumulative_correct: u32,
}

impl HistoryRecord {
    pub fn from_stats(stats: &RoundStats, cumulative_correct: u32, date: DateTime<Local>) -> Self {
        Self {
            date,
            round: stats.round.number(),
            reason: stats.reason.to_string(),
            correct: stats.correct_answers,
            errors: stats.errors,
            max_errors: stats.max_errors,
            total_time: (stats.total_time * 100.0).round() / 100.0,
            score: (stats.score * 100.0).round() / 100.0,
            mean_response: stats.mean_response().map(|m| (m * 100.0).round() / 100.0),
            cumulative_correct,
        }
    }
}

/// Append-only CSV log of finished rounds
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // a new file needs a header row
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        debug!(path = %self.path.display(), round = record.round, "history appended");
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader.deserialize().collect::<Result<Vec<HistoryRecord>, _>>()?;
        Ok(records)
    }

    /// Highest score ever recorded for `round`
    pub fn best_score(&self, round: u8) -> Result<Option<f64>, HistoryError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.round == round)
            .map(|r| r.score)
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s)))))
    }
}
