use airgrid_core::{DATE_FORMAT, Dataset, RunId};
use chrono::NaiveDate;
use std::fmt;

/// Storage path for one acquisition: `{source}/{dataset}/{YYYY-MM-DD}/{run_id}.{ext}`.
///
/// Rendering is a pure function of the fields, so any consumer holding the
/// same (source, dataset, date, run id, extension) rebuilds the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub source: String,
    pub dataset: Dataset,
    pub date: NaiveDate,
    pub run_id: RunId,
    pub extension: String,
}

impl ObjectKey {
    pub fn new(
        source: impl Into<String>,
        dataset: Dataset,
        date: NaiveDate,
        run_id: RunId,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            dataset,
            date,
            run_id,
            extension: extension.into(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}{}.{}",
            Self::prefix(&self.source, self.dataset, self.date),
            self.run_id,
            self.extension
        )
    }

    /// Shared prefix of every run stored for one (source, dataset, date).
    pub fn prefix(source: &str, dataset: Dataset, date: NaiveDate) -> String {
        format!("{source}/{dataset}/{}/", date.format(DATE_FORMAT))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
