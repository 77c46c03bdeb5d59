//! Bookkeeping for precache initialization passes.

use super::connection::StoreDb;
use crate::Error;
use tokio_rusqlite::params;

/// Record of one initialization pass.
#[derive(Debug, Clone)]
pub struct InstallRun {
    pub started_at: String,
    pub finished_at: String,
    pub manifest_len: usize,
    pub fetched: usize,
    pub outcome: String,
}

impl StoreDb {
    /// Append a run record. Diagnostics only; never read on the serve path.
    pub async fn record_install(&self, run: InstallRun) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO install_runs (started_at, finished_at, manifest_len, fetched, outcome)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        &run.started_at,
                        &run.finished_at,
                        run.manifest_len as i64,
                        run.fetched as i64,
                        &run.outcome,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
