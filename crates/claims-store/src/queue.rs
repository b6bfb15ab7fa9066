//! Background writer for region saves.
//!
//! ```text
//!  ClaimService ──save/delete──▶ SaveQueue ──crossbeam──▶ worker thread ──▶ ClaimDb
//! ```
//!
//! Jobs are applied in the order they were sent. Both modes go through the
//! worker; in [`SaveMode::Sync`] each write carries a reply channel and the
//! caller blocks on its [`Receipt`]. A failed job is logged and dropped; the
//! in-memory index already holds the newer state.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use claims_core::{PersistError, Receipt, Region, RegionId, RegionSink};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::db::ClaimDb;
use crate::error::{StoreError, StoreResult};

/// Whether writes return before or after they are durable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveMode {
    #[default]
    Async,
    Sync,
}

impl SaveMode {
    #[must_use]
    pub const fn from_async(async_saves: bool) -> Self {
        if async_saves { Self::Async } else { Self::Sync }
    }
}

type Reply = Sender<Result<(), PersistError>>;

enum Job {
    Save(Arc<Region>, Option<Reply>),
    Delete(RegionId, Option<Reply>),
    Flush(Sender<()>),
    Stop,
}

pub struct SaveQueue {
    db: Arc<ClaimDb>,
    mode: SaveMode,
    jobs: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SaveQueue {
    /// Start the worker thread.
    pub fn spawn(db: Arc<ClaimDb>, mode: SaveMode) -> StoreResult<Self> {
        let (jobs, rx) = unbounded();
        let worker_db = Arc::clone(&db);
        let worker = thread::Builder::new()
            .name("claims-save".into())
            .spawn(move || run(&worker_db, &rx))?;

        debug!(?mode, "save queue started");
        Ok(Self {
            db,
            mode,
            jobs,
            worker: Mutex::new(Some(worker)),
        })
    }

    #[must_use]
    pub const fn mode(&self) -> SaveMode {
        self.mode
    }

    #[must_use]
    pub const fn db(&self) -> &Arc<ClaimDb> {
        &self.db
    }

    /// Jobs sent but not yet picked up by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Block until every job sent before this call has been applied.
    pub fn flush(&self) -> StoreResult<()> {
        let (ack, done) = bounded(1);
        self.send(Job::Flush(ack))?;
        done.recv().map_err(|_| StoreError::QueueClosed)
    }

    /// Apply pending jobs and stop the worker. Later sends fail with
    /// [`StoreError::QueueClosed`].
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let pending = self.pending();
        if self.send(Job::Stop).is_ok() && worker.join().is_err() {
            error!("save worker panicked");
        }
        info!(pending, "save queue stopped");
    }

    fn send(&self, job: Job) -> StoreResult<()> {
        self.jobs.send(job).map_err(|_| StoreError::QueueClosed)
    }

    /// Send a write job, with a reply channel in sync mode.
    fn enqueue(&self, job: impl FnOnce(Option<Reply>) -> Job) -> Result<Receipt, PersistError> {
        match self.mode {
            SaveMode::Async => {
                self.send(job(None))?;
                Ok(Receipt::done())
            }
            SaveMode::Sync => {
                let (reply, outcome) = bounded(1);
                self.send(job(Some(reply)))?;
                Ok(Receipt::pending(outcome))
            }
        }
    }
}

impl RegionSink for SaveQueue {
    fn save(&self, region: Arc<Region>) -> Result<Receipt, PersistError> {
        self.enqueue(|reply| Job::Save(region, reply))
    }

    fn delete(&self, id: RegionId) -> Result<Receipt, PersistError> {
        self.enqueue(|reply| Job::Delete(id, reply))
    }

    fn flush(&self) -> Result<(), PersistError> {
        SaveQueue::flush(self).map_err(PersistError::from)
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(db: &ClaimDb, jobs: &Receiver<Job>) {
    for job in jobs {
        match job {
            Job::Save(region, reply) => {
                let result = db.save(&region);
                if let Err(err) = &result {
                    error!(region = %region.id(), %err, "failed to save region");
                }
                answer(reply, result);
            }
            Job::Delete(id, reply) => {
                let result = db.delete(id).map(|_| ());
                if let Err(err) = &result {
                    error!(region = %id, %err, "failed to delete region");
                }
                answer(reply, result);
            }
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
            Job::Stop => break,
        }
    }
}

fn answer(reply: Option<Reply>, result: StoreResult<()>) {
    if let Some(reply) = reply {
        let _ = reply.send(result.map_err(PersistError::from));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_core::{CellPos, FlagValues, PlayerId, Profile};
    use uuid::Uuid;

    const MAP_SIZE: usize = 16 * 1024 * 1024;

    fn region(id: u64) -> Arc<Region> {
        Arc::new(Region::new(
            RegionId(id),
            Profile::new(PlayerId(Uuid::from_u128(1)), "Steve"),
            CellPos::new("world", 0, id as i32),
            FlagValues::default(),
        ))
    }

    fn open() -> (tempfile::TempDir, Arc<ClaimDb>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(ClaimDb::open(dir.path(), MAP_SIZE).unwrap());
        (dir, db)
    }

    #[test]
    fn test_async_saves_land_after_flush() {
        let (_dir, db) = open();
        let queue = SaveQueue::spawn(Arc::clone(&db), SaveMode::Async).unwrap();

        for id in 1..=3 {
            queue.save(region(id)).unwrap().wait().unwrap();
        }
        queue.delete(RegionId(2)).unwrap().wait().unwrap();
        queue.flush().unwrap();

        let ids: Vec<_> = db
            .load_regions()
            .unwrap()
            .regions
            .iter()
            .map(Region::id)
            .collect();
        assert_eq!(ids, vec![RegionId(1), RegionId(3)]);
    }

    #[test]
    fn test_sync_mode_is_durable_after_wait() {
        let (_dir, db) = open();
        let queue = SaveQueue::spawn(Arc::clone(&db), SaveMode::Sync).unwrap();

        queue.save(region(7)).unwrap().wait().unwrap();
        assert_eq!(db.region_count().unwrap(), 1);

        queue.delete(RegionId(7)).unwrap().wait().unwrap();
        assert_eq!(db.region_count().unwrap(), 0);
    }

    #[test]
    fn test_sync_writes_keep_send_order() {
        let (_dir, db) = open();
        let queue = SaveQueue::spawn(Arc::clone(&db), SaveMode::Sync).unwrap();

        let saved = queue.save(region(3)).unwrap();
        let deleted = queue.delete(RegionId(3)).unwrap();
        deleted.wait().unwrap();
        saved.wait().unwrap();

        assert_eq!(db.region_count().unwrap(), 0);
    }

    #[test]
    fn test_shutdown_drains_and_closes() {
        let (_dir, db) = open();
        let queue = SaveQueue::spawn(Arc::clone(&db), SaveMode::Async).unwrap();
        let _ = queue.save(region(1)).unwrap();

        queue.shutdown();

        assert_eq!(db.region_count().unwrap(), 1);
        assert!(queue.save(region(2)).is_err());
        assert!(matches!(queue.flush(), Err(StoreError::QueueClosed)));
        queue.shutdown();
    }
}
