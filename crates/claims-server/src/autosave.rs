//! Periodic save of every region.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use claims_core::ClaimService;
use crossbeam_channel::{Sender, bounded, select, tick};
use tracing::{debug, error};

pub struct AutoSave {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl AutoSave {
    /// Save a snapshot of every region each `interval`. A zero interval
    /// disables auto-save.
    pub fn spawn(service: Arc<ClaimService>, interval: Duration) -> std::io::Result<Option<Self>> {
        if interval.is_zero() {
            return Ok(None);
        }
        let (stop, stopped) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("claims-autosave".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let saved = service.save_all();
                            debug!(saved, "auto-saved regions");
                        }
                        recv(stopped) -> _ => break,
                    }
                }
            })?;

        Ok(Some(Self { stop, handle }))
    }

    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            error!("auto-save thread panicked");
        }
    }
}
