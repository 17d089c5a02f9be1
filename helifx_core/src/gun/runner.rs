//! Gun processing thread.

use super::controller::{GunFireController, PulseInput};
use super::settings::GunSettings;
use crate::clock::Clock;
use crate::error::StartError;
use helifx_common::fx::types::{GunEvent, GunStatus};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

/// Upper bound between controller ticks; also the shutdown latency.
const TICK_TIMEOUT: Duration = Duration::from_millis(20);

/// Handle to a running gun controller.
///
/// Dropping the handle stops the thread, switches the outputs off and joins.
pub struct GunFx {
    settings: Arc<RwLock<Arc<GunSettings>>>,
    status: Arc<Mutex<GunStatus>>,
    events: flume::Receiver<GunEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GunFx {
    /// Move `controller` onto its own thread.
    pub fn spawn(mut controller: GunFireController) -> Result<Self, StartError> {
        let settings = controller.settings_handle();
        let status = controller.status_handle();
        let events = controller.events();
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("gun-fx".to_string())
                .spawn(move || {
                    run(&mut controller, &running);
                    controller.shutdown();
                })
                .map_err(|e| StartError::Thread(e.to_string()))?
        };
        info!("Gun thread started");

        Ok(Self {
            settings,
            status,
            events,
            running,
            handle: Some(handle),
        })
    }

    /// Replace the settings atomically.
    ///
    /// A firing or spin-down cycle in progress keeps its shot interval and
    /// fan-off deadline until its next transition.
    pub fn reconfigure(&self, settings: GunSettings) {
        *self.settings.write() = Arc::new(settings);
        info!("Gun settings replaced");
    }

    /// Latest status snapshot.
    pub fn status(&self) -> GunStatus {
        self.status.lock().clone()
    }

    /// Side-effect event stream.
    pub fn events(&self) -> flume::Receiver<GunEvent> {
        self.events.clone()
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop and join the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Gun thread panicked");
            }
            info!("Gun thread stopped");
        }
    }
}

impl Drop for GunFx {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(controller: &mut GunFireController, running: &AtomicBool) {
    let clock = controller.clock();
    let trigger = controller.trigger();

    while running.load(Ordering::SeqCst) {
        // Paced by trigger activity; ticks fall back to the timeout without signal.
        match &trigger {
            Some(trigger) => {
                let _ = trigger.wait(TICK_TIMEOUT);
            }
            None => std::thread::sleep(TICK_TIMEOUT),
        }
        controller.tick(clock.now());
    }
}
