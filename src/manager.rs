use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::api::EventSink;
use crate::buttons::{ButtonDispatcher, ButtonLines};
use crate::config::AppConfig;
use crate::messages::Event;
use crate::scanner::{ButtonMenu, SourceError, UidSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Init,
    Running,
    ShuttingDown,
    Terminated,
}

/// The blocking read/send loop. Runs on its own thread and pushes sends
/// through the runtime `Handle`.
pub struct Manager<S> {
    uid_source: Box<dyn UidSource>,
    menu: Option<Box<dyn ButtonMenu>>,
    sink: Arc<S>,
    machine_id: String,
    interscan_delay: Duration,
    stop: Arc<AtomicBool>,
}

impl<S: EventSink> Manager<S> {
    pub fn new(
        uid_source: Box<dyn UidSource>,
        menu: Option<Box<dyn ButtonMenu>>,
        sink: Arc<S>,
        config: &AppConfig,
    ) -> Self {
        Manager {
            uid_source,
            menu,
            sink,
            machine_id: config.station.machine_id().to_string(),
            interscan_delay: config.station.interscan_delay(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Loops until the input closes, a read fails or the stop flag is set.
    pub fn run_loop(mut self, handle: Handle) -> Result<(), SourceError> {
        while !self.stop.load(Ordering::Relaxed) {
            let uid = match self.uid_source.read_uid() {
                Ok(uid) => uid,
                Err(SourceError::Closed) => {
                    info!("Input closed");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            let uid = uid.trim();
            if !uid.is_empty() {
                handle.block_on(self.sink.send(Event::scan(uid, &self.machine_id)));
            }

            match self.menu.as_mut() {
                Some(menu) => match run_menu(&mut **menu, &*self.sink, &self.machine_id, &handle) {
                    Err(SourceError::Closed) => {
                        info!("Input closed");
                        return Ok(());
                    }
                    other => other?,
                },
                // Buttons arrive through interrupts meanwhile.
                None => thread::sleep(self.interscan_delay),
            }
        }
        Ok(())
    }
}

fn run_menu<S: EventSink>(
    menu: &mut dyn ButtonMenu,
    sink: &S,
    machine_id: &str,
    handle: &Handle,
) -> Result<(), SourceError> {
    menu.open()?;
    while let Some(action) = menu.next_action()? {
        handle.block_on(sink.send(Event::button(action, machine_id)));
    }
    Ok(())
}

/// Owns the process-wide resources around a [`Manager`]: the GPIO lines and
/// the button dispatcher. Both are released on every exit path.
pub struct Station {
    dispatcher: Option<ButtonDispatcher>,
    lines: Option<Box<dyn ButtonLines>>,
    shutdown_grace: Duration,
    phase: Phase,
}

impl Station {
    pub fn new(
        dispatcher: ButtonDispatcher,
        lines: Option<Box<dyn ButtonLines>>,
        config: &AppConfig,
    ) -> Self {
        Station {
            dispatcher: Some(dispatcher),
            lines,
            shutdown_grace: config.buttons.shutdown_grace(),
            phase: Phase::Init,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Station {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs `manager` until it finishes or `shutdown` resolves, then cleans
    /// up. A loop blocked on input is left behind; it ends with the process.
    /// A station runs once; later calls find its resources already released.
    pub async fn run<S, F>(&mut self, manager: Manager<S>, shutdown: F) -> Result<(), SourceError>
    where
        S: EventSink,
        F: Future<Output = ()>,
    {
        let stop = manager.stop_flag();
        let handle = Handle::current();
        let (done_tx, done_rx) = oneshot::channel();

        self.enter(Phase::Running);
        let spawned = thread::Builder::new()
            .name("scan-loop".to_string())
            .spawn(move || {
                let _ = done_tx.send(manager.run_loop(handle));
            });

        let outcome = match spawned {
            Ok(_) => {
                tokio::select! {
                    res = done_rx => match res {
                        Ok(res) => res,
                        Err(_) => Err(SourceError::Reader("scan loop panicked".to_string())),
                    },
                    _ = shutdown => Ok(()),
                }
            }
            Err(err) => Err(SourceError::Io(err)),
        };

        self.enter(Phase::ShuttingDown);
        info!("Shutting down...");
        if let Err(err) = &outcome {
            error!("Scan loop stopped: {}", err);
        }
        stop.store(true, Ordering::Relaxed);

        if let Some(lines) = self.lines.take() {
            lines.release();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown(self.shutdown_grace).await;
        }
        self.enter(Phase::Terminated);

        outcome
    }

    #[cfg(test)]
    fn phase(&self) -> Phase {
        self.phase
    }
}
