use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::api::EventSink;
use crate::config::ButtonsConfig;
use crate::messages::{ButtonAction, Event};

/// Registered button inputs that must be handed back to the OS on exit.
pub trait ButtonLines: Send {
    fn release(self: Box<Self>);
}

/// Cheap handle given to interrupt callbacks. Maps a line to its action and
/// queues it without ever touching the network.
#[derive(Clone)]
pub struct ButtonTrigger {
    pins: Arc<HashMap<u8, ButtonAction>>,
    tx: mpsc::Sender<ButtonAction>,
}

impl ButtonTrigger {
    /// Returns `true` when the press was queued for delivery.
    pub fn fire(&self, pin: u8) -> bool {
        let Some(action) = self.pins.get(&pin).copied() else {
            debug!("[BTN] ignoring unmapped line {}", pin);
            return false;
        };
        match self.tx.try_send(action) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("[BTN] queue full, dropping {}", action);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("[BTN] dispatcher stopped, dropping {}", action);
                false
            }
        }
    }
}

/// Bounded queue of button presses drained by a fixed pool of workers.
pub struct ButtonDispatcher {
    trigger: ButtonTrigger,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl ButtonDispatcher {
    pub fn start<S: EventSink>(sink: Arc<S>, machine_id: &str, config: &ButtonsConfig) -> Self {
        let capacity = config.queue_capacity();
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.workers())
            .map(|id| {
                let rx = Arc::clone(&rx);
                let sink = Arc::clone(&sink);
                let machine_id = machine_id.to_string();
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(action) = next else { break };
                        sink.send(Event::button(action, &machine_id)).await;
                    }
                    debug!("[BTN] worker {} stopped", id);
                })
            })
            .collect();

        let pins = config
            .pins()
            .into_iter()
            .map(|p| (p.pin, p.action))
            .collect::<HashMap<_, _>>();

        ButtonDispatcher {
            trigger: ButtonTrigger {
                pins: Arc::new(pins),
                tx,
            },
            workers,
            capacity,
        }
    }

    pub fn trigger(&self) -> ButtonTrigger {
        self.trigger.clone()
    }

    /// Closes the queue and gives in-flight sends `grace` to finish.
    /// Triggers still held elsewhere keep the queue open, so release the
    /// GPIO lines first.
    pub async fn shutdown(self, grace: Duration) {
        let queued = self.capacity - self.trigger.tx.capacity();
        if queued > 0 {
            debug!("[BTN] {} queued presses at shutdown", queued);
        }
        drop(self.trigger);

        let aborts: Vec<_> = self.workers.iter().map(|w| w.abort_handle()).collect();
        if tokio::time::timeout(grace, join_all(self.workers)).await.is_err() {
            let pending = aborts.iter().filter(|a| !a.is_finished()).count();
            warn!("[BTN] abandoning {} button sends still in flight", pending);
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use super::*;
    use crate::api::testing::RecordingSink;
    use crate::config::ButtonPin;

    #[tokio::test]
    async fn test_each_line_sends_its_action_once() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = ButtonDispatcher::start(Arc::clone(&sink), "ecran_1", &ButtonsConfig::default());
        let trigger = dispatcher.trigger();

        for pin in [17, 27, 22, 23, 24] {
            assert!(trigger.fire(pin));
        }
        assert!(!trigger.fire(4));
        drop(trigger);
        dispatcher.shutdown(Duration::from_secs(5)).await;

        let mut actions: Vec<_> = sink
            .events()
            .into_iter()
            .map(|e| match e {
                Event::Button(b) => {
                    assert_eq!(b.machine_id, "ecran_1");
                    b.action
                }
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        actions.sort();
        assert_eq!(actions, ButtonAction::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_unmapped_line_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let config = ButtonsConfig {
            pins: Some(vec![ButtonPin { pin: 5, action: ButtonAction::Back }]),
            ..Default::default()
        };
        let dispatcher = ButtonDispatcher::start(Arc::clone(&sink), "ecran_1", &config);
        let trigger = dispatcher.trigger();

        assert!(!trigger.fire(17));
        drop(trigger);
        dispatcher.shutdown(Duration::from_secs(5)).await;
        assert!(sink.events().is_empty());
    }

    struct StuckSink;

    impl EventSink for StuckSink {
        async fn send(&self, _event: Event) {
            pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stuck_sends() {
        let config = ButtonsConfig {
            workers: Some(1),
            queue_capacity: Some(1),
            ..Default::default()
        };
        let dispatcher = ButtonDispatcher::start(Arc::new(StuckSink), "ecran_1", &config);
        let trigger = dispatcher.trigger();
        assert!(trigger.fire(24));
        drop(trigger);

        tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.shutdown(Duration::from_millis(50)),
        )
        .await
        .expect("shutdown waits no longer than the grace period");
    }
}
