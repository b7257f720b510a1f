//! Graceful shutdown latch
//!
//! SIGINT/SIGTERM set the shutdown flag. A signal that arrives while a
//! clean-up run is in flight lets the run finish; a signal during the
//! between-cycles sleep wakes it up so the process exits promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    /// Install the signal handlers and return the latch.
    pub fn install() -> Self {
        let shutdown = Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        };
        let handle = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Received termination signal, shutting down after the current clean-up run");
            handle.flag.store(true, Ordering::SeqCst);
            // notify_one stores a permit, so a signal that fires before
            // the sleep is entered still wakes it
            handle.notify.notify_one();
        });
        shutdown
    }

    pub fn shutdown_now(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep between cycles; returns true when interrupted by a signal.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.shutdown_now() {
            return true;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => self.shutdown_now(),
            () = self.notify.notified() => true,
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());
    match (interrupt, terminate) {
        (Ok(mut interrupt), Ok(mut terminate)) => {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
        }
        // no handlers could be installed; fall back to ctrl-c
        _ => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_returns_false_without_signal() {
        let shutdown = Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        };
        assert!(!shutdown.sleep(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn test_sleep_wakes_on_notify() {
        let shutdown = Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        };
        let sleeper = shutdown.clone();
        let task = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(60)).await });
        tokio::task::yield_now().await;
        shutdown.flag.store(true, Ordering::SeqCst);
        shutdown.notify.notify_one();
        assert!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_flag() {
        let shutdown = Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        };
        assert!(!shutdown.shutdown_now());
        shutdown.flag.store(true, Ordering::SeqCst);
        assert!(shutdown.shutdown_now());
        assert!(shutdown.sleep(Duration::from_secs(60)).await);
    }
}
