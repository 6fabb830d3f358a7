use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{Monitor, AFTER_PANIC_INTERVAL};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Run one tick; a panic inside it is logged and turned into a long sleep.
pub fn guarded_tick(monitor: &mut Monitor) -> Duration {
    match catch_unwind(AssertUnwindSafe(|| monitor.tick())) {
        Ok(next) => next,
        Err(payload) => {
            log_error!("monitor tick panicked: {}", panic_message(payload));
            AFTER_PANIC_INTERVAL
        }
    }
}

/// Poll until `cancel_token` fires, then restore audio and report the session.
pub async fn monitor_loop(mut monitor: Monitor, cancel_token: CancellationToken) {
    log_info!("Watching for ads");

    loop {
        let pause = guarded_tick(&mut monitor);

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = cancel_token.cancelled() => {
                log_info!("monitor loop shutting down");
                break;
            }
        }
    }

    monitor.shutdown();
}
