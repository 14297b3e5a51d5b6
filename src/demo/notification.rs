use crate::concurrency::{run_detached, DetachedHandle};
use crate::errors::DispatchError;
use std::time::Duration;
use tracing::info;

/// Fire-and-forget notification sent from its own thread
#[derive(Debug, Clone)]
pub struct NotificationTask {
    message: String,
    delay: Duration,
}

impl NotificationTask {
    pub fn new(message: impl Into<String>, delay: Duration) -> Self {
        Self {
            message: message.into(),
            delay,
        }
    }

    pub fn send(self) -> Result<DetachedHandle, DispatchError> {
        run_detached("notification", move |ctx| {
            info!(message = %self.message, "Sending notification");
            ctx.sleep(self.delay)?;
            info!(message = %self.message, "Notification sent");
            Ok(())
        })
    }
}
