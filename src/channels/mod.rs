//! Outbound messaging channels
//!
//! The proactive scheduler delivers every message through an
//! [`OutboundChannel`]. Failures are returned to the caller, which logs them
//! and moves on.

mod log;
mod twilio;

use async_trait::async_trait;

pub use log::LogChannel;
pub use twilio::TwilioChannel;

use crate::{Error, Result};

/// Delivery of SMS and voice messages to a phone number
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Send a text message
    async fn send_sms(&self, to: &str, body: &str) -> Result<()>;

    /// Place a voice call that reads `message` aloud
    ///
    /// Default implementation reports that calls are unsupported
    async fn place_call(&self, to: &str, message: &str) -> Result<()> {
        let _ = (to, message);
        Err(Error::Channel(format!(
            "{} does not support voice calls",
            self.name()
        )))
    }
}
