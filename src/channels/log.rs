//! Dry-run channel that logs instead of sending

use async_trait::async_trait;

use super::OutboundChannel;
use crate::Result;

/// Logs every message at `info` and reports success
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl OutboundChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        tracing::info!(to, body, "sms (dry run)");
        Ok(())
    }

    async fn place_call(&self, to: &str, message: &str) -> Result<()> {
        tracing::info!(to, message, "voice call (dry run)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_always_succeeds() {
        let channel = LogChannel;
        assert!(tokio_test::block_on(channel.send_sms("+15550001111", "hello")).is_ok());
        assert!(tokio_test::block_on(channel.place_call("+15550001111", "wake up")).is_ok());
    }
}
