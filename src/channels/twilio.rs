//! Twilio SMS and voice channel
//!
//! Uses the Twilio REST API: `Messages.json` for SMS and `Calls.json` with
//! inline `TwiML` for voice calls.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::OutboundChannel;
use crate::config::TwilioConfig;
use crate::{Error, Result};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Twilio channel adapter
pub struct TwilioChannel {
    config: TwilioConfig,
    client: Client,
    limiter: SharedLimiter,
    api_base: String,
}

impl TwilioChannel {
    /// Create a new Twilio channel adapter
    #[must_use]
    pub fn new(config: TwilioConfig) -> Self {
        let rpm = NonZeroU32::new(config.messages_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            config,
            client: Client::new(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rpm))),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different API host
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/Accounts/{}/{resource}.json",
            self.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    async fn post(&self, resource: &str, params: &[(&str, &str)]) -> Result<String> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .post(self.endpoint(resource))
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(params)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Twilio request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TwilioError>(&body)
                .map_or(body, |e| e.message);
            return Err(Error::Channel(format!("Twilio API error: {status} - {detail}")));
        }

        let created: TwilioResource = response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("Twilio response parse error: {e}")))?;
        Ok(created.sid)
    }
}

impl std::fmt::Debug for TwilioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioChannel")
            .field("account_sid", &self.config.account_sid)
            .field("from_number", &self.config.from_number)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OutboundChannel for TwilioChannel {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        let sid = self
            .post(
                "Messages",
                &[("To", to), ("From", &self.config.from_number), ("Body", body)],
            )
            .await?;
        tracing::debug!(to, sid = %sid, "sms queued");
        Ok(())
    }

    async fn place_call(&self, to: &str, message: &str) -> Result<()> {
        let twiml = say_twiml(message);
        let sid = self
            .post(
                "Calls",
                &[("To", to), ("From", &self.config.from_number), ("Twiml", &twiml)],
            )
            .await?;
        tracing::debug!(to, sid = %sid, "call placed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TwilioResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    message: String,
}

/// Voice response reading `message` once
fn say_twiml(message: &str) -> String {
    format!(
        "<Response><Say voice=\"alice\">{}</Say></Response>",
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token"),
            from_number: "+15550000".to_string(),
            messages_per_minute: 60,
        }
    }

    #[test]
    fn endpoint_includes_account() {
        let channel = TwilioChannel::new(config()).with_api_base("http://localhost:9/");
        assert_eq!(
            channel.endpoint("Messages"),
            "http://localhost:9/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn twiml_escapes_message() {
        assert_eq!(
            say_twiml("Wake up & <shine>"),
            "<Response><Say voice=\"alice\">Wake up &amp; &lt;shine&gt;</Say></Response>"
        );
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", TwilioChannel::new(config()));
        assert!(rendered.contains("AC123"));
        assert!(!rendered.contains("token\""));
    }

    #[tokio::test]
    async fn unreachable_host_is_channel_error() {
        let channel = TwilioChannel::new(config()).with_api_base("http://127.0.0.1:9");
        let err = channel.send_sms("+15551234", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Channel(_)));
    }
}
