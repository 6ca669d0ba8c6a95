//! Telephony provider REST client
//!
//! Talks to the carrier account API for outbound dialing and status
//! lookups of calls this process never relayed. Missing credentials
//! degrade the client to a mock mode that mints synthetic sids and
//! answers no statuses, so the rest of the service stays usable in
//! development.

use crate::domain::registry::{ProviderStatusLookup, RemoteCallStatus};
use crate::domain::shared::{DomainError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Connection settings for the carrier account
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub base_url: String,
    /// Caller id for outbound dials
    pub from_number: Option<String>,
    /// Voice webhook handed to the carrier on originate
    pub voice_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            base_url: "https://api.twilio.com/2010-04-01".to_string(),
            from_number: None,
            voice_url: None,
        }
    }
}

struct Credentials {
    account_sid: String,
    auth_token: String,
}

/// Call resource as returned by the carrier API
#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    status: String,
    /// Seconds, serialized as a string by the carrier
    #[serde(default)]
    duration: Option<String>,
}

/// REST client for the carrier account, or a mock when unconfigured
pub struct CarrierClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    from_number: Option<String>,
    voice_url: Option<String>,
}

impl CarrierClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| DomainError::Internal(format!("http client init failed: {}", err)))?;

        let credentials = match (settings.account_sid, settings.auth_token) {
            (Some(account_sid), Some(auth_token)) => Some(Credentials {
                account_sid,
                auth_token,
            }),
            _ => {
                warn!("carrier credentials missing, provider client running in mock mode");
                None
            }
        };

        Ok(Self {
            client,
            base_url: settings.base_url,
            credentials,
            from_number: settings.from_number,
            voice_url: settings.voice_url,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.credentials.is_none()
    }

    /// Place an outbound call and return the provider's sid for it.
    pub async fn originate(&self, to: &str) -> Result<String> {
        let creds = match &self.credentials {
            Some(creds) => creds,
            None => {
                let sid = format!("mock-CA-{}", Uuid::new_v4().simple());
                debug!(%to, sid = %sid, "mock originate");
                return Ok(sid);
            }
        };

        let from = self.from_number.as_deref().ok_or_else(|| {
            DomainError::ValidationError("provider.from_number is not configured".to_string())
        })?;

        let url = format!("{}/Accounts/{}/Calls.json", self.base_url, creds.account_sid);
        let mut form = vec![("To", to.to_string()), ("From", from.to_string())];
        if let Some(voice_url) = &self.voice_url {
            form.push(("Url", voice_url.clone()));
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|err| DomainError::Provider(format!("originate request failed: {}", err)))?;

        if !response.status().is_success() {
            return Err(DomainError::Provider(format!(
                "originate rejected with {}",
                response.status()
            )));
        }

        let resource: CallResource = response.json().await.map_err(|err| {
            DomainError::Provider(format!("unreadable originate response: {}", err))
        })?;
        info!(sid = %resource.sid, %to, "outbound call placed");
        Ok(resource.sid)
    }
}

#[async_trait::async_trait]
impl ProviderStatusLookup for CarrierClient {
    async fn fetch_status(&self, call_sid: &str) -> Result<Option<RemoteCallStatus>> {
        let creds = match &self.credentials {
            Some(creds) => creds,
            None => return Ok(None),
        };

        let url = format!(
            "{}/Accounts/{}/Calls/{}.json",
            self.base_url, creds.account_sid, call_sid
        );
        let response = self
            .client
            .get(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .send()
            .await
            .map_err(|err| DomainError::Provider(format!("status request failed: {}", err)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DomainError::Provider(format!(
                "status query rejected with {}",
                response.status()
            )));
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|err| DomainError::Provider(format!("unreadable status response: {}", err)))?;
        Ok(Some(RemoteCallStatus {
            sid: resource.sid,
            status: resource.status,
            duration_seconds: resource.duration.and_then(|d| d.parse().ok()),
        }))
    }
}
