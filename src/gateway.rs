use std::env;
use std::future::Future;

use tracing::{debug, warn};

use crate::protocol::{DEFAULT_COMPONENT, device_command_body};
use crate::types::AcState;
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.smartthings.com";

/// Sink for air-conditioner commands. Any error means the state was not applied.
pub trait DeviceGateway {
    fn apply(&self, state: &AcState) -> impl Future<Output = Result<()>> + Send;
}

pub struct SmartThingsGatewayBuilder {
    device_id: String,
    token: String,
    base_url: String,
    component: String,
    http: Option<reqwest::Client>,
}

impl SmartThingsGatewayBuilder {
    pub fn new(device_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.into(),
            base_url: DEFAULT_API_URL.to_string(),
            component: DEFAULT_COMPONENT.to_string(),
            http: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<SmartThingsGateway> {
        if self.device_id.is_empty() || self.token.is_empty() {
            return Err(Error::Config(
                "device id and token must not be empty".to_string(),
            ));
        }
        let http = match self.http {
            Some(client) => client,
            None => reqwest::Client::builder().build()?,
        };
        Ok(SmartThingsGateway {
            http,
            commands_url: format!("{}/v1/devices/{}/commands", self.base_url, self.device_id),
            token: self.token,
            component: self.component,
        })
    }
}

/// Device gateway over the SmartThings REST API.
pub struct SmartThingsGateway {
    http: reqwest::Client,
    commands_url: String,
    token: String,
    component: String,
}

impl SmartThingsGateway {
    pub fn builder(
        device_id: impl Into<String>,
        token: impl Into<String>,
    ) -> SmartThingsGatewayBuilder {
        SmartThingsGatewayBuilder::new(device_id, token)
    }

    /// Reads `SMARTTHINGS_TOKEN`, `SMARTTHINGS_DEVICE_ID` and the optional
    /// `SMARTTHINGS_API_URL`.
    pub fn from_env() -> Result<Self> {
        let token = env::var("SMARTTHINGS_TOKEN")
            .map_err(|_| Error::Config("SMARTTHINGS_TOKEN is not set".to_string()))?;
        let device_id = env::var("SMARTTHINGS_DEVICE_ID")
            .map_err(|_| Error::Config("SMARTTHINGS_DEVICE_ID is not set".to_string()))?;
        let mut builder = SmartThingsGatewayBuilder::new(device_id, token);
        if let Ok(url) = env::var("SMARTTHINGS_API_URL") {
            builder = builder.base_url(url);
        }
        builder.build()
    }
}

impl DeviceGateway for SmartThingsGateway {
    async fn apply(&self, state: &AcState) -> Result<()> {
        state.validate()?;
        let body = device_command_body(state, &self.component);
        debug!(url = %self.commands_url, state = %state, "sending device command");

        let resp = self
            .http
            .post(&self.commands_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::DeviceCommand {
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %message, "device rejected command");
            return Err(Error::DeviceCommand {
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(())
    }
}
