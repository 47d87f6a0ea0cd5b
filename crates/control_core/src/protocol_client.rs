//! HTTP implementation of the [`ControlPlane`] collaborator against the
//! cloud-control backend. Every endpoint answers with the
//! `{ success, data?, error? }` envelope from `shared::protocol`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::InstanceStatus, protocol::ApiResponse};
use url::Url;

use crate::ControlPlane;

pub struct HttpControlPlane {
    http: Client,
    base_url: Url,
}

impl HttpControlPlane {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid control backend url '{base_url}'"))?;
        // Relative joins drop the last path segment unless the base ends
        // with a slash.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid control endpoint path '{path}'"))
    }

    async fn post_command(&self, path: &str) -> Result<()> {
        let envelope: ApiResponse<()> = self
            .http
            .post(self.endpoint(path)?)
            .send()
            .await
            .with_context(|| format!("failed to call {path}"))?
            .error_for_status()
            .with_context(|| format!("{path} returned an http error"))?
            .json()
            .await
            .with_context(|| format!("invalid response body from {path}"))?;
        envelope.ensure_success().map_err(Into::into)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn instance_status(&self) -> Result<InstanceStatus> {
        let envelope: ApiResponse<InstanceStatus> = self
            .http
            .get(self.endpoint("instance/status")?)
            .send()
            .await
            .context("failed to query instance status")?
            .error_for_status()
            .context("instance status query returned an http error")?
            .json()
            .await
            .context("invalid instance status response body")?;
        envelope.into_result().map_err(Into::into)
    }

    async fn start_instance(&self) -> Result<()> {
        self.post_command("instance/start").await
    }

    async fn stop_instance(&self) -> Result<()> {
        self.post_command("instance/stop").await
    }

    async fn start_service(&self) -> Result<()> {
        self.post_command("service/start").await
    }
}

#[cfg(test)]
#[path = "tests/protocol_client_tests.rs"]
mod tests;
