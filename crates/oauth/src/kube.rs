// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes API access on behalf of the calling user.
//!
//! Every call forwards the caller's own bearer credential; the service never
//! uses its own identity against the cluster.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::storage::OwnerRef;

/// API group and version of the SPI custom resources.
pub const SPI_GROUP: &str = "appstudio.redhat.com";
pub const SPI_VERSION: &str = "v1beta1";

/// Attributes of a self-subject access review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub namespace: String,
    pub verb: String,
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// The parts of an `SPIAccessToken` the broker cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenObject {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
}

/// Cluster operations performed with a caller's credential.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Ask the cluster whether the credential's subject may act as described.
    async fn self_subject_access_review(
        &self,
        credential: &str,
        attributes: &ResourceAttributes,
    ) -> anyhow::Result<bool>;

    /// Read the `SPIAccessToken` identified by `owner`.
    async fn get_access_token(
        &self,
        credential: &str,
        owner: &OwnerRef,
    ) -> anyhow::Result<AccessTokenObject>;

    /// Create an `SPIAccessTokenDataUpdate` so controllers watching the token
    /// learn that its data changed.
    async fn create_data_update(&self, credential: &str, owner: &OwnerRef) -> anyhow::Result<()>;
}

/// [`ClusterClient`] talking to the Kubernetes REST API.
pub struct KubeClient {
    base_url: String,
    client: Client,
}

impl KubeClient {
    pub fn new(base_url: &str, ca_file: Option<&Path>, timeout: Duration) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let mut builder = Client::builder().timeout(timeout);
        if let Some(path) = ca_file {
            let pem = std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("reading CA bundle {}: {e}", path.display()))?;
            for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        Ok(Self { base_url: base_url.trim_end_matches('/').to_owned(), client: builder.build()? })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn spi_path(&self, namespace: &str, resource: &str) -> String {
        format!("/apis/{SPI_GROUP}/{SPI_VERSION}/namespaces/{namespace}/{resource}")
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn self_subject_access_review(
        &self,
        credential: &str,
        attributes: &ResourceAttributes,
    ) -> anyhow::Result<bool> {
        let body = serde_json::json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SelfSubjectAccessReview",
            "spec": { "resourceAttributes": attributes },
        });
        let resp = self
            .client
            .post(self.url("/apis/authorization.k8s.io/v1/selfsubjectaccessreviews"))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;

        // The API server refusing the credential outright is a "no", not an outage.
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::debug!(status = %resp.status(), "access review rejected the credential");
            return Ok(false);
        }

        let review: serde_json::Value = resp.error_for_status()?.json().await?;
        let allowed = review["status"]["allowed"].as_bool().unwrap_or(false);
        tracing::debug!(
            namespace = %attributes.namespace,
            resource = %attributes.resource,
            allowed,
            "self subject access review"
        );
        Ok(allowed)
    }

    async fn get_access_token(
        &self,
        credential: &str,
        owner: &OwnerRef,
    ) -> anyhow::Result<AccessTokenObject> {
        let path = format!("{}/{}", self.spi_path(&owner.namespace, "spiaccesstokens"), owner.name);
        let resp = self.client.get(self.url(&path)).bearer_auth(credential).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("reading SPIAccessToken {owner} failed ({})", resp.status());
        }

        let object: serde_json::Value = resp.json().await?;
        let metadata = &object["metadata"];
        Ok(AccessTokenObject {
            name: metadata["name"].as_str().unwrap_or(&owner.name).to_owned(),
            namespace: metadata["namespace"].as_str().unwrap_or(&owner.namespace).to_owned(),
            uid: metadata["uid"].as_str().map(String::from),
        })
    }

    async fn create_data_update(&self, credential: &str, owner: &OwnerRef) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "apiVersion": format!("{SPI_GROUP}/{SPI_VERSION}"),
            "kind": "SPIAccessTokenDataUpdate",
            "metadata": {
                "generateName": format!("{}-", owner.name),
                "namespace": owner.namespace,
            },
            "spec": { "tokenName": owner.name },
        });
        let path = self.spi_path(&owner.namespace, "spiaccesstokendataupdates");
        let resp = self.client.post(self.url(&path)).bearer_auth(credential).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("creating SPIAccessTokenDataUpdate for {owner} failed ({})", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "kube_tests.rs"]
mod tests;
