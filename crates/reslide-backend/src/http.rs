// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared JSON-over-HTTP plumbing for the backend clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use reslide_core::config::EndpointSettings;
use reslide_core::error::{ReslideError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::retry::{RetryConfig, with_retry};

/// A configured endpoint: client with timeout, base URL, credentials, retry policy.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    service: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    retry: RetryConfig,
}

impl HttpBackend {
    pub fn new(service: impl Into<String>, settings: &EndpointSettings) -> Result<Self> {
        let service = service.into();
        if settings.base_url.trim().is_empty() {
            return Err(ReslideError::Config(format!("{service} backend has no base_url")));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ReslideError::backend(&service, format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key()?,
            model: settings.model.clone(),
            retry: RetryConfig::with_max_retries(settings.max_retries),
            client,
            service,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// POST a JSON body and decode a JSON reply, retrying transient failures.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.url(path);
        let url = url.as_str();
        with_retry(&self.service, &self.retry, move || async move {
            debug!(service = %self.service, url, "POST");
            let request = self.authorize(self.client.post(url)).json(body);
            self.send(request).await
        })
        .await
    }

    /// GET a JSON reply, retrying transient failures.
    pub async fn get_json<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        let url = self.url(path);
        let url = url.as_str();
        with_retry(&self.service, &self.retry, move || async move {
            debug!(service = %self.service, url, "GET");
            self.send(self.authorize(self.client.get(url))).await
        })
        .await
    }

    async fn send<R: DeserializeOwned + Send>(&self, request: RequestBuilder) -> Result<R> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReslideError::BackendStatus {
                service: self.service.clone(),
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| ReslideError::backend(&self.service, format!("failed to decode response: {e}")))
    }

    fn transport_error(&self, err: reqwest::Error) -> ReslideError {
        if err.is_timeout() {
            ReslideError::Timeout(format!("{} request", self.service))
        } else {
            ReslideError::backend(&self.service, err)
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> EndpointSettings {
        EndpointSettings {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let backend = HttpBackend::new("ocr", &settings("http://localhost:9000/")).unwrap();
        assert_eq!(backend.url("/ocr"), "http://localhost:9000/ocr");
        assert_eq!(backend.url("tasks/1"), "http://localhost:9000/tasks/1");
    }

    #[test]
    fn empty_base_url_is_a_config_error() {
        let err = HttpBackend::new("layout", &settings("  ")).unwrap_err();
        assert!(matches!(err, ReslideError::Config(_)));
    }

    #[test]
    fn missing_key_variable_is_reported() {
        let mut s = settings("http://localhost");
        s.api_key_env = Some("RESLIDE_TEST_KEY_THAT_IS_NEVER_SET".into());
        assert!(matches!(HttpBackend::new("style", &s), Err(ReslideError::Config(_))));
    }

    #[test]
    fn long_bodies_are_truncated() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
