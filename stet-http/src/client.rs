//! reqwest implementation of the engine transport.

use crate::config::HttpTransportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE, DATE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use stet_pis::{Body, Method, Request, Response, Transport};
use tokio::time::timeout;
use tracing::{debug, error, info};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Sends engine requests to a bank over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client.
    client: Client,

    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Creates a transport, checking that the configured URLs parse.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        config.endpoint_url(&stet_pis::Endpoint::PaymentRequests)?;
        config.endpoint_url(&stet_pis::Endpoint::Token)?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let url = self.config.endpoint_url(&request.endpoint)?;
        let request_id = Uuid::new_v4().to_string();
        info!("{} {} ({})", request.method, url, request_id);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .client
            .request(method, url.clone())
            .header(REQUEST_ID_HEADER, &request_id)
            .header(DATE, http_date());
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_string(body)?),
            Body::Form(form) => builder.form(form),
        };

        // Execute the request with a timeout
        let response = match timeout(self.config.request_timeout(), builder.send()).await {
            Ok(result) => result?,
            Err(_) => {
                error!("{} timed out", url);
                return Err(Error::Timeout(self.config.request_timeout_secs));
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = lowercase_headers(response.headers());
        let text = response.text().await?;
        debug!("Answer {} from {}: {} bytes", status, final_url, text.len());

        let mut answer = Response::new(status, parse_body(&text));
        answer.headers = headers;
        answer.url = final_url;
        answer.request_id = Some(request_id);
        Ok(answer)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, request: Request) -> stet_pis::Result<Response> {
        Ok(self.execute(request).await?)
    }
}

/// Current time in the IMF-fixdate format of the `Date` header.
fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn lowercase_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_lowercase(), value.to_string()))
        })
        .collect()
}

/// Bank answers are JSON, except for some error pages.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
