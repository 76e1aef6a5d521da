// # DNSPod DNS Provider
//
// This crate provides the Tencent Cloud DNSPod provider for the DDNS system.
//
// ## Scope
//
// - One HTTP request per trait call (the Reconciler owns retries, backoff
//   and deadlines)
// - Full error propagation with the API error code in the message
// - Both A and AAAA records
// - No caching and no background tasks
//
// ## Security Requirements
//
// - The secret key NEVER appears in logs or `Debug` output
// - Construction fails fast on empty credentials
//
// ## API Reference
//
// - Tencent Cloud API v3, service `dnspod`, version `2021-03-23`
// - Every action is `POST /` with the action name in `X-TC-Action`
// - Actions used: `DescribeRecordList`, `CreateRecord`, `ModifyRecord`,
//   `DeleteRecord`

mod sign;
mod types;

use async_trait::async_trait;
use chrono::Utc;
use ddns_core::config::{ApiConfig, DomainTarget, RecordType};
use ddns_core::traits::{DnsProvider, DnsRecord};
use ddns_core::{Error, Result};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use types::{
    CreateRecordRequest, CreateRecordResponse, DeleteRecordRequest, DescribeRecordListRequest,
    EmptyResponse, ModifyRecordRequest, RecordListResponse, TencentError, TencentResponse,
};

/// Name reported in logs and errors
pub const PROVIDER_NAME: &str = "dnspod";

/// Public API endpoint
pub const DNSPOD_ENDPOINT: &str = "https://dnspod.tencentcloudapi.com";

/// Service name in the credential scope
pub(crate) const DNSPOD_SERVICE: &str = "dnspod";

/// API version sent in `X-TC-Version`
const DNSPOD_VERSION: &str = "2021-03-23";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code meaning "the listing matched nothing"
const NO_DATA_OF_RECORD: &str = "ResourceNotFound.NoDataOfRecord";

/// Longest slice of an unexpected response body copied into an error
const MAX_ERROR_BODY: usize = 256;

/// Tencent Cloud DNSPod provider
///
/// # Security
///
/// The Debug implementation does NOT expose the secret key.
pub struct DnspodProvider {
    /// API secret id
    secret_id: String,

    /// API secret key
    /// ⚠️ NEVER log this value
    secret_key: String,

    /// API endpoint (overridable for tests and private gateways)
    endpoint: Url,

    /// `Host` header value, part of the signature
    host: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the secret key
impl std::fmt::Debug for DnspodProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodProvider")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<REDACTED>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl DnspodProvider {
    /// Create a new DNSPod provider against the public endpoint
    ///
    /// # Errors
    ///
    /// `Error::Config` if either credential is empty or the HTTP client
    /// cannot be built.
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        let secret_id = secret_id.into();
        let secret_key = secret_key.into();

        if secret_id.trim().is_empty() {
            return Err(Error::config("DNSPod SecretId cannot be empty"));
        }
        if secret_key.trim().is_empty() {
            return Err(Error::config("DNSPod SecretKey cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = parse_endpoint(DNSPOD_ENDPOINT)?;
        let host = host_header(&endpoint)?;

        Ok(Self {
            secret_id,
            secret_key,
            endpoint,
            host,
            client,
        })
    }

    /// Create a provider from the `[api]` configuration section
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Self::new(api.secret_id.clone(), api.secret_key.clone())
    }

    /// Send requests to `endpoint` instead of the public API
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        self.host = host_header(&endpoint)?;
        self.endpoint = endpoint;
        Ok(self)
    }

    /// The endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Execute one API action
    ///
    /// The outer `Result` carries transport and decoding failures; the inner
    /// one carries the API's own `Response.Error`.
    async fn call<T, B>(&self, action: &str, body: &B) -> Result<std::result::Result<T, TencentError>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let payload = serde_json::to_string(body)?;
        tracing::debug!(action, "Sending DNSPod request");

        let timestamp = Utc::now().timestamp();
        let authorization = self.sign(action, &self.host, &payload, timestamp)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Host", &self.host)
            .header("X-TC-Action", action)
            .header("X-TC-Version", DNSPOD_VERSION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("Authorization", authorization)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("DNSPod {} request timed out", action))
                } else {
                    Error::http(format!("DNSPod {} request failed: {}", action, e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read DNSPod {} response: {}", action, e)))?;

        if !status.is_success() {
            let excerpt = excerpt(&text);
            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!("DNSPod {} rejected: {} {}", action, status, excerpt)),
                429 => Error::rate_limited(format!("DNSPod {} throttled: {}", action, status)),
                _ => Error::http(format!("DNSPod {} returned {}: {}", action, status, excerpt)),
            });
        }

        let envelope: TencentResponse = serde_json::from_str(&text)?;

        if let Some(error) = envelope.response.get("Error") {
            let error: TencentError = serde_json::from_value(error.clone())?;
            return Ok(Err(error));
        }

        Ok(Ok(serde_json::from_value(envelope.response)?))
    }

    /// Execute one API action, mapping any API error
    async fn request<T, B>(&self, action: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        self.call(action, body)
            .await?
            .map_err(|e| map_api_error(action, &e))
    }
}

#[async_trait]
impl DnsProvider for DnspodProvider {
    async fn list_records(
        &self,
        domain: &str,
        sub_domain: Option<&str>,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>> {
        // Without Subdomain the API lists the whole zone
        let label = sub_domain.filter(|s| !s.is_empty()).unwrap_or("@");

        let body = DescribeRecordListRequest {
            domain,
            subdomain: Some(label),
            record_type: record_type.as_ref().map(RecordType::as_str),
        };

        let listing: RecordListResponse = match self.call("DescribeRecordList", &body).await? {
            Ok(listing) => listing,
            Err(e) if e.code == NO_DATA_OF_RECORD => {
                tracing::debug!(domain, sub_domain = label, "No DNSPod records found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(map_api_error("DescribeRecordList", &e)),
        };

        let records: Vec<DnsRecord> = listing
            .record_list
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.name.eq_ignore_ascii_case(label))
            .filter(|r| {
                record_type.is_none_or(|t| r.record_type.eq_ignore_ascii_case(t.as_str()))
            })
            .map(|r| DnsRecord::new(r.record_id.to_string(), r.value, r.line))
            .collect();

        tracing::debug!(domain, sub_domain = label, count = records.len(), "Listed DNSPod records");
        Ok(records)
    }

    async fn create_record(&self, target: &DomainTarget, value: &str) -> Result<String> {
        let body = CreateRecordRequest {
            domain: &target.domain,
            sub_domain: target.host_label(),
            record_type: target.record_type.as_str(),
            record_line: &target.record_line,
            value,
        };

        let created: CreateRecordResponse = self.request("CreateRecord", &body).await?;
        Ok(created.record_id.to_string())
    }

    async fn modify_record(
        &self,
        target: &DomainTarget,
        record_id: &str,
        value: &str,
    ) -> Result<()> {
        let body = ModifyRecordRequest {
            domain: &target.domain,
            sub_domain: target.host_label(),
            record_type: target.record_type.as_str(),
            record_line: &target.record_line,
            value,
            record_id: parse_record_id(record_id)?,
        };

        let _: EmptyResponse = self.request("ModifyRecord", &body).await?;
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<()> {
        let body = DeleteRecordRequest {
            domain,
            record_id: parse_record_id(record_id)?,
        };

        let _: EmptyResponse = self.request("DeleteRecord", &body).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Map a `Response.Error` onto the error taxonomy
fn map_api_error(action: &str, error: &TencentError) -> Error {
    let detail = format!("{} failed: [{}] {}", action, error.code, error.message);

    if error.code.starts_with("AuthFailure") {
        Error::auth(detail)
    } else if error.code.starts_with("RequestLimitExceeded")
        || error.code == "FailedOperation.FrequencyLimit"
    {
        Error::rate_limited(detail)
    } else {
        Error::provider(PROVIDER_NAME, detail)
    }
}

fn parse_record_id(record_id: &str) -> Result<u64> {
    record_id
        .parse()
        .map_err(|_| Error::provider(PROVIDER_NAME, format!("Invalid record id: {}", record_id)))
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("Invalid DNSPod endpoint {}: {}", raw, e)))
}

/// `host[:port]` exactly as sent in the `Host` header
fn host_header(endpoint: &Url) -> Result<String> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| Error::config(format!("DNSPod endpoint has no host: {}", endpoint)))?;

    Ok(match endpoint.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
