//! Tencent Cloud API v3 request and response types for DNSPod

use serde::{Deserialize, Serialize};

// ============ Envelope ============

/// Every API response is wrapped in `{"Response": {...}}`
#[derive(Debug, Deserialize)]
pub struct TencentResponse {
    #[serde(rename = "Response")]
    pub response: serde_json::Value,
}

/// `Response.Error` payload
#[derive(Debug, Clone, Deserialize)]
pub struct TencentError {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

// ============ Requests ============

/// `DescribeRecordList` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRecordListRequest<'a> {
    pub domain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<&'a str>,
}

/// `CreateRecord` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRecordRequest<'a> {
    pub domain: &'a str,
    pub sub_domain: &'a str,
    pub record_type: &'a str,
    pub record_line: &'a str,
    pub value: &'a str,
}

/// `ModifyRecord` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyRecordRequest<'a> {
    pub domain: &'a str,
    pub sub_domain: &'a str,
    pub record_type: &'a str,
    pub record_line: &'a str,
    pub value: &'a str,
    pub record_id: u64,
}

/// `DeleteRecord` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRecordRequest<'a> {
    pub domain: &'a str,
    pub record_id: u64,
}

// ============ Responses ============

/// `DescribeRecordList` response payload
#[derive(Debug, Deserialize)]
pub struct RecordListResponse {
    #[serde(rename = "RecordList")]
    pub record_list: Option<Vec<DnspodRecord>>,
}

/// One record item from `DescribeRecordList`
#[derive(Debug, Deserialize)]
pub struct DnspodRecord {
    #[serde(rename = "RecordId")]
    pub record_id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Line")]
    pub line: String,
}

/// `CreateRecord` response payload
#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    #[serde(rename = "RecordId")]
    pub record_id: u64,
}

/// Payload of write actions whose response carries nothing we use
#[derive(Debug, Deserialize)]
pub struct EmptyResponse {}
