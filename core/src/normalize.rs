//! Normalization of backend response envelopes.
//!
//! # Design
//! Each operation kind has its own typed envelope decoded with serde instead
//! of probing optional fields on one loose parse:
//!
//! - list: `{ data?: [record], pagination?: { total? } }`
//! - get-one / create / update: `{ data?: record }`
//! - custom: any JSON, provided the content type says so
//!
//! Non-2xx responses are routed through [`classify`]. A 2xx body that does
//! not decode into its envelope is a shape mismatch and is reported with the
//! response's own status.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{classify, AdapterError};
use crate::http::HttpResponse;

/// One page of records plus the backend's total across all pages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListResult {
    pub records: Vec<Value>,
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    pagination: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    #[serde(default)]
    data: Option<Value>,
}

fn decode<'a, T: Deserialize<'a>>(response: &'a HttpResponse, what: &str) -> Result<T, AdapterError> {
    serde_json::from_str(&response.body).map_err(|err| {
        tracing::warn!(status = response.status, error = %err, "undecodable {what} envelope");
        AdapterError::new(format!("Unexpected {what} response shape: {err}"), response.status)
    })
}

pub fn normalize_list(response: &HttpResponse) -> Result<ListResult, AdapterError> {
    if !response.is_success() {
        return Err(classify(response));
    }
    let envelope: ListEnvelope = decode(response, "list")?;
    let total = envelope.pagination.and_then(|page| page.total);
    let records = envelope.data.unwrap_or_default();
    let total_count = total.unwrap_or(records.len() as u64);
    Ok(ListResult { records, total_count })
}

pub fn normalize_one(response: &HttpResponse) -> Result<Value, AdapterError> {
    if !response.is_success() {
        return Err(classify(response));
    }
    let envelope: RecordEnvelope = decode(response, "record")?;
    Ok(envelope.data.unwrap_or(Value::Null))
}

/// Created (or updated) records share the single-record envelope.
///
/// The status is checked first so an error body is never mistaken for the
/// new record.
pub fn normalize_created(response: &HttpResponse) -> Result<Value, AdapterError> {
    normalize_one(response)
}

pub fn normalize_custom(response: &HttpResponse) -> Result<Value, AdapterError> {
    if !response.is_success() || !response.is_json() {
        return Err(classify(response));
    }
    decode(response, "custom")
}
