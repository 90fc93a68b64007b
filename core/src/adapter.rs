//! Resource data adapter: the list / get-one / create / update / custom
//! operations the UI layer calls.
//!
//! # Design
//! Like the session gateway, each operation is split into a `build_*` method
//! producing an `HttpRequest` and a `parse_*` method consuming an
//! `HttpResponse`. Both halves are pure; the async methods just run them
//! around one call to the injected [`Transport`]. No retries, no caching,
//! no de-duplication of concurrent identical queries.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::DataError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::{self, ListResult};
use crate::query::{self, QueryDescriptor};
use crate::transport::Transport;

/// A caller-defined call to an endpoint outside the resource conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomRequest {
    /// Absolute, or relative to the REST root.
    pub url: String,
    pub method: HttpMethod,
    pub query: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub payload: Option<Value>,
}

impl CustomRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            query: BTreeMap::new(),
            headers: Vec::new(),
            payload: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

pub struct DataAdapter<T: ?Sized> {
    config: ClientConfig,
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for DataAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

fn to_body<B: Serialize + ?Sized>(values: &B) -> Result<String, DataError> {
    serde_json::to_string(values).map_err(|e| DataError::Serialization(e.to_string()))
}

impl<T: Transport + ?Sized> DataAdapter<T> {
    pub fn new(config: ClientConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_list(&self, descriptor: &QueryDescriptor) -> HttpRequest {
        let params = descriptor.to_params();
        let url = format!("{}?{}", self.config.resource_url(&descriptor.resource), query::encode(&params));
        HttpRequest::get(url)
    }

    pub fn build_get_one(&self, resource: &str, id: impl Display) -> HttpRequest {
        HttpRequest::get(self.config.record_url(resource, &id.to_string()))
    }

    pub fn build_create<B: Serialize + ?Sized>(&self, resource: &str, values: &B) -> Result<HttpRequest, DataError> {
        Ok(HttpRequest::json(
            HttpMethod::Post,
            self.config.resource_url(resource),
            to_body(values)?,
        ))
    }

    pub fn build_update<B: Serialize + ?Sized>(
        &self,
        resource: &str,
        id: impl Display,
        values: &B,
    ) -> Result<HttpRequest, DataError> {
        Ok(HttpRequest::json(
            HttpMethod::Patch,
            self.config.record_url(resource, &id.to_string()),
            to_body(values)?,
        ))
    }

    pub fn build_custom(&self, custom: &CustomRequest) -> Result<HttpRequest, DataError> {
        let mut url = self.config.resolve(&custom.url);
        if !custom.query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(custom.query.iter())
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }

        let mut request = match &custom.payload {
            Some(payload) => HttpRequest::json(custom.method, url, to_body(payload)?),
            None => HttpRequest {
                method: custom.method,
                url,
                headers: Vec::new(),
                body: None,
            },
        };
        request.headers.extend(custom.headers.iter().cloned());
        Ok(request)
    }

    pub fn parse_list(&self, response: &HttpResponse) -> Result<ListResult, DataError> {
        Ok(normalize::normalize_list(response)?)
    }

    pub fn parse_get_one(&self, response: &HttpResponse) -> Result<Value, DataError> {
        Ok(normalize::normalize_one(response)?)
    }

    pub fn parse_create(&self, response: &HttpResponse) -> Result<Value, DataError> {
        Ok(normalize::normalize_created(response)?)
    }

    pub fn parse_update(&self, response: &HttpResponse) -> Result<Value, DataError> {
        Ok(normalize::normalize_created(response)?)
    }

    pub fn parse_custom(&self, response: &HttpResponse) -> Result<Value, DataError> {
        Ok(normalize::normalize_custom(response)?)
    }

    pub async fn list(&self, descriptor: &QueryDescriptor) -> Result<ListResult, DataError> {
        let response = self.transport.execute(self.build_list(descriptor)).await?;
        self.parse_list(&response)
    }

    pub async fn get_one(&self, resource: &str, id: impl Display) -> Result<Value, DataError> {
        let response = self.transport.execute(self.build_get_one(resource, id)).await?;
        self.parse_get_one(&response)
    }

    pub async fn create<B: Serialize + ?Sized>(&self, resource: &str, values: &B) -> Result<Value, DataError> {
        let response = self.transport.execute(self.build_create(resource, values)?).await?;
        self.parse_create(&response)
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        resource: &str,
        id: impl Display,
        values: &B,
    ) -> Result<Value, DataError> {
        let response = self.transport.execute(self.build_update(resource, id, values)?).await?;
        self.parse_update(&response)
    }

    pub async fn custom(&self, custom: &CustomRequest) -> Result<Value, DataError> {
        let response = self.transport.execute(self.build_custom(custom)?).await?;
        self.parse_custom(&response)
    }
}
