//! JSON-over-HTTP management channel.
//!
//! Requests are `{"operation": ..., "address": [{"host": "master"}, ...]}`
//! POSTed to the management endpoint. Responses carry
//! `{"outcome": "success", "result": ...}` or
//! `{"outcome": "failed", "failure-description": ...}`.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::config::ServerConfig;

use super::{Address, ManagementChannel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ManagementResponse {
    outcome: String,
    #[serde(default)]
    result: Value,
    #[serde(default, rename = "failure-description")]
    failure_description: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpManagementChannel {
    client: reqwest::blocking::Client,
    endpoint: Url,
    credentials: Option<(String, Option<String>)>,
}

impl HttpManagementChannel {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint_url()?,
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn execute(&self, body: Value) -> anyhow::Result<Value> {
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_ref());
        }
        let response = request
            .send()
            .with_context(|| format!("Management request to {} failed", self.endpoint))?;
        let parsed: ManagementResponse = response
            .json()
            .context("Failed to parse management response")?;
        check_outcome(parsed)
    }
}

impl ManagementChannel for HttpManagementChannel {
    fn query(&self, address: &Address) -> anyhow::Result<String> {
        let mut body = request_body("read-resource", address);
        body.insert("include-runtime".to_string(), Value::Bool(true));
        let result = self.execute(Value::Object(body))?;
        status_from_result(&result)
    }

    fn command(&self, operation: &str, address: &Address) -> anyhow::Result<()> {
        self.execute(Value::Object(request_body(operation, address)))?;
        Ok(())
    }
}

fn request_body(operation: &str, address: &Address) -> Map<String, Value> {
    let segments = address
        .segments()
        .iter()
        .map(|segment| {
            let mut entry = Map::new();
            entry.insert(segment.key.clone(), Value::String(segment.value.clone()));
            Value::Object(entry)
        })
        .collect();

    let mut body = Map::new();
    body.insert("operation".to_string(), Value::String(operation.to_string()));
    body.insert("address".to_string(), Value::Array(segments));
    body
}

fn check_outcome(response: ManagementResponse) -> anyhow::Result<Value> {
    if response.outcome == "success" {
        return Ok(response.result);
    }
    let reason = match response.failure_description {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => "no failure description".to_string(),
    };
    anyhow::bail!("Management operation {}: {}", response.outcome, reason)
}

fn status_from_result(result: &Value) -> anyhow::Result<String> {
    result
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Management response has no status"))
}
