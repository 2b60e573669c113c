//! Remote endpoint over HTTP, using ureq (blocking)
//!
//! Every request is POSTed as a JSON document; the reply body is the JSON
//! response model. Error statuses still carry a response model (the
//! endpoint reports failed outcomes with a 500), so their bodies are
//! decoded as well.

use crate::error::CliError;
use crate::session::ModelController;
use crate::value::ModelValue;
use std::time::Duration;
use tracing::debug;

pub struct HttpController {
    url: String,
    agent: ureq::Agent,
}

impl HttpController {
    pub fn new(url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .build();
        HttpController {
            url: url.to_string(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn decode(body: &str) -> Result<ModelValue, CliError> {
    serde_json::from_str::<serde_json::Value>(body)
        .map(ModelValue::from_json)
        .map_err(|e| CliError::TransportFailure(format!("invalid response: {}", e)))
}

impl ModelController for HttpController {
    fn execute(&mut self, request: &ModelValue) -> Result<ModelValue, CliError> {
        let body = request.to_json().to_string();
        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_string(&body);

        match response {
            Ok(resp) => {
                let text = resp
                    .into_string()
                    .map_err(|e| CliError::TransportFailure(e.to_string()))?;
                decode(&text)
            }
            Err(ureq::Error::Status(code, resp)) => {
                debug!(code, url = %self.url, "endpoint returned error status");
                let text = resp.into_string().unwrap_or_default();
                decode(&text).map_err(|_| CliError::TransportFailure(format!("HTTP {} from {}", code, self.url)))
            }
            Err(ureq::Error::Transport(t)) => Err(CliError::TransportFailure(t.to_string())),
        }
    }

    fn endpoint(&self) -> String {
        self.url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .split('/')
            .next()
            .unwrap_or("")
            .to_string()
    }
}

/// Placeholder controller for sessions without an endpoint
pub struct DisconnectedController;

impl ModelController for DisconnectedController {
    fn execute(&mut self, _request: &ModelValue) -> Result<ModelValue, CliError> {
        Err(CliError::TransportFailure("not connected".into()))
    }

    fn endpoint(&self) -> String {
        "disconnected".to_string()
    }
}
