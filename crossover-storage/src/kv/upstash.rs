//! Upstash REST backend.
//!
//! Each command is POSTed as a JSON array (`["INCR", "key"]`) to the REST
//! endpoint with a bearer token. Single commands answer `{"result": ...}` or
//! `{"error": "..."}`; `/multi-exec` runs a list of commands as one
//! transaction and answers with one such object per command.

use async_trait::async_trait;
use crossover_core::{BackendError, BackendResult, KvConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::traits::KeyValueBackend;

/// Reply envelope for one command.
#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl CommandReply {
    fn into_result(self, command: &str) -> BackendResult<Value> {
        match self.error {
            Some(message) => Err(BackendError::CommandFailed {
                command: command.to_string(),
                message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Key/value backend speaking the Upstash REST protocol.
#[derive(Debug, Clone)]
pub struct UpstashBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl UpstashBackend {
    /// Create a backend from validated connection settings.
    pub fn new(config: &KvConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Transport {
                endpoint: config.url.clone(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Run a single command.
    async fn command(&self, args: Value) -> BackendResult<Value> {
        let name = command_name(&args);
        let body = self.post(&self.base_url, &args, &name).await?;
        let reply: CommandReply =
            serde_json::from_value(body).map_err(|e| BackendError::MalformedResponse {
                command: name.clone(),
                reason: e.to_string(),
            })?;
        reply.into_result(&name)
    }

    /// Run several commands inside one MULTI/EXEC transaction.
    async fn transaction(&self, commands: Value) -> BackendResult<Vec<Value>> {
        let url = format!("{}/multi-exec", self.base_url);
        let body = self.post(&url, &commands, "MULTI").await?;
        let replies: Vec<CommandReply> =
            serde_json::from_value(body).map_err(|e| BackendError::MalformedResponse {
                command: "MULTI".to_string(),
                reason: e.to_string(),
            })?;

        let names: Vec<String> = commands
            .as_array()
            .map(|cmds| cmds.iter().map(command_name).collect())
            .unwrap_or_default();

        replies
            .into_iter()
            .enumerate()
            .map(|(i, reply)| {
                let name = names.get(i).map(String::as_str).unwrap_or("MULTI");
                reply.into_result(name)
            })
            .collect()
    }

    async fn post(&self, url: &str, body: &Value, command: &str) -> BackendResult<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BackendError::Transport {
            endpoint: url.to_string(),
            reason: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<CommandReply>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(text);
            return Err(match status {
                StatusCode::BAD_REQUEST => BackendError::CommandFailed {
                    command: command.to_string(),
                    message,
                },
                _ => BackendError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        serde_json::from_str(&text).map_err(|e| BackendError::MalformedResponse {
            command: command.to_string(),
            reason: e.to_string(),
        })
    }
}

fn command_name(args: &Value) -> String {
    args.get(0)
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string()
}

#[async_trait]
impl KeyValueBackend for UpstashBackend {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn get(&self, key: &str) -> BackendResult<Option<Value>> {
        let value = self.command(json!(["GET", key])).await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> BackendResult<()> {
        let args = match ttl_secs {
            Some(secs) => json!(["SET", key, value, "EX", secs]),
            None => json!(["SET", key, value]),
        };
        self.command(args).await.map(|_| ())
    }

    async fn incr(&self, key: &str) -> BackendResult<Value> {
        self.command(json!(["INCR", key])).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> BackendResult<Value> {
        self.command(json!(["EXPIRE", key, ttl_secs])).await
    }

    async fn pttl(&self, key: &str) -> BackendResult<Value> {
        self.command(json!(["PTTL", key])).await
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> BackendResult<Vec<Value>> {
        self.transaction(json!([["INCR", key], ["EXPIRE", key, ttl_secs]]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_command_reply_error_maps_to_command_failed() {
        let reply: CommandReply =
            serde_json::from_str(r#"{"error":"ERR value is not an integer"}"#).unwrap();
        let err = reply.into_result("INCR").unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { ref command, .. } if command == "INCR"));
    }

    #[test]
    fn test_command_reply_missing_result_is_null() {
        let reply: CommandReply = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert_eq!(reply.into_result("GET").unwrap(), Value::Null);

        let reply: CommandReply = serde_json::from_str(r#"{"result":"3"}"#).unwrap();
        assert_eq!(reply.into_result("GET").unwrap(), json!("3"));
    }

    #[test]
    fn test_command_name_extraction() {
        assert_eq!(command_name(&json!(["PTTL", "k"])), "PTTL");
        assert_eq!(command_name(&json!([])), "UNKNOWN");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = KvConfig::new("https://example.upstash.io/", "token")
            .with_timeout(Duration::from_millis(500));
        let backend = UpstashBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "https://example.upstash.io");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config =
            KvConfig::new("http://127.0.0.1:9", "token").with_timeout(Duration::from_millis(200));
        let backend = UpstashBackend::new(&config).unwrap();
        let err = backend.get("ct:graph:version").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
