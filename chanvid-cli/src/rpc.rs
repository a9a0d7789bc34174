use crate::config::Credentials;
use crate::http::{build_client, method_url};
use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chanvid::model::DialogsPage;
use chanvid::{ChannelHandle, ChunkResponse, ChunkTransport, FileLocation, HistoryPage};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::trace;

pub const DIALOGS_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("rpc error {code}: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Api {
        code: i32,
        error: String,
        description: Option<String>,
    },
    #[error("unexpected {method} result: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid chunk payload: {0}")]
    Payload(#[from] base64::DecodeError),
    #[error("invalid gateway URL: {0:#}")]
    Url(anyhow::Error),
}

impl RpcError {
    /// Seconds requested by a `FLOOD_WAIT_<n>` error.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            RpcError::Api { error, .. } => error.strip_prefix("FLOOD_WAIT_")?.parse().ok(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Http(err) => err.is_timeout() || err.is_connect() || err.is_body(),
            RpcError::Status(status) => *status >= 500 || *status == 429 || *status == 408,
            RpcError::Api { code, .. } => *code == 420 || *code >= 500,
            RpcError::Decode { .. } | RpcError::Payload(_) | RpcError::Url(_) => false,
        }
    }
}

/// Gateway envelope. `result` is decoded separately so a shape mismatch keeps
/// its own error message.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        match self.username.as_deref().filter(|name| !name.is_empty()) {
            Some(username) => format!("{} (@{})", full, username),
            None => full.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "_")]
enum FileChunk {
    #[serde(rename = "upload.file")]
    File { bytes: String },
    #[serde(rename = "upload.fileCdnRedirect")]
    CdnRedirect { dc_id: i32 },
}

/// Client for the JSON gateway in front of the messaging service. One
/// instance covers the account session, dialog directory, history pages and
/// file chunks.
pub struct RpcClient {
    base_url: String,
    http: Client,
    credentials: Credentials,
}

impl RpcClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            http: build_client()?,
            credentials,
        })
    }

    pub fn get_self(&self) -> Result<User, RpcError> {
        self.call("users.getSelf", json!({}))
    }

    pub fn get_dialogs(&self, limit: u32) -> Result<DialogsPage, RpcError> {
        self.call(
            "messages.getDialogs",
            json!({
                "offset_peer": {"_": "inputPeerEmpty"},
                "limit": limit,
            }),
        )
    }

    pub fn get_history(&self, channel: &ChannelHandle, limit: u32) -> Result<HistoryPage, RpcError> {
        // Basic groups carry no access hash.
        let peer = if channel.access_hash == 0 {
            json!({"_": "inputPeerChat", "chat_id": channel.id})
        } else {
            json!({
                "_": "inputPeerChannel",
                "channel_id": channel.id,
                "access_hash": channel.access_hash,
            })
        };
        self.call("messages.getHistory", json!({"peer": peer, "limit": limit}))
    }

    pub fn get_file(
        &self,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<ChunkResponse, RpcError> {
        let chunk: FileChunk = self.call(
            "upload.getFile",
            json!({
                "location": {
                    "_": "inputDocumentFileLocation",
                    "id": location.id,
                    "access_hash": location.access_hash,
                    "file_reference": location.file_reference,
                    "thumb_size": "",
                },
                "offset": offset,
                "limit": limit,
            }),
        )?;
        match chunk {
            FileChunk::File { bytes } => Ok(ChunkResponse::Bytes(STANDARD.decode(bytes)?)),
            FileChunk::CdnRedirect { dc_id } => Ok(ChunkResponse::Redirect { dc_id }),
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Result<T, RpcError> {
        let url = method_url(&self.base_url, method).map_err(RpcError::Url)?;
        trace!(method, "rpc call");

        let mut request = self
            .http
            .post(url)
            .header("X-Api-Id", self.credentials.api_id.to_string())
            .header("X-Api-Hash", &self.credentials.api_hash)
            .json(&payload);
        if let Some(token) = self.credentials.session_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() && !status.is_client_error() {
            return Err(RpcError::Status(status.as_u16()));
        }
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        if !is_json {
            return Err(RpcError::Status(status.as_u16()));
        }

        let envelope: Envelope = response.json()?;
        if !envelope.ok {
            return Err(RpcError::Api {
                code: envelope.error_code.unwrap_or(status.as_u16() as i32),
                error: envelope.error.unwrap_or_else(|| "UNKNOWN".to_string()),
                description: envelope.description,
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null)).map_err(|source| {
            RpcError::Decode {
                method: method.to_string(),
                source,
            }
        })
    }
}

impl ChunkTransport for RpcClient {
    fn fetch_range(&self, location: &FileLocation, offset: u64, limit: u32) -> Result<ChunkResponse> {
        Ok(self.get_file(location, offset, limit)?)
    }
}
