use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_AUDD_ENDPOINT: &str = "https://api.audd.io/";

/// Display metadata for a recognized track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recognition {
    pub artist: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl Recognition {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: None,
        }
    }
}

/// Identifies the track playing in an audio sample.
///
/// `Ok(None)` means the service answered but found nothing (talk, jingle, ad).
pub trait Recognizer: Send + Sync + 'static {
    fn identify<'a>(
        &'a self,
        audio: &'a [u8],
    ) -> BoxFuture<'a, Result<Option<Recognition>, String>>;
}

/// Recognizer backed by the AudD HTTP API (or a compatible endpoint).
pub struct AuddRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl AuddRecognizer {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| format!("build recognizer http client: {err}"))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token: api_token.into(),
        })
    }
}

impl Recognizer for AuddRecognizer {
    fn identify<'a>(
        &'a self,
        audio: &'a [u8],
    ) -> BoxFuture<'a, Result<Option<Recognition>, String>> {
        Box::pin(async move {
            let file = reqwest::multipart::Part::bytes(audio.to_vec())
                .file_name("sample.mp3")
                .mime_str("audio/mpeg")
                .map_err(|err| format!("build upload: {err}"))?;
            let form = reqwest::multipart::Form::new()
                .text("api_token", self.api_token.clone())
                .part("file", file);
            let response = self
                .client
                .post(&self.endpoint)
                .multipart(form)
                .send()
                .await
                .map_err(|err| format!("request recognition: {err}"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("recognition request returned status {status}"));
            }
            let payload: Value = response
                .json()
                .await
                .map_err(|err| format!("decode recognition payload: {err}"))?;
            let recognition = parse_audd_payload(&payload)?;
            if let Some(found) = recognition.as_ref() {
                tracing::debug!(artist = %found.artist, title = %found.title, "audd match");
            }
            Ok(recognition)
        })
    }
}

fn parse_audd_payload(payload: &Value) -> Result<Option<Recognition>, String> {
    match payload.get("status").and_then(Value::as_str) {
        Some("success") => {}
        _ => {
            let message = payload
                .pointer("/error/error_message")
                .and_then(Value::as_str)
                .unwrap_or("unknown recognition error");
            return Err(message.to_string());
        }
    }
    let Some(result) = payload.get("result").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let field = |name: &str| {
        result
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match (field("artist"), field("title")) {
        (Some(artist), Some(title)) => Ok(Some(Recognition {
            artist,
            title,
            album: field("album"),
        })),
        _ => Ok(None),
    }
}
