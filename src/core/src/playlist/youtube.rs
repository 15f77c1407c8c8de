use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use super::api::{AuthorizedClient, ClientAuth};
use super::provider::{PlaylistEntry, PlaylistProvider, ProviderKind};
use crate::radiomon_config::YouTubeConfig;
use crate::recognition::Recognition;

pub struct YouTubeProvider {
    client: AuthorizedClient,
    api_base: String,
}

impl YouTubeProvider {
    pub fn from_config(config: &YouTubeConfig) -> Result<Self, String> {
        let client = AuthorizedClient::new(
            &config.token_url,
            &config.client_id,
            &config.client_secret,
            &config.refresh_token,
            ClientAuth::Form,
        )?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, String> {
        let raw = format!("{}/{}", self.api_base, path);
        Url::parse_with_params(&raw, params)
            .map(String::from)
            .map_err(|err| format!("build url {raw}: {err}"))
    }

    async fn insert(
        &self,
        playlist_id: &str,
        video_id: &str,
        top: bool,
    ) -> Result<Option<String>, String> {
        let url = self.url("playlistItems", &[("part", "snippet")])?;
        let mut snippet = json!({
            "playlistId": playlist_id,
            "resourceId": { "kind": "youtube#video", "videoId": video_id }
        });
        if top {
            snippet["position"] = json!(0);
        }
        let created = self
            .client
            .send(Method::POST, &url, Some(&json!({ "snippet": snippet })))
            .await?;
        Ok(created.get("id").and_then(Value::as_str).map(str::to_string))
    }

    async fn remove(&self, entry: &PlaylistEntry) -> Result<(), String> {
        let item_id = entry
            .item_id
            .as_deref()
            .ok_or_else(|| format!("no playlist item id for video {}", entry.track_id))?;
        let url = self.url("playlistItems", &[("id", item_id)])?;
        self.client.send(Method::DELETE, &url, None).await?;
        Ok(())
    }
}

impl PlaylistProvider for YouTubeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Youtube
    }

    fn verify(&self) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async move {
            let url = self.url("channels", &[("part", "snippet"), ("mine", "true")])?;
            let body = self.client.get(&url).await?;
            body.pointer("/items/0/snippet/title")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| "account has no youtube channel".to_string())
        })
    }

    fn search_track<'a>(
        &'a self,
        track: &'a Recognition,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move {
            let query = format!("{} {} official music video", track.artist, track.title);
            let url = self.url(
                "search",
                &[
                    ("part", "id"),
                    ("type", "video"),
                    ("maxResults", "1"),
                    ("q", query.as_str()),
                ],
            )?;
            let body = self.client.get(&url).await?;
            Ok(body
                .pointer("/items/0/id/videoId")
                .and_then(Value::as_str)
                .map(str::to_string))
        })
    }

    fn list_tracks<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PlaylistEntry>, String>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let mut params = vec![
                    ("part", "id,snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", "50"),
                ];
                if let Some(token) = page_token.as_deref() {
                    params.push(("pageToken", token));
                }
                let url = self.url("playlistItems", &params)?;
                let page = self.client.get(&url).await?;
                entries.extend(parse_items_page(&page));
                match page.get("nextPageToken").and_then(Value::as_str) {
                    Some(token) => page_token = Some(token.to_string()),
                    None => break,
                }
            }
            Ok(entries)
        })
    }

    fn insert_top<'a>(
        &'a self,
        playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(self.insert(playlist_id, track_id, true))
    }

    fn insert_bottom<'a>(
        &'a self,
        playlist_id: &'a str,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(self.insert(playlist_id, track_id, false))
    }

    fn remove_top<'a>(
        &'a self,
        _playlist_id: &'a str,
        entry: &'a PlaylistEntry,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(self.remove(entry))
    }

    fn remove_bottom<'a>(
        &'a self,
        _playlist_id: &'a str,
        entry: &'a PlaylistEntry,
        _position: usize,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(self.remove(entry))
    }
}

/// One entry per playlist slot; items without a video id keep an empty one.
fn parse_items_page(page: &Value) -> Vec<PlaylistEntry> {
    let Some(items) = page.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let video_id = item
                .pointer("/snippet/resourceId/videoId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let inserted_at = item
                .pointer("/snippet/publishedAt")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            PlaylistEntry {
                track_id: video_id.to_string(),
                inserted_at,
                item_id: item.get("id").and_then(Value::as_str).map(str::to_string),
            }
        })
        .collect()
}
