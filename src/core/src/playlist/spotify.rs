use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use super::api::{AuthorizedClient, ClientAuth};
use super::provider::{PlaylistEntry, PlaylistProvider, ProviderKind};
use crate::radiomon_config::SpotifyConfig;
use crate::recognition::Recognition;

const PAGE_LIMIT: &str = "100";

pub struct SpotifyProvider {
    client: AuthorizedClient,
    api_base: String,
    market: Option<String>,
}

impl SpotifyProvider {
    pub fn from_config(config: &SpotifyConfig) -> Result<Self, String> {
        let client = AuthorizedClient::new(
            &config.token_url,
            &config.client_id,
            &config.client_secret,
            &config.refresh_token,
            ClientAuth::Basic,
        )?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            market: config.market.clone().filter(|m| !m.trim().is_empty()),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, String> {
        let raw = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        Url::parse_with_params(&raw, params)
            .map(String::from)
            .map_err(|err| format!("build url {raw}: {err}"))
    }

    fn items_url(&self, playlist_id: &str) -> Result<String, String> {
        self.url(&format!("playlists/{playlist_id}/items"), &[])
    }

    async fn search_once(&self, query: &str) -> Result<Option<String>, String> {
        let mut params = vec![("q", query), ("type", "track"), ("limit", "1")];
        if let Some(market) = self.market.as_deref() {
            params.push(("market", market));
        }
        let url = self.url("search", &params)?;
        let body = self.client.get(&url).await?;
        Ok(body
            .pointer("/tracks/items/0/uri")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn insert(
        &self,
        playlist_id: &str,
        track_id: &str,
        top: bool,
    ) -> Result<Option<String>, String> {
        let url = self.items_url(playlist_id)?;
        let body = if top {
            json!({ "uris": [track_id], "position": 0 })
        } else {
            json!({ "uris": [track_id] })
        };
        self.client.send(Method::POST, &url, Some(&body)).await?;
        Ok(None)
    }

    async fn remove(
        &self,
        playlist_id: &str,
        entry: &PlaylistEntry,
        position: usize,
    ) -> Result<(), String> {
        if entry.track_id.is_empty() {
            return Err(format!(
                "item at position {position} is unavailable and can only be removed by hand"
            ));
        }
        let url = self.items_url(playlist_id)?;
        let body = json!({
            "items": [{ "uri": entry.track_id, "positions": [position] }]
        });
        self.client.send(Method::DELETE, &url, Some(&body)).await?;
        Ok(())
    }
}

impl PlaylistProvider for SpotifyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Spotify
    }

    fn verify(&self) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async move {
            let url = self.url("me", &[])?;
            let me = self.client.get(&url).await?;
            let product = me.get("product").and_then(Value::as_str).unwrap_or("unknown");
            if product != "premium" {
                return Err(format!(
                    "playlist writes require a premium account (account product is {product})"
                ));
            }
            let name = me
                .get("display_name")
                .and_then(Value::as_str)
                .or_else(|| me.get("id").and_then(Value::as_str))
                .unwrap_or("unknown");
            Ok(name.to_string())
        })
    }

    fn search_track<'a>(
        &'a self,
        track: &'a Recognition,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move {
            for query in search_queries(&track.artist, &track.title) {
                if let Some(uri) = self.search_once(&query).await? {
                    tracing::debug!(query = %query, uri = %uri, "spotify search hit");
                    return Ok(Some(uri));
                }
            }
            Ok(None)
        })
    }

    fn list_tracks<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PlaylistEntry>, String>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut next = Some(self.url(
                &format!("playlists/{playlist_id}/items"),
                &[("limit", PAGE_LIMIT), ("fields", "items(added_at,track(uri)),next")],
            )?);
            while let Some(url) = next.take() {
                let page = self.client.get(&url).await?;
                entries.extend(parse_items_page(&page));
                next = page.get("next").and_then(Value::as_str).map(str::to_string);
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
        playlist_id: &'a str,
        entry: &'a PlaylistEntry,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(self.remove(playlist_id, entry, 0))
    }

    fn remove_bottom<'a>(
        &'a self,
        playlist_id: &'a str,
        entry: &'a PlaylistEntry,
        position: usize,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(self.remove(playlist_id, entry, position))
    }
}

/// One entry per playlist slot, so indices match provider positions.
///
/// Unavailable items (`"track": null`) keep their slot with an empty track id.
fn parse_items_page(page: &Value) -> Vec<PlaylistEntry> {
    let Some(items) = page.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let uri = item
                .pointer("/track/uri")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let inserted_at = item
                .get("added_at")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            PlaylistEntry {
                track_id: uri.to_string(),
                inserted_at,
                item_id: None,
            }
        })
        .collect()
}

/// Search queries to try in order, most specific first.
///
/// Station metadata often carries the original-script title in parentheses
/// or an edition suffix like "(Radio Edit)"; both get their own attempts.
pub fn search_queries(artist: &str, title: &str) -> Vec<String> {
    let artist = artist.trim();
    let title = title.trim();
    let alt_title = alternate_form(title);
    let alt_artist = alternate_form(artist);

    let mut queries = vec![format!("artist:{artist} track:{title}")];
    if let Some(alt) = alt_title {
        queries.push(format!("artist:{artist} track:{alt}"));
        queries.push(format!("{artist} {alt}"));
    }
    if let Some(alt) = alt_artist {
        queries.push(format!("{alt} {title}"));
        if let Some(alt_t) = alt_title {
            queries.push(format!("{alt} {alt_t}"));
        }
    }
    queries.push(format!("{artist} {title}"));
    queries.push(format!("{artist} - {title}"));

    let first = first_artist(artist);
    if first != artist {
        queries.push(format!("{first} {title}"));
        if let Some(alt) = alt_title {
            queries.push(format!("{first} {alt}"));
        }
    }

    let stripped = strip_trailing_group(title);
    if !stripped.is_empty() && stripped != title {
        queries.push(format!("artist:{artist} track:{stripped}"));
        queries.push(format!("{artist} {stripped}"));
    }
    if let Some(alt) = alt_title {
        queries.push(format!("track:{alt}"));
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries
}

/// Text inside the first parenthesised group when it is written in a
/// non-Latin script.
fn alternate_form(value: &str) -> Option<&str> {
    let open = value.find('(')?;
    let close = value[open..].find(')')? + open;
    let inner = value[open + 1..close].trim();
    let non_latin = inner.chars().any(|c| c.is_alphabetic() && !c.is_ascii());
    (non_latin && !inner.is_empty()).then_some(inner)
}

fn first_artist(artist: &str) -> &str {
    artist
        .split([',', '&'])
        .next()
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(artist)
}

/// Drop a trailing "(...)" or "[...]" group such as "(Radio Edit)".
fn strip_trailing_group(title: &str) -> &str {
    let trimmed = title.trim_end();
    let open = match trimmed.chars().last() {
        Some(')') => '(',
        Some(']') => '[',
        _ => return trimmed,
    };
    match trimmed.rfind(open) {
        Some(idx) => trimmed[..idx].trim_end(),
        None => trimmed,
    }
}
