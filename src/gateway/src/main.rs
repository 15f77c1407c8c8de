use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use radiomon_core::{
    AuddRecognizer, Collaborators, FfmpegSampler, HistoryLocation, MonitorSupervisor,
    PlaylistProvider, ProviderKind, RadiomonConfig, SpotifyProvider, StartupError, SystemClock,
    YouTubeProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter())
        .init();

    let file_config = match config_path_override() {
        Some(path) => RadiomonConfig::load_from(&path)?,
        None => RadiomonConfig::load()?,
    };
    let mut config = file_config.monitor_config()?;

    if let Ok(path) = env::var("RADIOMON_DB_PATH") {
        config.analytics.location = HistoryLocation::File(radiomon_core::resolve_path(&path)?);
    }
    if parse_bool("RADIOMON_DASHBOARD", config.analytics.dashboard.is_some()) {
        let addr = parse_optional_socket("RADIOMON_DASHBOARD_BIND")
            .or(config.analytics.dashboard)
            .unwrap_or_else(radiomon_core::default_dashboard_addr);
        config.analytics.dashboard = Some(addr);
    } else {
        config.analytics.dashboard = None;
    }

    let sampler = Arc::new(FfmpegSampler::new(file_config.capture.ffmpeg_path.clone()));
    if file_config.recognizer.api_token.trim().is_empty() {
        tracing::warn!(
            "recognizer api_token is empty; recognition will be rate limited or refused"
        );
    }
    let recognizer = Arc::new(AuddRecognizer::new(
        file_config.recognizer.endpoint.clone(),
        file_config.recognizer.api_token.clone(),
    )?);
    let mut collaborators = Collaborators::new(sampler, recognizer);

    let used = |kind: ProviderKind| {
        config
            .stations
            .iter()
            .any(|s| s.targets.iter().any(|t| t.provider == kind))
    };
    if used(ProviderKind::Spotify) {
        let provider = SpotifyProvider::from_config(&file_config.providers.spotify)?;
        collaborators = collaborators.with_provider(Arc::new(provider));
    }
    if used(ProviderKind::Youtube) {
        let provider = YouTubeProvider::from_config(&file_config.providers.youtube)?;
        collaborators = collaborators.with_provider(Arc::new(provider));
    }

    if parse_bool("RADIOMON_SKIP_VERIFY", false) {
        tracing::warn!("skipping provider account verification");
    } else {
        for provider in collaborators.providers() {
            verify_provider(provider.as_ref()).await?;
        }
    }

    let supervisor =
        MonitorSupervisor::start(config, collaborators, Arc::new(SystemClock)).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    supervisor.shutdown().await;
    Ok(())
}

async fn verify_provider(provider: &dyn PlaylistProvider) -> Result<(), StartupError> {
    let kind = provider.kind();
    match provider.verify().await {
        Ok(account) => {
            tracing::info!(provider = %kind, %account, "provider account verified");
            Ok(())
        }
        Err(message) => Err(StartupError::Verify {
            provider: kind.as_str(),
            message,
        }),
    }
}

/// `RADIOMON_CONFIG`, else the first CLI argument.
fn config_path_override() -> Option<PathBuf> {
    env::var_os("RADIOMON_CONFIG")
        .filter(|v| !v.is_empty())
        .or_else(|| env::args_os().nth(1))
        .map(PathBuf::from)
}

fn parse_optional_socket(key: &str) -> Option<SocketAddr> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"),
        Err(_) => default,
    }
}

fn tracing_filter() -> tracing_subscriber::EnvFilter {
    let explicit = env::var("RADIOMON_LOG").or_else(|_| env::var("RUST_LOG")).ok();
    if let Some(filter) = explicit {
        return tracing_subscriber::EnvFilter::new(filter);
    }
    if matches!(
        env::var("RADIOMON_DEBUG").as_deref(),
        Ok("1" | "true" | "TRUE" | "yes" | "YES")
    ) {
        return tracing_subscriber::EnvFilter::new("debug");
    }
    tracing_subscriber::EnvFilter::new("info")
}
