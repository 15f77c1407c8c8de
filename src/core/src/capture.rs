use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::process::Command;

/// Extra seconds granted to ffmpeg beyond the requested sample length.
const FFMPEG_TIMEOUT_EXTRA: Duration = Duration::from_secs(15);

/// Grabs a short audio sample from a live stream.
pub trait AudioSampler: Send + Sync + 'static {
    fn capture<'a>(
        &'a self,
        source: &'a str,
        duration: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, String>>;
}

/// Samples streams by running `ffmpeg` and reading mono MP3 from its stdout.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    binary: String,
}

impl FfmpegSampler {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, source: &str, duration: Duration) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-y", "-re", "-i", source])
            .args(["-t", &duration.as_secs().to_string()])
            .args(["-acodec", "libmp3lame", "-ar", "44100", "-ac", "1"])
            .args(["-loglevel", "error", "-f", "mp3", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioSampler for FfmpegSampler {
    fn capture<'a>(
        &'a self,
        source: &'a str,
        duration: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, String>> {
        Box::pin(async move {
            let limit = duration + FFMPEG_TIMEOUT_EXTRA;
            let mut cmd = self.command(source, duration);
            let output = tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| format!("ffmpeg timed out after {}s", limit.as_secs()))?
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => format!("{} not found on PATH", self.binary),
                    _ => format!("spawn ffmpeg: {e}"),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!("ffmpeg failed: {}", stderr.trim()));
            }
            if output.stdout.is_empty() {
                return Err("ffmpeg produced no audio".to_string());
            }
            tracing::debug!(
                bytes = output.stdout.len(),
                secs = duration.as_secs(),
                "sample captured"
            );
            Ok(output.stdout)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let sampler = FfmpegSampler::new("radiomon-no-such-ffmpeg");
        let err = sampler
            .capture("http://127.0.0.1:9/stream", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.contains("not found"), "{err}");
    }

    #[test]
    fn command_requests_mono_mp3_on_stdout() {
        let sampler = FfmpegSampler::default();
        let cmd = sampler.command("http://radio/live", Duration::from_secs(12));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-t", "12"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }
}
