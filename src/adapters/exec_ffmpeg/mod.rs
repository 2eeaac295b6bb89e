//! FFmpeg execution adapter
//!
//! Implements the [`Encoder`] port with the `ffmpeg` and `ffprobe` command
//! line tools. Every child process is killed when its future is dropped, so
//! timeouts and cancellation never leave an encoder running.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::EncoderSettings;
use crate::domain::model::{MediaProbe, StreamInfo, StreamKind};
use crate::engine::progress::CancelToken;
use crate::error::{CutlistError, CutlistResult};
use crate::ports::{Encoder, ProcessOutcome, TimeCallback, TimeWindow};

/// Diagnostic lines kept from a failed run
const STDERR_TAIL_LINES: usize = 20;
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// `ffmpeg`/`ffprobe` backed encoder
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg_path.clone(),
            ffprobe: settings.ffprobe_path.clone(),
        }
    }

    /// Run ffprobe and return its stdout
    async fn ffprobe(&self, args: &[String]) -> CutlistResult<Vec<u8>> {
        trace!("{} {}", self.ffprobe, args.join(" "));
        let output = Command::new(&self.ffprobe)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(PROBE_TIMEOUT, output)
            .await
            .map_err(|_| CutlistError::probe(format!("{} timed out", self.ffprobe)))?
            .map_err(|e| CutlistError::probe(format!("could not start {}: {}", self.ffprobe, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CutlistError::probe(format!(
                "{} exited with {}: {}",
                self.ffprobe,
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn probe(&self, path: &Path) -> CutlistResult<MediaProbe> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        let stdout = self.ffprobe(&args).await?;
        parse_probe(path, &stdout)
    }

    async fn run(
        &self,
        args: &[String],
        cancel: &CancelToken,
        on_time: TimeCallback<'_>,
    ) -> CutlistResult<ProcessOutcome> {
        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CutlistError::encode("spawn", format!("could not start {}: {}", self.ffmpeg, e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CutlistError::encode("spawn", "stderr was not captured"))?;

        let work = async move {
            let mut reader = BufReader::new(stderr);
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut chunk = Vec::new();

            // Progress lines end in '\r', diagnostics in '\n'
            loop {
                chunk.clear();
                match reader.read_until(b'\r', &mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                for line in String::from_utf8_lossy(&chunk).split(|c: char| c == '\r' || c == '\n') {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(seconds) = parse_progress_time(line) {
                        on_time(seconds);
                        continue;
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
            }

            let status = child.wait().await;
            (status, tail)
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Cancelled, stopping {}", self.ffmpeg);
                Err(CutlistError::Cancelled)
            }
            (status, tail) = work => {
                let status = status?;
                let stderr = Vec::from(tail).join("\n");
                Ok(ProcessOutcome {
                    success: status.success(),
                    exit_code: status.code(),
                    stderr,
                })
            }
        }
    }

    async fn find_keyframes(&self, path: &Path, window: TimeWindow) -> CutlistResult<Vec<f64>> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-read_intervals".to_string(),
            format!("{:.3}%{:.3}", window.start, window.end),
            "-show_entries".to_string(),
            "packet=pts_time,flags".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        let stdout = self.ffprobe(&args).await?;
        parse_keyframes(&stdout, window)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PacketOutput {
    #[serde(default)]
    packets: Vec<Packet>,
}

#[derive(Debug, Deserialize)]
struct Packet {
    pts_time: Option<String>,
    flags: Option<String>,
}

/// Build a [`MediaProbe`] from `ffprobe -print_format json` output
pub fn parse_probe(path: &Path, json: &[u8]) -> CutlistResult<MediaProbe> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| CutlistError::probe(format!("unreadable ffprobe output for {}: {}", path.display(), e)))?;

    let streams: Vec<StreamInfo> = output
        .streams
        .iter()
        .map(|stream| StreamInfo {
            index: stream.index,
            kind: match stream.codec_type.as_deref() {
                Some("video") => StreamKind::Video,
                Some("audio") => StreamKind::Audio,
                Some("subtitle") => StreamKind::Subtitle,
                _ => StreamKind::Data,
            },
            codec: stream.codec_name.clone().unwrap_or_default(),
            width: stream.width,
            height: stream.height,
            sample_rate: stream.sample_rate.as_deref().and_then(|rate| rate.parse().ok()),
        })
        .collect();

    let duration = output
        .format
        .and_then(|format| format.duration)
        .or_else(|| output.streams.iter().find_map(|stream| stream.duration.clone()))
        .and_then(|duration| duration.parse::<f64>().ok())
        .ok_or_else(|| CutlistError::probe(format!("{} has no duration", path.display())))?;

    Ok(MediaProbe {
        path: path.to_path_buf(),
        duration,
        streams,
    })
}

/// Keyframe timestamps inside `window` from a packet listing
pub fn parse_keyframes(json: &[u8], window: TimeWindow) -> CutlistResult<Vec<f64>> {
    let output: PacketOutput = serde_json::from_slice(json)
        .map_err(|e| CutlistError::probe(format!("unreadable packet listing: {}", e)))?;

    let mut keyframes: Vec<f64> = output
        .packets
        .iter()
        .filter(|packet| packet.flags.as_deref().map_or(false, |flags| flags.contains('K')))
        .filter_map(|packet| packet.pts_time.as_deref()?.parse::<f64>().ok())
        .filter(|time| *time >= window.start && *time <= window.end)
        .collect();
    keyframes.sort_by(f64::total_cmp);
    keyframes.dedup();
    Ok(keyframes)
}

/// Seconds written so far, from a `time=HH:MM:SS.xx` progress line
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let value = line.split("time=").nth(1)?.split_whitespace().next()?;
    let mut seconds = 0.0;
    for part in value.split(':') {
        seconds = seconds * 60.0 + part.parse::<f64>().ok()?;
    }
    (seconds >= 0.0).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_time() {
        let line = "frame=  150 fps= 30 q=28.0 size=    1024kB time=00:01:05.50 bitrate= 200.0kbits/s speed=1.50x";
        assert_eq!(parse_progress_time(line), Some(65.5));
        assert_eq!(parse_progress_time("time=N/A bitrate=N/A"), None);
        assert_eq!(parse_progress_time("Input #0, mov,mp4"), None);
    }

    #[test]
    fn test_parse_probe() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000"}
            ],
            "format": {"duration": "100.040000"}
        }"#;
        let probe = parse_probe(Path::new("a.mp4"), json).unwrap();
        assert_eq!(probe.duration, 100.04);
        assert_eq!(probe.video_codec(), Some("h264"));
        assert!(probe.has_audio());
        assert_eq!(probe.streams[1].sample_rate, Some(48000));
    }

    #[test]
    fn test_parse_probe_without_duration() {
        let json = br#"{"streams": [], "format": {}}"#;
        assert!(matches!(
            parse_probe(Path::new("a.mp4"), json),
            Err(CutlistError::Probe { .. })
        ));
    }

    #[test]
    fn test_parse_keyframes() {
        let json = br#"{"packets": [
            {"pts_time": "4.000000", "flags": "K__"},
            {"pts_time": "4.033000", "flags": "___"},
            {"pts_time": "0.000000", "flags": "K__"},
            {"pts_time": "8.000000", "flags": "K_"},
            {"pts_time": "50.000000", "flags": "K_"}
        ]}"#;
        let window = TimeWindow { start: 0.0, end: 25.0 };
        assert_eq!(parse_keyframes(json, window).unwrap(), vec![0.0, 4.0, 8.0]);
    }
}
