//! Video decoding through an `ffmpeg` subprocess.
//!
//! ffmpeg does the heavy lifting (demux, decode, resample to the target
//! rate, crop) and writes raw `rgb24` ROI frames to its stdout. We read one
//! frame-sized chunk per `next()`, so the pipe provides back-pressure.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use aimtune_common::clock::{ns_to_secs, sample_timestamp_ns};
use aimtune_common::config::RegionOfInterest;
use aimtune_common::error::{AimtuneError, AimtuneResult, PipelineStage};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

const STAGE: PipelineStage = PipelineStage::FrameSource;

/// Container/stream metadata reported by `ffprobe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Native frame rate, when the stream declares one.
    pub fps: Option<f64>,
    pub duration_secs: Option<f64>,
    pub frame_count: Option<u64>,
    pub codec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    codec_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Whether both `ffmpeg` and `ffprobe` are on the PATH.
pub fn ffmpeg_available() -> bool {
    command_exists("ffmpeg") && command_exists("ffprobe")
}

/// Whether `binary` resolves on the PATH.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Probe the first video stream of `path`.
pub fn probe_video(path: &Path) -> AimtuneResult<VideoInfo> {
    if !path.exists() {
        return Err(AimtuneError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames,codec_name,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| AimtuneError::unsupported(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(AimtuneError::decode(
            STAGE,
            format!(
                "ffprobe rejected {} (status {}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
        AimtuneError::decode(STAGE, format!("Unreadable ffprobe output: {e}"))
    })?;
    video_info_from_probe(path, probe)
}

fn video_info_from_probe(path: &Path, probe: ProbeOutput) -> AimtuneResult<VideoInfo> {
    let stream = probe.streams.into_iter().next().ok_or_else(|| {
        AimtuneError::decode(STAGE, format!("No video stream in {}", path.display()))
    })?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(AimtuneError::decode(
                STAGE,
                format!("Video stream in {} has no dimensions", path.display()),
            ))
        }
    };

    let duration_secs = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        duration_secs,
        frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        codec: stream.codec_name,
    })
}

/// Parse an ffprobe rational such as `60000/1001` or `30`.
pub(crate) fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Frame source backed by an `ffmpeg` child process.
pub struct FfmpegFrameSource {
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    roi_width: u32,
    roi_height: u32,
    sampling_rate_hz: f64,
    next_index: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Start decoding `path` at `sampling_rate_hz`, cropped to `roi`.
    pub fn open(
        path: &Path,
        roi: &RegionOfInterest,
        sampling_rate_hz: f64,
    ) -> AimtuneResult<Self> {
        if !path.exists() {
            return Err(AimtuneError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if !command_exists("ffmpeg") {
            return Err(AimtuneError::unsupported(
                "ffmpeg not found in PATH; install ffmpeg to analyze video files",
            ));
        }

        let info = probe_video(path)?;
        let (x, y, w, h) = roi.to_pixels(info.width, info.height);
        let args = decode_args(path, sampling_rate_hz, (x, y, w, h));

        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AimtuneError::decode(STAGE, format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            width = info.width,
            height = info.height,
            roi_width = w,
            roi_height = h,
            sampling_rate_hz,
            "ffmpeg decoder started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AimtuneError::decode(STAGE, "Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AimtuneError::decode(STAGE, "Failed to capture ffmpeg stderr"))?;

        // ffmpeg stalls if nobody reads its stderr.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            info,
            child,
            stdout: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
            roi_width: w,
            roi_height: h,
            sampling_rate_hz,
            next_index: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_bytes(&self) -> usize {
        self.roi_width as usize * self.roi_height as usize * 3
    }

    fn current_timestamp_secs(&self) -> f64 {
        ns_to_secs(sample_timestamp_ns(self.next_index, self.sampling_rate_hz))
    }

    /// Reap the child once stdout is exhausted and report how decoding ended.
    fn finish(&mut self) -> AimtuneResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| AimtuneError::decode(STAGE, format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        if !status.success() {
            return Err(AimtuneError::decode_at(
                STAGE,
                self.current_timestamp_secs(),
                format!("ffmpeg exited with {status}: {}", stderr_output.trim()),
            ));
        }
        if self.next_index == 0 {
            return Err(AimtuneError::empty_input(format!(
                "{} produced no frames",
                self.info.path.display()
            )));
        }

        tracing::debug!(frames = self.next_index, "ffmpeg decoder finished");
        Ok(())
    }
}

impl Iterator for FfmpegFrameSource {
    type Item = AimtuneResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buffer = vec![0u8; self.frame_bytes()];
        let filled = match read_full(&mut self.stdout, &mut buffer) {
            Ok(n) => n,
            Err(e) => {
                self.finished = true;
                return Some(Err(AimtuneError::decode_at(
                    STAGE,
                    self.current_timestamp_secs(),
                    format!("Failed reading ffmpeg output: {e}"),
                )));
            }
        };

        if filled == 0 {
            return self.finish().err().map(Err);
        }
        if filled < buffer.len() {
            let err = AimtuneError::decode_at(
                STAGE,
                self.current_timestamp_secs(),
                format!("Truncated frame: got {filled} of {} bytes", buffer.len()),
            );
            self.finished = true;
            self.child.kill().ok();
            self.child.wait().ok();
            return Some(Err(err));
        }

        let image = match RgbImage::from_raw(self.roi_width, self.roi_height, buffer) {
            Some(image) => image,
            None => {
                self.finished = true;
                return Some(Err(AimtuneError::decode(
                    STAGE,
                    "Frame buffer does not match ROI dimensions",
                )));
            }
        };

        let frame = Frame {
            index: self.next_index,
            timestamp_ns: sample_timestamp_ns(self.next_index, self.sampling_rate_hz),
            image,
            source_width: self.info.width,
            source_height: self.info.height,
        };
        self.next_index += 1;
        Some(Ok(frame))
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(pid = self.child.id(), "Stopping ffmpeg decoder early");
            self.child.kill().ok();
            self.child.wait().ok();
        }
    }
}

/// Read until `buffer` is full or the stream ends; returns bytes read.
fn read_full(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn decode_args(path: &Path, sampling_rate_hz: f64, roi: (u32, u32, u32, u32)) -> Vec<String> {
    let (x, y, w, h) = roi;
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        path.to_string_lossy().into_owned(),
        "-an".to_string(),
        "-vf".to_string(),
        format!("fps={sampling_rate_hz},crop={w}:{h}:{x}:{y}"),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-".to_string(),
    ]
}
