//! Analyze a single recording.

use std::io::Write;
use std::path::{Path, PathBuf};

use aimtune_analysis_core::{analyze_image_sequence, analyze_video, CancelToken};
use aimtune_common::config::{AnalysisConfig, AppConfig};
use aimtune_session_model::{parse_combat_events, CombatEvent, SessionSummary};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::SessionArgs;

/// File written for every analyzed input.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub input: PathBuf,
    pub analyzed_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub summary: SessionSummary,
}

impl AnalysisReport {
    pub fn new(input: &Path, summary: SessionSummary) -> Self {
        Self {
            input: input.to_path_buf(),
            analyzed_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            summary,
        }
    }
}

/// Everything a session needs besides its input path.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub config: AnalysisConfig,
    pub combat_events: Vec<CombatEvent>,
    pub frames_dir_fps: f64,
}

impl SessionSetup {
    pub fn from_args(args: &SessionArgs) -> anyhow::Result<Self> {
        let app = match &args.config {
            Some(path) => AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AppConfig::load(),
        };
        let mut config = app.analysis;
        if let Some(rate) = args.sampling_rate {
            config.sampling_rate_hz = rate;
        }
        if let Some(fov) = args.fov {
            config.field_of_view_degrees = fov;
        }
        config.validate().context("Invalid analysis configuration")?;

        let combat_events = match &args.combat_events {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Combat event log not found: {}", path.display()))?;
                parse_combat_events(&content)
                    .with_context(|| format!("Failed to parse combat events in {}", path.display()))?
            }
            None => Vec::new(),
        };

        Ok(Self {
            config,
            combat_events,
            frames_dir_fps: args.frames_dir_fps,
        })
    }

    /// Run one blocking analysis session over `input`.
    pub fn analyze(&self, input: &Path, cancel: &CancelToken) -> anyhow::Result<SessionSummary> {
        let summary = if input.is_dir() {
            analyze_image_sequence(
                input,
                self.frames_dir_fps,
                &self.combat_events,
                &self.config,
                Some(cancel),
            )
        } else {
            analyze_video(input, &self.combat_events, &self.config, Some(cancel))
        };
        summary.with_context(|| format!("Analysis of {} failed", input.display()))
    }
}

/// Progress and the digest go to stderr; stdout carries only the JSON report
/// when no `--output` is given.
pub async fn run(input: PathBuf, output: Option<PathBuf>, args: SessionArgs) -> anyhow::Result<()> {
    let setup = SessionSetup::from_args(&args)?;
    eprintln!("Analyzing: {}", input.display());
    if !setup.combat_events.is_empty() {
        eprintln!("  Loaded {} combat events", setup.combat_events.len());
    }

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let worker_input = input.clone();
    let mut task =
        tokio::task::spawn_blocking(move || setup.analyze(&worker_input, &worker_cancel));

    let summary = tokio::select! {
        joined = &mut task => joined.context("Analysis worker panicked")??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted, stopping...");
            cancel.cancel();
            // Let the worker observe the flag and release the decoder.
            let _ = task.await;
            anyhow::bail!("Analysis cancelled");
        }
    };

    write_digest(&mut std::io::stderr().lock(), &summary)?;

    let report = AnalysisReport::new(&input, summary);
    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            eprintln!("\nReport saved to: {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Human-readable digest of a session.
pub fn write_digest(out: &mut impl Write, summary: &SessionSummary) -> std::io::Result<()> {
    let rec = &summary.recommendation;
    writeln!(
        out,
        "  Frames: {} ({} motion samples, {:.1}s)",
        summary.frames_analyzed, summary.motion_samples, summary.duration_secs
    )?;
    writeln!(
        out,
        "  Engagements: {} ({} hit, {} miss, {} disengaged, {} discarded)",
        summary.engagement_count(),
        summary.outcomes.hit,
        summary.outcomes.miss,
        summary.outcomes.disengaged,
        summary.discarded_engagements
    )?;
    if summary.motion.tracking_segment_count > 0 {
        writeln!(
            out,
            "  Tracking: {} smooth segment(s), {:.1} deg",
            summary.motion.tracking_segment_count, summary.motion.tracking_distance_deg
        )?;
    }
    if summary.low_confidence_fraction > 0.0 {
        writeln!(
            out,
            "  Low-confidence tracking: {:.0}% of samples, {} gap(s)",
            summary.low_confidence_fraction * 100.0,
            summary.tracking_gaps.len()
        )?;
    }
    writeln!(
        out,
        "  Recommendation: {:?} x{:.2} (confidence {:?}, {:.2})",
        rec.direction, rec.factor, rec.confidence_level, rec.confidence_score
    )?;
    for reason in &rec.rationale {
        writeln!(out, "    - {reason}")?;
    }
    Ok(())
}
