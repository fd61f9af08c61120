//! Analyze several recordings concurrently.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aimtune_analysis_core::CancelToken;
use anyhow::Context;
use tokio::sync::Semaphore;

use super::analyze::{AnalysisReport, SessionSetup};
use crate::SessionArgs;

struct Outcome {
    input: PathBuf,
    result: anyhow::Result<PathBuf>,
}

pub async fn run(
    inputs: Vec<PathBuf>,
    jobs: usize,
    output_dir: PathBuf,
    args: SessionArgs,
) -> anyhow::Result<()> {
    let setup = Arc::new(SessionSetup::from_args(&args)?);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let jobs = jobs.max(1);
    println!("Analyzing {} inputs ({jobs} at a time)", inputs.len());

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nInterrupted, cancelling remaining sessions...");
            interrupt.cancel();
        }
    });

    let semaphore = Arc::new(Semaphore::new(jobs));
    let report_paths = report_paths(&inputs, &output_dir);
    let mut handles = Vec::with_capacity(inputs.len());

    for (input, report_path) in inputs.into_iter().zip(report_paths) {
        let permit = semaphore.clone().acquire_owned().await?;
        let setup = setup.clone();
        let cancel = cancel.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            tracing::info!(input = %input.display(), "Session started");
            let result = setup
                .analyze(&input, &cancel)
                .and_then(|summary| write_report(&input, summary, &report_path));
            Outcome { input, result }
        }));
    }

    let mut failed = 0usize;
    for handle in handles {
        let outcome = handle.await.context("Analysis worker panicked")?;
        match outcome.result {
            Ok(path) => println!("[OK]   {} -> {}", outcome.input.display(), path.display()),
            Err(e) => {
                failed += 1;
                println!("[FAIL] {}: {e:#}", outcome.input.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} session(s) failed");
    }
    println!("\nAll sessions complete.");
    Ok(())
}

fn write_report(
    input: &Path,
    summary: aimtune_session_model::SessionSummary,
    path: &Path,
) -> anyhow::Result<PathBuf> {
    let report = AnalysisReport::new(input, summary);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// One `<stem>.json` per input; repeated stems get a numeric suffix.
fn report_paths(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut used = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "session".to_string());
            let mut name = stem.clone();
            let mut n = 1;
            while !used.insert(name.clone()) {
                n += 1;
                name = format!("{stem}-{n}");
            }
            output_dir.join(format!("{name}.json"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_paths_are_unique() {
        let inputs = vec![
            PathBuf::from("a/match.mp4"),
            PathBuf::from("b/match.mkv"),
            PathBuf::from("scrim.mp4"),
        ];
        let paths = report_paths(&inputs, Path::new("out"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/match.json"),
                PathBuf::from("out/match-2.json"),
                PathBuf::from("out/scrim.json"),
            ]
        );
    }
}
