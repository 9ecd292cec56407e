use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread;
use std::time::Instant;

use pactcheck_core::{Error as CoreError, Extraction, Location, ModelBuilder};
use pactcheck_extract::{ExtractOptions, SourceText, extract};
use pactcheck_report::{ExitStatus, build_report, render_summary, to_json};
use pactcheck_rules::evaluate;

use crate::atomic::write_bytes_atomic;
use crate::config::Settings;
use crate::discover::{ArtifactFile, discover};
use crate::errors::{CliError, CliResult};

/// Top-level notice when discovery found no artifact at all.
pub const NO_ARTIFACTS: &str = "no artifacts discovered";

/// Run one check: discover, extract, build, evaluate, report.
///
/// The JSON report is written to `out` atomically and the summary is
/// printed on stdout. Any error returned here happens before the model is
/// built, so no report is written for it.
pub fn run_check(settings: &Settings, out: &Path) -> CliResult<ExitStatus> {
    let timer = Instant::now();
    tracing::info!(
        event = "run_started",
        root = %settings.root.display(),
        config = ?settings.config_file,
        policy_granularity = settings.rules.policy_granularity.as_str()
    );

    let files = discover(settings)?;
    let sources = read_sources(&files)?;
    let extractions = extract_all(&sources, &settings.extract)?;
    tracing::info!(event = "extraction_finished", files = extractions.len());

    let mut builder = ModelBuilder::new(settings.build.clone());
    for extraction in extractions {
        builder.add(extraction);
    }
    let model = builder.build();
    tracing::info!(
        event = "model_built",
        tables = model.tables().len(),
        types = model.types().len(),
        endpoints = model.endpoints().len(),
        call_sites = model.call_sites().len(),
        parse_warnings = model.warnings().len()
    );

    let outcome = evaluate(&model, &settings.rules);

    let mut notices = Vec::new();
    if files.is_empty() {
        tracing::warn!(event = "no_artifacts", root = %settings.root.display());
        notices.push(NO_ARTIFACTS.to_string());
    }
    let report = build_report(outcome, model.warnings(), notices);

    let json = to_json(&report)?;
    write_bytes_atomic(out, json.as_bytes())?;
    tracing::info!(event = "report_written", path = %out.display());

    println!("{}", render_summary(&report));

    let status = ExitStatus::of(&report);
    tracing::info!(
        event = "run_finished",
        exit_code = status.code(),
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(status)
}

fn read_sources(files: &[ArtifactFile]) -> CliResult<Vec<(&ArtifactFile, SourceText)>> {
    files
        .iter()
        .map(|file| {
            let bytes = std::fs::read(&file.path)
                .map_err(|err| CoreError::unreadable(file.name.as_str(), err))?;
            let text = String::from_utf8(bytes)
                .map_err(|err| CoreError::unreadable(file.name.as_str(), err))?;
            tracing::debug!(
                event = "artifact_read",
                artifact = %file.kind,
                file = %file.name,
                bytes = text.len()
            );
            Ok((file, SourceText::new(file.name.as_str(), text)))
        })
        .collect()
}

/// Extract every source on a small pool of scoped threads.
///
/// An extractor that panics costs only its own file, which is reported as
/// a parse issue.
fn extract_all(
    sources: &[(&ArtifactFile, SourceText)],
    options: &ExtractOptions,
) -> CliResult<Vec<Extraction>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let chunk_size = sources.len().div_ceil(workers).max(1);

    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|(file, source)| extract_one(file, source, options))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut extractions = Vec::with_capacity(sources.len());
        for handle in handles {
            extractions.extend(handle.join().map_err(|_| CliError::Extraction)?);
        }
        Ok(extractions)
    })
}

fn extract_one(file: &ArtifactFile, source: &SourceText, options: &ExtractOptions) -> Extraction {
    panic::catch_unwind(AssertUnwindSafe(|| extract(file.kind, source, options))).unwrap_or_else(
        |_| {
            tracing::error!(event = "extractor_panicked", artifact = %file.kind, file = %file.name);
            let mut extraction = Extraction::new(file.kind, file.name.as_str());
            extraction.warn(
                Location::new(file.name.as_str(), 1, 1),
                format!("{} extractor failed on this file; it was skipped", file.kind),
            );
            extraction
        },
    )
}
