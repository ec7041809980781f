use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::args::GenerateArgs;
use crate::audio::wav_duration_seconds;
use crate::catalog::{Catalog, PlannedSample};
use crate::tts::{AudioQuality, TtsClient, best_audio_url};

#[derive(Debug, Clone)]
pub enum SampleOutcome {
    Written {
        filename: String,
        quality: AudioQuality,
        bytes: usize,
    },
    Failed {
        filename: String,
        reason: String,
    },
}

impl SampleOutcome {
    fn failed(sample: &PlannedSample, reason: impl Into<String>) -> Self {
        SampleOutcome::Failed {
            filename: sample.filename.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub quality: BTreeMap<AudioQuality, usize>,
    pub failures: Vec<(String, String)>,
}

impl GenerationReport {
    fn record(&mut self, outcome: SampleOutcome) {
        match outcome {
            SampleOutcome::Written { quality, .. } => {
                self.succeeded += 1;
                *self.quality.entry(quality).or_insert(0) += 1;
            }
            SampleOutcome::Failed { filename, reason } => {
                self.failed += 1;
                self.failures.push((filename, reason));
            }
        }
    }
}

/// Runs one batch through submit, poll, resolve and download. A failure in
/// submit or poll fails the whole batch; later failures only the one sample.
pub async fn generate_batch(client: &TtsClient, batch: &[PlannedSample]) -> Vec<SampleOutcome> {
    let requests: Vec<_> = batch.iter().map(|s| s.request.clone()).collect();

    let speak_urls = match client.submit_batch(&requests).await {
        Ok(urls) => urls,
        Err(e) => {
            error!("Batch submit failed: {:#}", e);
            return batch.iter().map(|s| SampleOutcome::failed(s, format!("submit: {:#}", e))).collect();
        }
    };
    let results = match client.poll_batch(&speak_urls).await {
        Ok(results) => results,
        Err(e) => {
            error!("Batch poll failed: {:#}", e);
            return batch.iter().map(|s| SampleOutcome::failed(s, format!("poll: {:#}", e))).collect();
        }
    };

    let mut outcomes = Vec::with_capacity(batch.len());
    for (i, sample) in batch.iter().enumerate() {
        let Some(result) = results.get(i) else {
            outcomes.push(SampleOutcome::failed(sample, "no result returned"));
            continue;
        };
        if !result.is_done() {
            outcomes.push(SampleOutcome::failed(sample, format!("status {}", result.status)));
            continue;
        }
        let Some((audio_url, quality)) = best_audio_url(result) else {
            outcomes.push(SampleOutcome::failed(sample, "missing audio URL"));
            continue;
        };
        let outcome = match download_sample(client, sample, &audio_url).await {
            Ok(bytes) => {
                info!("{}: {} ({} bytes)", quality.as_str().to_uppercase(), sample.filename, bytes);
                SampleOutcome::Written {
                    filename: sample.filename.clone(),
                    quality,
                    bytes,
                }
            }
            Err(e) => {
                warn!("Failed {}: {:#}", sample.filename, e);
                SampleOutcome::failed(sample, format!("{:#}", e))
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn download_sample(client: &TtsClient, sample: &PlannedSample, audio_url: &str) -> anyhow::Result<usize> {
    let download_url = client.resolve_download_url(audio_url).await?;
    let bytes = client.download(&download_url).await?;
    if let Some(parent) = sample.output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&sample.output_path, &bytes)?;
    match wav_duration_seconds(&bytes) {
        Ok(dur) => info!("{} duration: {:.2} seconds", sample.filename, dur),
        Err(_) => warn!("{} is not a WAV file; duration unknown", sample.filename),
    }
    Ok(bytes.len())
}

/// Submits `planned` in serial batches of `batch_size`.
pub async fn run_batches(client: &TtsClient, planned: &[PlannedSample], batch_size: usize) -> GenerationReport {
    let mut report = GenerationReport::default();
    let batch_size = batch_size.max(1);
    let total = planned.len().div_ceil(batch_size);
    for (i, batch) in planned.chunks(batch_size).enumerate() {
        info!("Processing batch {}/{} ({} files)", i + 1, total, batch.len());
        for outcome in generate_batch(client, batch).await {
            report.record(outcome);
        }
    }
    report
}

pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };

    let mut planned = Vec::new();
    for expressivity in args.expressivities() {
        if args.references {
            planned.extend(catalog.plan_references(expressivity, &args.out_dir));
        }
        let matrix = catalog.plan(expressivity, &args.out_dir);
        info!(
            "expressivity_{}: {} voices x {} emotions x 3 text types x {} scales = {}",
            expressivity,
            catalog.voices.len(),
            catalog.emotions.len(),
            catalog.scales.len(),
            matrix.len()
        );
        planned.extend(matrix);
    }
    let descriptors: Vec<_> = planned.iter().map(|p| p.descriptor.clone()).collect();

    let before = planned.len();
    if !args.overwrite {
        planned.retain(|p| !p.output_path.exists());
    }
    let skipped = before - planned.len();
    if skipped > 0 {
        info!("Skipping {} samples already on disk", skipped);
    }

    if args.dry_run {
        for p in &planned {
            println!("{}\t{}", p.filename, p.request.text);
        }
        info!("Dry run: {} samples would be generated", planned.len());
        return Ok(());
    }

    let client = TtsClient::new(&args.base_url, &args.token)?
        .with_polling(args.poll_attempts, Duration::from_millis(args.poll_interval_ms));

    let mut report = run_batches(&client, &planned, args.batch_size).await;
    report.skipped = skipped;

    let on_disk: Vec<_> = descriptors
        .into_iter()
        .filter(|d| args.out_dir.join(&d.filename).exists())
        .collect();
    let metadata_path = args.metadata_path();
    let pool_size = crate::store::save_pool(&metadata_path, &on_disk)?;
    info!("Sample metadata written to {} ({} samples)", metadata_path.display(), pool_size);

    info!("Success: {}/{}", report.succeeded, planned.len());
    info!("Failed: {}", report.failed);
    info!("Skipped (already present): {}", report.skipped);
    for (quality, count) in &report.quality {
        info!("  {}: {}", quality, count);
    }
    for (filename, reason) in report.failures.iter().take(10) {
        warn!("  {}: {}", filename, reason);
    }
    if report.failures.len() > 10 {
        warn!("  ... and {} more failures", report.failures.len() - 10);
    }
    Ok(())
}
