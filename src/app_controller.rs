use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::jobs::{BroadcastNotifier, JobEvent, JobManager, JobSnapshot, JobSpec, JobStatus};
use crate::providers::{BackendConfig, ConfiguredProviders};

// @module: Application controller for document translation

/// Outcome of translating one file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Translated { output: PathBuf, warnings: usize },
    Skipped { output: PathBuf },
}

/// Counts of a folder run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderSummary {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Job manager running the translations
    manager: JobManager,

    // @field: Event source for progress display
    events: BroadcastNotifier,

    // @field: Raw glossary object passed to every job
    glossary: Option<serde_json::Value>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let events = BroadcastNotifier::default();
        let manager = JobManager::new(
            config.pipeline.clone(),
            config.jobs.clone(),
            Arc::new(ConfiguredProviders::new(config.translation.clone())),
            Arc::new(events.clone()),
        );
        Ok(Self {
            config,
            manager,
            events,
            glossary: None,
        })
    }

    // @method: Load a glossary JSON object used by every job of this run
    pub fn with_glossary_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content = FileManager::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse glossary file: {:?}", path.as_ref()))?;
        self.glossary = Some(value);
        Ok(self)
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    fn backend(&self) -> BackendConfig {
        BackendConfig {
            provider: self.config.translation.provider.to_lowercase_string(),
            model: self.config.translation.get_model(),
            temperature: self.config.translation.temperature,
        }
    }

    /// Translate one document; `output` defaults to `<stem>.<target>.md` next to the input
    pub async fn run(&self, input_file: PathBuf, output: Option<PathBuf>, force_overwrite: bool) -> Result<FileOutcome> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, output, &multi_progress, force_overwrite)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output: Option<PathBuf>,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<FileOutcome> {
        let start_time = std::time::Instant::now();

        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path = output.unwrap_or_else(|| {
            let dir = input_file.parent().unwrap_or(Path::new("."));
            FileManager::generate_output_path(input_file, dir, &self.config.target_language)
        });
        if output_path.exists() && !force_overwrite {
            warn!("Skipping {:?}, translation already exists (use -f to force overwrite)", input_file);
            return Ok(FileOutcome::Skipped { output: output_path });
        }

        let document = FileManager::read_to_string(input_file)?;
        let mut spec = JobSpec::new(
            document,
            self.config.source_language.clone(),
            self.config.target_language.clone(),
            self.backend(),
        );
        if let Some(glossary) = &self.glossary {
            spec = spec.with_glossary(glossary.clone());
        }

        let progress_bar = multi_progress.add(ProgressBar::new(100));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {percent}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));

        // Subscribe before starting so no event of the job is missed
        let mut events = self.events.subscribe();
        let job_id = self.manager.start(spec)?;
        let snapshot = self.follow(&job_id, &mut events, &progress_bar).await?;

        match snapshot.status {
            JobStatus::Completed => {
                let result = self.manager.result(&job_id)?;
                FileManager::write_to_file(&output_path, &result)?;
                progress_bar.finish_with_message("done");
                info!(
                    "Translated {:?} → {:?} in {} ({} attempt(s))",
                    input_file,
                    output_path,
                    Self::format_duration(start_time.elapsed()),
                    snapshot.attempts
                );
                Ok(FileOutcome::Translated {
                    output: output_path,
                    warnings: snapshot.warnings.len(),
                })
            }
            JobStatus::Cancelled => {
                progress_bar.abandon_with_message("cancelled");
                Err(anyhow!("Translation of {:?} was cancelled", input_file))
            }
            _ => {
                progress_bar.abandon_with_message("failed");
                let reason = snapshot
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("job ended in state {}", snapshot.status));
                Err(anyhow!("Translation of {:?} failed: {}", input_file, reason))
            }
        }
    }

    /// Render job events until the job is terminal; Ctrl-C cancels the job
    async fn follow(
        &self,
        job_id: &str,
        events: &mut tokio::sync::broadcast::Receiver<JobEvent>,
        progress_bar: &ProgressBar,
    ) -> Result<JobSnapshot> {
        let wait = self.manager.wait(job_id);
        tokio::pin!(wait);
        let mut interrupted = false;

        loop {
            tokio::select! {
                snapshot = &mut wait => return Ok(snapshot?),
                signal = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    if signal.is_ok() {
                        warn!("Interrupted, cancelling job");
                        self.manager.cancel(job_id)?;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) if event.job_id() == job_id => match event {
                        JobEvent::ProgressUpdated { progress, message, .. } => {
                            progress_bar.set_position(progress as u64);
                            progress_bar.set_message(message);
                        }
                        JobEvent::WarningRaised { message, .. } => {
                            progress_bar.suspend(|| warn!("{}", message));
                        }
                        JobEvent::Failed { error, .. } => {
                            progress_bar.suspend(|| error!("{}", error));
                        }
                        _ => {}
                    },
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Ok(wait.await?),
                },
            }
        }
    }

    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Translate every document below `input_dir`, one job at a time
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = std::time::Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let documents = FileManager::find_documents(&input_dir, &self.config.target_language)?;
        if documents.is_empty() {
            return Err(anyhow!("No documents found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));

        let mut summary = FolderSummary::default();
        for document in documents.iter() {
            let file_name = document
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self.run_with_progress(document, None, &multi_progress, force_overwrite).await {
                Ok(FileOutcome::Translated { .. }) => summary.translated += 1,
                Ok(FileOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }
        folder_pb.finish_with_message("Folder processing complete");

        info!(
            "Folder processing completed in {}: {} translated, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            summary.translated,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}
