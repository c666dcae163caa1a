use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::PipelineError;
use crate::sandbox::{
    ArtifactHandle, ArtifactStore, CompileOutcome, ExecutionOutcome, ScanVerdict, Toolchain,
    normalize, scan,
};

/// Placeholder shown instead of scratch paths in compiler output
const SCRATCH_PLACEHOLDER: &str = "<scratch>";
const NO_OUTPUT: &str = "(no output)";

/// One submission as received from the caller
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source: String,
    pub language: Option<String>,
    pub version: Option<String>,
}

/// Final outcome plus the wall-clock time since the request was received
#[derive(Debug)]
pub struct PipelineReport {
    pub result: Result<String, PipelineError>,
    pub elapsed: Duration,
}

/// validate -> filter -> write -> compile -> execute -> clean
pub struct Pipeline {
    store: ArtifactStore,
    toolchain: Toolchain,
    language: String,
    max_source_chars: usize,
    slots: Semaphore,
}

impl Pipeline {
    pub fn new(config: &Config, store: ArtifactStore) -> Self {
        Self {
            store,
            toolchain: Toolchain::new(&config.toolchain, &config.limits),
            language: config.toolchain.language.clone(),
            max_source_chars: config.limits.max_source_chars,
            slots: Semaphore::new(config.server.max_concurrent_jobs),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn max_source_chars(&self) -> usize {
        self.max_source_chars
    }

    pub async fn execute(&self, request: CompileRequest) -> PipelineReport {
        let received = Instant::now();
        let result = self.process(request).await;
        if let Err(PipelineError::Internal(e)) = &result {
            log::error!("Internal error while processing submission: {e:#}");
        }
        PipelineReport {
            result,
            elapsed: received.elapsed(),
        }
    }

    async fn process(&self, request: CompileRequest) -> Result<String, PipelineError> {
        self.validate(&request)?;

        if let ScanVerdict::Blocked(reason) = scan(&request.source) {
            log::info!("Submission rejected by security filter: {reason}");
            return Err(PipelineError::SecurityViolation(reason.to_string()));
        }

        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| anyhow!("Execution slots closed"))?;

        let artifact = self.store.allocate()?;
        log::info!("Processing submission as artifact {}", artifact.id());

        let result = self.build_and_run(&artifact, &request.source).await;
        artifact.cleanup();
        result
    }

    fn validate(&self, request: &CompileRequest) -> Result<(), PipelineError> {
        if request.source.trim().is_empty() {
            return Err(PipelineError::Validation("No code provided".to_string()));
        }
        let chars = request.source.chars().count();
        if chars > self.max_source_chars {
            return Err(PipelineError::Validation(format!(
                "Code too long ({chars} characters, maximum is {})",
                self.max_source_chars
            )));
        }
        if let Some(language) = &request.language
            && !language.eq_ignore_ascii_case(&self.language)
        {
            return Err(PipelineError::Validation(format!(
                "Unsupported language '{language}', only '{}' is available",
                self.language
            )));
        }
        if let Some(version) = &request.version {
            log::debug!("Ignoring requested version {version}");
        }
        Ok(())
    }

    async fn build_and_run(
        &self,
        artifact: &ArtifactHandle,
        source: &str,
    ) -> Result<String, PipelineError> {
        let normalized = normalize(source);
        if normalized.wrapped {
            log::debug!("Wrapped artifact {} in an entry point", artifact.id());
        }
        let source_path = artifact.write_source(&normalized.file_name(), &normalized.text)?;
        let work_dir = artifact.dir().to_path_buf();

        let compiled = self
            .toolchain
            .compile(&source_path, &work_dir, &normalized.entry_class)
            .await
            .context("Compiler invocation failed")?;
        if let CompileOutcome::Failure(text) = compiled {
            let text = sanitize(&text, &work_dir, self.store.root());
            log::debug!("Artifact {} failed to compile:\n{text}", artifact.id());
            return Err(PipelineError::Compile(text));
        }

        let executed = self
            .toolchain
            .run(&source_path, &work_dir, &normalized.entry_class)
            .await
            .context("Runner invocation failed")?;

        match executed {
            ExecutionOutcome::TimedOut => {
                log::info!("Artifact {} timed out", artifact.id());
                Err(PipelineError::ExecutionTimeout(self.toolchain.execution_timeout()))
            }
            ExecutionOutcome::Completed {
                stdout,
                stderr,
                exit_code,
            } => {
                let text = match exit_code {
                    Some(0) if !stdout.trim().is_empty() => stdout,
                    Some(0) => stderr,
                    _ => [stdout.trim_end(), stderr.trim_end()]
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n"),
                };
                let output = format_output(&sanitize(&text, &work_dir, self.store.root()));
                match exit_code {
                    Some(0) => Ok(output),
                    code => Err(PipelineError::Runtime {
                        code: code.unwrap_or(-1), // -1 when killed by a signal
                        output,
                    }),
                }
            }
        }
    }
}

/// Replaces scratch locations with a stable placeholder
///
/// The request directory disappears entirely so `/.../<id>/Main.java:3` reads
/// `Main.java:3`; anything else under the scratch root becomes `<scratch>`.
pub fn sanitize(text: &str, work_dir: &Path, scratch_root: &Path) -> String {
    let work_dir = work_dir.to_string_lossy();
    let scratch_root = scratch_root.to_string_lossy();
    text.replace(&format!("{work_dir}/"), "")
        .replace(work_dir.as_ref(), ".")
        .replace(scratch_root.as_ref(), SCRATCH_PLACEHOLDER)
}

fn format_output(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        trimmed.to_string()
    }
}
