use std::path::Path;

use anyhow::Result;

use super::{ExecOutcome, ExecutionOutcome, Toolchain, expand_template, supervise};

impl Toolchain {
    /// Runs the compiled `main_class` from `work_dir` under the execution timeout
    ///
    /// Stdin is closed from the start, so programs waiting for input see EOF
    /// instead of hanging until the deadline.
    pub async fn run(
        &self,
        source_path: &Path,
        work_dir: &Path,
        main_class: &str,
    ) -> Result<ExecutionOutcome> {
        let command = expand_template(&self.run_command, source_path, work_dir, main_class);
        let outcome = supervise(&command, work_dir, &self.env, &self.run_limits).await?;

        Ok(match outcome {
            ExecOutcome::Exited {
                status,
                stdout,
                stderr,
            } => ExecutionOutcome::Completed {
                stdout,
                stderr,
                exit_code: status.code(),
            },
            ExecOutcome::TimedOut => ExecutionOutcome::TimedOut,
        })
    }
}
