use std::path::Path;

use anyhow::Result;

use super::{CompileOutcome, ExecOutcome, Toolchain, expand_template, supervise};

impl Toolchain {
    /// Compiles `source_path` with `out_dir` as working and output directory
    ///
    /// Any non-zero exit or an overrun of the compile timeout is a `Failure`
    /// carrying whatever the compiler printed. `Err` is reserved for failures
    /// of the service itself, such as a missing compiler binary.
    pub async fn compile(
        &self,
        source_path: &Path,
        out_dir: &Path,
        main_class: &str,
    ) -> Result<CompileOutcome> {
        let command = expand_template(&self.compile_command, source_path, out_dir, main_class);
        let outcome = supervise(&command, out_dir, &self.env, &self.compile_limits).await?;

        Ok(match outcome {
            ExecOutcome::Exited {
                status,
                stdout,
                stderr,
            } => {
                let text = combine(&stderr, &stdout);
                if status.success() {
                    CompileOutcome::Success(text)
                } else {
                    CompileOutcome::Failure(text)
                }
            }
            ExecOutcome::TimedOut => CompileOutcome::Failure(format!(
                "Compilation timed out after {} ms",
                self.compile_limits.timeout.as_millis()
            )),
        })
    }
}

fn combine(first: &str, second: &str) -> String {
    match (first.trim().is_empty(), second.trim().is_empty()) {
        (false, false) => format!("{first}\n{second}"),
        (false, true) => first.to_string(),
        (true, _) => second.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{LimitsConfig, ToolchainConfig};

    fn toolchain(compile: &str) -> Toolchain {
        let config = ToolchainConfig {
            compile_command: vec!["sh".into(), "-c".into(), compile.into()],
            ..ToolchainConfig::default()
        };
        let limits = LimitsConfig {
            compile_timeout_ms: 1000,
            execution_timeout_ms: 500,
            kill_grace_ms: 100,
            ..LimitsConfig::default()
        };
        Toolchain::new(&config, &limits)
    }

    #[tokio::test]
    async fn test_successful_compile() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("Main.java");
        std::fs::write(&source, "class Main {}").unwrap();

        let outcome = toolchain("cp %INPUT% %OUTPUT%/Main.class")
            .compile(&source, tmp.path(), "Main")
            .await
            .unwrap();
        assert_eq!(outcome, CompileOutcome::Success(String::new()));
        assert!(tmp.path().join("Main.class").exists());
    }

    #[tokio::test]
    async fn test_failure_carries_compiler_text() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("Main.java");
        let outcome = toolchain("echo \"%INPUT%:1: error: ';' expected\" >&2; exit 1")
            .compile(&source, tmp.path(), "Main")
            .await
            .unwrap();
        let CompileOutcome::Failure(text) = outcome else {
            panic!("expected failure");
        };
        assert!(text.contains("error: ';' expected"));
        assert!(text.contains(&source.display().to_string()));
    }

    #[tokio::test]
    async fn test_compile_timeout_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = toolchain("sleep 10")
            .compile(&tmp.path().join("Main.java"), tmp.path(), "Main")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CompileOutcome::Failure("Compilation timed out after 1000 ms".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_compiler_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ToolchainConfig {
            compile_command: vec!["/nonexistent/javac".into()],
            ..ToolchainConfig::default()
        };
        let toolchain = Toolchain::new(&config, &LimitsConfig::default());
        assert!(
            toolchain
                .compile(&tmp.path().join("Main.java"), tmp.path(), "Main")
                .await
                .is_err()
        );
    }
}
