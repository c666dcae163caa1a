#![allow(dead_code)]

use std::path::Path;

use tempfile::TempDir;

use javarun::config::{Config, LimitsConfig, ScratchConfig, ServerConfig, ToolchainConfig};
use javarun::pipeline::Pipeline;
use javarun::sandbox::ArtifactStore;

/// Stand-in compiler: fails on sources containing `syntax error`, otherwise
/// "compiles" by copying the source to `<MAIN>.class`
const FAKE_COMPILE: &str = r##"if grep -q 'syntax error' %INPUT%; then echo "%INPUT%:3: error: ';' expected" >&2; echo "1 error" >&2; exit 1; fi; cp %INPUT% %OUTPUT%/%MAIN%.class"##;

/// Stand-in JVM: spins forever on `while(true)`, otherwise echoes the string
/// literals passed to `System.out.println`
const FAKE_RUN: &str = r##"if grep -q 'while(true)' %MAIN%.class; then while :; do :; done; fi; sed -n 's/.*System.out.println("\(.*\)");.*/\1/p' %MAIN%.class"##;

pub const EXECUTION_TIMEOUT_MS: u64 = 1000;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

pub fn fake_config(scratch: &Path) -> Config {
    Config {
        server: ServerConfig {
            max_concurrent_jobs: 16,
            ..ServerConfig::default()
        },
        limits: LimitsConfig {
            compile_timeout_ms: 3000,
            execution_timeout_ms: EXECUTION_TIMEOUT_MS,
            kill_grace_ms: 100,
            ..LimitsConfig::default()
        },
        toolchain: ToolchainConfig {
            compile_command: sh(FAKE_COMPILE),
            run_command: sh(FAKE_RUN),
            ..ToolchainConfig::default()
        },
        scratch: ScratchConfig {
            dir: Some(scratch.to_path_buf()),
            ..ScratchConfig::default()
        },
    }
}

/// Pipeline over a fresh scratch directory; keep the `TempDir` alive
pub fn fake_pipeline() -> (Pipeline, TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let config = fake_config(scratch.path());
    let store = ArtifactStore::open(scratch.path()).unwrap();
    (Pipeline::new(&config, store), scratch)
}

/// Pipeline using the real default JDK toolchain
pub fn java_pipeline() -> (Pipeline, TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let config = Config {
        scratch: ScratchConfig {
            dir: Some(scratch.path().to_path_buf()),
            ..ScratchConfig::default()
        },
        ..Config::default()
    };
    let store = ArtifactStore::open(scratch.path()).unwrap();
    (Pipeline::new(&config, store), scratch)
}

pub fn javac_available() -> bool {
    std::process::Command::new("javac")
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
