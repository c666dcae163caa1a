mod artifact;
mod compile;
pub mod filter;
pub mod normalize;
mod process;
pub mod reaper;
mod runner;

pub use artifact::{ArtifactHandle, ArtifactStore};
pub use filter::{ScanVerdict, scan};
pub use normalize::{NormalizedSource, normalize};
pub use process::{ExecLimits, ExecOutcome, supervise};

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use crate::config::{LimitsConfig, ToolchainConfig};

/// Result of invoking the compiler on one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success(String),
    Failure(String),
}

/// Result of running a compiled program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    TimedOut,
}

/// The external compiler and runtime, invoked through command templates
///
/// The toolchain is opaque: its only contract is exit status, output text and
/// dying when signalled.
#[derive(Debug, Clone)]
pub struct Toolchain {
    compile_command: Vec<String>,
    run_command: Vec<String>,
    env: Vec<(String, OsString)>,
    compile_limits: ExecLimits,
    run_limits: ExecLimits,
}

impl Toolchain {
    pub fn new(toolchain: &ToolchainConfig, limits: &LimitsConfig) -> Self {
        let env = toolchain
            .inherited_env
            .iter()
            .filter_map(|key| std::env::var_os(key).map(|value| (key.clone(), value)))
            .collect();

        Self {
            compile_command: toolchain.compile_command.clone(),
            run_command: toolchain.run_command.clone(),
            env,
            compile_limits: ExecLimits {
                timeout: limits.compile_timeout(),
                kill_grace: limits.kill_grace(),
                max_output_bytes: limits.max_output_bytes,
            },
            run_limits: ExecLimits {
                timeout: limits.execution_timeout(),
                kill_grace: limits.kill_grace(),
                max_output_bytes: limits.max_output_bytes,
            },
        }
    }

    pub fn execution_timeout(&self) -> std::time::Duration {
        self.run_limits.timeout
    }
}

/// Expands `%INPUT%`, `%OUTPUT%` and `%MAIN%` in each argument. Nothing goes
/// through a shell.
fn expand_template(
    template: &[String],
    source_path: &Path,
    out_dir: &Path,
    main_class: &str,
) -> Vec<String> {
    let source = source_path.to_string_lossy();
    let output = out_dir.to_string_lossy();
    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", &source);
    mapping.insert("%OUTPUT%", &output);
    mapping.insert("%MAIN%", main_class);

    template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}
