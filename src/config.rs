use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "javarun", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Address to bind, overrides the configuration file
    #[arg(long = "bind")]
    pub bind_address: Option<String>,

    /// Port to bind, overrides the configuration file
    #[arg(long = "port", short = 'p')]
    pub bind_port: Option<u16>,
}

impl CliArgs {
    /// Load the configuration from the specified file, falling back to defaults
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .map_err(|e| anyhow!("Unable to open config file {path}: {e}"))?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader)?
            }
            None => Config::default(),
        };

        if let Some(address) = &self.bind_address {
            config.server.bind_address = Some(address.clone());
        }
        if let Some(port) = self.bind_port {
            config.server.bind_port = Some(port);
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub toolchain: ToolchainConfig,
    pub scratch: ScratchConfig,
}

impl Config {
    /// Rejects timeout combinations under which the reaper could race a live request
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.max_source_chars == 0 {
            bail!("limits.max_source_chars must not be 0");
        }
        if limits.execution_timeout() >= limits.compile_timeout() {
            bail!(
                "limits.execution_timeout_ms ({}) must be shorter than limits.compile_timeout_ms ({})",
                limits.execution_timeout_ms,
                limits.compile_timeout_ms
            );
        }
        // Each supervised stage may overrun its timeout by one kill grace
        let request_bound =
            limits.compile_timeout() + limits.execution_timeout() + limits.kill_grace() * 2;
        if self.scratch.max_age() <= request_bound {
            bail!(
                "scratch.max_age_secs ({}s) must exceed the longest request ({}s)",
                self.scratch.max_age_secs,
                request_bound.as_secs_f64()
            );
        }
        if self.toolchain.compile_command.is_empty() || self.toolchain.run_command.is_empty() {
            bail!("toolchain commands must not be empty");
        }
        if self.server.max_concurrent_jobs == 0 {
            bail!("server.max_concurrent_jobs must not be 0");
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
    pub max_concurrent_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            bind_port: None,
            max_concurrent_jobs: 4,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_source_chars: usize,
    pub compile_timeout_ms: u64,
    pub execution_timeout_ms: u64,
    pub kill_grace_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_source_chars: 10_000,
            compile_timeout_ms: 10_000,
            execution_timeout_ms: 5_000,
            kill_grace_ms: 500,
            max_output_bytes: 64 * 1024,
        }
    }
}

impl LimitsConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Command templates for the external toolchain
///
/// `%INPUT%` expands to the absolute source path, `%OUTPUT%` to the
/// per-request output directory and `%MAIN%` to the entry class name.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToolchainConfig {
    pub language: String,
    pub compile_command: Vec<String>,
    pub run_command: Vec<String>,
    pub inherited_env: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let owned = |args: &[&str]| args.iter().map(|s| s.to_string()).collect();
        Self {
            language: "java".to_string(),
            compile_command: owned(&["javac", "-encoding", "UTF-8", "-d", "%OUTPUT%", "%INPUT%"]),
            run_command: owned(&["java", "-Xmx256m", "-Xss8m", "-cp", "%OUTPUT%", "%MAIN%"]),
            inherited_env: owned(&["PATH", "JAVA_HOME", "LANG"]),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ScratchConfig {
    pub dir: Option<PathBuf>,
    pub sweep_interval_secs: u64,
    pub max_age_secs: u64,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: None,
            sweep_interval_secs: 600,
            max_age_secs: 300,
        }
    }
}

impl ScratchConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Resolves the scratch root, defaulting to the user cache directory
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        use directories::ProjectDirs;

        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        let proj_dirs = ProjectDirs::from("", "", "javarun")
            .ok_or_else(|| anyhow!("Unable to find user directory"))?;
        Ok(proj_dirs.cache_dir().join("scratch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("config/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(config.limits.max_source_chars, 10_000);
        assert_eq!(config.limits.execution_timeout(), Duration::from_secs(5));
        assert_eq!(config.toolchain.compile_command[0], "javac");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "limits": { "execution_timeout_ms": 2000 } }"#).unwrap();
        assert_eq!(config.limits.execution_timeout_ms, 2000);
        assert_eq!(config.limits.compile_timeout_ms, 10_000);
        assert_eq!(config.scratch.max_age_secs, 300);
        assert_eq!(config.toolchain.language, "java");
    }

    #[test]
    fn test_execution_timeout_must_be_shorter_than_compile() {
        let mut config = Config::default();
        config.limits.execution_timeout_ms = config.limits.compile_timeout_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_age_must_exceed_request_duration() {
        let mut config = Config::default();
        config.scratch.max_age_secs = 15;
        assert!(config.validate().is_err());
        // 10s compile + 5s execution + 2 x 0.5s kill grace
        config.scratch.max_age_secs = 16;
        assert!(config.validate().is_err());
        config.scratch.max_age_secs = 17;
        assert!(config.validate().is_ok());

        config.limits.kill_grace_ms = 1500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_bind() {
        let cli = CliArgs::parse_from(["javarun", "--bind", "0.0.0.0", "-p", "9000"]);
        let config = cli.to_config().unwrap();
        assert_eq!(config.server.bind_address.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.server.bind_port, Some(9000));
    }
}
