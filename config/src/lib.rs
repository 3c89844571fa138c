//! Shade Configuration
//!
//! Shared configuration crate for all Shade components.
//!
//! Handles loading configuration from:
//! 1. SHADE_CONFIG env var (explicit path)
//! 2. ./shade.toml (current directory)
//! 3. ~/.shade/shade.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "shade.toml";
const CONFIG_DIR_NAME: &str = ".shade";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_TREE_HEIGHT: u8 = 20;
pub const MAX_TREE_HEIGHT: u8 = 32;
const DEFAULT_ROOT_HISTORY: usize = 32;
const DEFAULT_MAX_CONSOLIDATE_INPUTS: usize = 4;

const DEFAULT_PROOF_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROOF_RETRIES: u32 = 3;
const DEFAULT_PROOF_RETRY_BASE_MS: u64 = 200;

const DEFAULT_MAX_SUBMIT_ATTEMPTS: u32 = 3;
const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATUS_POLL_MS: u64 = 25;

const DEFAULT_RELAYER: &str = "direct";
const DEFAULT_RELAYER_TIMEOUT_MS: u64 = 2_000;

const DEFAULT_SCAN_INTERVAL_MS: u64 = 500;
const DEFAULT_SCAN_BATCH: usize = 256;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadeConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub circuit: CircuitConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// Commitment tree shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_height")]
    pub height: u8,
    /// Number of recent roots a proof may reference
    #[serde(default = "default_root_history")]
    pub root_history: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            height: DEFAULT_TREE_HEIGHT,
            root_history: DEFAULT_ROOT_HISTORY,
        }
    }
}

fn default_tree_height() -> u8 {
    DEFAULT_TREE_HEIGHT
}
fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

/// Limits of the deployed circuits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    #[serde(default = "default_max_consolidate_inputs")]
    pub max_consolidate_inputs: usize,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_consolidate_inputs: DEFAULT_MAX_CONSOLIDATE_INPUTS,
        }
    }
}

fn default_max_consolidate_inputs() -> usize {
    DEFAULT_MAX_CONSOLIDATE_INPUTS
}

/// Proof request behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_proof_timeout")]
    pub timeout_secs: u64,
    /// Retries after the backend reports itself unavailable
    #[serde(default = "default_proof_retries")]
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    #[serde(default = "default_proof_retry_base")]
    pub retry_base_ms: u64,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PROOF_TIMEOUT_SECS,
            max_retries: DEFAULT_PROOF_RETRIES,
            retry_base_ms: DEFAULT_PROOF_RETRY_BASE_MS,
        }
    }
}

fn default_proof_timeout() -> u64 {
    DEFAULT_PROOF_TIMEOUT_SECS
}
fn default_proof_retries() -> u32 {
    DEFAULT_PROOF_RETRIES
}
fn default_proof_retry_base() -> u64 {
    DEFAULT_PROOF_RETRY_BASE_MS
}

/// Submission and confirmation behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Attempts (each with a fresh proof) before giving up with congestion
    #[serde(default = "default_max_submit_attempts")]
    pub max_submit_attempts: u32,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_status_poll")]
    pub status_poll_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_submit_attempts: DEFAULT_MAX_SUBMIT_ATTEMPTS,
            confirm_timeout_ms: DEFAULT_CONFIRM_TIMEOUT_MS,
            status_poll_ms: DEFAULT_STATUS_POLL_MS,
        }
    }
}

fn default_max_submit_attempts() -> u32 {
    DEFAULT_MAX_SUBMIT_ATTEMPTS
}
fn default_confirm_timeout() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_MS
}
fn default_status_poll() -> u64 {
    DEFAULT_STATUS_POLL_MS
}

/// Relayer endpoints, tried in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(default = "default_relayers")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_relayer_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            endpoints: default_relayers(),
            request_timeout_ms: DEFAULT_RELAYER_TIMEOUT_MS,
        }
    }
}

fn default_relayers() -> Vec<String> {
    vec![DEFAULT_RELAYER.into()]
}
fn default_relayer_timeout() -> u64 {
    DEFAULT_RELAYER_TIMEOUT_MS
}

/// In-process reference ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Upper bound on stored nullifiers (unbounded when absent)
    #[serde(default)]
    pub nullifier_capacity: Option<usize>,
    /// Delay between acceptance and confirmation
    #[serde(default)]
    pub confirmation_delay_ms: u64,
}

/// Note discovery loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scan_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_scan_batch")]
    pub batch_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            batch_size: DEFAULT_SCAN_BATCH,
        }
    }
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}
fn default_scan_batch() -> usize {
    DEFAULT_SCAN_BATCH
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Source of override values, `std::env` outside of tests
trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(src: &dyn EnvSource, key: &str, field: &mut T) {
    if let Some(v) = src.get(key) {
        match v.trim().parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

/// Set Option<T> from env var if present and parseable
fn env_parse_option<T: std::str::FromStr>(src: &dyn EnvSource, key: &str, field: &mut Option<T>) {
    if let Some(v) = src.get(key) {
        match v.trim().parse() {
            Ok(parsed) => *field = Some(parsed),
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

/// Set a list from a comma-separated env var
fn env_list(src: &dyn EnvSource, key: &str, field: &mut Vec<String>) {
    if let Some(v) = src.get(key) {
        let items: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if !items.is_empty() {
            *field = items;
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadeConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides(&ProcessEnv);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(&ProcessEnv);
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHADE_CONFIG env var
        if let Ok(path) = env::var("SHADE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHADE_CONFIG points at missing file {}", path.display());
        }

        // 2. Check ./shade.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shade/shade.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self, src: &dyn EnvSource) {
        // Tree
        env_parse(src, "SHADE_TREE_HEIGHT", &mut self.tree.height);
        env_parse(src, "SHADE_ROOT_HISTORY", &mut self.tree.root_history);

        // Circuit
        env_parse(
            src,
            "SHADE_MAX_CONSOLIDATE_INPUTS",
            &mut self.circuit.max_consolidate_inputs,
        );

        // Prover
        env_parse(src, "SHADE_PROOF_TIMEOUT_SECS", &mut self.prover.timeout_secs);
        env_parse(src, "SHADE_PROOF_RETRIES", &mut self.prover.max_retries);
        env_parse(src, "SHADE_PROOF_RETRY_BASE_MS", &mut self.prover.retry_base_ms);

        // Submission
        env_parse(
            src,
            "SHADE_MAX_SUBMIT_ATTEMPTS",
            &mut self.submission.max_submit_attempts,
        );
        env_parse(
            src,
            "SHADE_CONFIRM_TIMEOUT_MS",
            &mut self.submission.confirm_timeout_ms,
        );

        // Relayer
        env_list(src, "SHADE_RELAYERS", &mut self.relayer.endpoints);

        // Ledger
        env_parse_option(
            src,
            "SHADE_NULLIFIER_CAPACITY",
            &mut self.ledger.nullifier_capacity,
        );
        env_parse(
            src,
            "SHADE_CONFIRMATION_DELAY_MS",
            &mut self.ledger.confirmation_delay_ms,
        );

        // Scanner
        env_parse(src, "SHADE_SCAN_INTERVAL_MS", &mut self.scanner.poll_interval_ms);
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.tree.height == 0 || self.tree.height > MAX_TREE_HEIGHT {
            bail!(
                "tree.height must be between 1 and {MAX_TREE_HEIGHT}, got {}",
                self.tree.height
            );
        }
        if self.tree.root_history == 0 {
            bail!("tree.root_history must be at least 1");
        }
        // A fragmented balance can only be merged two or more notes at a time
        if self.circuit.max_consolidate_inputs < 2 {
            bail!(
                "circuit.max_consolidate_inputs must be at least 2, got {}",
                self.circuit.max_consolidate_inputs
            );
        }
        if self.submission.max_submit_attempts == 0 {
            bail!("submission.max_submit_attempts must be at least 1");
        }
        if self.relayer.endpoints.is_empty() {
            bail!("relayer.endpoints must name at least one relayer");
        }
        if self.scanner.batch_size == 0 {
            bail!("scanner.batch_size must be at least 1");
        }
        Ok(())
    }

    pub fn proof_timeout(&self) -> Duration {
        Duration::from_secs(self.prover.timeout_secs)
    }

    pub fn proof_retry_base(&self) -> Duration {
        Duration::from_millis(self.prover.retry_base_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.submission.confirm_timeout_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.submission.status_poll_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scanner.poll_interval_ms)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.relayer.endpoints = vec!["direct".into(), "backup".into()];
        sample.ledger.nullifier_capacity = Some(1 << 20);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
