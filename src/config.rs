//! # Benchmark Configuration
//!
//! Loads the YAML benchmark catalogue, validates it once, and resolves the
//! benchmark selected on the command line. Also loads the chat prompt that
//! every worker sends.
//!
//! ```yaml
//! benchmarks:
//!   - name: gpt-small
//!     api_key: sk-...
//!     model_id: gpt-4o-mini
//!     base_url: http://localhost:8000/v1   # optional
//!     prompt_path: prompt.json              # default
//!     benchmark_time_sec: 30                # default
//!     request_timeout: 30                   # default
//! ```

use crate::error::{BenchmarkError, BenchmarkResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

fn default_prompt_path() -> PathBuf {
    PathBuf::from(crate::defaults::PROMPT_PATH)
}

fn default_benchmark_time_sec() -> u64 {
    crate::defaults::BENCHMARK_TIME_SEC
}

fn default_request_timeout() -> u64 {
    crate::defaults::REQUEST_TIMEOUT_SEC
}

/// One benchmark target as declared in the configuration file.
///
/// Shared read-only by every worker of every phase.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkSpec {
    /// Unique key used to select this benchmark; also the output directory name
    pub name: String,

    /// Base URL of the OpenAI-compatible API (e.g. `http://host:8000/v1`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer credential; empty for keyless servers, which then get no
    /// `Authorization` header
    pub api_key: String,

    pub model_id: String,

    /// JSON file holding the chat messages sent with every request
    #[serde(default = "default_prompt_path")]
    pub prompt_path: PathBuf,

    /// Length of each phase in seconds
    #[serde(default = "default_benchmark_time_sec")]
    pub benchmark_time_sec: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl BenchmarkSpec {
    /// Minimal spec with the documented defaults, mostly useful for tests.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            api_key: api_key.into(),
            model_id: model_id.into(),
            prompt_path: default_prompt_path(),
            benchmark_time_sec: default_benchmark_time_sec(),
            request_timeout: default_request_timeout(),
        }
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.benchmark_time_sec)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Check field-level constraints.
    pub fn validate(&self) -> BenchmarkResult<()> {
        let invalid = |msg: String| Err(BenchmarkError::Configuration(msg));

        if self.name.trim().is_empty() {
            return invalid("benchmark name must not be empty".to_string());
        }
        if self.model_id.trim().is_empty() {
            return invalid(format!("benchmark '{}': model_id must not be empty", self.name));
        }
        if self.benchmark_time_sec == 0 {
            return invalid(format!(
                "benchmark '{}': benchmark_time_sec must be greater than zero",
                self.name
            ));
        }
        if self.request_timeout == 0 {
            return invalid(format!(
                "benchmark '{}': request_timeout must be greater than zero",
                self.name
            ));
        }
        if let Some(base_url) = &self.base_url {
            if let Err(e) = Url::parse(base_url) {
                return invalid(format!(
                    "benchmark '{}': invalid base_url '{}': {}",
                    self.name, base_url, e
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BenchmarkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkSpec")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("prompt_path", &self.prompt_path)
            .field("benchmark_time_sec", &self.benchmark_time_sec)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Human-readable view of a spec for the sweep banner. Never prints the key.
pub struct BenchmarkSpecDisplay<'a>(pub &'a BenchmarkSpec);

impl<'a> fmt::Display for BenchmarkSpecDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.0;
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Benchmark:          {}", spec.name)?;
        writeln!(f, "  Model:            {}", spec.model_id)?;
        writeln!(
            f,
            "  Base URL:         {}",
            spec.base_url.as_deref().unwrap_or("(default)")
        )?;
        writeln!(f, "  Prompt:           {}", spec.prompt_path.display())?;
        writeln!(f, "  Phase Duration:   {}s", spec.benchmark_time_sec)?;
        writeln!(f, "  Request Timeout:  {}s", spec.request_timeout)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkRoot {
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkSpec>,
}

impl BenchmarkRoot {
    /// Parse and validate a configuration document.
    pub fn from_yaml_str(content: &str) -> BenchmarkResult<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let root: BenchmarkRoot = serde_yaml::from_str(content)
            .map_err(|e| BenchmarkError::Configuration(format!("invalid config: {}", e)))?;
        root.validate()?;
        Ok(root)
    }

    /// Read, parse and validate the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> BenchmarkResult<Self> {
        let path = path.as_ref();
        debug!("Loading benchmark config from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchmarkError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> BenchmarkResult<()> {
        let mut seen = HashSet::new();
        for spec in &self.benchmarks {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(BenchmarkError::Configuration(format!(
                    "duplicate benchmark name '{}'",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve a benchmark by name.
    pub fn select(&self, name: &str) -> BenchmarkResult<&BenchmarkSpec> {
        self.benchmarks
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| {
                BenchmarkError::Configuration(format!(
                    "benchmark '{}' not found (available: {})",
                    name,
                    self.names().join(", ")
                ))
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.benchmarks.iter().map(|b| b.name.as_str()).collect()
    }
}

/// A single chat message of the prompt.
///
/// `content` is kept as raw JSON so both plain strings and structured content
/// parts are forwarded untouched. Any other key (`name`, `tool_calls`,
/// `tool_call_id`, ...) is carried in `extra` and sent as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: serde_json::Value::String(content.into()),
            extra: serde_json::Map::new(),
        }
    }
}

/// The fixed prompt issued by every request of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn from_json_str(content: &str) -> BenchmarkResult<Self> {
        let prompt: Prompt = serde_json::from_str(content)
            .map_err(|e| BenchmarkError::Configuration(format!("invalid prompt: {}", e)))?;
        if prompt.messages.is_empty() {
            return Err(BenchmarkError::Configuration(
                "prompt must contain at least one message".to_string(),
            ));
        }
        Ok(prompt)
    }

    /// Load the prompt referenced by `spec.prompt_path`.
    pub fn load(spec: &BenchmarkSpec) -> BenchmarkResult<Self> {
        let path = &spec.prompt_path;
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchmarkError::Configuration(format!(
                "failed to read prompt file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
benchmarks:
  - name: local
    base_url: http://localhost:8000/v1
    api_key: secret
    model_id: llama
    benchmark_time_sec: 10
  - name: remote
    api_key: other
    model_id: gpt-4o-mini
"#;

    #[test]
    fn test_parse_with_defaults() {
        let root = BenchmarkRoot::from_yaml_str(CONFIG).unwrap();
        assert_eq!(root.names(), vec!["local", "remote"]);

        let remote = root.select("remote").unwrap();
        assert_eq!(remote.base_url, None);
        assert_eq!(remote.prompt_path, PathBuf::from("prompt.json"));
        assert_eq!(remote.run_duration(), Duration::from_secs(30));
        assert_eq!(remote.timeout(), Duration::from_secs(30));

        let local = root.select("local").unwrap();
        assert_eq!(local.run_duration(), Duration::from_secs(10));
        assert_eq!(local.base_url.as_deref(), Some("http://localhost:8000/v1"));
    }

    #[test]
    fn test_select_unknown_name() {
        let root = BenchmarkRoot::from_yaml_str(CONFIG).unwrap();
        let err = root.select("missing").unwrap_err();
        assert!(matches!(err, BenchmarkError::Configuration(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_missing_required_field() {
        let yaml = "benchmarks:\n  - name: x\n    api_key: k\n";
        let err = BenchmarkRoot::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("model_id"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "benchmarks:\n  - name: x\n    api_key: k\n    model_id: m\n    colour: red\n";
        assert!(BenchmarkRoot::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_validation_rules() {
        let zero_time = "benchmarks: [{name: x, api_key: k, model_id: m, benchmark_time_sec: 0}]";
        assert!(BenchmarkRoot::from_yaml_str(zero_time).is_err());

        let bad_url = "benchmarks:\n  - {name: x, api_key: k, model_id: m, base_url: not a url}\n";
        assert!(BenchmarkRoot::from_yaml_str(bad_url).is_err());

        let entry = "  - {name: x, api_key: k, model_id: m}\n";
        let duplicate = format!("benchmarks:\n{}{}", entry, entry);
        let err = BenchmarkRoot::from_yaml_str(&duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_api_key_allowed() {
        let yaml = "benchmarks:\n  - {name: local, api_key: \"\", model_id: m}\n";
        let root = BenchmarkRoot::from_yaml_str(yaml).unwrap();
        assert_eq!(root.select("local").unwrap().api_key, "");
    }

    #[test]
    fn test_empty_document() {
        assert!(BenchmarkRoot::from_yaml_str("").unwrap().benchmarks.is_empty());
        assert!(BenchmarkRoot::from_yaml_str("benchmarks: []")
            .unwrap()
            .benchmarks
            .is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let root = BenchmarkRoot::load(file.path()).unwrap();
        assert_eq!(root.benchmarks.len(), 2);

        let err = BenchmarkRoot::load("/nonexistent/llm_config.yaml").unwrap_err();
        assert!(matches!(err, BenchmarkError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let spec = BenchmarkSpec::new("x", "super-secret", "m");
        let debug = format!("{:?}", spec);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));

        let display = BenchmarkSpecDisplay(&spec).to_string();
        assert!(!display.contains("super-secret"));
        assert!(display.contains("Benchmark:          x"));
    }

    #[test]
    fn test_prompt_parsing() {
        let prompt = Prompt::from_json_str(
            r#"[{"role": "system", "content": "be brief"}, {"role": "user", "content": "hi"}]"#,
        )
        .unwrap();
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[1], ChatMessage::new("user", "hi"));

        assert!(Prompt::from_json_str("[]").is_err());
        assert!(Prompt::from_json_str("{}").is_err());
    }

    #[test]
    fn test_prompt_keeps_extra_message_keys() {
        let prompt = Prompt::from_json_str(
            r#"[{"role": "user", "content": "hi", "name": "alice"},
                {"role": "tool", "content": "42", "tool_call_id": "call_1"}]"#,
        )
        .unwrap();
        assert_eq!(prompt.messages[0].extra["name"], "alice");

        let round: serde_json::Value = serde_json::to_value(&prompt).unwrap();
        assert_eq!(round[0]["name"], "alice");
        assert_eq!(round[0]["content"], "hi");
        assert_eq!(round[1]["tool_call_id"], "call_1");
        assert!(round[1].get("extra").is_none());
    }

    #[test]
    fn test_prompt_load_from_spec() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[{"role": "user", "content": "hello"}]"#)
            .unwrap();
        let mut spec = BenchmarkSpec::new("x", "k", "m");
        spec.prompt_path = file.path().to_path_buf();

        let prompt = Prompt::load(&spec).unwrap();
        assert_eq!(prompt.messages, vec![ChatMessage::new("user", "hello")]);
    }
}
