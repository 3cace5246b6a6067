use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the token signing secret.
pub const TOKEN_SECRET_ENV: &str = "MEDGATE_TOKEN_SECRET";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub patient_db: PatientDbConfig,
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// SQLite database holding the users table.
    pub database: PathBuf,
    /// Lifetime of tokens issued at login, in minutes.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatientDbConfig {
    /// SQLite database the SQL query agent plans against.
    pub database: PathBuf,
}

/// The two content domains the knowledge base is built from.
#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// PDF backing the technical index.
    pub technical_pdf: PathBuf,
    /// Web page backing the diet index.
    pub diet_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_window_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest chunks handed to the generator per index query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            url: default_generation_url(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_generation_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.window_chars == 0 {
        anyhow::bail!("chunking.window_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.window_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.window_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified for provider '{}'",
            config.embedding.provider
        );
    }

    if config.auth.token_ttl_minutes < 1 {
        anyhow::bail!("auth.token_ttl_minutes must be >= 1");
    }

    Ok(config)
}

/// Read the token signing secret from the environment. Startup fails hard
/// when it is absent or too short to sign with.
pub fn token_secret() -> Result<String> {
    let secret = std::env::var(TOKEN_SECRET_ENV)
        .map_err(|_| anyhow::anyhow!("{} environment variable not set", TOKEN_SECRET_ENV))?;
    if secret.len() < 32 {
        anyhow::bail!("{} must be at least 32 characters", TOKEN_SECRET_ENV);
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("medgate.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[server]
bind = "127.0.0.1:8080"

[auth]
database = "data/auth.sqlite"

[patient_db]
database = "data/patients.sqlite"

[knowledge]
technical_pdf = "docs/technical.pdf"
diet_url = "https://example.com/diet"

[embedding]
model = "text-embedding-3-small"
"#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), MINIMAL);
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.window_chars, 1000);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.auth.token_ttl_minutes, 30);
    }

    #[test]
    fn missing_relational_parameter_fails_hard() {
        let tmp = tempfile::tempdir().unwrap();
        // No [patient_db] section at all
        let body = r#"
[server]
bind = "127.0.0.1:8080"

[auth]
database = "data/auth.sqlite"

[knowledge]
technical_pdf = "docs/technical.pdf"
diet_url = "https://example.com/diet"
"#;
        let path = write_config(tmp.path(), body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!(
            "{}\n[chunking]\nwindow_chars = 100\noverlap_chars = 100\n",
            MINIMAL
        );
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());
    }
}
