use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// CLI surface: a single flag pointing at the YAML config file (spec §6).
#[derive(Debug, Clone, Parser)]
#[command(name = "keyproxy")]
#[command(about = "Reverse proxy that re-signs requests across cloud vendors")]
pub struct Cli {
    #[arg(long = "conf-file", default_value = "./config.yml")]
    pub conf_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub forbidden: Forbidden,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Http {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub tls: Tls,
}

fn default_address() -> String {
    "0.0.0.0:80".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tls {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cert_file: String,
    #[serde(default)]
    pub key_file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Log {
    #[serde(default)]
    pub output: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub max_age: i64,
    #[serde(default)]
    pub max_size: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Forbidden {
    #[serde(default)]
    pub forbidden_account_not_found: bool,
    #[serde(default)]
    pub forbidden_proxy_credential_err: bool,
}

impl Forbidden {
    pub fn forbid_unknown_account(&self) -> bool {
        self.forbidden_account_not_found
    }

    pub fn forbid_signature_mismatch(&self) -> bool {
        self.forbidden_proxy_credential_err
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    pub cloud_account_name: String,
    pub vendor: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    pub proxy: Credential,
    pub real: Credential,
}

/// Up to five named strings a vendor may draw a subset of; unused fields
/// stay empty. Immutable once loaded (spec §3).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialPair {
    pub proxy: Credential,
    pub real: Credential,
}

impl From<Credentials> for CredentialPair {
    fn from(c: Credentials) -> Self {
        Self {
            proxy: c.proxy,
            real: c.real,
        }
    }
}

pub fn load(path: &PathBuf) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("config file is not existed: {}: {}", path.display(), e))?;
    let conf: Config = serde_yaml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("read config failed: {}", e))?;
    Ok(conf)
}
