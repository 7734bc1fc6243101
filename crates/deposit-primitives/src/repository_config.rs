use serde::{Deserialize, Serialize};

use crate::status::StatusMapping;

/// Per-target deposit configuration. Not stored in the metadata store; held
/// in-memory by the repository config registry (C2), read-only after init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub repository_key: String,
    pub assembler_id: String,
    pub assembler_options: AssemblerOptions,
    pub protocol_binding: ProtocolBinding,
    #[serde(default)]
    pub auth_realms: Vec<BasicAuthRealm>,
    #[serde(default)]
    pub status_mapping: StatusMapping,
    pub deposit_status_processor_id: String,
    /// Duration to wait after a SWORD-style deposit before resolving its
    /// status — a workaround for targets that are effectively synchronous
    /// but expose an asynchronous API. Defaults to 10s (§9 Open Question).
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    /// If a resolved `statementUrl` starts with this prefix, it is rewritten
    /// by replacing the prefix with `statement_url_replacement` before being
    /// stored on the deposit.
    #[serde(default)]
    pub statement_url_rewrite_prefix: Option<String>,
    #[serde(default)]
    pub statement_url_rewrite_replacement: Option<String>,
    /// Whether HTTP redirects are followed when resolving a status
    /// reference. Default: follow.
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
}

fn default_settle_interval_ms() -> u64 {
    10_000
}

fn default_follow_redirects() -> bool {
    true
}

impl RepositoryConfig {
    /// Applies the configured statement-URL rewrite rule. A no-op when no
    /// prefix is configured, or when `url` does not start with the prefix.
    pub fn rewrite_statement_url(&self, url: &str) -> String {
        match (&self.statement_url_rewrite_prefix, &self.statement_url_rewrite_replacement) {
            (Some(prefix), Some(replacement)) if url.starts_with(prefix.as_str()) => {
                format!("{replacement}{}", &url[prefix.len()..])
            }
            _ => url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblerOptions {
    #[serde(default)]
    pub archive: Option<String>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub checksum_algorithms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthRealm {
    pub base_url: String,
    pub user: String,
    pub password: String,
}

/// Tagged sum type replacing an inheritance hierarchy of protocol bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ProtocolBinding {
    Filesystem {
        base_dir: String,
        #[serde(default)]
        overwrite: bool,
        #[serde(default)]
        create_if_missing: bool,
    },
    Ftp {
        host: String,
        port: u16,
        user: String,
        password: String,
        default_dir: String,
        mode: FtpMode,
        #[serde(rename = "type")]
        transfer_type: FtpTransferType,
        #[serde(default = "default_true")]
        passive: bool,
    },
    SwordV2 {
        service_doc_url: String,
        default_collection_url: String,
        user: String,
        password: String,
        #[serde(default)]
        on_behalf_of: Option<String>,
        #[serde(default)]
        collection_hints: Vec<String>,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FtpMode {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FtpTransferType {
    Ascii,
    Binary,
}
