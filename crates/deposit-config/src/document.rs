use std::collections::HashMap;

use deposit_primitives::{
    AssemblerOptions, BasicAuthRealm, DepositStatus, ProtocolBinding, RepositoryConfig, StatusMapping,
};
use serde::Deserialize;

use crate::errors::ConfigError;

/// The on-disk shape of the repository configuration document, keyed by
/// `repositoryKey` — the schema from §6 of the design notes, expressed as
/// TOML tables instead of the source's annotation-driven JSON binding.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    pub repositories: HashMap<String, DocRepositoryConfig>,
}

impl ConfigDocument {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocRepositoryConfig {
    #[serde(rename = "deposit-config")]
    pub deposit_config: DocDepositConfig,
    #[serde(rename = "transport-config")]
    pub transport_config: DocTransportConfig,
    pub assembler: DocAssembler,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocDepositConfig {
    pub processing: DocProcessing,
    pub mapping: DocMapping,
    /// Per-target override of the global settle-interval env default.
    #[serde(default)]
    pub settle_interval_ms: Option<u64>,
    #[serde(default)]
    pub statement_url_rewrite_prefix: Option<String>,
    #[serde(default)]
    pub statement_url_rewrite_replacement: Option<String>,
    #[serde(default)]
    pub follow_redirects: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocProcessing {
    pub bean_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocMapping {
    #[serde(rename = "default-mapping")]
    pub default_mapping: Option<DepositStatus>,
    #[serde(flatten)]
    pub entries: HashMap<String, DepositStatus>,
}

impl DocMapping {
    fn into_status_mapping(self) -> StatusMapping {
        StatusMapping::new(self.entries, self.default_mapping)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocTransportConfig {
    #[serde(rename = "auth-realms", default)]
    pub auth_realms: Vec<BasicAuthRealm>,
    #[serde(rename = "protocol-binding")]
    pub protocol_binding: ProtocolBinding,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocAssembler {
    #[serde(default)]
    pub specification: Option<String>,
    pub bean_name: String,
    #[serde(default)]
    pub options: AssemblerOptions,
}

const DEFAULT_SETTLE_INTERVAL_MS: u64 = 10_000;
const DEFAULT_FOLLOW_REDIRECTS: bool = true;

impl DocRepositoryConfig {
    /// Flattens the nested document shape into the flat
    /// [`RepositoryConfig`] the rest of the core operates on.
    pub fn into_repository_config(self, repository_key: String) -> RepositoryConfig {
        RepositoryConfig {
            repository_key,
            assembler_id: self.assembler.bean_name,
            assembler_options: self.assembler.options,
            protocol_binding: self.transport_config.protocol_binding,
            auth_realms: self.transport_config.auth_realms,
            status_mapping: self.deposit_config.mapping.into_status_mapping(),
            deposit_status_processor_id: self.deposit_config.processing.bean_name,
            settle_interval_ms: self.deposit_config.settle_interval_ms.unwrap_or(DEFAULT_SETTLE_INTERVAL_MS),
            statement_url_rewrite_prefix: self.deposit_config.statement_url_rewrite_prefix,
            statement_url_rewrite_replacement: self.deposit_config.statement_url_rewrite_replacement,
            follow_redirects: self.deposit_config.follow_redirects.unwrap_or(DEFAULT_FOLLOW_REDIRECTS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [repositories.dspace-main]

        [repositories.dspace-main.deposit-config]
        [repositories.dspace-main.deposit-config.processing]
        bean-name = "atom"

        [repositories.dspace-main.deposit-config.mapping]
        default-mapping = "SUBMITTED"
        "http://dspace.org/state/archived" = "ACCEPTED"
        "http://dspace.org/state/withdrawn" = "REJECTED"

        [repositories.dspace-main.transport-config]
        [[repositories.dspace-main.transport-config.auth-realms]]
        base-url = "http://dspace.example.org/"
        user = "depositor"
        password = "secret"

        [repositories.dspace-main.transport-config.protocol-binding]
        protocol = "sword_v2"
        service-doc-url = "http://dspace.example.org/sword/servicedocument"
        default-collection-url = "http://dspace.example.org/sword/collection/123"
        user = "depositor"
        password = "secret"

        [repositories.dspace-main.assembler]
        specification = "bagit"
        bean-name = "bagitAssembler"

        [repositories.dspace-main.assembler.options]
        archive = "zip"
        algorithms = ["sha1"]
    "#;

    #[test]
    fn parses_full_document_and_flattens() {
        let doc = ConfigDocument::parse(SAMPLE).expect("valid document");
        let raw = doc.repositories.get("dspace-main").expect("present").clone();
        let cfg = raw.into_repository_config("dspace-main".into());

        assert_eq!(cfg.repository_key, "dspace-main");
        assert_eq!(cfg.assembler_id, "bagitAssembler");
        assert_eq!(cfg.settle_interval_ms, DEFAULT_SETTLE_INTERVAL_MS);
        assert!(cfg.follow_redirects);
        assert_eq!(
            cfg.status_mapping.lookup("http://dspace.org/state/archived"),
            Some(DepositStatus::Accepted)
        );
        assert_eq!(
            cfg.status_mapping.lookup("http://dspace.org/state/unrecognized"),
            Some(DepositStatus::Submitted)
        );
        assert!(matches!(cfg.protocol_binding, ProtocolBinding::SwordV2 { .. }));
    }
}
