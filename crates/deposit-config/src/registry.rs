use std::collections::HashMap;

use deposit_primitives::{Repository, RepositoryConfig};
use url::Url;

use crate::document::ConfigDocument;
use crate::errors::{ConfigError, ResolveConfigError};

/// In-memory registry of per-target [`RepositoryConfig`]s, keyed by
/// `repositoryKey`. Built once at startup from a [`ConfigDocument`] and
/// read-only thereafter — the only process-wide shared state besides the
/// metadata store itself (§5).
#[derive(Debug, Clone)]
pub struct RepositoryConfigRegistry {
    by_key: HashMap<String, RepositoryConfig>,
}

impl RepositoryConfigRegistry {
    pub fn new(configs: HashMap<String, RepositoryConfig>) -> Self {
        Self { by_key: configs }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let doc = ConfigDocument::parse(raw)?;
        let by_key = doc
            .repositories
            .into_iter()
            .map(|(key, raw_cfg)| (key.clone(), raw_cfg.into_repository_config(key)))
            .collect();
        Ok(Self { by_key })
    }

    /// Looks a config up directly by registry key, bypassing the resolution
    /// order below. Used by [`Self::resolve`]'s id-as-string and
    /// repository-key steps, and exposed for tests.
    pub fn get(&self, key: &str) -> Option<&RepositoryConfig> {
        self.by_key.get(key)
    }

    /// Resolves the [`RepositoryConfig`] for a [`Repository`] using the
    /// first-hit-wins order from §4.6:
    ///
    /// 1. the repository id, as a string, matches a registered key;
    /// 2. `repository.repositoryKey` matches;
    /// 3. the URI-path last component of the repository id matches;
    /// 4. progressive suffixes of the repository-id path, with and without
    ///    a leading `/`, shortest first.
    pub fn resolve(&self, repository: &Repository) -> Result<&RepositoryConfig, ResolveConfigError> {
        let id_str = repository.id.to_string();

        for candidate in self.candidates(&id_str, &repository.repository_key) {
            if let Some(cfg) = self.by_key.get(candidate.as_str()) {
                return Ok(cfg);
            }
        }

        Err(ResolveConfigError::Unresolved(id_str, repository.repository_key.clone()))
    }

    fn candidates(&self, id_str: &str, repository_key: &str) -> Vec<String> {
        let mut candidates = vec![id_str.to_string(), repository_key.to_string()];

        let segments = path_segments(id_str);
        if let Some((last, rest)) = segments.split_last() {
            candidates.push((*last).to_string());

            for i in (0..rest.len()).rev() {
                let suffix = rest[i..].iter().chain(std::iter::once(last)).copied().collect::<Vec<_>>().join("/");
                candidates.push(suffix.clone());
                candidates.push(format!("/{suffix}"));
            }
        }

        candidates
    }
}

/// Extracts the non-empty path segments of `id_str`, parsed as a URI when
/// possible and falling back to a bare `/`-split when it is not an
/// absolute URI (e.g. an opaque store-assigned id).
fn path_segments(id_str: &str) -> Vec<&str> {
    if let Ok(url) = Url::parse(id_str) {
        if let Some(segments) = url.path_segments() {
            return segments.filter(|s| !s.is_empty()).collect();
        }
    }

    id_str.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use deposit_primitives::{IntegrationType, ResourceId};

    use super::*;

    fn repository(id: &str, key: &str) -> Repository {
        Repository {
            id: ResourceId::from_str(id),
            repository_key: key.to_string(),
            name: "example".to_string(),
            integration_type: IntegrationType::Full,
            etag: None,
        }
    }

    fn make_registry(keys: &[&str]) -> RepositoryConfigRegistry {
        let configs = keys
            .iter()
            .map(|k| (k.to_string(), sample_config(k)))
            .collect();
        RepositoryConfigRegistry::new(configs)
    }

    fn sample_config(key: &str) -> RepositoryConfig {
        use deposit_primitives::{AssemblerOptions, ProtocolBinding, StatusMapping};

        RepositoryConfig {
            repository_key: key.to_string(),
            assembler_id: "bagit".into(),
            assembler_options: AssemblerOptions::default(),
            protocol_binding: ProtocolBinding::Filesystem {
                base_dir: "/tmp".into(),
                overwrite: false,
                create_if_missing: true,
            },
            auth_realms: vec![],
            status_mapping: StatusMapping::default(),
            deposit_status_processor_id: "atom".into(),
            settle_interval_ms: 10_000,
            statement_url_rewrite_prefix: None,
            statement_url_rewrite_replacement: None,
            follow_redirects: true,
        }
    }

    #[test]
    fn each_candidate_resolves_in_isolation() {
        let repo = repository("http://example/x/y/z", "k");

        for key in ["k", "z", "y/z", "/y/z", "http://example/x/y/z"] {
            let registry = make_registry(&[key]);
            let resolved = registry.resolve(&repo).expect("should resolve in isolation");
            assert_eq!(resolved.repository_key, key);
        }
    }

    #[test]
    fn first_hit_wins_id_over_key() {
        let repo = repository("http://example/x/y/z", "k");
        let registry = make_registry(&["http://example/x/y/z", "k"]);
        let resolved = registry.resolve(&repo).expect("should resolve");
        assert_eq!(resolved.repository_key, "http://example/x/y/z");
    }

    #[test]
    fn key_beats_path_component_when_id_does_not_match() {
        let repo = repository("http://example/x/y/z", "k");
        let registry = make_registry(&["k", "z"]);
        let resolved = registry.resolve(&repo).expect("should resolve");
        assert_eq!(resolved.repository_key, "k");
    }

    #[test]
    fn unresolvable_repository_is_an_error() {
        let repo = repository("http://example/x/y/z", "k");
        let registry = make_registry(&["something-else"]);
        assert!(registry.resolve(&repo).is_err());
    }

    #[test]
    fn path_segments_parses_uri() {
        assert_eq!(path_segments("http://example/x/y/z"), vec!["x", "y", "z"]);
    }

    #[test]
    fn path_segments_falls_back_for_opaque_ids() {
        assert_eq!(path_segments("x/y/z"), vec!["x", "y", "z"]);
    }
}
