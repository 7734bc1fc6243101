use async_trait::async_trait;
use base64::Engine;
use deposit_primitives::{ExternalStatusUri, RepositoryConfig};

use crate::errors::ResolveError;

const SWORD_STATE_SCHEME: &str = "sword-state";

/// Abstracts the raw HTTP fetch of a status-reference document so C4's
/// parsing logic can be tested without a network. The production
/// implementation is [`ReqwestStatusFetcher`].
#[async_trait]
pub trait StatusDocumentFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        basic_auth: Option<(&str, &str)>,
        follow_redirects: bool,
    ) -> Result<String, ResolveError>;
}

/// Production [`StatusDocumentFetcher`] over `reqwest`. Holds two clients —
/// one following redirects, one not — since `reqwest::Client`'s redirect
/// policy is fixed at construction.
pub struct ReqwestStatusFetcher {
    following: reqwest::Client,
    non_following: reqwest::Client,
}

impl ReqwestStatusFetcher {
    pub fn new(user_agent: &str, connect_timeout: std::time::Duration, read_timeout: std::time::Duration) -> Self {
        let base = reqwest::Client::builder().user_agent(user_agent).connect_timeout(connect_timeout).timeout(read_timeout);

        let following = base
            .clone()
            .redirect(reqwest::redirect::Policy::default())
            .build()
            .expect("reqwest client configuration is valid");
        let non_following = base
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client configuration is valid");

        Self { following, non_following }
    }
}

#[async_trait]
impl StatusDocumentFetcher for ReqwestStatusFetcher {
    async fn fetch(
        &self,
        url: &str,
        basic_auth: Option<(&str, &str)>,
        follow_redirects: bool,
    ) -> Result<String, ResolveError> {
        let client = if follow_redirects { &self.following } else { &self.non_following };
        let mut request = client.get(url);
        if let Some((user, password)) = basic_auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|err| ResolveError::Io(err.to_string()))?;
        let response = response.error_for_status().map_err(|err| ResolveError::Io(err.to_string()))?;
        response.text().await.map_err(|err| ResolveError::Io(err.to_string()))
    }
}

/// Picks the auth realm (if any) whose `base_url` is a prefix of `status_ref`.
fn matching_realm<'a>(cfg: &'a RepositoryConfig, status_ref: &str) -> Option<(&'a str, &'a str)> {
    cfg.auth_realms
        .iter()
        .find(|realm| status_ref.starts_with(realm.base_url.as_str()))
        .map(|realm| (realm.user.as_str(), realm.password.as_str()))
}

/// Resolves a deposit's status reference into a normalized external status
/// token (C4, §4.3).
///
/// 1. Pick the matching auth realm, if any.
/// 2. Fetch the document, honoring `cfg.follow_redirects`.
/// 3. Parse as an Atom feed; return the term of the first entry category
///    whose scheme is `sword-state`.
pub async fn resolve(
    fetcher: &dyn StatusDocumentFetcher,
    status_ref: &str,
    cfg: &RepositoryConfig,
) -> Result<ExternalStatusUri, ResolveError> {
    let auth = matching_realm(cfg, status_ref);
    let body = fetcher.fetch(status_ref, auth, cfg.follow_redirects).await?;

    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|err| ResolveError::Malformed(err.to_string()))?;

    feed.entries
        .iter()
        .flat_map(|entry| entry.categories.iter())
        .find(|category| category.scheme.as_deref() == Some(SWORD_STATE_SCHEME))
        .map(|category| category.term.clone())
        .ok_or(ResolveError::NoRecognizedTerm)
}

/// Encodes a basic-auth header value, exposed for callers that need to hand
/// a pre-built `Authorization` header to a collaborator (e.g. [`crate::task`]
/// passing realm credentials through [`deposit_collaborators::TransportOptions`]).
pub fn basic_auth_header(user: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    format!("Basic {encoded}")
}

#[cfg(test)]
mod tests {
    use deposit_primitives::{AssemblerOptions, BasicAuthRealm, ProtocolBinding, StatusMapping};

    use super::*;

    fn cfg_with_realms(realms: Vec<BasicAuthRealm>) -> RepositoryConfig {
        RepositoryConfig {
            repository_key: "k".into(),
            assembler_id: "bagit".into(),
            assembler_options: AssemblerOptions::default(),
            protocol_binding: ProtocolBinding::Filesystem {
                base_dir: "/tmp".into(),
                overwrite: false,
                create_if_missing: true,
            },
            auth_realms: realms,
            status_mapping: StatusMapping::default(),
            deposit_status_processor_id: "atom".into(),
            settle_interval_ms: 10_000,
            statement_url_rewrite_prefix: None,
            statement_url_rewrite_replacement: None,
            follow_redirects: true,
        }
    }

    struct StaticFetcher(String);

    #[async_trait]
    impl StatusDocumentFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str, _auth: Option<(&str, &str)>, _follow: bool) -> Result<String, ResolveError> {
            Ok(self.0.clone())
        }
    }

    const ATOM_ACCEPTED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <title>Deposit status</title>
          <id>http://r/s/1</id>
          <updated>2024-01-01T00:00:00Z</updated>
          <entry>
            <title>entry</title>
            <id>http://r/s/1/entry</id>
            <updated>2024-01-01T00:00:00Z</updated>
            <category term="http://dspace.org/state/archived" scheme="sword-state"/>
          </entry>
        </feed>"#;

    const ATOM_NO_SWORD_CATEGORY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <title>Deposit status</title>
          <id>http://r/s/1</id>
          <updated>2024-01-01T00:00:00Z</updated>
          <entry>
            <title>entry</title>
            <id>http://r/s/1/entry</id>
            <updated>2024-01-01T00:00:00Z</updated>
            <category term="irrelevant" scheme="other-scheme"/>
          </entry>
        </feed>"#;

    #[tokio::test]
    async fn resolves_first_sword_state_category() {
        let fetcher = StaticFetcher(ATOM_ACCEPTED.to_string());
        let cfg = cfg_with_realms(vec![]);
        let term = resolve(&fetcher, "http://r/s/1", &cfg).await.unwrap();
        assert_eq!(term, "http://dspace.org/state/archived");
    }

    #[tokio::test]
    async fn no_recognized_category_is_unmapped() {
        let fetcher = StaticFetcher(ATOM_NO_SWORD_CATEGORY.to_string());
        let cfg = cfg_with_realms(vec![]);
        let result = resolve(&fetcher, "http://r/s/1", &cfg).await;
        assert!(matches!(result, Err(ResolveError::NoRecognizedTerm)));
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let fetcher = StaticFetcher("not xml at all".to_string());
        let cfg = cfg_with_realms(vec![]);
        let result = resolve(&fetcher, "http://r/s/1", &cfg).await;
        assert!(matches!(result, Err(ResolveError::Malformed(_))));
    }

    #[test]
    fn realm_matching_is_prefix_based() {
        let cfg = cfg_with_realms(vec![BasicAuthRealm {
            base_url: "http://dspace.example.org/".into(),
            user: "depositor".into(),
            password: "secret".into(),
        }]);

        assert_eq!(
            matching_realm(&cfg, "http://dspace.example.org/sword/statement/1"),
            Some(("depositor", "secret"))
        );
        assert_eq!(matching_realm(&cfg, "http://other.example.org/s/1"), None);
    }
}
