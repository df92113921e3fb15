use anyhow::{anyhow, bail, Result};
use url::Url;

pub const DEFAULT_PROXY_PREFIX: &str = "/ollama";
pub const DEFAULT_UPSTREAM_ORIGIN: &str = "http://localhost:11434";

/// Forwards requests under `prefix` to `origin`, with the prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    prefix: String,
    origin: String,
    authority: String,
}

impl RouteRule {
    pub fn new(prefix: &str, origin: &str) -> Result<Self> {
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            bail!("Proxy prefix must start with '/' and not end with '/': {prefix:?}");
        }

        let url = Url::parse(origin)
            .map_err(|err| anyhow!("Invalid upstream origin {origin:?}: {err}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Upstream origin must be http or https: {origin}");
        }
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("Upstream origin has no host: {origin}"))?;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            bail!("Upstream origin must not carry a path, query or fragment: {origin}");
        }

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            prefix: prefix.to_string(),
            origin: format!("{}://{}", url.scheme(), authority),
            authority,
        })
    }

    pub fn ollama() -> Self {
        Self {
            prefix: DEFAULT_PROXY_PREFIX.to_string(),
            origin: DEFAULT_UPSTREAM_ORIGIN.to_string(),
            authority: "localhost:11434".to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scheme and authority, e.g. `http://localhost:11434`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Value for the forwarded `Host` header.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Strips the prefix once. `None` when the path is outside this rule;
    /// `/ollamax` is not under `/ollama`.
    pub fn rewrite(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            return Some("/".to_string());
        }
        rest.starts_with('/').then(|| rest.to_string())
    }

    pub fn upstream_url(&self, rewritten_path: &str, query: Option<&str>) -> String {
        let mut target = format!("{}{}", self.origin, rewritten_path);
        if let Some(q) = query {
            target.push('?');
            target.push_str(q);
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_once() {
        let rule = RouteRule::ollama();
        assert_eq!(rule.rewrite("/ollama/api/tags").as_deref(), Some("/api/tags"));
        assert_eq!(
            rule.rewrite("/ollama/ollama/api").as_deref(),
            Some("/ollama/api")
        );
        assert_eq!(rule.rewrite("/ollama").as_deref(), Some("/"));
        assert_eq!(rule.rewrite("/ollama/").as_deref(), Some("/"));
    }

    #[test]
    fn non_matching_paths_fall_through() {
        let rule = RouteRule::ollama();
        assert_eq!(rule.rewrite("/"), None);
        assert_eq!(rule.rewrite("/ollamax/api"), None);
        assert_eq!(rule.rewrite("/static/ollama/x"), None);
    }

    #[test]
    fn upstream_url_keeps_query() {
        let rule = RouteRule::ollama();
        assert_eq!(
            rule.upstream_url("/api/tags", Some("verbose=1")),
            "http://localhost:11434/api/tags?verbose=1"
        );
        assert_eq!(rule.upstream_url("/", None), "http://localhost:11434/");
    }

    #[test]
    fn parses_custom_origin() {
        let rule = RouteRule::new("/llm", "http://127.0.0.1:8080/").unwrap();
        assert_eq!(rule.origin(), "http://127.0.0.1:8080");
        assert_eq!(rule.authority(), "127.0.0.1:8080");

        let default_port = RouteRule::new("/llm", "https://models.local").unwrap();
        assert_eq!(default_port.authority(), "models.local");
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(RouteRule::new("ollama", DEFAULT_UPSTREAM_ORIGIN).is_err());
        assert!(RouteRule::new("/ollama/", DEFAULT_UPSTREAM_ORIGIN).is_err());
        assert!(RouteRule::new("/", DEFAULT_UPSTREAM_ORIGIN).is_err());
        assert!(RouteRule::new("/ollama", "ftp://localhost:11434").is_err());
        assert!(RouteRule::new("/ollama", "http://localhost:11434/v1").is_err());
        assert!(RouteRule::new("/ollama", "not a url").is_err());
    }

    #[test]
    fn default_rule_matches_parsed_default() {
        let parsed = RouteRule::new(DEFAULT_PROXY_PREFIX, DEFAULT_UPSTREAM_ORIGIN).unwrap();
        assert_eq!(parsed, RouteRule::ollama());
    }
}
