//! In-memory hierarchical property store.
//!
//! Properties are grouped by domain, where a domain is either a service
//! hostname (`billing.example.com`), one of its parent suffixes
//! (`example.com`, `com`) or the synthetic `all` domain that applies to
//! everyone. Lookup walks from the most specific domain outwards, so a value
//! set close to the service beats the same name set further up.
//!
//! Domains and property names are case-insensitive: everything is lowercased
//! on the way in. Values are plain strings; scalars of other YAML types are
//! stringified at load time.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::BROADCAST_HOSTNAME;
use crate::ConfigError;
use crate::Result;

/// One YAML document's worth of property blocks, before normalization.
type RawDocument = HashMap<String, Option<HashMap<String, serde_yaml::Value>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    domains: HashMap<String, HashMap<String, String>>,
}

impl Repository {
    pub fn new() -> Self {
        Repository::default()
    }

    /// Builds a repository from a YAML document.
    ///
    /// The document is a mapping of domain names to property blocks; a block
    /// may be empty. Domains that collide after lowercasing are merged
    /// key-wise. An empty document yields an empty repository.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidYaml`] if the document does not parse into
    ///   string-keyed mappings
    /// - [`ConfigError::NonScalarValue`] if a property value is a sequence or
    ///   a nested mapping
    pub fn parse_yaml(text: &str) -> Result<Self> {
        let document: Option<RawDocument> =
            serde_yaml::from_str(text).map_err(ConfigError::InvalidYaml)?;

        let mut domains: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (raw_domain, block) in document.unwrap_or_default() {
            let domain = raw_domain.to_lowercase();
            let properties = domains.entry(domain.clone()).or_default();
            let Some(block) = block else {
                continue;
            };
            for (raw_name, raw_value) in block {
                let value =
                    scalar_to_string(&raw_value).ok_or_else(|| ConfigError::NonScalarValue {
                        domain: domain.clone(),
                        key: raw_name.clone(),
                    })?;
                properties.insert(raw_name.to_lowercase(), value);
            }
        }

        Ok(Repository { domains })
    }

    /// Replaces the whole contents from a YAML document.
    ///
    /// The swap only happens when the document parses cleanly; on error the
    /// previous contents stay in place untouched.
    pub fn load_yaml(
        &mut self,
        text: &str,
    ) -> Result<()> {
        *self = Repository::parse_yaml(text)?;
        Ok(())
    }

    /// Resolves `name` for a service at `hostname`.
    ///
    /// Walks the domain chain from most specific to least: the exact
    /// hostname, then each parent suffix obtained by stripping one leading
    /// label, then the synthetic `all` domain. The first domain that carries
    /// the name wins, even when its value is the empty string.
    pub fn value(
        &self,
        hostname: &str,
        name: &str,
    ) -> Option<String> {
        let name = name.to_lowercase();
        let mut domain = hostname.to_lowercase();
        loop {
            if let Some(properties) = self.domains.get(&domain) {
                if let Some(value) = properties.get(&name) {
                    return Some(value.clone());
                }
            }
            match domain.split_once('.') {
                Some((_, parent)) => domain = parent.to_string(),
                None => break,
            }
        }
        self.domains
            .get(BROADCAST_HOSTNAME)
            .and_then(|properties| properties.get(&name))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Number of domains, counting ones whose block is empty.
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }
}

/// Renders a scalar YAML value as its property-string form. `None` for
/// sequences and mappings.
///
/// A null value becomes the empty string, which still counts as an explicit
/// override during lookup. String values lose exactly one trailing newline,
/// the one a YAML literal block scalar appends.
fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.strip_suffix('\n').unwrap_or(s).to_string()),
        _ => None,
    }
}
