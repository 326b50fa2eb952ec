use std::fmt;

pub const DEFAULT_API_VERSION: &str = "2024-10";

/// A single store on the platform, addressed by name and authenticated by token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tenant {
    pub store_name: String,
    access_token: String,
}

impl Tenant {
    pub fn new(store_name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// GraphQL admin endpoint for this store at the given API version
    pub fn endpoint(&self, api_version: &str) -> String {
        format!(
            "https://{}.myshopify.com/admin/api/{}/graphql.json",
            self.store_name, api_version
        )
    }

    pub fn has_credentials(&self) -> bool {
        !self.store_name.is_empty() && !self.access_token.is_empty()
    }
}

// Tokens end up in logs through `{:?}` far too easily.
impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("store_name", &self.store_name)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.store_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let tenant = Tenant::new("acme-source", "shpat_123");
        assert_eq!(
            tenant.endpoint(DEFAULT_API_VERSION),
            "https://acme-source.myshopify.com/admin/api/2024-10/graphql.json"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let tenant = Tenant::new("acme", "shpat_secret");
        let debug = format!("{:?}", tenant);
        assert!(debug.contains("acme"));
        assert!(!debug.contains("shpat_secret"));
    }

    #[test]
    fn test_has_credentials() {
        assert!(Tenant::new("acme", "token").has_credentials());
        assert!(!Tenant::new("acme", "").has_credentials());
        assert!(!Tenant::new("", "token").has_credentials());
    }
}
