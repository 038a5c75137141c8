use crate::config::ExternalizationConfig;
use crate::object::Externalizable;

/// Produces globally unique, stable external identifiers.
pub trait ExternalIdGenerator: Send + Sync {
    /// Identifier for `obj`, or `None` if the object has no persisted
    /// identity to derive one from.
    fn external_id(&self, obj: &dyn Externalizable) -> Option<String>;
}

/// Tag-URI identifiers of the form
/// `tag:{authority},{date}:{provider}-OID-{0x...}`.
#[derive(Clone, Debug)]
pub struct NtiidGenerator {
    authority: String,
    date: String,
    system_user: String,
}

impl NtiidGenerator {
    pub fn new(
        authority: impl Into<String>,
        date: impl Into<String>,
        system_user: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            date: date.into(),
            system_user: system_user.into(),
        }
    }

    pub fn from_config(config: &ExternalizationConfig) -> Self {
        Self::new(
            &config.ntiid_authority,
            &config.ntiid_date,
            &config.system_user,
        )
    }
}

impl ExternalIdGenerator for NtiidGenerator {
    fn external_id(&self, obj: &dyn Externalizable) -> Option<String> {
        let attrs = obj.standard();
        let oid = attrs.oid?;
        let provider = attrs
            .creator
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.system_user.clone());
        Some(format!(
            "tag:{},{}:{}-OID-{}",
            self.authority,
            self.date,
            escape_provider(&provider),
            oid.to_external()
        ))
    }
}

/// Spaces and dashes would break the `provider-OID-...` segment.
fn escape_provider(provider: &str) -> String {
    provider.replace([' ', '-'], "_")
}
