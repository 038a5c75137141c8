use serde::{Deserialize, Serialize};

/// Configuration for externalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalizationConfig {
    /// Prefix of mime types derived from the `Class` tag.
    pub mime_prefix: String,
    /// Naming authority of generated portable ids.
    pub ntiid_authority: String,
    /// Authority date of generated portable ids.
    pub ntiid_date: String,
    /// Provider used in portable ids of objects without a creator.
    pub system_user: String,
    /// Render "no value" as `false`.
    pub coerce_none: bool,
    /// Retry adapter lookup under the default name when no adapter is
    /// registered under the requested one.
    pub fallback_to_default_name: bool,
    /// Nesting depth past which objects render as references.
    pub max_depth: usize,
}

impl Default for ExternalizationConfig {
    fn default() -> Self {
        Self {
            mime_prefix: "application/vnd.holdall.".into(),
            ntiid_authority: "holdall.dev".into(),
            ntiid_date: "2011-10".into(),
            system_user: "system".into(),
            coerce_none: false,
            fallback_to_default_name: true,
            max_depth: 64,
        }
    }
}

impl ExternalizationConfig {
    /// Mime type derived from a `Class` tag.
    pub fn mime_type_for(&self, class_name: &str) -> String {
        format!("{}{}", self.mime_prefix, class_name.to_lowercase())
    }
}
