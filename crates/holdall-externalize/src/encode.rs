use crate::error::{ExternalizeError, ExternalizeResult};
use crate::value::ExternalValue;

/// Final string encoding of externalized data.
pub trait Encoder {
    /// Short format name, for diagnostics.
    fn format_name(&self) -> &str;

    /// Whether nulls must be stripped before encoding. Formats without a
    /// representation for "no value" return `true`.
    fn strips_none(&self) -> bool {
        false
    }

    fn encode(&self, value: &ExternalValue) -> ExternalizeResult<String>;
}

/// JSON encoding. Nulls are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEncoder {
    pretty: bool,
}

impl JsonEncoder {
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Encoder for JsonEncoder {
    fn format_name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &ExternalValue) -> ExternalizeResult<String> {
        if let Some(opaque) = value.find_opaque() {
            return Err(ExternalizeError::Opaque {
                type_name: opaque.type_name.clone(),
            });
        }
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.map_err(|e| ExternalizeError::Encoding {
            format: self.format_name().to_string(),
            reason: e.to_string(),
        })
    }
}
