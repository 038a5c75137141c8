//! Well-known field names of the external representation.

pub const ID: &str = "ID";
pub const OID: &str = "OID";
pub const NTIID: &str = "NTIID";
pub const CREATOR: &str = "Creator";
pub const CONTAINER_ID: &str = "ContainerId";
pub const LAST_MODIFIED: &str = "Last Modified";
pub const CREATED_TIME: &str = "CreatedTime";
pub const CLASS: &str = "Class";
pub const MIMETYPE: &str = "MimeType";
pub const LINKS: &str = "Links";
pub const ACL: &str = "ACL";

/// Keys the store and the externalizer own.
///
/// Client-supplied data carrying these keys has them dropped on input, and
/// they cannot be used as contained ids in associative containers.
pub const SYNTHETIC_KEYS: &[&str] = &[OID, ID, LAST_MODIFIED, CREATOR, CONTAINER_ID, CLASS];

/// Returns `true` if `key` is one of [`SYNTHETIC_KEYS`].
pub fn is_synthetic_key(key: &str) -> bool {
    SYNTHETIC_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_keys() {
        assert!(is_synthetic_key("Last Modified"));
        assert!(is_synthetic_key("Class"));
        assert!(!is_synthetic_key("MimeType"));
        assert!(!is_synthetic_key("title"));
    }
}
