use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};

use super::types::EntityId;

/// Derives the identifier of a pharmacy from its published name.
///
/// The identifier is the hex SHA-1 of the UTF-8 name. Only the name counts:
/// two pharmacies that publish the exact same name share one identifier and
/// end up merged into a single record.
pub fn derive_id(name: &str) -> EntityId {
    let hash = digest(&SHA1_FOR_LEGACY_USE_ONLY, name.as_bytes());
    let hex: String = hash
        .as_ref()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    EntityId::from(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_known_digests() {
        assert_eq!(
            derive_id("Farmacia A").as_str(),
            "dd869ab417a56e376d2b0b2d727e6be147a2b731"
        );
        assert_eq!(
            derive_id("").as_str(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        for name in ["Farmacia B", "Farmacia Sant'Anna", "Farmàcia Città"] {
            assert_eq!(derive_id(name), derive_id(name));
            assert_eq!(derive_id(name).as_str().len(), 40);
        }
        assert_ne!(derive_id("Farmacia A"), derive_id("Farmacia B"));
    }

    #[test]
    fn test_derive_id_is_sensitive_to_whitespace() {
        // Names are hashed as published, no normalization.
        assert_ne!(derive_id("Farmacia A"), derive_id("Farmacia  A"));
    }
}
