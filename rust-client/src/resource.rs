use std::fmt;

/// Offset that moves an unsigned 64-bit value into the signed range of a
/// Postgres `BIGINT` column (`16^16 / 2`).
const SIGNED_OFFSET: u64 = 1 << 63;

const MAX_HEX_DIGITS: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResourceIdError {
    #[error("resource id is empty")]
    Empty,
    #[error("resource id '{0}' is not hexadecimal")]
    NotHex(String),
    #[error("resource id '{0}' has more than 32 hex digits")]
    TooLong(String),
}

/// Storage key derived from a site's `resource_id`.
///
/// The mapping keeps only the low 64 bits of the identifier, so it is not
/// guaranteed injective. The `resources` table keeps the original string for
/// every key written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(i64);

impl ResourceKey {
    pub fn from_resource_id(resource_id: &str) -> Result<Self, ResourceIdError> {
        let digits: String = resource_id.chars().filter(|c| *c != '-').collect();

        if digits.is_empty() {
            return Err(ResourceIdError::Empty);
        }
        if digits.len() > MAX_HEX_DIGITS {
            return Err(ResourceIdError::TooLong(resource_id.to_string()));
        }
        // from_str_radix accepts a leading '+', which is not a hex digit here.
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ResourceIdError::NotHex(resource_id.to_string()));
        }

        let value = u128::from_str_radix(&digits, 16)
            .map_err(|_| ResourceIdError::NotHex(resource_id.to_string()))?;

        let low = value as u64;
        Ok(Self(low.wrapping_sub(SIGNED_OFFSET) as i64))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_identifier_maps_to_fixed_key() {
        let key = ResourceKey::from_resource_id("ab12ab12-ab12-ab12-ab12-ab12ab12ab12").unwrap();
        assert_eq!(key.get(), 3_103_731_189_879_581_458);
    }

    #[test]
    fn hyphen_placement_does_not_matter() {
        let a = ResourceKey::from_resource_id("ab12ab12-ab12-ab12-ab12-ab12ab12ab12").unwrap();
        let b = ResourceKey::from_resource_id("ab12ab12ab12ab12ab12ab12ab12ab12").unwrap();
        let c = ResourceKey::from_resource_id("ab-12ab12ab12ab12ab12ab12ab12ab-12").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn is_case_insensitive() {
        let lower = ResourceKey::from_resource_id("ab12ab12-ab12-ab12-ab12-ab12ab12ab12").unwrap();
        let upper = ResourceKey::from_resource_id("AB12AB12-AB12-AB12-AB12-AB12AB12AB12").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn covers_the_whole_signed_range() {
        let zero = ResourceKey::from_resource_id("00000000-0000-0000-0000-000000000000").unwrap();
        assert_eq!(zero.get(), i64::MIN);

        let max = ResourceKey::from_resource_id("00000000-0000-0000-ffff-ffffffffffff").unwrap();
        assert_eq!(max.get(), i64::MAX);
    }

    #[test]
    fn high_bits_are_discarded() {
        let a = ResourceKey::from_resource_id("00000000-0000-0001-0000-000000000001").unwrap();
        let b = ResourceKey::from_resource_id("ffffffff-ffff-ffff-0000-000000000001").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert_eq!(ResourceKey::from_resource_id("---"), Err(ResourceIdError::Empty));
        assert!(matches!(
            ResourceKey::from_resource_id("zz12ab12-ab12-ab12-ab12-ab12ab12ab12"),
            Err(ResourceIdError::NotHex(_))
        ));
        assert!(matches!(
            ResourceKey::from_resource_id("+b12"),
            Err(ResourceIdError::NotHex(_))
        ));
        assert!(matches!(
            ResourceKey::from_resource_id("ab12ab12-ab12-ab12-ab12-ab12ab12ab12ab"),
            Err(ResourceIdError::TooLong(_))
        ));
    }
}
