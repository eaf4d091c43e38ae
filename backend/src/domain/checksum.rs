//! Catalog checksums over the canonical catalog serialization.
//!
//! Clients compare checksums to decide whether to refetch a catalog, so the
//! encoding must be deterministic across instances: UTF-8 JSON, keys in
//! bytewise ascending order, no insignificant whitespace, RFC 8259 string
//! escaping. Serializing a `BTreeMap` with compact `serde_json` satisfies all
//! four properties.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest of a catalog's canonical serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Construct a checksum from a 32-byte digest.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a checksum from its 64-character lowercase hex rendering.
    pub fn parse_hex(value: &str) -> Result<Self, ChecksumParseError> {
        let bytes = hex::decode(value).map_err(|_| ChecksumParseError::NotHex)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ChecksumParseError::WrongLength)?;
        Ok(Self(arr))
    }

    /// Encode the checksum as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Errors raised when parsing a hex-encoded checksum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumParseError {
    /// The input contained non-hex characters.
    #[error("checksum must be hexadecimal")]
    NotHex,
    /// The input did not decode to exactly 32 bytes.
    #[error("checksum must be 64 hex characters")]
    WrongLength,
}

/// Serialize a catalog mapping to its canonical byte form.
///
/// The `BTreeMap` key order is bytewise ascending for `String` keys, which is
/// exactly the canonical ordering; `serde_json` emits compact output with
/// RFC 8259 escaping.
pub fn canonical_json(entries: &BTreeMap<String, String>) -> Vec<u8> {
    // Serializing a map of strings cannot fail.
    serde_json::to_vec(entries).unwrap_or_default()
}

/// Compute the checksum of a catalog mapping.
///
/// Input key order is irrelevant: the canonical form re-orders keys, so any
/// permutation of the same mapping yields the same digest. The empty mapping
/// hashes the two bytes `{}`.
pub fn catalog_checksum(entries: &BTreeMap<String, String>) -> Checksum {
    let digest = Sha256::digest(canonical_json(entries));
    Checksum::from_bytes(digest.into())
}

#[cfg(test)]
mod tests {
    //! Checksum determinism and canonical-form properties.
    use super::{Checksum, ChecksumParseError, canonical_json, catalog_checksum};
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn map_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn checksum_ignores_insertion_order() {
        let forward = map_of(&[("a.one", "1"), ("b.two", "2"), ("c.three", "3")]);
        let reversed: BTreeMap<String, String> = forward.clone().into_iter().rev().collect();
        assert_eq!(catalog_checksum(&forward), catalog_checksum(&reversed));
    }

    #[rstest]
    fn empty_catalog_hashes_empty_object() {
        let checksum = catalog_checksum(&BTreeMap::new());
        // sha256("{}")
        assert_eq!(
            checksum.to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[rstest]
    fn canonical_form_is_compact_and_sorted() {
        let entries = map_of(&[("common.ok", "OK"), ("common.cancel", "Cancel")]);
        let bytes = canonical_json(&entries);
        assert_eq!(
            bytes,
            br#"{"common.cancel":"Cancel","common.ok":"OK"}"#.to_vec()
        );
    }

    #[rstest]
    fn canonical_form_escapes_per_rfc_8259() {
        let entries = map_of(&[("greeting", "hi \"{name}\"\n")]);
        let bytes = canonical_json(&entries);
        assert_eq!(bytes, br#"{"greeting":"hi \"{name}\"\n"}"#.to_vec());
    }

    #[rstest]
    fn parsing_and_recanonicalizing_is_byte_identical() {
        let entries = map_of(&[
            ("a.nested.key", "first"),
            ("b", "second \"quoted\""),
            ("z.tail", "third\n"),
        ]);
        let bytes = canonical_json(&entries);
        let reparsed: BTreeMap<String, String> =
            serde_json::from_slice(&bytes).expect("canonical form parses");
        assert_eq!(canonical_json(&reparsed), bytes);
    }

    #[rstest]
    fn hex_round_trip() {
        let checksum = catalog_checksum(&map_of(&[("common.ok", "OK")]));
        let parsed = Checksum::parse_hex(&checksum.to_hex()).expect("valid hex");
        assert_eq!(parsed, checksum);
    }

    #[rstest]
    #[case("zz", ChecksumParseError::NotHex)]
    #[case("abcd", ChecksumParseError::WrongLength)]
    fn rejects_malformed_hex(#[case] input: &str, #[case] expected: ChecksumParseError) {
        assert_eq!(Checksum::parse_hex(input).expect_err("rejected"), expected);
    }
}
