//! Field element helpers over the BN254 scalar field

use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use num_traits::Num;

use crate::error::{ComplianceError, Result};

/// Element of the proof system's scalar field
pub type FieldElement = ark_bn254::Fr;

/// The scalar field modulus `r`
pub fn modulus() -> BigUint {
    BigUint::from_bytes_le(&FieldElement::MODULUS.to_bytes_le())
}

/// Convert an integer to a field element, rejecting values `>= r`
pub fn fr_from_biguint(value: &BigUint, field: &str) -> Result<FieldElement> {
    if *value >= modulus() {
        return Err(ComplianceError::invalid_input(
            field,
            "<out of range>",
            "integer in [0, field modulus)",
        ));
    }
    Ok(FieldElement::from_le_bytes_mod_order(&value.to_bytes_le()))
}

/// Convert a field element to its canonical integer
pub fn fr_to_biguint(f: &FieldElement) -> BigUint {
    BigUint::from_bytes_le(&f.into_bigint().to_bytes_le())
}

/// Parse a decimal or `0x`-prefixed hex string into a field element
///
/// Values are never reduced: anything `>= r` is rejected.
pub fn parse_field_element(s: &str, field: &str) -> Result<FieldElement> {
    let trimmed = s.trim();
    let parsed = if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        BigUint::from_str_radix(hex_digits, 16)
    } else {
        BigUint::from_str_radix(trimmed, 10)
    };

    let value = parsed.map_err(|_| {
        ComplianceError::invalid_input(field, "<unparsable>", "decimal or 0x-hex integer")
    })?;
    fr_from_biguint(&value, field)
}

/// Decimal representation of a field element
pub fn fr_to_decimal(f: &FieldElement) -> String {
    fr_to_biguint(f).to_str_radix(10)
}

/// `0x`-prefixed, zero-padded big-endian hex representation
pub fn fr_to_hex(f: &FieldElement) -> String {
    let mut bytes = f.into_bigint().to_bytes_be();
    if bytes.len() < 32 {
        let mut padded = vec![0u8; 32 - bytes.len()];
        padded.append(&mut bytes);
        bytes = padded;
    }
    format!("0x{}", hex::encode(bytes))
}

/// Whether a field element is the additive identity
pub fn is_zero(f: &FieldElement) -> bool {
    f.is_zero()
}

/// Serde adapter writing a field element as a decimal string
pub mod serde_fr {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::{fr_to_decimal, parse_field_element, FieldElement};

    pub fn serialize<S: Serializer>(f: &FieldElement, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&fr_to_decimal(f))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FieldElement, D::Error> {
        let s = String::deserialize(d)?;
        parse_field_element(&s, "field element").map_err(D::Error::custom)
    }
}

/// Serde adapter for a list of field elements
pub mod serde_fr_vec {
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    use super::{fr_to_decimal, parse_field_element, FieldElement};

    pub fn serialize<S: Serializer>(v: &[FieldElement], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for f in v {
            seq.serialize_element(&fr_to_decimal(f))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<FieldElement>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|s| parse_field_element(s, "field element").map_err(D::Error::custom))
            .collect()
    }
}
