//! Stable hashing for group and join keys.

use blake3::Hasher;

use crate::types::{scalar_type_order, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

/// Hash a tuple of scalars (a group key).
///
/// Equal keys hash equally even when one side carries an `F64` holding an
/// integral value and the other an `I64`. Position matters: `(a, nil)` and
/// `(nil, a)` differ.
pub fn hash_key(values: &[Scalar]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(&(values.len() as u64).to_le_bytes());
    for v in values {
        hash_scalar(v, &mut h);
    }
    Hash256(h.finalize().into())
}

/// Hash a scalar value into a hasher.
fn hash_scalar(scalar: &Scalar, hasher: &mut Hasher) {
    // Write type discriminant first
    hasher.update(&[scalar_type_order(scalar)]);

    match scalar {
        Scalar::Null => {}
        Scalar::Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        Scalar::I64(i) => {
            hasher.update(&[0]);
            hasher.update(&i.to_le_bytes());
        }
        Scalar::F64(f) if f.fract() == 0.0 && f.abs() < 9.0e18 => {
            // Integral floats hash as the matching integer (also folds -0.0)
            hasher.update(&[0]);
            hasher.update(&(*f as i64).to_le_bytes());
        }
        Scalar::F64(f) => {
            hasher.update(&[1]);
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Scalar::Str(s) => {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Scalar::Timestamp(t) => {
            hasher.update(&t.timestamp().to_le_bytes());
            hasher.update(&t.timestamp_subsec_nanos().to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_match_ints() {
        assert_eq!(
            hash_key(&[Scalar::I64(2022)]),
            hash_key(&[Scalar::F64(2022.0)])
        );
        assert_ne!(
            hash_key(&[Scalar::F64(202.1)]),
            hash_key(&[Scalar::F64(202.2)])
        );
    }

    #[test]
    fn null_position_matters() {
        let a = Scalar::from("A");
        assert_ne!(
            hash_key(&[a.clone(), Scalar::Null]),
            hash_key(&[Scalar::Null, a])
        );
        assert_eq!(hash_key(&[Scalar::Null]), hash_key(&[Scalar::Null]));
    }

    #[test]
    fn strings_are_length_prefixed() {
        assert_ne!(
            hash_key(&[Scalar::from("ab"), Scalar::from("c")]),
            hash_key(&[Scalar::from("a"), Scalar::from("bc")])
        );
    }
}
