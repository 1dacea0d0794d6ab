//! Pedersen commitments over secp256k1.
//!
//! `C = m*G + r*H` where `m` is a hashed message reduced into the scalar
//! field and `r` is blinding randomness. Points travel as 33-byte SEC1
//! compressed hex, scalars as 32-byte big-endian hex.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::subtle::ConstantTimeEq;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar, U256};
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::core::errors::{DecodeError, ProofError, ProofResult};
use crate::core::types::{CurveId, COMPRESSED_POINT_SIZE, SCALAR_SIZE};
use crate::core::utils::{compute_sha3_256, compute_sha3_256_from_slices, decode_hex_fixed};

/// A point on the commitment curve
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint(ProjectivePoint);

impl CurvePoint {
    pub fn generator() -> Self {
        CurvePoint(ProjectivePoint::GENERATOR)
    }

    pub fn is_identity(&self) -> bool {
        bool::from(self.0.is_identity())
    }

    /// SEC1 compressed encoding. The identity encodes as a single zero byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_affine().to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_bytes(field: &'static str, bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != COMPRESSED_POINT_SIZE {
            return Err(DecodeError::Width {
                field,
                expected: COMPRESSED_POINT_SIZE,
                actual: bytes.len(),
            });
        }
        // Only 02/03; compact and hybrid tags would give a point a second encoding
        if !matches!(bytes[0], 0x02 | 0x03) {
            return Err(DecodeError::PointTag {
                field,
                tag: bytes[0],
            });
        }
        let encoded =
            EncodedPoint::from_bytes(bytes).map_err(|_| DecodeError::NotOnCurve { field })?;
        let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        let point = affine
            .map(ProjectivePoint::from)
            .ok_or(DecodeError::NotOnCurve { field })?;
        if bool::from(point.is_identity()) {
            return Err(DecodeError::Identity { field });
        }
        Ok(CurvePoint(point))
    }

    pub fn from_hex(field: &'static str, value: &str) -> Result<Self, DecodeError> {
        let bytes = decode_hex_fixed::<COMPRESSED_POINT_SIZE>(field, value)?;
        Self::from_bytes(field, &bytes)
    }

    /// Multiply by a scalar
    pub fn mul(&self, scalar: &CurveScalar) -> CurvePoint {
        CurvePoint(self.0 * scalar.0)
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurvePoint({})", self.to_hex())
    }
}

impl Serialize for CurvePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CurvePoint::from_hex("point", &s).map_err(serde::de::Error::custom)
    }
}

/// An element of the curve's scalar field
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CurveScalar(Scalar);

impl CurveScalar {
    /// Reduce a 32-byte big-endian value modulo the group order
    pub fn from_bytes_reduced(bytes: &[u8; SCALAR_SIZE]) -> Self {
        let field_bytes = FieldBytes::from(*bytes);
        CurveScalar(<Scalar as Reduce<U256>>::reduce_bytes(&field_bytes))
    }

    /// SHA3-256 of `data`, reduced into the scalar field
    pub fn hash_message(data: &[u8]) -> Self {
        Self::from_bytes_reduced(&compute_sha3_256(data))
    }

    /// SHA3-256 of `data || seed`, the message every stored chunk commits to
    pub fn hash_with_seed(data: &[u8], seed: &str) -> Self {
        Self::from_bytes_reduced(&compute_sha3_256_from_slices(data, seed.as_bytes()))
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; SCALAR_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes_reduced(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        let mut out = [0u8; SCALAR_SIZE];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decode a canonical (already reduced) scalar
    pub fn from_hex(field: &'static str, value: &str) -> Result<Self, DecodeError> {
        let bytes = decode_hex_fixed::<SCALAR_SIZE>(field, value)?;
        let scalar: Option<Scalar> = Scalar::from_repr(FieldBytes::from(bytes)).into();
        scalar
            .map(CurveScalar)
            .ok_or(DecodeError::NonCanonicalScalar { field })
    }
}

impl fmt::Debug for CurveScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Blinding factors are secrets until opened
        f.write_str("CurveScalar(..)")
    }
}

/// Common reference string: the two generators every commitment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub curve: CurveId,
    pub g: CurvePoint,
    pub h: CurvePoint,
}

impl Crs {
    /// `g` is the curve generator, `h = g * x`
    pub fn from_trapdoor(curve: CurveId, x: &CurveScalar) -> ProofResult<Self> {
        let g = CurvePoint::generator();
        let h = g.mul(x);
        if h.is_identity() || h == g {
            return Err(ProofError::CryptoMisconfigured(
                "degenerate CRS trapdoor".to_string(),
            ));
        }
        Ok(Crs { curve, g, h })
    }
}

/// Fresh CRS with a random trapdoor
pub fn setup_crs(curve: CurveId) -> ProofResult<Crs> {
    let crs = Crs::from_trapdoor(curve, &CurveScalar::random())?;
    debug!("CRS generated on {} (h = {}...)", curve, &crs.h.to_hex()[..16]);
    Ok(crs)
}

/// The full commitment triple as published by a committer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub g: CurvePoint,
    pub h: CurvePoint,
    pub value: CurvePoint,
}

impl Commitment {
    pub fn opens_to(&self, message: &CurveScalar, randomness: &CurveScalar) -> bool {
        open(&self.value, message, randomness, &self.g, &self.h)
    }
}

/// `message * g + randomness * h`
pub fn commit(
    message: &CurveScalar,
    randomness: &CurveScalar,
    g: &CurvePoint,
    h: &CurvePoint,
) -> CurvePoint {
    CurvePoint(g.0 * message.0 + h.0 * randomness.0)
}

/// Commit under a CRS, returning the full triple
pub fn commit_with_crs(crs: &Crs, message: &CurveScalar, randomness: &CurveScalar) -> Commitment {
    Commitment {
        g: crs.g,
        h: crs.h,
        value: commit(message, randomness, &crs.g, &crs.h),
    }
}

/// Recompute the commitment and compare in constant time
pub fn open(
    commitment: &CurvePoint,
    message: &CurveScalar,
    randomness: &CurveScalar,
    g: &CurvePoint,
    h: &CurvePoint,
) -> bool {
    let recomputed = commit(message, randomness, g, h);
    bool::from(recomputed.0.ct_eq(&commitment.0))
}

/// Open from wire encodings. Any malformed value opens to `false`.
pub fn open_hex(
    commitment: &str,
    message: &CurveScalar,
    randomness: &str,
    g: &str,
    h: &str,
) -> bool {
    let decoded = (|| -> Result<_, DecodeError> {
        Ok((
            CurvePoint::from_hex("commitment", commitment)?,
            CurveScalar::from_hex("randomness", randomness)?,
            CurvePoint::from_hex("g", g)?,
            CurvePoint::from_hex("h", h)?,
        ))
    })();

    match decoded {
        Ok((c, r, g, h)) => open(&c, message, &r, &g, &h),
        Err(e) => {
            debug!("Commitment open rejected malformed input: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_commit_open() {
        let crs = setup_crs(CurveId::Secp256k1).unwrap();
        let m = CurveScalar::hash_with_seed(b"hello", "abc123");
        let r = CurveScalar::random();
        let c = commit_with_crs(&crs, &m, &r);
        assert!(c.opens_to(&m, &r));

        let other = CurveScalar::hash_with_seed(b"hellp", "abc123");
        assert!(!c.opens_to(&other, &r));
        assert!(!c.opens_to(&m, &CurveScalar::random()));
    }

    #[test]
    fn test_point_hex_round_trip() {
        let p = CurvePoint::generator().mul(&CurveScalar::hash_message(b"point"));
        let hex_str = p.to_hex();
        assert_eq!(hex_str.len(), 2 * COMPRESSED_POINT_SIZE);
        assert_eq!(CurvePoint::from_hex("p", &hex_str).unwrap(), p);
    }

    #[test]
    fn test_generator_encoding() {
        assert_eq!(
            CurvePoint::generator().to_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_point_decode_failures() {
        assert!(matches!(
            CurvePoint::from_hex("g", "zz"),
            Err(DecodeError::Hex { .. })
        ));
        assert!(matches!(
            CurvePoint::from_hex("g", "02"),
            Err(DecodeError::Width { .. })
        ));
        // x equal to the field modulus is not a field element
        let off_curve = "02fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
        assert_eq!(
            CurvePoint::from_hex("g", off_curve),
            Err(DecodeError::NotOnCurve { field: "g" })
        );
        let x = &CurvePoint::generator().to_hex()[2..];
        for tag in [0x00u8, 0x04, 0x05, 0x06, 0x07] {
            assert_eq!(
                CurvePoint::from_hex("g", &format!("{:02x}{}", tag, x)),
                Err(DecodeError::PointTag { field: "g", tag })
            );
        }
    }

    #[test]
    fn test_scalar_must_be_canonical() {
        let n_plus_one = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364142";
        assert_eq!(
            CurveScalar::from_hex("randomness", n_plus_one),
            Err(DecodeError::NonCanonicalScalar { field: "randomness" })
        );
        let r = CurveScalar::random();
        assert_eq!(CurveScalar::from_hex("randomness", &r.to_hex()).unwrap(), r);
    }

    #[test]
    fn test_open_hex_false_on_malformed() {
        let crs = setup_crs(CurveId::Secp256k1).unwrap();
        let m = CurveScalar::hash_message(b"data");
        let r = CurveScalar::random();
        let c = commit(&m, &r, &crs.g, &crs.h);

        assert!(open_hex(&c.to_hex(), &m, &r.to_hex(), &crs.g.to_hex(), &crs.h.to_hex()));
        assert!(!open_hex("not hex", &m, &r.to_hex(), &crs.g.to_hex(), &crs.h.to_hex()));
        assert!(!open_hex(&c.to_hex(), &m, "00", &crs.g.to_hex(), &crs.h.to_hex()));
    }

    #[test]
    fn test_crs_serde() {
        let crs = setup_crs(CurveId::Secp256k1).unwrap();
        let json = serde_json::to_string(&crs).unwrap();
        assert!(json.contains("\"secp256k1\""));
        let back: Crs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, crs);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_commitment_opens(m in any::<[u8; 32]>(), r in any::<[u8; 32]>(), x in any::<[u8; 32]>()) {
            let x = CurveScalar::from_bytes_reduced(&x);
            prop_assume!(Crs::from_trapdoor(CurveId::Secp256k1, &x).is_ok());
            let crs = Crs::from_trapdoor(CurveId::Secp256k1, &x).unwrap();
            let m = CurveScalar::from_bytes_reduced(&m);
            let r = CurveScalar::from_bytes_reduced(&r);
            let c = commit(&m, &r, &crs.g, &crs.h);
            prop_assert!(open(&c, &m, &r, &crs.g, &crs.h));
        }

        #[test]
        fn prop_commitment_binds(m1 in any::<[u8; 32]>(), m2 in any::<[u8; 32]>(), r in any::<[u8; 32]>()) {
            let m1 = CurveScalar::hash_message(&m1);
            let m2 = CurveScalar::hash_message(&m2);
            prop_assume!(m1 != m2);
            let crs = setup_crs(CurveId::Secp256k1).unwrap();
            let r = CurveScalar::from_bytes_reduced(&r);
            let c = commit(&m1, &r, &crs.g, &crs.h);
            prop_assert!(!open(&c, &m2, &r, &crs.g, &crs.h));
        }
    }
}
