//! Merkle trees over commitment points.
//!
//! Leaves are taken as given (not re-hashed); an internal node is
//! `SHA3-256(left || right)`. When a level has an odd number of nodes the
//! last one is promoted unchanged and contributes no proof step.

use log::trace;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::core::errors::{DecodeError, ProofError, ProofResult};
use crate::core::utils::{compute_sha3_256_from_slices, decode_hex_field};

/// One step from a node towards the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireStep", into = "WireStep")]
pub struct ProofStep {
    pub sibling: Vec<u8>,
    /// The sibling sits to the left of the running hash
    pub is_left: bool,
}

/// `{"left": hex}` or `{"right": hex}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireStep {
    Left(String),
    Right(String),
}

impl TryFrom<WireStep> for ProofStep {
    type Error = DecodeError;

    fn try_from(step: WireStep) -> Result<Self, Self::Error> {
        let (value, is_left) = match step {
            WireStep::Left(v) => (v, true),
            WireStep::Right(v) => (v, false),
        };
        Ok(ProofStep {
            sibling: decode_hex_field("merkle_proof", &value)?,
            is_left,
        })
    }
}

impl From<ProofStep> for WireStep {
    fn from(step: ProofStep) -> Self {
        let value = hex::encode(step.sibling);
        if step.is_left {
            WireStep::Left(value)
        } else {
            WireStep::Right(value)
        }
    }
}

/// Ordered sibling list from a leaf up to the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof {
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_json(&self) -> ProofResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(json).map_err(|e| DecodeError::MerkleProof {
            reason: e.to_string(),
        })
    }

    /// Replay the chain starting at `leaf`
    pub fn compute_root(&self, leaf: &[u8]) -> Vec<u8> {
        let mut current = leaf.to_vec();
        for step in &self.steps {
            current = if step.is_left {
                compute_sha3_256_from_slices(&step.sibling, &current).to_vec()
            } else {
                compute_sha3_256_from_slices(&current, &step.sibling).to_vec()
            };
        }
        current
    }
}

/// A fully materialized tree, level 0 being the leaves
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Vec<u8>>>,
}

impl MerkleTree {
    pub fn build<L: AsRef<[u8]>>(leaves: &[L]) -> ProofResult<Self> {
        if leaves.is_empty() {
            return Err(ProofError::InvalidInput {
                reason: "cannot build a merkle tree without leaves".to_string(),
            });
        }

        let mut levels = vec![leaves.iter().map(|l| l.as_ref().to_vec()).collect::<Vec<_>>()];

        while levels.last().map_or(0, |level| level.len()) > 1 {
            let current_level = &levels[levels.len() - 1];
            let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);

            for chunk in current_level.chunks(2) {
                if chunk.len() == 2 {
                    next_level.push(compute_sha3_256_from_slices(&chunk[0], &chunk[1]).to_vec());
                } else {
                    // Odd node - promote to next level
                    next_level.push(chunk[0].clone());
                }
            }
            levels.push(next_level);
        }

        trace!(
            "Built merkle tree: {} leaves, {} levels",
            leaves.len(),
            levels.len()
        );
        Ok(Self { levels })
    }

    pub fn root(&self) -> &[u8] {
        // build() guarantees a single-node top level
        &self.levels[self.levels.len() - 1][0]
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaf(&self, index: usize) -> Option<&[u8]> {
        self.levels[0].get(index).map(|l| l.as_slice())
    }

    /// Inclusion proof for `leaf_index`, `None` when out of range
    pub fn prove(&self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = index ^ 1;
            if let Some(sibling) = level.get(sibling_index) {
                steps.push(ProofStep {
                    sibling: sibling.clone(),
                    is_left: sibling_index < index,
                });
            }
            index /= 2;
        }
        Some(MerkleProof { steps })
    }
}

/// `true` iff replaying `proof` from `leaf` lands exactly on `expected_root`
pub fn validate(leaf: &[u8], proof: &MerkleProof, expected_root: &[u8]) -> bool {
    proof.compute_root(leaf) == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::compute_sha3_256;
    use proptest::prelude::*;

    #[derive(Clone)]
    struct Sha3Algorithm;

    impl rs_merkle::Hasher for Sha3Algorithm {
        type Hash = [u8; 32];

        fn hash(data: &[u8]) -> [u8; 32] {
            compute_sha3_256(data)
        }
    }

    fn leaves(n: usize) -> Vec<[u8; 32]> {
        (0..n)
            .map(|i| compute_sha3_256(format!("leaf-{}", i).as_bytes()))
            .collect()
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = MerkleTree::build(&[b"only".to_vec()]).unwrap();
        assert_eq!(tree.root(), b"only");
        let proof = tree.prove(0).unwrap();
        assert!(proof.is_empty());
        assert!(validate(b"only", &proof, b"only"));
        assert!(!validate(b"other", &proof, b"only"));
    }

    #[test]
    fn test_empty_tree_is_error() {
        let empty: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(
            MerkleTree::build(&empty),
            Err(ProofError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_three_leaves_promotes_last() {
        let l = leaves(3);
        let tree = MerkleTree::build(&l).unwrap();
        let left = compute_sha3_256_from_slices(&l[0], &l[1]);
        let expected = compute_sha3_256_from_slices(&left, &l[2]);
        assert_eq!(tree.root(), &expected[..]);

        // The promoted leaf only needs one step
        let proof = tree.prove(2).unwrap();
        assert_eq!(proof.len(), 1);
        assert!(proof.steps[0].is_left);
        assert!(validate(&l[2], &proof, tree.root()));
    }

    #[test]
    fn test_out_of_range_proof() {
        let tree = MerkleTree::build(&leaves(4)).unwrap();
        assert!(tree.prove(4).is_none());
    }

    #[test]
    fn test_matches_rs_merkle() {
        for n in 1..=17 {
            let l = leaves(n);
            let ours = MerkleTree::build(&l).unwrap();
            let theirs = rs_merkle::MerkleTree::<Sha3Algorithm>::from_leaves(&l);
            assert_eq!(Some(ours.root().to_vec()), theirs.root().map(|r| r.to_vec()), "n = {}", n);
        }
    }

    #[test]
    fn test_proof_json_wire_form() {
        let l = leaves(2);
        let tree = MerkleTree::build(&l).unwrap();
        let proof = tree.prove(0).unwrap();
        let json = proof.to_json().unwrap();
        assert_eq!(json, format!(r#"[{{"right":"{}"}}]"#, hex::encode(l[1])));
        assert_eq!(MerkleProof::from_json(&json).unwrap(), proof);

        assert!(MerkleProof::from_json(r#"[{"up":"00"}]"#).is_err());
        assert!(MerkleProof::from_json(r#"[{"left":"xyz"}]"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_every_leaf_validates(n in 1usize..40, pick in any::<prop::sample::Index>()) {
            let l = leaves(n);
            let tree = MerkleTree::build(&l).unwrap();
            let i = pick.index(n);
            let proof = tree.prove(i).unwrap();
            prop_assert!(validate(&l[i], &proof, tree.root()));
        }

        #[test]
        fn prop_tampered_sibling_rejected(
            n in 2usize..40,
            pick in any::<prop::sample::Index>(),
            step_pick in any::<prop::sample::Index>(),
            byte_pick in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let l = leaves(n);
            let tree = MerkleTree::build(&l).unwrap();
            let i = pick.index(n);
            let mut proof = tree.prove(i).unwrap();
            prop_assume!(!proof.is_empty());
            let s = step_pick.index(proof.len());
            let b = byte_pick.index(proof.steps[s].sibling.len());
            proof.steps[s].sibling[b] ^= flip;
            prop_assert!(!validate(&l[i], &proof, tree.root()));
        }
    }
}
