pub mod chained;
pub mod commitment;
pub mod merkle;
pub mod signer;

pub use chained::*;
pub use commitment::*;
pub use merkle::{validate as validate_merkle_proof, MerkleProof, MerkleTree, ProofStep};
pub use signer::*;
