pub mod prover;
pub mod requests;
pub mod verifier;

pub use requests::*;
pub use verifier::{Verification, Verifier};
