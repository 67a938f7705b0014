//! R1CS gadgets used by the balance compliance circuit
//!
//! - `poseidon`: the Poseidon commitment as constraints
//! - `range`: bit decomposition and recomposition

pub mod poseidon;
pub mod range;

pub use poseidon::PoseidonGadget;
pub use range::{alloc_bits, recompose};
