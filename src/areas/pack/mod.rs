//! Pack file backend: sorted-hash index parsing, record inflation and
//! delta-chain resolution

pub mod delta;
pub mod index;
pub mod store;

pub use index::PackIndex;
pub use store::PackStore;
