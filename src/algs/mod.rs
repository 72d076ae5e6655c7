//! Communication, distribution and mesh generation.

pub mod communicator;
pub mod distribute;
pub mod exchange;
pub mod meshgen;
pub mod wire;

pub use communicator::Communicator;
pub use exchange::exchange_records;
