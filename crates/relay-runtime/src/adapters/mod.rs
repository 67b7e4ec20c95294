//! Outbound adapters: concrete implementations of the subsystem ports,
//! wired in by the runtime (the subsystem crates stay transport-free).

pub mod directory;
pub mod enclave;
pub mod p2p;

pub use directory::DirectoryAdapter;
pub use enclave::RestEnclaveClient;
pub use p2p::RestP2pClient;
