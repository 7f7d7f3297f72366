mod party_store;

pub use party_store::*;
