mod backoff;
mod generation;
mod party_session;

pub use backoff::*;
pub use generation::*;
pub use party_session::*;
