pub mod chat;
pub mod party;
pub mod playback;
pub mod session;
