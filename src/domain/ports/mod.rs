mod clock;
mod identity_provider;
mod media_device;

pub use clock::*;
pub use identity_provider::*;
pub use media_device::*;
