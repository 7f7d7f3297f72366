mod headless;

pub use headless::*;
