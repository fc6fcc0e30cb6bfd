mod supervisor;

pub use supervisor::*;
