mod call_store;
mod membership;

pub use call_store::*;
pub use membership::*;
