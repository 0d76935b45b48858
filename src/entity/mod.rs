pub mod identity;
pub mod types;

pub use identity::derive_id;
pub use types::*;
