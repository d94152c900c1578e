pub mod gas;
pub mod keys;
pub mod nonce_manager;

pub use gas::*;
pub use keys::*;
pub use nonce_manager::*;
