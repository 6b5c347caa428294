pub mod auth;
pub mod chunk;
pub mod cipher;
pub mod constants;
pub mod container;
pub mod des;
pub mod error;
pub mod pack;


// Re-export the conversion entry points for easy access
pub use container::{ConvertConfig, CpiParts, build_encrypted_cpi, convert};
pub use error::CpiError;
pub use pack::{Blob, Pack};
