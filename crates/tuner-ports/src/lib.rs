pub mod audio;
pub mod storage;
pub mod types;

pub use audio::*;
pub use storage::*;
pub use types::*;
