pub mod devices;
pub mod device_slot;
pub mod endpoint;
pub mod negotiate;
pub mod samples;
pub mod stream_binding;

pub use devices::*;
pub use device_slot::*;
pub use endpoint::*;
pub use negotiate::*;
pub use samples::*;
pub use stream_binding::*;
