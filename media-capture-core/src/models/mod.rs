pub mod capabilities;
pub mod device;
pub mod error;
pub mod format;
pub mod state;
