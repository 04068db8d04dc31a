//! Process and controller lifecycle primitives

mod shutdown;
mod signal;

pub use shutdown::ShutdownSignal;
pub use signal::Signal;
