//! Control socket for the daemon

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::{read_message, write_request, Server};
