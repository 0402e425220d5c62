// ABOUTME: SSH transport for remote deployment hosts.
// ABOUTME: Key or agent authentication, remote commands, and unix socket tunnels.

mod error;
mod session;
mod tunnel;

pub use error::{Error, Result};
pub use session::{CommandOutput, Session, SessionConfig};
pub use tunnel::Tunnel;
