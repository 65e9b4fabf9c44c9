//! Deterministic coordinator endpoint.
//!
//! Coordinator and workers derive the same Unix socket path from the invoking
//! user's login name, so jobs run by different users on the same machine do
//! not collide.

use std::path::PathBuf;

const SOCKET_DIR: &str = "/var/tmp";

/// Socket path for the current user.
pub fn coordinator_socket() -> PathBuf {
    socket_for_user(&whoami::username())
}

/// Socket path for `user`.
pub fn socket_for_user(user: &str) -> PathBuf {
    let user: String = user
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    PathBuf::from(SOCKET_DIR).join(format!("mr-coordinator-{user}.sock"))
}
