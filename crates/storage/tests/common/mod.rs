pub mod nexus;

#[allow(unused_imports)]
pub use nexus::FakeNexus;

use std::net::TcpListener;

/// httpmock and the fake Nexus both need a loopback listener.
#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}
