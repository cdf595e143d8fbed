use std::net::SocketAddr;

/// How many bytes a connection must deliver before it can be classified.
pub const PRELUDE_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ssh,
    Http,
}

/// Classify a connection by its first bytes. Exactly `SSH` selects the
/// SSH backend; every other prefix falls back to HTTP. The fallback is
/// deliberate: anything that is not an SSH client banner is handed to
/// the HTTP server to answer or reject.
pub fn detect(prelude: &[u8]) -> Protocol {
    if prelude == b"SSH" {
        Protocol::Ssh
    } else {
        Protocol::Http
    }
}

/// Backend addresses, fixed for the process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Upstreams {
    pub ssh: SocketAddr,
    pub http: SocketAddr,
}

impl Upstreams {
    pub fn dest_for(&self, protocol: Protocol) -> SocketAddr {
        match protocol {
            Protocol::Ssh => self.ssh,
            Protocol::Http => self.http,
        }
    }
}
