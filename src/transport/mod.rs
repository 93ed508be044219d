//! UDP transport layer.

mod udp;

pub use udp::{SocketConfig, UdpEndpoint};

pub(crate) use udp::is_transient;
