//! Error types for Pulselink.

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

/// Result type alias for Pulselink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Pulselink.
#[derive(Error, Debug)]
pub enum Error {
    // Wire format errors
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    // Link health errors
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Timer / event loop errors
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    // Worker thread errors
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Packet encoding and decoding errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload too large: {size} bytes (max {max})")]
    DataTooLarge { size: usize, max: usize },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid packet: buffer shorter than declared frame")]
    InvalidPacket,

    #[error("CRC mismatch: frame 0x{received:08X}, computed 0x{computed:08X}")]
    CrcMismatch { received: u32, computed: u32 },
}

/// Link health errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("unstable communication: receive interval outside tolerance")]
    UnstableCommunication,

    #[error("loss of communication: peer lifesign frozen past timeout")]
    LossOfCommunication,
}

/// UDP socket errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("socket creation failed: {0}")]
    SocketCreate(io::Error),

    #[error("bind failed on {addr}: {source}")]
    Bind { addr: SocketAddrV4, source: io::Error },

    #[error("connect failed to {addr}: {source}")]
    Connect { addr: SocketAddrV4, source: io::Error },

    #[error("send failed: {0}")]
    Send(io::Error),

    #[error("receive failed: {0}")]
    Recv(io::Error),

    #[error("socket buffer configuration failed: {0}")]
    SetSocketBuffer(io::Error),
}

/// Timer and readiness loop errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("timer creation failed: {0}")]
    TimerCreate(String),

    #[error("timer arming failed: {0}")]
    SetTime(String),

    #[error("timer read failed: {0}")]
    TimerRead(String),

    #[error("event loop creation failed: {0}")]
    EventLoopCreate(String),

    #[error("event registration failed: {0}")]
    RegisterEvent(String),

    #[error("event wait failed: {0}")]
    WaitEvent(String),
}

/// Worker thread configuration errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("thread creation failed: {0}")]
    ThreadCreate(io::Error),

    #[error("CPU affinity to core {core} failed")]
    SetAffinity { core: usize },

    #[error("realtime scheduling at priority {priority} failed: {reason}")]
    SetScheduler { priority: u8, reason: String },
}

impl Error {
    /// Check whether this error is fatal to startup (vs. degraded operation).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(
                TransportError::SocketCreate(_)
                    | TransportError::Bind { .. }
                    | TransportError::Connect { .. }
            ) | Error::Runtime(RuntimeError::ThreadCreate(_))
                | Error::Scheduler(_)
                | Error::Config(_)
        )
    }
}
