/// Timeout (ms) allowed for the handshake writer to shut down after a connection ends.
pub const WRITE_TASK_SHUTDOWN_MS: u64 = 500;
