use thiserror::Error;

/// Errors surfaced to the control thread. The audio thread never produces or
/// propagates these; on any invalid or uninitialized state it substitutes
/// silence instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("SPC file is truncated (expected at least 0x10180 bytes)")]
    TruncatedSpcFile,
    #[error("BRR block is malformed (expected at least 9 bytes)")]
    MalformedBrrBlock,
    #[error("handle does not refer to a live engine instance")]
    InvalidHandle,
    #[error("voice index is out of range (expected 0..8)")]
    InvalidVoiceIndex,
    #[error("sample rate must be positive")]
    InvalidSampleRate,
}

impl EngineError {
    /// Collapses a result to the `0`/`1` convention used across the C ABI,
    /// logging any rejected error before discarding it.
    pub fn abi_result<T>(result: Result<T, Self>) -> u8 {
        match result {
            Ok(_) => 1,
            Err(err) => {
                log::warn!("rejected ABI call: {err}");
                0
            }
        }
    }
}
