//! Host memory pressure probe: chunk sizing and memory-constrained detection.

use vmpull_utils::{
    CHUNK_SIZING_FREE_MEMORY_THRESHOLD, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
    MEMORY_CONSTRAINED_THRESHOLD, MIN_CHUNK_SIZE,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the chunk size to use for streaming copies, in bytes.
///
/// Defaults to 512 KiB. If free memory is known and at least 1 GiB, scales up to
/// `clamp(free / 1000, 512 KiB, 2 MiB)`.
pub fn optimal_chunk_size() -> u64 {
    match free_memory_bytes() {
        Some(free) if free >= CHUNK_SIZING_FREE_MEMORY_THRESHOLD => {
            (free / 1000).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
        }
        _ => DEFAULT_CHUNK_SIZE,
    }
}

/// True iff free memory is reported and below 2 GiB, or the memory query failed. Fails safe
/// toward "constrained" so the reassembler prefers fsync-heavy, low-memory behavior when in
/// doubt.
pub fn memory_constrained() -> bool {
    match free_memory_bytes() {
        Some(free) => free < MEMORY_CONSTRAINED_THRESHOLD,
        None => true,
    }
}

fn free_memory_bytes() -> Option<u64> {
    psutil::memory::virtual_memory().ok().map(|mem| mem.available())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_chunk_size_is_within_documented_bounds() {
        let chunk = optimal_chunk_size();
        assert!(chunk >= MIN_CHUNK_SIZE);
        assert!(chunk <= MAX_CHUNK_SIZE);
    }

    #[test]
    fn memory_constrained_is_a_plain_bool() {
        // Smoke test: the real host's memory state is not controllable here, so we only assert
        // the probe runs without panicking and returns a bool.
        let _ = memory_constrained();
    }
}
