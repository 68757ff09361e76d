//! Streams ordered disk-image parts into a single output file under a bounded chunk budget.

use std::path::Path;

use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::{
    oci::{memory, scheduler::PartSource},
    VmPullError, VmPullResult,
};
use vmpull_utils::FSYNC_EVERY_N_CHUNKS;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Concatenates `parts` (unordered pairs of `(partNum, source)`, 1-based, contiguous through
/// `total_parts`) into `output_path` in part-number order.
///
/// Logs a progress tick every 5% of `expected_size` copied. If the host is memory-constrained,
/// requests an fsync of the output every [`FSYNC_EVERY_N_CHUNKS`] chunks. A final size mismatch
/// against `expected_size` is logged as a warning, not an error.
#[tracing::instrument(skip(parts))]
pub async fn reassemble(
    parts: &[(u32, PartSource)],
    total_parts: u32,
    output_path: &Path,
    expected_size: u64,
) -> VmPullResult<()> {
    let chunk_size = memory::optimal_chunk_size() as usize;
    let fsync_while_constrained = memory::memory_constrained();

    let mut output = File::create(output_path).await?;
    let mut copied: u64 = 0;
    let mut last_tick = 0u64;
    let mut chunks_since_fsync: u64 = 0;

    for part_num in 1..=total_parts {
        let source = parts
            .iter()
            .find(|(n, _)| *n == part_num)
            .map(|(_, s)| s)
            .ok_or(VmPullError::MissingPart(part_num))?;

        let mut input = File::open(source.path()).await?;
        let mut buf = vec![0u8; chunk_size];

        loop {
            let read = input.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            output.write_all(&buf[..read]).await?;
            copied += read as u64;

            if expected_size > 0 {
                let tick = (copied * 20 / expected_size).min(20);
                if tick > last_tick {
                    tracing::debug!(percent = tick * 5, "reassembly progress");
                    last_tick = tick;
                }
            }

            if fsync_while_constrained {
                chunks_since_fsync += 1;
                if chunks_since_fsync >= FSYNC_EVERY_N_CHUNKS {
                    output.sync_data().await?;
                    chunks_since_fsync = 0;
                }
            }
        }
    }

    output.flush().await?;

    let final_size = output.metadata().await?.len();
    if final_size != expected_size {
        tracing::warn!(
            final_size,
            expected_size,
            "reassembled disk image size differs from expected sum of part sizes"
        );
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
