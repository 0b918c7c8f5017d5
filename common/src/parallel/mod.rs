//! Parallel processing utilities.
//!
//! Row-aligned chunking for image buffers and bounded parallel maps that keep
//! results in input order.

use rayon::prelude::*;

#[cfg(test)]
mod tests;

/// Multiplier for number of chunks relative to CPU threads.
const CHUNKS_PER_THREAD: usize = 3;

#[inline]
fn auto_chunk_rows(height: usize) -> usize {
    let num_chunks = rayon::current_num_threads() * CHUNKS_PER_THREAD;
    (height / num_chunks).max(1)
}

/// Splits an interleaved row-major buffer into parallel chunks of whole rows.
///
/// `row_len` is the number of elements per row (width * channels). Yields
/// `(first_row, chunk)` pairs; every chunk length is a multiple of `row_len`.
pub fn par_rows_mut<'a, T: Send + 'a>(
    data: &'a mut [T],
    row_len: usize,
) -> impl IndexedParallelIterator<Item = (usize, &'a mut [T])> + 'a {
    assert!(row_len > 0, "row_len must be > 0");
    assert_eq!(data.len() % row_len, 0, "buffer is not row-aligned");

    let chunk_rows = auto_chunk_rows(data.len() / row_len);
    data.par_chunks_mut(row_len * chunk_rows)
        .enumerate()
        .map(move |(idx, chunk)| (idx * chunk_rows, chunk))
}

/// Maps a fallible `f` over `items` in parallel, with at most
/// `max_concurrent` items in flight. Results keep input order.
///
/// Items are processed in chunks of `max_concurrent` to cap peak memory.
/// Returns the error of the first failing item in input order. Remaining
/// chunks are not started once a chunk has failed.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn try_par_map_limited<T, R, E, F>(
    items: &[T],
    max_concurrent: usize,
    f: F,
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<Result<R, E>> = chunk.par_iter().map(&f).collect();
        for result in chunk_results {
            results.push(result?);
        }
    }
    Ok(results)
}
