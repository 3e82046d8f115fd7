//! Batch splitting under provider batch-size limits

/// Split `texts` into consecutive chunks of at most `max_batch_size` items.
///
/// `max_batch_size == 0` means unlimited: the whole input is one chunk. Empty input yields
/// no chunks at all.
pub fn chunk<T>(texts: &[T], max_batch_size: usize) -> Vec<&[T]> {
    if texts.is_empty() {
        return Vec::new();
    }
    if max_batch_size == 0 {
        return vec![texts];
    }
    texts.chunks(max_batch_size).collect()
}
