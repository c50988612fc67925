//! Id-based work partitioning.

/// Queue index for a message id.
///
/// Stable for the life of the process: every message with the same id
/// goes to the same worker, which keeps their relative order.
pub fn partition(id: &str, workers: usize) -> usize {
    if workers <= 1 {
        return 0;
    }
    crc32fast::hash(id.as_bytes()) as usize % workers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_id_same_queue() {
        for workers in 1..8 {
            let first = partition("a1b2c3", workers);
            assert!(first < workers);
            assert_eq!(partition("a1b2c3", workers), first);
        }
    }

    #[test]
    fn test_single_worker() {
        assert_eq!(partition("anything", 1), 0);
        assert_eq!(partition("anything", 0), 0);
    }

    #[test]
    fn test_spreads_ids() {
        let used: std::collections::HashSet<usize> =
            (0..64).map(|i| partition(&format!("id-{}", i), 4)).collect();
        assert!(used.len() > 1);
    }
}
