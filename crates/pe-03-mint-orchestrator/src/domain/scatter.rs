//! Concurrent fan-out with per-item failure isolation.

use futures::future::join_all;
use std::future::Future;

/// Per-item results of a [`scatter_gather`] run, keyed by input index.
#[derive(Debug)]
pub struct ScatterResult<T, E> {
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<(usize, E)>,
}

impl<T, E> ScatterResult<T, E> {
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.successes.is_empty() && !self.failures.is_empty()
    }

    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.successes.into_iter().map(|(_, value)| value)
    }
}

/// Run `op` for every input concurrently and wait for all of them.
///
/// Failures never cancel siblings. Successes come back in input order.
pub async fn scatter_gather<I, T, E, F, Fut>(inputs: Vec<I>, op: F) -> ScatterResult<T, E>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let futures = inputs.into_iter().enumerate().map(|(index, input)| {
        let fut = op(index, input);
        async move { (index, fut.await) }
    });

    let mut result = ScatterResult {
        successes: Vec::new(),
        failures: Vec::new(),
    };
    for (index, outcome) in join_all(futures).await {
        match outcome {
            Ok(value) => result.successes.push((index, value)),
            Err(err) => result.failures.push((index, err)),
        }
    }
    result
}

/// Split `items` into consecutive chunks of at most `size` items.
#[must_use]
pub fn split_chunks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Sizes of the chunks [`split_chunks`] would produce for `total` items,
/// without materializing the items.
#[must_use]
pub fn chunk_sizes(total: u64, size: usize) -> Vec<usize> {
    let size = size.max(1) as u64;
    (0..total.div_ceil(size))
        .map(|index| size.min(total - index * size) as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks_sizes() {
        let items: Vec<u32> = (0..25).collect();
        let sizes: Vec<usize> = split_chunks(&items, 10).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert!(split_chunks::<u32>(&[], 10).is_empty());
        assert_eq!(split_chunks(&items, 0).len(), 25);
    }

    #[test]
    fn test_chunk_sizes_match_split() {
        assert_eq!(chunk_sizes(25, 10), vec![10, 10, 5]);
        assert_eq!(chunk_sizes(20, 10), vec![10, 10]);
        assert!(chunk_sizes(0, 10).is_empty());
        assert_eq!(chunk_sizes(3, 0), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        let result = scatter_gather(vec![1u32, 2, 3, 4], |_, n| async move {
            if n % 2 == 0 {
                Err(format!("even {n}"))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(result.successes, vec![(0, 10), (2, 30)]);
        assert_eq!(result.failures.len(), 2);
        assert!(!result.all_failed());
    }
}
