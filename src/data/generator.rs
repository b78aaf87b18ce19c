// ============================================================
// Layer 4 — Windowed Batch Generator
// ============================================================
// Turns one split into a lazy sequence of mini-batches.
//
//   shuffle=true        → a fresh permutation per call (per epoch)
//   dynamic_batch=true  → the trailing under-full batch is kept
//   dynamic_batch=false → the trailing under-full batch is dropped
//
// With W windows and batch size B (dynamic): ceil(W / B) batches,
// sizes summing to W, each window exactly once per call.

use rand::seq::SliceRandom;
use rand::Rng;

/// Iterator over the batches of one split, created by [`gen_batch`].
pub struct BatchGenerator<'a, T> {
    items: &'a [T],
    order: Vec<usize>,
    batch_size: usize,
    dynamic_batch: bool,
    cursor: usize,
}

/// Start one pass over `items`.
///
/// A `batch_size` of 0 is treated as 1.
pub fn gen_batch<'a, T, R>(
    items: &'a [T],
    batch_size: usize,
    shuffle: bool,
    dynamic_batch: bool,
    rng: &mut R,
) -> BatchGenerator<'a, T>
where
    R: Rng + ?Sized,
{
    let mut order: Vec<usize> = (0..items.len()).collect();
    if shuffle {
        order.shuffle(rng);
    }
    BatchGenerator {
        items,
        order,
        batch_size: batch_size.max(1),
        dynamic_batch,
        cursor: 0,
    }
}

impl<T> BatchGenerator<'_, T> {
    /// Number of batches this pass yields in total.
    pub fn num_batches(&self) -> usize {
        let n = self.order.len();
        if self.dynamic_batch {
            n.div_ceil(self.batch_size)
        } else {
            n / self.batch_size
        }
    }
}

impl<T: Clone> Iterator for BatchGenerator<'_, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.order.len();
        if self.cursor >= len {
            return None;
        }
        let mut end = self.cursor + self.batch_size;
        if end > len {
            if !self.dynamic_batch {
                self.cursor = len;
                return None;
            }
            end = len;
        }
        let batch = self.order[self.cursor..end]
            .iter()
            .map(|&i| self.items[i].clone())
            .collect();
        self.cursor = end;
        Some(batch)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dynamic_batch_covers_every_item_once() {
        let items: Vec<usize> = (0..23).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let gen = gen_batch(&items, 5, true, true, &mut rng);
        assert_eq!(gen.num_batches(), 5);

        let batches: Vec<Vec<usize>> = gen.collect();
        assert_eq!(batches.len(), 5);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![5, 5, 5, 5, 3]);

        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, items);
    }

    #[test]
    fn test_without_dynamic_batch_tail_is_dropped() {
        let items: Vec<usize> = (0..23).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let batches: Vec<Vec<usize>> = gen_batch(&items, 5, false, false, &mut rng).collect();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3], vec![15, 16, 17, 18, 19]);
    }

    #[test]
    fn test_no_shuffle_keeps_order() {
        let items = vec!['a', 'b', 'c'];
        let mut rng = StdRng::seed_from_u64(0);
        let batches: Vec<Vec<char>> = gen_batch(&items, 2, false, true, &mut rng).collect();
        assert_eq!(batches, vec![vec!['a', 'b'], vec!['c']]);
    }

    #[test]
    fn test_shuffle_is_per_invocation() {
        let items: Vec<usize> = (0..64).collect();
        let mut rng = StdRng::seed_from_u64(1337);
        let first: Vec<usize> = gen_batch(&items, 8, true, true, &mut rng).flatten().collect();
        let second: Vec<usize> = gen_batch(&items, 8, true, true, &mut rng).flatten().collect();

        // same multiset ...
        let (mut a, mut b) = (first.clone(), second.clone());
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        // ... independently permuted (64! orderings, collision is not a concern)
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_split_yields_nothing() {
        let items: Vec<u8> = Vec::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(gen_batch(&items, 4, true, true, &mut rng).count(), 0);
    }

    #[test]
    fn test_batch_larger_than_split() {
        let items = vec![1, 2, 3];
        let mut rng = StdRng::seed_from_u64(0);
        let batches: Vec<Vec<i32>> = gen_batch(&items, 48, false, true, &mut rng).collect();
        assert_eq!(batches, vec![vec![1, 2, 3]]);
    }
}
