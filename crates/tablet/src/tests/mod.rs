mod writer_tests;

use crate::Pair;

/// `count` sorted pairs `key00000 -> value0`, `key00001 -> value1`, ...
/// with every `tombstone_every`-th key deleted (0 = none).
pub(crate) fn sample_pairs(count: usize, tombstone_every: usize) -> Vec<Pair> {
    (0..count)
        .map(|i| {
            let key = format!("key{:05}", i);
            if tombstone_every != 0 && i % tombstone_every == tombstone_every - 1 {
                Pair::tombstone(key.as_str())
            } else {
                Pair::put(key.as_str(), format!("value{}", i).as_str())
            }
        })
        .collect()
}
