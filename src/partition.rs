use std::hash::Hasher;

/// Hashes an intermediate key with 64-bit FNV-1a, keeping the low 31 bits.
///
/// Every worker must route keys with this exact function: a worker built
/// with a different hash would silently send keys to the wrong bucket.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Bucket for `key` among `buckets` reduce partitions.
pub fn partition(key: &str, buckets: usize) -> usize {
    assert!(buckets > 0, "partition count must be positive");
    ihash(key.as_bytes()) as usize % buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_is_fnv1a() {
        // FNV-1a 64 of the empty input is the offset basis.
        assert_eq!(ihash(b""), (0xcbf2_9ce4_8422_2325u64 & 0x7fff_ffff) as u32);
        assert_eq!(ihash(b"a"), (0xaf63_dc4c_8601_ec8cu64 & 0x7fff_ffff) as u32);
    }

    #[test]
    fn partition_is_stable_and_in_range() {
        for word in ["a", "b", "hello", "world", "the", "ernest"] {
            let bucket = partition(word, 7);
            assert!(bucket < 7);
            for _ in 0..10 {
                assert_eq!(partition(word, 7), bucket);
            }
        }
    }

    #[test]
    fn single_bucket_takes_everything() {
        assert_eq!(partition("anything", 1), 0);
    }
}
