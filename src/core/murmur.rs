//! MurmurHash3 (x86_32) implementation
//!
//! Partition-key routing hashes keys with this function, so the result must
//! stay bit-compatible with the hash used by the data nodes.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// Compute MurmurHash3 x86_32 for byte data with a given seed
pub fn murmurhash3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    // 处理末尾不足 4 字节的部分
    let tail = chunks.remainder();
    let mut k: u32 = 0;
    if tail.len() >= 3 {
        k ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k ^= tail[0] as u32;
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    fmix32(h)
}

/// Hash an int64 partition key over its little-endian bytes
pub fn hash32_int64(v: i64) -> u32 {
    murmurhash3_32(&v.to_le_bytes(), 0)
}

/// Hash a string partition key over its UTF-8 bytes
pub fn hash32_str(s: &str) -> u32 {
    murmurhash3_32(s.as_bytes(), 0)
}
