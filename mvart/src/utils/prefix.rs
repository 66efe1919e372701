//! Common-prefix length of two byte strings, compared a vector or a machine
//! word at a time.

use num_traits::PrimInt;
use std::mem::size_of;

#[inline]
fn load_word<T: PrimInt>(bytes: &[u8]) -> T {
    assert!(bytes.len() >= size_of::<T>());
    // SAFETY: the length was checked above; the read tolerates any alignment.
    T::from_le(unsafe { bytes.as_ptr().cast::<T>().read_unaligned() })
}

/// Index of the first differing byte of two little-endian loaded words.
#[inline]
fn first_mismatch<T: PrimInt>(a: T, b: T) -> usize {
    ((a ^ b).trailing_zeros() / 8) as usize
}

#[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
fn x86_64_sse_eq_mask(a: &[u8], b: &[u8]) -> u32 {
    use std::arch::x86_64::{__m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8};

    assert!(a.len() >= 16 && b.len() >= 16);
    // SAFETY: both slices hold at least 16 bytes and SSE2 is enabled for the target.
    unsafe {
        let va = _mm_loadu_si128(a.as_ptr() as *const __m128i);
        let vb = _mm_loadu_si128(b.as_ptr() as *const __m128i);
        _mm_movemask_epi8(_mm_cmpeq_epi8(va, vb)) as u32
    }
}

/// Number of leading bytes `a` and `b` have in common.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let len = a.len().min(b.len());
    let mut i = 0;

    #[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
    while i + 16 <= len {
        let mask = x86_64_sse_eq_mask(&a[i..], &b[i..]);
        if mask != 0xFFFF {
            return i + (!mask).trailing_zeros() as usize;
        }
        i += 16;
    }

    while i + 8 <= len {
        let wa = load_word::<u64>(&a[i..]);
        let wb = load_word::<u64>(&b[i..]);
        if wa != wb {
            return i + first_mismatch(wa, wb);
        }
        i += 8;
    }
    if i + 4 <= len {
        let wa = load_word::<u32>(&a[i..]);
        let wb = load_word::<u32>(&b[i..]);
        if wa != wb {
            return i + first_mismatch(wa, wb);
        }
        i += 4;
    }
    while i < len && a[i] == b[i] {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(a: &[u8], b: &[u8]) -> usize {
        a.iter().zip(b).take_while(|(x, y)| x == y).count()
    }

    #[test]
    fn matches_bytewise_comparison() {
        let base: Vec<u8> = (0..70u8).collect();
        for len in 0..base.len() {
            for flip in 0..len {
                let mut other = base[..len].to_vec();
                other[flip] ^= 0x80;
                assert_eq!(common_prefix_len(&base[..len], &other), naive(&base[..len], &other));
                assert_eq!(common_prefix_len(&base, &other), flip);
            }
            assert_eq!(common_prefix_len(&base, &base[..len]), len);
        }
        assert_eq!(common_prefix_len(b"", b"abc"), 0);
    }
}
