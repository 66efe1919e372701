//! Searches over the sorted key arrays of Node4 and Node16.

#[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
fn x86_64_sse_find_key_16_up_to(key: u8, keys: &[u8; 16], num_children: usize) -> Option<usize> {
    use std::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    // SAFETY: `keys` is exactly 16 readable bytes and SSE2 is enabled for the target.
    let bitfield = unsafe {
        let key_vec = _mm_set1_epi8(key as i8);
        let results = _mm_cmpeq_epi8(key_vec, _mm_loadu_si128(keys.as_ptr() as *const __m128i));
        let mask = ((1u32 << num_children) - 1) as i32;
        _mm_movemask_epi8(results) & mask
    };
    if bitfield != 0 {
        return Some(bitfield.trailing_zeros() as usize);
    }
    None
}

#[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
fn x86_64_sse_seek_insert_pos_16(key: u8, keys: &[u8; 16], num_children: usize) -> usize {
    use std::arch::x86_64::{
        __m128i, _mm_cmplt_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
        _mm_xor_si128,
    };

    // SSE2 only compares signed bytes; flipping the top bit turns that into
    // an unsigned comparison.
    // SAFETY: `keys` is exactly 16 readable bytes and SSE2 is enabled for the target.
    let bitfield = unsafe {
        let bias = _mm_set1_epi8(i8::MIN);
        let key_vec = _mm_xor_si128(_mm_set1_epi8(key as i8), bias);
        let keys_vec = _mm_xor_si128(_mm_loadu_si128(keys.as_ptr() as *const __m128i), bias);
        let mask = ((1u32 << num_children) - 1) as i32;
        _mm_movemask_epi8(_mm_cmplt_epi8(key_vec, keys_vec)) & mask
    };
    if bitfield != 0 {
        bitfield.trailing_zeros() as usize
    } else {
        num_children
    }
}

fn binary_find_key(key: u8, keys: &[u8], num_children: usize) -> Option<usize> {
    keys[..num_children].binary_search(&key).ok()
}

/// Index of `key` among the first `num_children` entries of a sorted key
/// array.
#[allow(unreachable_code)]
#[inline]
pub fn u8_keys_find_key_position_sorted<const WIDTH: usize>(
    key: u8,
    keys: &[u8],
    num_children: usize,
) -> Option<usize> {
    if WIDTH <= 4 {
        return (0..num_children).find(|&i| keys[i] == key);
    }

    if WIDTH == 16 {
        #[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
        {
            if let Ok(keys) = <&[u8; 16]>::try_from(&keys[..16]) {
                return x86_64_sse_find_key_16_up_to(key, keys, num_children);
            }
        }
    }

    binary_find_key(key, keys, num_children)
}

/// Index of the first entry strictly greater than `key`, or `num_children`.
#[allow(unreachable_code)]
#[inline]
pub fn u8_keys_find_insert_position<const WIDTH: usize>(
    key: u8,
    keys: &[u8],
    num_children: usize,
) -> usize {
    if WIDTH == 16 {
        #[cfg(all(feature = "simd_keys", target_arch = "x86_64", target_feature = "sse2"))]
        {
            if let Ok(keys) = <&[u8; 16]>::try_from(&keys[..16]) {
                return x86_64_sse_seek_insert_pos_16(key, keys, num_children);
            }
        }
    }

    keys[..num_children].partition_point(|&k| k <= key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_in_sorted_keys() {
        let mut keys = [0u8; 16];
        let present = [3u8, 17, 64, 128, 200, 255];
        keys[..present.len()].copy_from_slice(&present);
        for (i, k) in present.iter().enumerate() {
            assert_eq!(
                u8_keys_find_key_position_sorted::<16>(*k, &keys, present.len()),
                Some(i)
            );
            assert_eq!(
                u8_keys_find_key_position_sorted::<4>(*k, &keys, present.len().min(4)),
                if i < 4 { Some(i) } else { None }
            );
        }
        // Padding bytes past the child count must never match.
        assert_eq!(
            u8_keys_find_key_position_sorted::<16>(0, &keys, present.len()),
            None
        );
        assert_eq!(
            u8_keys_find_key_position_sorted::<16>(100, &keys, present.len()),
            None
        );
    }

    #[test]
    fn insert_position_is_unsigned() {
        let mut keys = [0u8; 16];
        let present = [1u8, 100, 127, 128, 250];
        keys[..present.len()].copy_from_slice(&present);
        assert_eq!(u8_keys_find_insert_position::<16>(0, &keys, 5), 0);
        assert_eq!(u8_keys_find_insert_position::<16>(2, &keys, 5), 1);
        assert_eq!(u8_keys_find_insert_position::<16>(126, &keys, 5), 2);
        assert_eq!(u8_keys_find_insert_position::<16>(129, &keys, 5), 4);
        assert_eq!(u8_keys_find_insert_position::<16>(255, &keys, 5), 5);
        assert_eq!(u8_keys_find_insert_position::<4>(129, &keys, 4), 4);
        assert_eq!(u8_keys_find_insert_position::<16>(7, &keys, 0), 0);
    }
}
