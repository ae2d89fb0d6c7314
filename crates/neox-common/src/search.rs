//! Byte search helpers.
//!
//! Thin wrappers around memchr, which picks the best SIMD implementation for
//! the running CPU.

/// Find the first null byte in a slice, returning its index.
#[inline]
pub fn find_null(data: &[u8]) -> Option<usize> {
    memchr::memchr(0, data)
}

/// Find a multi-byte pattern in a slice.
#[inline]
pub fn find_pattern(needle: &[u8], haystack: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}

/// Check whether a multi-byte pattern occurs anywhere in a slice.
#[inline]
pub fn contains(needle: &[u8], haystack: &[u8]) -> bool {
    find_pattern(needle, haystack).is_some()
}

/// Split a buffer on null bytes, skipping empty runs.
pub fn split_nul(data: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    data.split(|&b| b == 0).filter(|s| !s.is_empty())
}

/// Truncate a fixed-size field at its first null byte.
#[inline]
pub fn trim_nul(data: &[u8]) -> &[u8] {
    match find_null(data) {
        Some(end) => &data[..end],
        None => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_null() {
        assert_eq!(find_null(b"hello\0world"), Some(5));
        assert_eq!(find_null(b"hello"), None);
        assert_eq!(find_null(b"\0hello"), Some(0));
    }

    #[test]
    fn test_find_pattern() {
        let data = b"hello world";
        assert_eq!(find_pattern(b"world", data), Some(6));
        assert_eq!(find_pattern(b"foo", data), None);
        assert!(contains(b"lo w", data));
    }

    #[test]
    fn test_split_nul_skips_empty() {
        let names: Vec<&[u8]> = split_nul(b"a.png\0\0b.mesh\0").collect();
        assert_eq!(names, vec![&b"a.png"[..], &b"b.mesh"[..]]);
    }

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul(b"bone\0\0\0"), b"bone");
        assert_eq!(trim_nul(b"full"), b"full");
    }
}
