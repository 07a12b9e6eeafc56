//! Cache key naming
//!
//! Assets pulled out of a graph are stored under a derived key,
//! `"i_" + lowercase-hex(FNV-1a-64(file name))`. Inside the serialized graph
//! the image is renamed to `"<key>.osgearth_cachebin"` so the read side can
//! route it back to the cache bin.

/// Prefix marking a derived asset key
pub const IMAGE_PREFIX: &str = "i_";

/// Extension routing a reference to the cache bin reader
pub const CACHE_BIN_EXTENSION: &str = "osgearth_cachebin";

/// FNV-1a 64-bit hash of a string
pub fn hash_string(s: &str) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Derived cache key for an image identifier
pub fn image_cache_key(file_name: &str) -> String {
    format!("{}{:x}", IMAGE_PREFIX, hash_string(file_name))
}

/// Rewritten identifier pointing at a cache key
pub fn cache_reference(key: &str) -> String {
    format!("{}.{}", key, CACHE_BIN_EXTENSION)
}

/// Whether an identifier has already been rewritten to a cache key
#[inline]
pub fn is_cache_key(file_name: &str) -> bool {
    file_name.starts_with(IMAGE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(hash_string(""), 0xcbf29ce484222325);
        assert_eq!(hash_string("a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_key_shape() {
        let key = image_cache_key("/data/tex.png");
        assert!(key.starts_with("i_"));
        assert!(key[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key, image_cache_key("/data/tex.png"));
        assert_ne!(key, image_cache_key("/data/tex2.png"));

        assert_eq!(cache_reference(&key), format!("{}.osgearth_cachebin", key));
        assert!(is_cache_key(&cache_reference(&key)));
        assert!(!is_cache_key("/data/tex.png"));
    }
}
