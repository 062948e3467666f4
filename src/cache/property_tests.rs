//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the keying and index invariants over generated URLs.

use proptest::prelude::*;
use std::path::Path;

use crate::cache::codec::{derive_key, host_bucket, is_cacheable, normalize_for_key, resolve_path};
use crate::cache::QueryPolicy;
use crate::index::{CacheIndex, MemoryIndex};

// == Strategies ==
/// Hosts made of lowercase labels
fn host_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9]{0,10}", 1..4).prop_map(|labels| labels.join("."))
}

/// Absolute URL paths, possibly with an extension
fn path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[A-Za-z0-9_-]{1,12}", 0..4),
        prop::option::of(prop_oneof![
            Just("png".to_string()),
            Just("JPG".to_string()),
            Just("gif".to_string()),
            Just("webp".to_string()),
            "[a-z]{1,4}",
        ]),
    )
        .prop_map(|(segments, ext)| {
            let mut path = format!("/{}", segments.join("/"));
            if let Some(ext) = ext {
                path.push('.');
                path.push_str(&ext);
            }
            path
        })
}

/// Query parameter pairs with distinct names
fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-z]{1,6}", "[A-Za-z0-9]{0,8}", 0..5)
        .prop_map(|map| map.into_iter().collect())
}

fn build_url(scheme: &str, host: &str, path: &str, params: &[(String, String)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    if query.is_empty() {
        format!("{scheme}://{host}{path}")
    } else {
        format!("{scheme}://{host}{path}?{query}")
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // URLs that differ only in excluded parameters share one canonical form and key.
    #[test]
    fn prop_excluded_params_do_not_change_key(
        host in host_strategy(),
        path in path_strategy(),
        kept in params_strategy(),
        noise in "[A-Za-z0-9]{1,8}",
    ) {
        let names: Vec<String> = kept.iter().map(|(k, _)| k.clone()).collect();
        let policy = QueryPolicy::Only(names);

        let mut with_noise = kept.clone();
        with_noise.push(("zz_tracking".to_string(), noise));

        let a = normalize_for_key(&build_url("https", &host, &path, &kept), &policy).unwrap();
        let b = normalize_for_key(&build_url("https", &host, &path, &with_noise), &policy).unwrap();

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(derive_key(&a).unwrap(), derive_key(&b).unwrap());
    }

    // Keys are a pure function of the (url, policy) pair.
    #[test]
    fn prop_key_is_deterministic(
        host in host_strategy(),
        path in path_strategy(),
        params in params_strategy(),
        keep_all in any::<bool>(),
    ) {
        let url = build_url("http", &host, &path, &params);
        let policy = QueryPolicy::Flag(keep_all);

        let first = normalize_for_key(&url, &policy).unwrap();
        let second = normalize_for_key(&url, &policy).unwrap();
        prop_assert_eq!(&first, &second);

        let root = Path::new("/cache");
        prop_assert_eq!(
            resolve_path(&first, root).unwrap(),
            resolve_path(&second, root).unwrap()
        );
    }

    // Canonicalizing a canonical URL changes nothing.
    #[test]
    fn prop_normalization_is_idempotent(
        host in host_strategy(),
        path in path_strategy(),
        params in params_strategy(),
        keep_all in any::<bool>(),
    ) {
        let policy = QueryPolicy::Flag(keep_all);
        let once = normalize_for_key(&build_url("https", &host, &path, &params), &policy).unwrap();
        let twice = normalize_for_key(&once, &policy).unwrap();
        prop_assert_eq!(once, twice);
    }

    // File names are fixed-length hex plus an allow-listed extension.
    #[test]
    fn prop_key_is_filesystem_safe(
        host in host_strategy(),
        path in path_strategy(),
        params in params_strategy(),
    ) {
        let url = build_url("https", &host, &path, &params);
        let key = derive_key(&url).unwrap();

        prop_assert_eq!(key.digest().len(), 64);
        prop_assert!(key.digest().chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert!(crate::cache::codec::IMAGE_TYPES.contains(&key.extension()));

        let bucket = host_bucket(&url).unwrap();
        prop_assert!(bucket.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    // Only http(s) URLs are cacheable.
    #[test]
    fn prop_other_schemes_not_cacheable(
        scheme in "(ftp|file|data|ws|gopher|s3)",
        host in host_strategy(),
        path in path_strategy(),
    ) {
        let url = format!("{scheme}://{host}{path}");
        prop_assert!(!is_cacheable(&url));
        prop_assert!(normalize_for_key(&url, &QueryPolicy::all()).is_err());
    }

    // Strings without a scheme separator are never cacheable.
    #[test]
    fn prop_bare_strings_not_cacheable(raw in "[^:]{0,40}") {
        prop_assert!(!is_cacheable(&raw));
    }
}

// Fewer cases: each one drives an async index
proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    // The last set for a key wins and remove always leaves it absent.
    #[test]
    fn prop_index_set_get_remove(
        ops in prop::collection::vec(("[a-c]", "[a-z]{1,6}/[a-z]{1,6}\\.jpg", any::<bool>()), 1..30),
    ) {
        tokio_test::block_on(async {
            let index = MemoryIndex::new();
            let mut model = std::collections::HashMap::new();

            for (key, value, remove) in ops {
                if remove {
                    index.remove(&key).await.unwrap();
                    model.remove(&key);
                } else {
                    index.set(&key, &value, 300).await.unwrap();
                    model.insert(key, value);
                }
            }

            for key in ["a", "b", "c"] {
                assert_eq!(index.get(key).await.unwrap(), model.get(key).cloned());
            }
        });
    }
}
