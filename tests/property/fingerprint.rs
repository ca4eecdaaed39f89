//! Property tests for request fingerprinting.
//!
//! Invariants tested:
//! - The hash is a pure function of (method, url, body)
//! - An absent body and an empty body hash identically
//! - Different inputs produce different hashes (no accidental collisions
//!   from the delimiter scheme)

use http::Method;
use httpshield_dedup::fingerprint;
use proptest::prelude::*;
use url::Url;

fn arb_method() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::GET),
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::DELETE),
        Just(Method::PATCH),
        Just(Method::HEAD),
        Just(Method::OPTIONS),
    ]
}

fn arb_url() -> impl Strategy<Value = Url> {
    ("[a-z]{1,12}", "[a-z0-9/]{0,24}").prop_map(|(host, path)| {
        Url::parse(&format!("https://{host}.example.com/{path}")).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hashing_is_pure(
        method in arb_method(),
        url in arb_url(),
        body in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
    ) {
        let a = fingerprint(&method, &url, body.as_deref());
        let b = fingerprint(&method, &url, body.as_deref());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn empty_and_absent_bodies_coincide(method in arb_method(), url in arb_url()) {
        prop_assert_eq!(
            fingerprint(&method, &url, None),
            fingerprint(&method, &url, Some(b""))
        );
    }

    #[test]
    fn bodies_change_the_hash(
        method in arb_method(),
        url in arb_url(),
        body in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        prop_assert_ne!(
            fingerprint(&method, &url, None),
            fingerprint(&method, &url, Some(&body))
        );
    }

    #[test]
    fn output_is_always_hex_sha256(
        method in arb_method(),
        url in arb_url(),
        body in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
    ) {
        let hash = fingerprint(&method, &url, body.as_deref());
        prop_assert_eq!(hash.len(), 64);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
