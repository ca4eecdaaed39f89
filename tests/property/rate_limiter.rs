//! Property tests for the token bucket.
//!
//! Invariants tested:
//! - A fresh bucket admits exactly its quota within one window
//! - Admissions never exceed the quota regardless of request count
//! - Disabled policies admit everything

use httpshield_ratelimiter::{Per, RateLimiterConfig, RateLimiterStore, Strategy};
use proptest::prelude::*;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Whatever the quota and the offered load, a fresh per-hour bucket
    /// admits exactly min(load, quota) before refill matters.
    #[test]
    fn admissions_equal_the_quota(
        quota in 1_u32..=50,
        offered in 1_usize..=150,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = RateLimiterStore::new();
            let config = RateLimiterConfig::builder()
                .requests(quota)
                .per(Per::Hour)
                .strategy(Strategy::Error)
                .name("property")
                .build();

            let mut admitted = 0_usize;
            for _ in 0..offered {
                if store.consume("k", &config).await.is_ok() {
                    admitted += 1;
                }
            }

            assert_eq!(admitted, offered.min(quota as usize));
        });
    }

    /// A zero quota admits nothing.
    #[test]
    fn zero_quota_admits_nothing(offered in 1_usize..=20) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = RateLimiterStore::new();
            let config = RateLimiterConfig::builder()
                .requests(0)
                .strategy(Strategy::Error)
                .name("property")
                .build();

            for _ in 0..offered {
                assert!(store.consume("k", &config).await.is_err());
            }
        });
    }

    /// A disabled policy admits everything and creates no buckets.
    #[test]
    fn disabled_policies_admit_everything(offered in 1_usize..=50) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = RateLimiterStore::new();
            let config = RateLimiterConfig::builder()
                .enabled(false)
                .requests(1)
                .strategy(Strategy::Error)
                .name("property")
                .build();

            for _ in 0..offered {
                assert!(store.consume("k", &config).await.is_ok());
            }
            assert!(store.is_empty());
        });
    }

    /// Keys never interfere: distributing load over distinct keys admits
    /// the per-key quota for each.
    #[test]
    fn keys_are_independent(quota in 1_u32..=10, keys in 1_usize..=8) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let store = RateLimiterStore::new();
            let config = RateLimiterConfig::builder()
                .requests(quota)
                .per(Per::Hour)
                .strategy(Strategy::Error)
                .name("property")
                .build();

            for key_index in 0..keys {
                let key = format!("key-{key_index}");
                let mut admitted = 0;
                for _ in 0..quota + 5 {
                    if store.consume(&key, &config).await.is_ok() {
                        admitted += 1;
                    }
                }
                assert_eq!(admitted, quota);
            }
        });
    }
}
