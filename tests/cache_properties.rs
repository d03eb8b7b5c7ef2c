// tests/cache_properties.rs

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use podexec::ExpiringCache;

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u32),
    Get(u8),
    Remove(u8),
}

// A small key space so operations actually collide.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8u8, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0..8u8).prop_map(Op::Get),
        (0..8u8).prop_map(Op::Remove),
    ]
}

proptest! {
    // With TTLs far longer than the test, the cache must behave like a map.
    #[test]
    fn test_cache_matches_hashmap_model(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let cache = ExpiringCache::new(Duration::from_secs(3600), Duration::from_secs(3600));
        let mut model: HashMap<String, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    let key = format!("key-{k}");
                    cache.set(key.clone(), v, Duration::from_secs(3600));
                    model.insert(key, v);
                }
                Op::Get(k) => {
                    let key = format!("key-{k}");
                    prop_assert_eq!(cache.get::<u32>(&key), model.get(&key).copied());
                }
                Op::Remove(k) => {
                    let key = format!("key-{k}");
                    prop_assert_eq!(cache.remove(&key), model.remove(&key).is_some());
                }
            }
        }

        prop_assert_eq!(cache.len(), model.len());
    }

    #[test]
    fn test_wrong_type_is_always_a_miss(key in "[a-z]{1,12}", value in any::<u64>()) {
        let cache = ExpiringCache::new(Duration::from_secs(3600), Duration::from_secs(3600));
        cache.set(key.clone(), value, Duration::from_secs(3600));

        prop_assert_eq!(cache.get::<u32>(&key), None);
        prop_assert_eq!(cache.get::<String>(&key), None);
        prop_assert_eq!(cache.get::<u64>(&key), Some(value));
    }

    #[test]
    fn test_expired_entry_behaves_like_missing(key in "[a-z]{1,12}", value in any::<i64>()) {
        let cache = ExpiringCache::new(Duration::from_secs(3600), Duration::from_secs(3600));
        cache.set(key.clone(), value, Duration::ZERO);

        prop_assert_eq!(cache.get::<i64>(&key), cache.get::<i64>("never-written"));
        prop_assert!(!cache.remove(&key));
        prop_assert!(cache.is_empty());
    }
}
