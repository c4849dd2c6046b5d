use proptest::prelude::*;
use std::path::{Component, Path};
use std::time::{Duration, Instant};
use warden_core::TaskDefinition;
use warden_security::capabilities::normalize_path;
use warden_security::{CapabilityRegistry, RateLimitConfig, RateLimiter};

fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9_]{1,8}".prop_map(|s| s.to_string()),
        Just(".".to_string()),
        Just("..".to_string()),
    ]
}

fn arb_absolute_path() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_segment(), 0..8).prop_map(|parts| format!("/{}", parts.join("/")))
}

proptest! {
    #[test]
    fn test_normalized_paths_are_clean(path in arb_absolute_path()) {
        let cleaned = normalize_path(&path);
        prop_assert!(cleaned.is_absolute());
        prop_assert!(cleaned
            .components()
            .all(|c| matches!(c, Component::RootDir | Component::Normal(_))));
    }

    #[test]
    fn test_path_decision_follows_cleaned_path(path in arb_absolute_path()) {
        let registry = CapabilityRegistry::new(
            &[],
            &["/etc".to_string()],
            Vec::<TaskDefinition>::new(),
        );
        let inside = normalize_path(&path).starts_with(Path::new("/etc"));
        prop_assert_eq!(registry.is_path_allowed(&path), inside);
    }

    #[test]
    fn test_window_never_exceeds_capacity(
        capacity in 1usize..8,
        gaps in prop::collection::vec(0u64..400, 1..60),
    ) {
        let limiter = RateLimiter::new(RateLimitConfig {
            capacity,
            window: Duration::from_secs(1),
        });
        let start = Instant::now();
        let mut offset = 0;
        let mut admitted: Vec<u64> = Vec::new();

        for gap in gaps {
            offset += gap;
            if limiter.allow_at("client", start + Duration::from_millis(offset)) {
                admitted.push(offset);
            }
        }

        for (i, t) in admitted.iter().enumerate() {
            let in_window = admitted[i..].iter().filter(|u| **u < t + 1000).count();
            prop_assert!(in_window <= capacity);
        }
    }
}
