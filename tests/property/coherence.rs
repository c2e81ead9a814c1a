//! Coherence is always the coherent fraction of tracked components.

use ctxsync::context::{ComponentStatus, ContextStore};
use proptest::prelude::*;

const STATUSES: [ComponentStatus; 6] = [
    ComponentStatus::Active,
    ComponentStatus::Processing,
    ComponentStatus::Connected,
    ComponentStatus::Monitoring,
    ComponentStatus::Ready,
    ComponentStatus::Idle,
];

#[test]
fn test_coherence_is_bounded_fraction() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec((0u8..16, 0usize..STATUSES.len()), 0..40),
            |updates| {
                let store = ContextStore::new();
                let mut latest = std::collections::HashMap::new();
                for (name, status) in &updates {
                    let name = format!("component-{}", name);
                    store.update_component(name.clone(), STATUSES[*status]);
                    latest.insert(name, STATUSES[*status]);
                }

                let coherence = store.coherence();
                prop_assert!((0.0..=1.0).contains(&coherence));

                if latest.is_empty() {
                    prop_assert_eq!(coherence, 1.0);
                } else {
                    let coherent = latest.values().filter(|s| s.is_coherent()).count();
                    let expected = coherent as f64 / latest.len() as f64;
                    prop_assert!((coherence - expected).abs() < 1e-12);
                }

                let copy = store.snapshot();
                prop_assert_eq!(copy.coherence, coherence);
                prop_assert_eq!(copy.components.len(), latest.len());
                Ok(())
            },
        )
        .unwrap();
}
