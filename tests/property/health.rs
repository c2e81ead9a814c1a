//! Health scoring stays within bounds and always reacts to loss phrases.

use ctxsync::config::EngineConfig;
use ctxsync::health::ACTION_FULL_RECOVERY;
use ctxsync::Engine;
use proptest::prelude::*;

#[test]
fn test_health_score_is_bounded_for_any_input() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<String>(), |input| {
            let result = engine.check_health(Some(&input));
            prop_assert!((0.0..=1.0).contains(&result.score));
            prop_assert_eq!(result.indicators.is_empty(), result.score == 1.0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_loss_phrase_anywhere_forces_full_recovery() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    let keywords = engine.health().config().loss_keywords.clone();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &("[a-z ]{0,20}", 0..keywords.len(), "[a-z ]{0,20}", any::<bool>()),
            |(prefix, keyword, suffix, shout)| {
                let phrase = if shout {
                    keywords[keyword].to_uppercase()
                } else {
                    keywords[keyword].clone()
                };
                let input = format!("{}{}{}", prefix, phrase, suffix);

                let result = engine.check_health(Some(&input));
                prop_assert!(result.score <= 0.3);
                prop_assert!(result.needs_immediate_recovery());
                prop_assert!(result
                    .recovery_actions
                    .iter()
                    .any(|action| action == ACTION_FULL_RECOVERY));
                let expected = format!("User mentioned: {}", keywords[keyword]);
                prop_assert!(result.indicators.contains(&expected));
                Ok(())
            },
        )
        .unwrap();
}
