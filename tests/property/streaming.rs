//! Streamed chunks always reassemble into the normalized response text.

use chrono::Utc;
use ctxsync::scheduler::{stream_chunks, Response};
use proptest::prelude::*;
use uuid::Uuid;

#[test]
fn test_chunks_cover_response_and_end_complete() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&"[a-zA-Z0-9 \t\n]{0,80}", |content| {
            let response = Response {
                id: Uuid::new_v4(),
                conversation_id: "default".to_string(),
                content: content.clone(),
                success: true,
                confidence: 0.85,
                timestamp: Utc::now(),
                processing_time_ms: 1,
            };
            let chunks = stream_chunks(&response);

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks.iter().filter(|c| c.is_complete).count(), 1);
            prop_assert!(chunks.last().map(|c| c.is_complete).unwrap_or(false));
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.response_id, response.id);
                prop_assert!((0.7..=1.0).contains(&chunk.coherence));
            }

            let streamed: String = chunks.iter().map(|c| c.content.as_str()).collect();
            let expected = content.split_whitespace().collect::<Vec<_>>().join(" ");
            prop_assert_eq!(streamed, expected);
            Ok(())
        })
        .unwrap();
}
