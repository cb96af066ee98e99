//! Property tests for the queue document codec.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use scrapbook_core::codec::{parse, render, QueueDocument};
use scrapbook_core::{Importance, Minutes, NewQuestion, Question};

fn importance() -> impl Strategy<Value = Importance> {
    prop_oneof![
        Just(Importance::Low),
        Just(Importance::Medium),
        Just(Importance::High),
    ]
}

/// Titles the add path accepts, drawn from markup-heavy characters.
fn title() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 *#:,()\\[\\]?./'-]{1,32}".prop_filter_map("rejected title", |raw| {
        NewQuestion::new(raw).into_question().ok().map(|q| q.title)
    })
}

fn question(completed: bool) -> impl Strategy<Value = Question> {
    (
        title(),
        importance(),
        prop::option::of(1u64..600),
        prop::option::of(0i64..2_000_000),
        0u64..1000,
    )
        .prop_map(move |(title, importance, estimate, started, spent)| {
            let mut q = Question::new(title)
                .with_importance(importance)
                .with_estimate(Minutes(estimate.unwrap_or(0)))
                .with_time_spent(Minutes(spent));
            q.start_time = started.map(|m| {
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(m)
            });
            q.completed = completed;
            q
        })
}

fn doc() -> impl Strategy<Value = QueueDocument> {
    (
        prop::option::of(question(false)),
        prop::collection::vec(question(false), 0..6),
        prop::collection::vec(question(true), 0..6),
    )
        .prop_map(|(active, pending, completed)| QueueDocument {
            active,
            pending,
            completed,
        })
}

proptest! {
    #[test]
    fn test_render_then_parse_preserves_queue(doc in doc()) {
        let parsed = parse(&render(&doc));

        prop_assert_eq!(&parsed.active, &doc.active);
        prop_assert_eq!(&parsed.completed, &doc.completed);
        let expected: Vec<Question> = doc.sorted_pending().into_iter().cloned().collect();
        prop_assert_eq!(&parsed.pending, &expected);
    }

    #[test]
    fn test_render_is_stable(doc in doc()) {
        let once = render(&doc);
        let twice = render(&parse(&once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_never_panics(text in "(#|##|- \\[[ x]\\] |\\*\\*|[a-zA-Z:, ()\\n])*") {
        let _ = parse(&text);
    }
}
