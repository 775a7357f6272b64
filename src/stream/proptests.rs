//! Property-based tests for the accumulator

use super::*;
use crate::conversation::{ContentBlock, Message, Role};
use proptest::prelude::*;

#[derive(Default)]
struct Recorder {
    fragments: Vec<String>,
    unknown: Vec<String>,
}

impl StreamObserver for Recorder {
    fn on_fragment(&mut self, fragment: &str) -> Result<(), BoxError> {
        self.fragments.push(fragment.to_string());
        Ok(())
    }

    fn on_unknown_event(&mut self, tag: &str) {
        self.unknown.push(tag.to_string());
    }
}

/// A delta or an unknown event to interleave
#[derive(Debug, Clone)]
enum Body {
    Delta(String),
    Unknown(String),
}

fn arb_body() -> impl Strategy<Value = Body> {
    prop_oneof![
        4 => "[a-zA-Z0-9 .,\n]{0,12}".prop_map(Body::Delta),
        1 => "[a-z_]{1,10}".prop_map(Body::Unknown),
    ]
}

proptest! {
    #[test]
    fn prop_text_is_concatenation_of_deltas(body in proptest::collection::vec(arb_body(), 0..30)) {
        let mut rec = Recorder::default();
        let mut acc = StreamAccumulator::new();
        acc.apply(StreamEvent::start(Role::Assistant), &mut rec).unwrap();

        let mut expected = String::new();
        let mut expected_fragments = Vec::new();
        let mut expected_unknown = Vec::new();
        for item in body {
            match item {
                Body::Delta(text) => {
                    expected.push_str(&text);
                    expected_fragments.push(text.clone());
                    acc.apply(StreamEvent::delta(text), &mut rec).unwrap();
                }
                Body::Unknown(tag) => {
                    expected_unknown.push(tag.clone());
                    acc.apply(StreamEvent::unknown(tag), &mut rec).unwrap();
                }
            }
        }
        acc.apply(StreamEvent::MessageStop, &mut rec).unwrap();

        let msg = acc.finish().unwrap();
        prop_assert_eq!(msg, Message::assistant(vec![ContentBlock::Text(expected)]));
        prop_assert_eq!(rec.fragments, expected_fragments);
        prop_assert_eq!(rec.unknown, expected_unknown);
    }

    #[test]
    fn prop_delta_without_start_never_produces_message(
        fragments in proptest::collection::vec("[a-z]{1,5}", 1..5),
    ) {
        let mut rec = Recorder::default();
        let mut acc = StreamAccumulator::new();
        let mut failed = false;
        for text in fragments {
            if acc.apply(StreamEvent::delta(text), &mut rec).is_err() {
                failed = true;
                break;
            }
        }
        prop_assert!(failed);
        prop_assert!(rec.fragments.is_empty());
    }
}
