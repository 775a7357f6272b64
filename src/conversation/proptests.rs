//! Property-based tests for the conversation model
//!
//! Arbitrary sequences of appends, valid or not, must never produce a
//! history that breaks alternation, and rejected appends must not mutate.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_image_format() -> impl Strategy<Value = ImageFormat> {
    prop_oneof![
        Just(ImageFormat::Jpeg),
        Just(ImageFormat::Png),
        Just(ImageFormat::Gif),
        Just(ImageFormat::Webp),
    ]
}

fn arb_image_source() -> impl Strategy<Value = ImageSource> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(ImageSource::Bytes),
        "https://[a-z]{3,10}\\.test/[a-z]{1,8}\\.png".prop_map(ImageSource::Reference),
    ]
}

fn arb_block() -> impl Strategy<Value = ContentBlock> {
    prop_oneof![
        3 => "[a-zA-Z0-9 ?.!]{0,40}".prop_map(ContentBlock::Text),
        1 => (arb_image_format(), arb_image_source())
            .prop_map(|(format, source)| ContentBlock::Image { format, source }),
    ]
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant)]
}

#[derive(Debug, Clone)]
enum Op {
    User(Vec<ContentBlock>),
    Assistant(Message),
    Discard,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::collection::vec(arb_block(), 0..4).prop_map(Op::User),
        4 => (arb_role(), proptest::collection::vec(arb_block(), 0..3))
            .prop_map(|(role, content)| Op::Assistant(Message::new(role, content))),
        1 => Just(Op::Discard),
    ]
}

fn assert_alternates(conv: &Conversation) {
    for (i, msg) in conv.history().iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(msg.role, expected, "turn {i} has the wrong role");
        assert!(!msg.content.is_empty(), "turn {i} has no content");
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_history_always_alternates(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut conv = Conversation::new();
        for op in ops {
            let before = conv.clone();
            let ok = match op {
                Op::User(blocks) => conv.append_user_turn(blocks).is_ok(),
                Op::Assistant(message) => conv.append_assistant_turn(message).is_ok(),
                Op::Discard => conv.discard_open_turn().is_some(),
            };
            if !ok {
                prop_assert_eq!(&conv, &before);
            }
            assert_alternates(&conv);
        }
    }

    #[test]
    fn prop_block_order_preserved(blocks in proptest::collection::vec(arb_block(), 1..8)) {
        let mut conv = Conversation::new();
        conv.append_user_turn(blocks.clone()).unwrap();
        prop_assert_eq!(&conv.history()[0].content, &blocks);
    }

    #[test]
    fn prop_second_user_turn_always_rejected(
        first in proptest::collection::vec(arb_block(), 1..4),
        second in proptest::collection::vec(arb_block(), 0..4),
    ) {
        let mut conv = Conversation::new();
        conv.append_user_turn(first).unwrap();
        let before = conv.clone();
        prop_assert_eq!(
            conv.append_user_turn(second).unwrap_err(),
            InvariantError::ConsecutiveUserTurn
        );
        prop_assert_eq!(conv, before);
    }
}
