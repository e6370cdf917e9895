//! Frame Reassembly
//!
//! Accumulates the fragments of one connection into complete logical
//! messages. The assembler owns the connection's message buffer and enforces
//! the maximum message size; it performs no I/O.
//!
//! ## States
//!
//! ```text
//! Idle ──fragment──▶ Accumulating ──final──▶ Idle          (Complete)
//!                         │
//!                         └──over limit──▶ Rejecting ──final──▶ Idle
//!                            (SizeExceeded, once)   (fragments swallowed)
//! ```

use crate::protocol::wire::{Fragment, Message, MessageKind};

/// Outcome of feeding one fragment to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// More fragments are needed
    Continue,
    /// The final fragment arrived; the buffer has been cleared
    Complete(Message),
    /// The message grew past the limit; the buffer has been discarded
    SizeExceeded { size: usize, limit: usize },
}

/// Per-connection message buffer with a size limit.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: Vec<u8>,
    /// Kind declared by the first fragment of the in-flight message
    kind: Option<MessageKind>,
    max_size: usize,
    rejecting: bool,
}

impl MessageAssembler {
    pub fn new(max_size: usize) -> Self {
        MessageAssembler {
            buffer: Vec::new(),
            kind: None,
            max_size,
            rejecting: false,
        }
    }

    /// Append a fragment and report whether a message is complete.
    pub fn accumulate(&mut self, fragment: Fragment) -> Assembly {
        if self.rejecting {
            if fragment.is_final {
                self.rejecting = false;
            }
            return Assembly::Continue;
        }

        let kind = *self.kind.get_or_insert(fragment.kind);
        let size = self.buffer.len() + fragment.data.len();
        if size > self.max_size {
            self.discard();
            self.rejecting = !fragment.is_final;
            return Assembly::SizeExceeded {
                size,
                limit: self.max_size,
            };
        }

        self.buffer.extend_from_slice(&fragment.data);
        if !fragment.is_final {
            return Assembly::Continue;
        }

        self.kind = None;
        Assembly::Complete(Message {
            kind,
            data: std::mem::take(&mut self.buffer),
        })
    }

    /// Bytes buffered for the in-flight message
    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the in-flight message and release its memory
    pub fn discard(&mut self) {
        self.buffer = Vec::new();
        self.kind = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text_fragment(data: &str, is_final: bool) -> Fragment {
        Fragment::new(MessageKind::Text, data.as_bytes().to_vec(), is_final)
    }

    #[test]
    fn test_single_fragment_message() {
        let mut asm = MessageAssembler::new(1024);
        let result = asm.accumulate(Fragment::text("hello"));
        assert_eq!(result, Assembly::Complete(Message::text("hello")));
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut asm = MessageAssembler::new(1024);
        assert_eq!(asm.accumulate(text_fragment("get_", false)), Assembly::Continue);
        assert_eq!(asm.accumulate(text_fragment("dashboard", false)), Assembly::Continue);
        assert_eq!(asm.buffered(), 13);
        assert_eq!(
            asm.accumulate(text_fragment("_data", true)),
            Assembly::Complete(Message::text("get_dashboard_data"))
        );
    }

    #[test]
    fn test_kind_comes_from_first_fragment() {
        let mut asm = MessageAssembler::new(1024);
        asm.accumulate(Fragment::new(MessageKind::Binary, vec![1, 2], false));
        let result = asm.accumulate(Fragment::new(MessageKind::Text, vec![3], true));
        assert_eq!(result, Assembly::Complete(Message::binary(vec![1, 2, 3])));
    }

    #[test]
    fn test_buffer_cleared_between_messages() {
        let mut asm = MessageAssembler::new(1024);
        asm.accumulate(Fragment::text("first"));
        let result = asm.accumulate(Fragment::binary(vec![9]));
        assert_eq!(result, Assembly::Complete(Message::binary(vec![9])));
    }

    #[test]
    fn test_exactly_at_limit_is_accepted() {
        let mut asm = MessageAssembler::new(4);
        asm.accumulate(Fragment::new(MessageKind::Binary, vec![0; 2], false));
        let result = asm.accumulate(Fragment::new(MessageKind::Binary, vec![0; 2], true));
        assert!(matches!(result, Assembly::Complete(m) if m.len() == 4));
    }

    #[test]
    fn test_over_limit_reports_size_exceeded() {
        let mut asm = MessageAssembler::new(4);
        asm.accumulate(Fragment::new(MessageKind::Binary, vec![0; 3], false));
        let result = asm.accumulate(Fragment::new(MessageKind::Binary, vec![0; 3], false));
        assert_eq!(result, Assembly::SizeExceeded { size: 6, limit: 4 });
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_rejected_message_never_completes() {
        let mut asm = MessageAssembler::new(4);
        assert!(matches!(
            asm.accumulate(Fragment::new(MessageKind::Text, vec![b'a'; 5], false)),
            Assembly::SizeExceeded { .. }
        ));
        assert_eq!(asm.accumulate(text_fragment("b", false)), Assembly::Continue);
        assert_eq!(asm.accumulate(text_fragment("c", true)), Assembly::Continue);
        // The next message starts clean
        assert_eq!(
            asm.accumulate(Fragment::text("ok")),
            Assembly::Complete(Message::text("ok"))
        );
    }

    #[test]
    fn test_empty_message() {
        let mut asm = MessageAssembler::new(4);
        let result = asm.accumulate(Fragment::text(""));
        assert_eq!(result, Assembly::Complete(Message::text("")));
    }

    proptest! {
        #[test]
        fn prop_under_limit_yields_one_complete(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..16)
        ) {
            let total: usize = chunks.iter().map(Vec::len).sum();
            let mut asm = MessageAssembler::new(total.max(1));
            let expected: Vec<u8> = chunks.concat();
            let last = chunks.len() - 1;

            let mut completes = Vec::new();
            for (i, chunk) in chunks.into_iter().enumerate() {
                match asm.accumulate(Fragment::new(MessageKind::Binary, chunk, i == last)) {
                    Assembly::Complete(m) => completes.push(m),
                    Assembly::Continue => {}
                    Assembly::SizeExceeded { .. } => prop_assert!(false, "unexpected size violation"),
                }
            }
            prop_assert_eq!(completes.len(), 1);
            prop_assert_eq!(&completes[0].data, &expected);
        }

        #[test]
        fn prop_over_limit_exceeds_exactly_once(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 2..16)
        ) {
            let total: usize = chunks.iter().map(Vec::len).sum();
            let mut asm = MessageAssembler::new(total - 1);
            let last = chunks.len() - 1;

            let mut exceeded = 0;
            for (i, chunk) in chunks.into_iter().enumerate() {
                match asm.accumulate(Fragment::new(MessageKind::Binary, chunk, i == last)) {
                    Assembly::Complete(_) => prop_assert!(false, "oversized message completed"),
                    Assembly::SizeExceeded { .. } => exceeded += 1,
                    Assembly::Continue => {}
                }
            }
            prop_assert_eq!(exceeded, 1);
        }
    }
}
