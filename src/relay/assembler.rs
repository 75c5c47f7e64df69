use super::Fragment;
use crate::history::ChatMessage;
use std::collections::HashMap;

/// A reply whose terminal fragment has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMessage {
    pub chat_id: String,
    pub completion_id: String,
    pub message: ChatMessage,
}

#[derive(Debug)]
struct AssemblyRecord {
    chat_id: String,
    role: String,
    content: String,
    created: String,
}

/// In-flight replies keyed by completion id.
///
/// Owned by a single consumer, so it carries no locking. A record whose
/// terminal fragment never arrives stays here until the assembler is dropped.
#[derive(Debug, Default)]
pub struct Assembler {
    in_flight: HashMap<String, AssemblyRecord>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one fragment into its record. Returns the finished message when
    /// the fragment is terminal.
    pub fn push(&mut self, chat_id: String, fragment: Fragment) -> Option<CompletedMessage> {
        let terminal = fragment.is_terminal();
        let Fragment {
            completion_id,
            role,
            content,
            created,
            ..
        } = fragment;

        let record = self
            .in_flight
            .entry(completion_id.clone())
            .or_insert_with(|| AssemblyRecord {
                chat_id,
                role: String::new(),
                content: String::new(),
                created: String::new(),
            });

        if let Some(content) = content {
            record.content.push_str(&content);
        }
        if let Some(role) = role.filter(|r| !r.is_empty()) {
            record.role = role;
        }
        // last fragment's timestamp wins
        record.created = created;

        if !terminal {
            return None;
        }

        let record = self.in_flight.remove(&completion_id)?;
        Some(CompletedMessage {
            chat_id: record.chat_id,
            completion_id,
            message: ChatMessage {
                role: record.role,
                content: record.content,
                created: record.created,
            },
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_assembling(&self, completion_id: &str) -> bool {
        self.in_flight.contains_key(completion_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_fragments_make_one_message() {
        let mut assembler = Assembler::new();

        let first = Fragment::new("c1", "t1")
            .with_role("assistant")
            .with_content("Hel");
        assert!(assembler.push("chat-1".into(), first).is_none());
        assert!(assembler.is_assembling("c1"));

        let last = Fragment::new("c1", "t2")
            .with_content("lo")
            .with_finish_reason("stop");
        let completed = assembler.push("chat-1".into(), last).unwrap();

        assert_eq!(
            completed,
            CompletedMessage {
                chat_id: "chat-1".into(),
                completion_id: "c1".into(),
                message: ChatMessage::assistant("Hello", "t2"),
            }
        );
        assert_eq!(assembler.in_flight(), 0);
    }

    #[test]
    fn test_interleaved_completions_stay_separate() {
        let mut assembler = Assembler::new();

        assembler.push(
            "chat-1".into(),
            Fragment::new("c1", "1").with_role("assistant").with_content("one"),
        );
        assembler.push(
            "chat-2".into(),
            Fragment::new("c2", "1").with_role("assistant").with_content("two"),
        );

        let c1 = assembler
            .push(
                "chat-1".into(),
                Fragment::new("c1", "2").with_content("!").with_finish_reason("stop"),
            )
            .unwrap();
        let c2 = assembler
            .push(
                "chat-2".into(),
                Fragment::new("c2", "3").with_content("?").with_finish_reason("length"),
            )
            .unwrap();

        assert_eq!(c1.chat_id, "chat-1");
        assert_eq!(c1.message.content, "one!");
        assert_eq!(c2.chat_id, "chat-2");
        assert_eq!(c2.message.content, "two?");
        assert_eq!(c2.message.created, "3");
    }

    #[test]
    fn test_missing_terminal_keeps_record_in_flight() {
        let mut assembler = Assembler::new();

        for token in ["a", "b", "c"] {
            let done = assembler.push("chat-1".into(), Fragment::new("c1", "1").with_content(token));
            assert!(done.is_none());
        }

        assert_eq!(assembler.in_flight(), 1);
    }

    #[test]
    fn test_lone_terminal_fragment_flushes_immediately() {
        let mut assembler = Assembler::new();

        let completed = assembler
            .push(
                "chat-1".into(),
                Fragment::new("c9", "7").with_finish_reason("stop"),
            )
            .unwrap();

        assert_eq!(completed.message, ChatMessage::new("", "", "7"));
        assert_eq!(assembler.in_flight(), 0);
    }

    #[test]
    fn test_empty_role_does_not_overwrite() {
        let mut assembler = Assembler::new();

        assembler.push("chat-1".into(), Fragment::new("c1", "1").with_role("assistant"));
        let completed = assembler
            .push(
                "chat-1".into(),
                Fragment::new("c1", "2")
                    .with_role("")
                    .with_content("ok")
                    .with_finish_reason("stop"),
            )
            .unwrap();

        assert_eq!(completed.message.role, "assistant");
    }

    #[test]
    fn test_chat_id_comes_from_first_fragment() {
        let mut assembler = Assembler::new();

        assembler.push("chat-1".into(), Fragment::new("c1", "1").with_content("x"));
        let completed = assembler
            .push(
                "chat-other".into(),
                Fragment::new("c1", "2").with_finish_reason("stop"),
            )
            .unwrap();

        assert_eq!(completed.chat_id, "chat-1");
    }
}
