use crate::types::{Message, Role};

/// Append-only, chronologically ordered conversation log owned by one client.
///
/// Messages are never reordered or deduplicated; the log only shrinks through
/// [`Conversation::reset`].
///
/// # Examples
///
/// ```
/// use llm_connectors::conversation::Conversation;
/// use llm_connectors::types::Message;
///
/// let mut conversation = Conversation::new();
/// conversation.append(Message::user("Hello"));
/// conversation.append(Message::assistant("Hi there"));
/// assert_eq!(conversation.history().len(), 2);
///
/// conversation.reset();
/// assert!(conversation.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Ordered view of every message appended so far.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages of a single role, in order.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |message| message.role == role)
    }
}
