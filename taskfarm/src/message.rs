use crate::transport::Tag;

/// Everything that travels between the coordinator and its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T, O> {
    /// Worker asking for its next assignment.
    Ready,
    Task(T),
    /// Sentinel, no more work. Each worker receives it exactly once.
    Stop,
    /// Output of the one task the worker was holding.
    Complete(O),
}

impl<T, O> Message<T, O> {
    pub fn tag(&self) -> Tag {
        match self {
            Message::Ready => Tag::Ready,
            Message::Task(_) | Message::Stop => Tag::Assignment,
            Message::Complete(_) => Tag::Result,
        }
    }
}
