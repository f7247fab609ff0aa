use crate::storage::entities::TimeLog;

/// Modal prompt collecting an optional tag for a session that was stopped interactively.
///
/// `Idle -> AwaitingTag -> Idle`. While awaiting, the log's timestamps and duration are already
/// fixed, only the tag is still open. There is no way out of the prompt that drops the log.
#[derive(Debug, Default)]
pub enum TagCapture {
    #[default]
    Idle,
    AwaitingTag { pending: TimeLog, buffer: String },
}

impl TagCapture {
    pub fn begin(&mut self, pending: TimeLog) {
        *self = TagCapture::AwaitingTag {
            pending,
            buffer: String::new(),
        };
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, TagCapture::AwaitingTag { .. })
    }

    pub fn pending(&self) -> Option<&TimeLog> {
        match self {
            TagCapture::Idle => None,
            TagCapture::AwaitingTag { pending, .. } => Some(pending),
        }
    }

    pub fn buffer(&self) -> Option<&str> {
        match self {
            TagCapture::Idle => None,
            TagCapture::AwaitingTag { buffer, .. } => Some(buffer),
        }
    }

    /// Appends a printable character. Control characters are ignored.
    pub fn push(&mut self, c: char) {
        if let TagCapture::AwaitingTag { buffer, .. } = self {
            if !c.is_control() {
                buffer.push(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if let TagCapture::AwaitingTag { buffer, .. } = self {
            buffer.pop();
        }
    }

    /// Resolves the prompt with the typed tag.
    pub fn confirm(&mut self) -> Option<TimeLog> {
        match std::mem::take(self) {
            TagCapture::Idle => None,
            TagCapture::AwaitingTag { pending, buffer } => Some(pending.with_tag(buffer)),
        }
    }

    /// Resolves the prompt without a tag.
    pub fn skip(&mut self) -> Option<TimeLog> {
        match std::mem::take(self) {
            TagCapture::Idle => None,
            TagCapture::AwaitingTag { pending, .. } => Some(pending.with_tag(String::new())),
        }
    }
}
