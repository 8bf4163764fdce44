use std::{borrow::Cow, ops::Range};

/// Source text split into one chunk per byte offset of the original text.
///
/// Edits are addressed by original offsets: replacing a range writes the new text into
/// the chunk at its start and blanks the others, so an outer edit reading its range
/// sees every edit applied inside it before.
#[derive(Debug)]
pub struct EditBuffer<'a> {
    chunks: Vec<Cow<'a, str>>,
}

impl<'a> EditBuffer<'a> {
    pub fn new(text: &'a str) -> EditBuffer<'a> {
        let mut chunks = vec![Cow::Borrowed(""); text.len()];
        for (i, c) in text.char_indices() {
            chunks[i] = Cow::Borrowed(&text[i..i + c.len_utf8()]);
        }

        EditBuffer { chunks }
    }

    /// Current text of the range, including earlier edits.
    pub fn source(&self, range: Range<usize>) -> String {
        self.chunks[self.clamp(range)].concat()
    }

    pub fn replace(&mut self, range: Range<usize>, text: String) {
        let range = self.clamp(range);
        if range.is_empty() {
            return;
        }

        self.chunks[range.start] = Cow::Owned(text);
        for chunk in &mut self.chunks[range.start + 1..range.end] {
            *chunk = Cow::Borrowed("");
        }
    }

    pub fn finish(self) -> String {
        self.chunks.concat()
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.chunks.len());
        range.start.min(end)..end
    }
}
