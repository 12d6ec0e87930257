//! Sentence-level text splitting, used to chunk persona text into
//! individually embeddable long-term memories.

/// Split text into sentences using `.`, `!`, `?`, `;` as delimiters, with
/// blank lines treated as hard paragraph breaks.
///
/// Within a paragraph, whitespace is normalised (runs collapse to a single
/// space) and the text is cut after each terminator that is followed by
/// whitespace. Empty chunks are dropped.
pub struct SentenceSplitter;

impl SentenceSplitter {
    pub fn split(text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for paragraph in Self::paragraphs(text) {
            Self::split_sentences(&paragraph, &mut chunks);
        }
        chunks
    }

    /// Group lines into paragraphs separated by blank (whitespace-only) lines.
    fn paragraphs(text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }
        paragraphs
    }

    fn split_sentences(paragraph: &str, out: &mut Vec<String>) {
        let normalized = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return;
        }

        let mut current = String::new();
        let mut chars = normalized.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if matches!(c, '.' | '!' | '?' | ';') && chars.peek() == Some(&' ') {
                chars.next(); // consume the separator space
                let chunk = current.trim().to_string();
                if !chunk.is_empty() {
                    out.push(chunk);
                }
                current.clear();
            }
        }

        let tail = current.trim().to_string();
        if !tail.is_empty() {
            out.push(tail);
        }
    }
}
