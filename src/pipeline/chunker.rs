use tracing::debug;

/// One chunk of a source document. `start`/`end` are byte offsets into the
/// original text, so mention spans found inside a chunk can be mapped back.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Paragraph-bounded text chunker. Consecutive paragraphs are packed into
/// one chunk while they fit the size limit; a single oversized paragraph is
/// hard-split at character boundaries.
pub struct Chunker {
    max_chars: usize,
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (start, end) in paragraph_spans(text) {
            match current {
                Some((chunk_start, _)) if end - chunk_start <= self.max_chars => {
                    current = Some((chunk_start, end));
                }
                Some((chunk_start, chunk_end)) => {
                    self.push(&mut chunks, text, chunk_start, chunk_end);
                    current = Some((start, end));
                }
                None => current = Some((start, end)),
            }
        }
        if let Some((chunk_start, chunk_end)) = current {
            self.push(&mut chunks, text, chunk_start, chunk_end);
        }

        debug!("chunked {} bytes into {} chunks", text.len(), chunks.len());
        chunks
    }

    fn push(&self, chunks: &mut Vec<Chunk>, text: &str, start: usize, end: usize) {
        let mut cursor = start;
        while cursor < end {
            let mut split = (cursor + self.max_chars).min(end);
            while split > cursor && !text.is_char_boundary(split) {
                split -= 1;
            }
            if split == cursor {
                // Limit smaller than one character: take the character whole.
                split = text[cursor..]
                    .chars()
                    .next()
                    .map(|c| cursor + c.len_utf8())
                    .unwrap_or(end);
            }
            chunks.push(Chunk {
                index: chunks.len(),
                text: text[cursor..split].to_string(),
                start: cursor,
                end: split,
            });
            cursor = split;
        }
    }
}

/// Byte spans of the non-blank paragraphs of `text`, trailing whitespace
/// trimmed.
fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                spans.push((s, s + text[s..line_start].trim_end().len()));
            }
        } else if start.is_none() {
            start = Some(line_start);
        }
    }
    if let Some(s) = start {
        spans.push((s, s + text[s..].trim_end().len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_map_back_into_the_source_text() {
        let text = "First paragraph.\n\nSecond paragraph\nwith two lines.\n\n\nThird.";
        let chunks = Chunker::new(1200).chunk(text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn small_paragraphs_pack_into_one_chunk() {
        let text = "One.\n\nTwo.\n\nThree.";
        let chunks = Chunker::new(1200).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("One."));
        assert!(chunks[0].text.contains("Three."));
    }

    #[test]
    fn oversized_paragraph_is_hard_split_within_the_limit() {
        let text = "a".repeat(2500);
        let chunks = Chunker::new(1000).chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.len() <= 1000));
        assert_eq!(chunks.iter().map(|c| c.text.len()).sum::<usize>(), 2500);
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        let text = "é".repeat(100);
        let chunks = Chunker::new(3).chunk(&text);
        for chunk in &chunks {
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn blank_input_yields_no_chunks() {
        assert!(Chunker::new(100).chunk("").is_empty());
        assert!(Chunker::new(100).chunk("  \n\n  \n").is_empty());
    }
}
