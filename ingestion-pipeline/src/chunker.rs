use common::error::AppError;

/// One fixed-size window of extracted text. Offsets are byte positions into
/// the source so reconstruction is exact for multi-byte input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub ordinal: u32,
    pub text: String,
    pub start_byte: u64,
    pub end_byte: u64,
}

/// Splits text into overlapping character windows: chunk `i` starts at
/// character `i * (chunk_size - overlap)` and spans `chunk_size` characters,
/// the last window possibly shorter. Re-joining the windows with the overlap
/// removed reproduces the input exactly.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(AppError::InvalidConfiguration(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Ordered windows over `text`; empty input yields an empty sequence.
    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character, so windows slice on char
        // boundaries while spans report byte positions.
        let offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        let total_chars = offsets.len();
        let step = self.chunk_size - self.overlap;

        let mut spans = Vec::new();
        let mut start_char = 0usize;
        let mut ordinal = 0u32;

        while start_char < total_chars {
            let end_char = (start_char + self.chunk_size).min(total_chars);
            let start_byte = offsets[start_char];
            let end_byte = if end_char == total_chars {
                text.len()
            } else {
                offsets[end_char]
            };

            spans.push(ChunkSpan {
                ordinal,
                text: text[start_byte..end_byte].to_string(),
                start_byte: start_byte as u64,
                end_byte: end_byte as u64,
            });

            if end_char == total_chars {
                break;
            }
            start_char += step;
            ordinal += 1;
        }

        spans
    }

    /// Inverse of [`Chunker::chunk`]: the first window verbatim, every later
    /// window with its leading `overlap` characters dropped.
    pub fn reassemble(&self, spans: &[ChunkSpan]) -> String {
        let mut text = String::new();
        for (idx, span) in spans.iter().enumerate() {
            if idx == 0 {
                text.push_str(&span.text);
            } else {
                text.extend(span.text.chars().skip(self.overlap));
            }
        }
        text
    }
}
