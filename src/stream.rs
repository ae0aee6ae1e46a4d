//! Reassembly of raw byte chunks into complete text lines.
//!
//! Child output arrives in arbitrary chunks that can split lines and even
//! multi-byte characters. The assembler buffers bytes and only decodes
//! complete lines, so a UTF-8 sequence straddling a chunk boundary is never
//! decoded in halves.

/// Accumulator of undelivered trailing bytes between chunk feeds.
///
/// After `feed` returns, the internal buffer never holds a complete
/// newline-terminated line. Concatenating everything returned by `feed` (with
/// the consumed `\n` delimiters re-inserted) plus the final `flush` output
/// reproduces the original stream.
#[derive(Debug, Default)]
pub struct LineAssembler {
    held: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes, in order.
    /// Lines are returned without their trailing newline. An empty chunk is a
    /// no-op; a chunk with no newline just grows the held partial line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.held.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.held.iter().position(|&b| b == b'\n') {
            let rest = self.held.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.held, rest);
            line.pop(); // the delimiter
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Give up the held partial line, if any. Called at stream end.
    pub fn flush(&mut self) -> Option<String> {
        if self.held.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.held);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reconstruct the stream from feed/flush results for round-trip checks.
    fn reassemble(assembler: &mut LineAssembler, chunks: &[&[u8]]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            for line in assembler.feed(chunk) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        if let Some(tail) = assembler.flush() {
            out.push_str(&tail);
        }
        out
    }

    #[test]
    fn test_single_chunk_single_line() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.feed(b"hello\n"), vec!["hello".to_string()]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.feed(b"hel").is_empty());
        assert!(assembler.feed(b"lo wor").is_empty());
        assert_eq!(assembler.feed(b"ld\n"), vec!["hello world".to_string()]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut assembler = LineAssembler::new();
        assert_eq!(
            assembler.feed(b"one\ntwo\nthr"),
            vec!["one".to_string(), "two".to_string()]
        );
        assert_eq!(assembler.flush(), Some("thr".to_string()));
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut assembler = LineAssembler::new();
        assembler.feed(b"partial");
        assert!(assembler.feed(b"").is_empty());
        assert_eq!(assembler.flush(), Some("partial".to_string()));
    }

    #[test]
    fn test_flush_empty_buffer_is_none() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.flush(), None);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        // "héllo\n" with the two-byte 'é' (0xC3 0xA9) split between chunks
        let mut assembler = LineAssembler::new();
        assert!(assembler.feed(&[b'h', 0xC3]).is_empty());
        assert_eq!(assembler.feed(&[0xA9, b'l', b'l', b'o', b'\n']), vec![
            "héllo".to_string()
        ]);
    }

    #[test]
    fn test_carriage_returns_preserved() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.feed(b"dos line\r\n"), vec!["dos line\r".to_string()]);
    }

    #[test]
    fn test_blank_lines_preserved() {
        let mut assembler = LineAssembler::new();
        assert_eq!(
            assembler.feed(b"a\n\nb\n"),
            vec!["a".to_string(), String::new(), "b".to_string()]
        );
    }

    #[test]
    fn test_round_trip_at_every_split_point() {
        let original = "Step 1 done\nStep 2 ünïcode ✓\npartial tail";
        let bytes = original.as_bytes();
        for split in 0..=bytes.len() {
            let mut assembler = LineAssembler::new();
            let rebuilt = reassemble(&mut assembler, &[&bytes[..split], &bytes[split..]]);
            assert_eq!(rebuilt, original, "split at byte {split}");
        }
    }

    #[test]
    fn test_round_trip_byte_at_a_time() {
        let original = "αβγ\nδεζ\n";
        let mut assembler = LineAssembler::new();
        let chunks: Vec<&[u8]> = original.as_bytes().chunks(1).collect();
        assert_eq!(reassemble(&mut assembler, &chunks), original);
    }
}
