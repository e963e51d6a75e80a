//! Line framing over raw serial chunks
//!
//! Serial reads return whatever bytes happen to be in the driver buffer, so a
//! line may arrive split across any number of chunks. [`LineFramer`] keeps the
//! unterminated tail between calls and only emits a line once its terminator
//! has been seen. The tail is never discarded except by [`LineFramer::reset`].

use crate::config::LineTerminator;

/// Reassembles terminator-delimited lines from byte chunks
#[derive(Debug, Clone)]
pub struct LineFramer {
    terminator: LineTerminator,
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create a framer for one session's terminator
    pub fn new(terminator: LineTerminator) -> Self {
        Self {
            terminator,
            pending: Vec::with_capacity(256),
        }
    }

    pub fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    /// Number of buffered bytes not yet part of a complete line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append a chunk and return every line it completes, terminators stripped
    ///
    /// Lines are decoded lossily; invalid UTF-8 becomes U+FFFD rather than
    /// dropping the line.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        tracing::trace!(chunk_len = chunk.len(), "Pushing chunk into LineFramer");
        self.pending.extend_from_slice(chunk);

        let term = self.terminator.as_bytes();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut search_from = 0;

        while let Some(pos) = find_subsequence(&self.pending[search_from..], term) {
            let end = search_from + pos;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + term.len();
            search_from = start;
        }

        if start > 0 {
            self.pending.drain(..start);
        }

        lines
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(
                discarded = self.pending.len(),
                "Discarding partial line fragment"
            );
        }
        self.pending.clear();
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    match needle {
        [b] => haystack.iter().position(|x| x == b),
        _ => haystack
            .windows(needle.len())
            .position(|window| window == needle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_line_split_across_chunks() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        assert!(framer.push_chunk(b"AB").is_empty());
        assert_eq!(framer.push_chunk(b"C\n"), vec!["ABC".to_string()]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_unterminated_chunk_is_retained() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        assert!(framer.push_chunk(b"temp:23").is_empty());
        assert_eq!(framer.pending_len(), 7);
    }

    #[test]
    fn test_multiple_lines_and_tail() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        let lines = framer.push_chunk(b"a:1\nb:2\nc:");
        assert_eq!(lines, vec!["a:1", "b:2"]);
        assert_eq!(framer.push_chunk(b"3\n"), vec!["c:3"]);
    }

    #[test]
    fn test_crlf_split_between_cr_and_lf() {
        let mut framer = LineFramer::new(LineTerminator::CrLf);
        assert!(framer.push_chunk(b"x:1\r").is_empty());
        assert_eq!(framer.push_chunk(b"\ny:2\r\n"), vec!["x:1", "y:2"]);
    }

    #[test]
    fn test_cr_terminator_ignores_lf() {
        let mut framer = LineFramer::new(LineTerminator::Cr);
        assert_eq!(framer.push_chunk(b"a\nb\r"), vec!["a\nb"]);
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        assert_eq!(framer.push_chunk(b"\n\n"), vec!["", ""]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        let lines = framer.push_chunk(b"v:\xff1\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("v:"));
    }

    #[test]
    fn test_reset_discards_fragment() {
        let mut framer = LineFramer::new(LineTerminator::Lf);
        framer.push_chunk(b"partial");
        framer.reset();
        assert_eq!(framer.pending_len(), 0);
        assert_eq!(framer.push_chunk(b"next\n"), vec!["next"]);
    }

    fn arb_terminator() -> impl Strategy<Value = LineTerminator> {
        prop_oneof![
            Just(LineTerminator::Lf),
            Just(LineTerminator::Cr),
            Just(LineTerminator::CrLf),
        ]
    }

    proptest! {
        #[test]
        fn test_chunking_does_not_change_lines(
            lines in prop::collection::vec("[a-z0-9: .]{0,12}", 0..20),
            cuts in prop::collection::vec(0usize..400, 0..10),
            terminator in arb_terminator(),
        ) {
            let term = terminator.as_bytes();
            let mut stream = Vec::new();
            for line in &lines {
                stream.extend_from_slice(line.as_bytes());
                stream.extend_from_slice(term);
            }

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(stream.len())).collect();
            cuts.sort_unstable();

            let mut framer = LineFramer::new(terminator);
            let mut framed = Vec::new();
            let mut last = 0;
            for cut in cuts {
                framed.extend(framer.push_chunk(&stream[last..cut]));
                last = cut;
            }
            framed.extend(framer.push_chunk(&stream[last..]));

            // Property: any chunking yields the same lines with nothing left over
            prop_assert_eq!(framed, lines);
            prop_assert_eq!(framer.pending_len(), 0);
        }
    }
}
