/// Longest line kept; anything longer is line noise (usually a baud-rate mismatch)
pub const MAX_LINE_BYTES: usize = 4096;

/// Reassembles newline-terminated lines from arbitrarily chunked reads.
///
/// Bytes after the last `\n` are held back and prefixed onto the next chunk, so a
/// line split across reads comes out identical to one delivered whole. Decoding to
/// text happens per complete line, which keeps multi-byte UTF-8 sequences intact
/// even when a read boundary falls inside one.
///
/// A line longer than the limit is discarded whole: its buffered bytes are
/// dropped as soon as the limit is crossed and the rest is skipped up to the
/// next terminator.
#[derive(Debug)]
pub struct LineFramer {
    partial: Vec<u8>,
    max_line: usize,
    overflowed: bool,
    discarded: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(max_line: usize) -> Self {
        Self {
            partial: Vec::with_capacity(256),
            max_line,
            overflowed: false,
            discarded: 0,
        }
    }

    /// Append a chunk and return every line it completed, trailing whitespace trimmed.
    /// Empty lines are returned as empty strings.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let segment = &rest[..pos];
            if !self.overflowed && self.partial.len() + segment.len() > self.max_line {
                self.discarded += 1;
            } else if !self.overflowed {
                self.partial.extend_from_slice(segment);
                lines.push(String::from_utf8_lossy(&self.partial).trim_end().to_string());
            }
            self.partial.clear();
            self.overflowed = false;
            rest = &rest[pos + 1..];
        }

        if !self.overflowed {
            if self.partial.len() + rest.len() > self.max_line {
                self.partial.clear();
                self.overflowed = true;
                self.discarded += 1;
            } else {
                self.partial.extend_from_slice(rest);
            }
        }

        lines
    }

    /// Bytes received since the last terminator
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }

    /// Number of over-long lines dropped since the last call
    pub fn take_discarded(&mut self) -> usize {
        std::mem::take(&mut self.discarded)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"AT\r\nOK\r\n");
        assert_eq!(lines, vec!["AT", "OK"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_lines_split() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"+CS").is_empty());
        assert!(framer.push(b"Q: 21,").is_empty());
        assert_eq!(framer.pending(), b"+CSQ: 21,");

        let lines = framer.push(b"99\r\nOK");
        assert_eq!(lines, vec!["+CSQ: 21,99"]);
        assert_eq!(framer.pending(), b"OK");
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"\r\n\nOK\n");
        assert_eq!(lines, vec!["", "", "OK"]);
    }

    #[test]
    fn test_only_trailing_whitespace_is_trimmed() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"  +CGPSINFO: ,,,, \t\r\n");
        assert_eq!(lines, vec!["  +CGPSINFO: ,,,,"]);
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let bytes = "temp 21\u{b0}C\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC2).unwrap() + 1;

        let mut framer = LineFramer::new();
        assert!(framer.push(&bytes[..split]).is_empty());
        assert_eq!(framer.push(&bytes[split..]), vec!["temp 21\u{b0}C"]);
    }

    #[test]
    fn test_overlong_line_is_dropped_without_buffering() {
        let mut framer = LineFramer::with_limit(8);
        assert!(framer.push(b"garbage-garbage").is_empty());
        assert!(framer.pending().is_empty());
        assert_eq!(framer.take_discarded(), 1);

        // The tail of the noisy line is skipped; the next line comes through
        assert!(framer.push(b"more noise").is_empty());
        assert!(framer.pending().is_empty());
        assert_eq!(framer.push(b"\r\nOK\r\n"), vec!["OK"]);
        assert_eq!(framer.take_discarded(), 0);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let mut framer = LineFramer::with_limit(4);
        assert_eq!(framer.push(b"+CSQ\n+CSQ:\nOK\n"), vec!["+CSQ", "OK"]);
        assert_eq!(framer.take_discarded(), 1);
    }

    proptest! {
        #[test]
        fn prop_framing_is_split_invariant(
            data in proptest::collection::vec(
                prop_oneof![Just(b'\n'), Just(b'\r'), Just(b' '), any::<u8>()],
                0..512,
            ),
            cuts in proptest::collection::vec(any::<usize>(), 0..16),
            limit in prop_oneof![Just(MAX_LINE_BYTES), 1usize..64],
        ) {
            let mut whole = LineFramer::with_limit(limit);
            let expected = whole.push(&data);

            let mut points: Vec<usize> = cuts
                .iter()
                .map(|c| if data.is_empty() { 0 } else { c % (data.len() + 1) })
                .collect();
            points.sort_unstable();

            let mut chunked = LineFramer::with_limit(limit);
            let mut actual = Vec::new();
            let mut start = 0;
            for point in points {
                actual.extend(chunked.push(&data[start..point]));
                start = point;
            }
            actual.extend(chunked.push(&data[start..]));

            prop_assert_eq!(actual, expected);
            prop_assert_eq!(chunked.pending(), whole.pending());
            prop_assert_eq!(chunked.take_discarded(), whole.take_discarded());
        }
    }
}
