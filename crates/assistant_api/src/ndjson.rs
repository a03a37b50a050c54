use serde_json::Value;

/// Incremental parser for newline-delimited JSON streams.
///
/// The network layer may split one logical line across any number of
/// delivery fragments, or pack several lines into one fragment. The parser
/// buffers whatever arrives and only emits complete lines, so no record is
/// ever emitted partially, duplicated, or out of order. A line that fails to
/// parse is dropped and counted; it never aborts the stream.
#[derive(Debug, Default)]
pub struct NdjsonStreamParser {
    buffer: String,
    dropped_lines: usize,
}

impl NdjsonStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete records.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut records = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 1);

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(value) => records.push(value),
                Err(_) => self.dropped_lines += 1,
            }
        }

        records
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_lines(input: &str) -> Vec<Value> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// Number of malformed lines dropped so far.
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    /// True when no unterminated partial line is pending.
    ///
    /// A residual partial line at end-of-stream is discarded by dropping the
    /// parser; it is never emitted.
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::NdjsonStreamParser;

    #[test]
    fn parses_lines_split_across_feeds() {
        let mut parser = NdjsonStreamParser::default();

        assert!(parser.feed(b"{\"type\":\"chunk\",\"cont").is_empty());
        let records = parser.feed(b"ent\":\"Hel\"}\n{\"type\":\"done\"}\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["content"], "Hel");
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn retains_trailing_partial_line() {
        let mut parser = NdjsonStreamParser::default();
        assert!(parser.feed(b"{\"type\":\"chunk\"").is_empty());
        assert!(!parser.is_empty_buffer());
    }
}
