/// Byte accumulator that splits a response body into frames.
///
/// SSE frames end at a blank line; NDJSON frames end at a newline. Partial
/// frames stay buffered until the rest of the bytes arrive, so a multi-byte
/// character split across chunks is never decoded in halves.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete `\n\n`- (or `\r\n\r\n`-) terminated event block.
    pub fn next_event_block(&mut self) -> Option<String> {
        let (end, sep_len) = find_event_boundary(&self.buffer)?;
        let block: Vec<u8> = self.buffer.drain(..end + sep_len).take(end).collect();
        Some(String::from_utf8_lossy(&block).into_owned())
    }

    /// Next complete newline-terminated line, without the terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).take(end).collect();
        let line = String::from_utf8_lossy(&line);
        Some(line.trim_end_matches('\r').to_string())
    }

    /// Whatever is left once the body has ended.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let trimmed = rest.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Payloads of the `data:` lines in one event block.
pub fn parse_data_lines(block: &str) -> Vec<&str> {
    block
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .collect()
}

/// Whether the block carries the `[DONE]` terminator.
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_event_blocks_across_chunks() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"data: {\"a\":1}\n");
        assert!(buffer.next_event_block().is_none());
        buffer.push_chunk(b"\ndata: {\"b\":2}\n\n");

        assert_eq!(buffer.next_event_block().unwrap(), "data: {\"a\":1}");
        assert_eq!(buffer.next_event_block().unwrap(), "data: {\"b\":2}");
        assert!(buffer.next_event_block().is_none());
    }

    #[test]
    fn handles_crlf_boundaries() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"data: one\r\n\r\ndata: two\r\n\r\n");
        let first = buffer.next_event_block().unwrap();
        assert_eq!(parse_data_lines(&first), vec!["one"]);
        let second = buffer.next_event_block().unwrap();
        assert_eq!(parse_data_lines(&second), vec!["two"]);
    }

    #[test]
    fn keeps_split_utf8_intact() {
        let bytes = "data: héllo\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(&bytes[..split]);
        buffer.push_chunk(&bytes[split..]);
        let block = buffer.next_event_block().unwrap();
        assert_eq!(parse_data_lines(&block), vec!["héllo"]);
    }

    #[test]
    fn lines_and_remainder() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"{\"x\":1}\r\n{\"y\"");
        assert_eq!(buffer.next_line().unwrap(), "{\"x\":1}");
        assert!(buffer.next_line().is_none());
        buffer.push_chunk(b":2}");
        assert_eq!(buffer.take_remainder().unwrap(), "{\"y\":2}");
        assert!(buffer.take_remainder().is_none());
    }

    #[test]
    fn ignores_comments_and_event_names() {
        let block = ": keepalive\nevent: message\ndata: payload";
        assert_eq!(parse_data_lines(block), vec!["payload"]);
        assert!(is_done_marker("[DONE]"));
    }
}
