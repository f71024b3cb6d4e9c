//! Server-Sent Events decoding for streamed chat completions.
//!
//! The engine streams frames like
//! `data: {"choices":[{"delta":{"content":"hi"}}]}` separated by newlines
//! and ends with `data: [DONE]`.

use bytes::BytesMut;
use serde::Deserialize;

/// Terminal marker of a completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Something worth reporting from a decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Non-empty text carried by one delta.
    Delta(String),
    /// The `[DONE]` marker.
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Line assembler for an SSE byte stream.
///
/// Bytes after the last newline stay buffered until more input arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen. Input after it is ignored.
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Feed bytes and return the events of every completed line, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(line_end) = find_newline(&self.buf) {
            let line = self.buf.split_to(line_end);
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
                if self.done {
                    self.buf.clear();
                    break;
                }
            }
        }
        events
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.done || self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<SseEvent> {
        let event = parse_line(&String::from_utf8_lossy(line))?;
        if event == SseEvent::Done {
            self.done = true;
        }
        Some(event)
    }
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

/// Decode one line. Blank lines, comments, non-data fields and payloads
/// that do not parse yield nothing.
fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed.strip_prefix("data:")?.trim();
    if data == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    let content = chunk.choices.into_iter().next()?.delta?.content?;
    if content.is_empty() {
        None
    } else {
        Some(SseEvent::Delta(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n")
    }

    #[test]
    fn test_single_delta_then_done() {
        let mut decoder = SseDecoder::new();
        let input = format!("{}data: [DONE]\n", delta("Hi"));

        let events = decoder.push(input.as_bytes());
        assert_eq!(events, [SseEvent::Delta("Hi".to_string()), SseEvent::Done]);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_partial_lines_stay_buffered() {
        let mut decoder = SseDecoder::new();
        let frame = delta("Hello");
        let (head, tail) = frame.as_bytes().split_at(17);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), [SseEvent::Delta("Hello".to_string())]);
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let mut decoder = SseDecoder::new();
        let frame = delta("héllo");
        let split = frame.find('é').unwrap() + 1;
        let (head, tail) = frame.as_bytes().split_at(split);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), [SseEvent::Delta("héllo".to_string())]);
    }

    #[test]
    fn test_order_is_preserved_across_reads() {
        let mut decoder = SseDecoder::new();
        let mut seen = Vec::new();
        let input = format!("{}{}{}", delta("a"), delta("b"), delta("c"));
        for byte in input.as_bytes() {
            seen.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(
            seen,
            ["a", "b", "c"].map(|s| SseEvent::Delta(s.to_string()))
        );
    }

    #[test]
    fn test_noise_is_skipped() {
        let mut decoder = SseDecoder::new();
        let input = concat!(
            ": keep-alive\n",
            "\n",
            "event: message\n",
            "data: not json\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            "data: {\"choices\":[]}\n",
        );
        assert!(decoder.push(input.as_bytes()).is_empty());
    }

    #[test]
    fn test_crlf_and_no_space_after_colon() {
        let mut decoder = SseDecoder::new();
        let input = "data:{\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\ndata:[DONE]\r\n";
        assert_eq!(
            decoder.push(input.as_bytes()),
            [SseEvent::Delta("x".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn test_input_after_done_is_ignored() {
        let mut decoder = SseDecoder::new();
        let input = format!("data: [DONE]\n{}", delta("late"));
        assert_eq!(decoder.push(input.as_bytes()), [SseEvent::Done]);
        assert!(decoder.push(delta("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Done));
    }
}
