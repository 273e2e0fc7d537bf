//! Fan-in of a child's stdout and stderr into one tagged line stream.
//!
//! Each channel is framed independently by [`LineCodec`], and the two framed readers
//! are merged with [`futures::stream::select`], which polls both sides, so a quiet
//! channel never holds back lines that are ready on the other. Order is preserved per
//! channel only.

use crate::model::{Channel, OutputEvent};
use bytes::BytesMut;
use futures::stream::{self, Stream, StreamExt};
use std::io;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

/// Longest line buffered before it is emitted in pieces.
pub(crate) const MAX_LINE_BYTES: usize = 1_048_576;

/// A decoded line before it is tagged with its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedLine {
    pub text: String,
    pub malformed: bool,
}

impl DecodedLine {
    /// A complete line, newline already removed; a CRLF ending loses its `\r` too.
    fn from_line(raw: &[u8]) -> Self {
        Self::from_bytes(raw.strip_suffix(b"\r").unwrap_or(raw))
    }

    fn from_bytes(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(text) => Self {
                text: text.to_string(),
                malformed: false,
            },
            Err(_) => Self {
                text: String::from_utf8_lossy(raw).into_owned(),
                malformed: true,
            },
        }
    }

    fn tag(self, channel: Channel) -> OutputEvent {
        OutputEvent {
            channel,
            line: self.text,
            malformed: self.malformed,
        }
    }
}

/// Newline framing that never fails on content.
///
/// Unlike `LinesCodec`, invalid UTF-8 yields a lossy line flagged `malformed` instead
/// of an error, and an over-long line is emitted in `MAX_LINE_BYTES` pieces instead of
/// being discarded.
#[derive(Debug, Default)]
pub(crate) struct LineCodec {
    // Bytes of the buffer already scanned for a newline.
    next_index: usize,
}

impl Decoder for LineCodec {
    type Item = DecodedLine;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<DecodedLine>> {
        // A line of exactly MAX_LINE_BYTES still fits together with its newline.
        let scan_end = src.len().min(MAX_LINE_BYTES + 1);
        let start = self.next_index.min(scan_end);
        match src[start..scan_end].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let newline = start + offset;
                self.next_index = 0;
                let line = src.split_to(newline + 1);
                Ok(Some(DecodedLine::from_line(&line[..newline])))
            }
            None if src.len() > MAX_LINE_BYTES => {
                self.next_index = 0;
                let cut = chunk_boundary(src);
                let chunk = src.split_to(cut);
                Ok(Some(DecodedLine::from_bytes(&chunk)))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<DecodedLine>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Trailing text without a final newline.
        self.next_index = 0;
        let rest = src.split_to(src.len());
        Ok(Some(DecodedLine::from_bytes(&rest)))
    }
}

/// Split point for an over-long line: at most `MAX_LINE_BYTES`, moved back so a
/// multi-byte UTF-8 character is not cut in two. `src` must be longer than the limit.
fn chunk_boundary(src: &[u8]) -> usize {
    // At most three continuation bytes follow a UTF-8 lead byte.
    (MAX_LINE_BYTES - 3..=MAX_LINE_BYTES)
        .rev()
        .find(|&i| src[i] & 0b1100_0000 != 0b1000_0000)
        .unwrap_or(MAX_LINE_BYTES)
}

/// Merge both channels into one stream that ends when both reach end-of-stream.
pub(crate) fn multiplex<O, E>(
    stdout: O,
    stderr: E,
) -> impl Stream<Item = io::Result<OutputEvent>> + Unpin + Send
where
    O: AsyncRead + Unpin + Send,
    E: AsyncRead + Unpin + Send,
{
    let out = FramedRead::new(stdout, LineCodec::default())
        .map(|res| res.map(|line| line.tag(Channel::Stdout)));
    let err = FramedRead::new(stderr, LineCodec::default())
        .map(|res| res.map(|line| line.tag(Channel::Stderr)));
    stream::select(out, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn decode_all(input: &[u8]) -> Vec<DecodedLine> {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            out.push(line);
        }
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            out.push(line);
        }
        out
    }

    fn texts(lines: &[DecodedLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn splits_on_newlines_and_strips_carriage_returns() {
        let lines = decode_all(b"one\r\ntwo\n\nthree");
        assert_eq!(texts(&lines), ["one", "two", "", "three"]);
        assert!(lines.iter().all(|l| !l.malformed));
    }

    #[test]
    fn partial_line_waits_for_more_input() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"copy"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ing 3/10\nrest");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.text, "copying 3/10");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn invalid_utf8_is_flagged_not_fatal() {
        let lines = decode_all(b"ok\nbad \xff\xfe name\nok again\n");
        assert_eq!(lines.len(), 3);
        assert!(!lines[0].malformed);
        assert!(lines[1].malformed);
        assert!(lines[1].text.starts_with("bad "));
        assert_eq!(lines[2].text, "ok again");
    }

    #[test]
    fn overlong_line_is_emitted_in_pieces_without_loss() {
        let mut input = vec![b'x'; MAX_LINE_BYTES + 10];
        input.push(b'\n');
        let lines = decode_all(&input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text.len(), MAX_LINE_BYTES);
        assert_eq!(lines[1].text.len(), 10);
    }

    #[test]
    fn line_of_exactly_the_limit_stays_whole() {
        let mut input = vec![b'x'; MAX_LINE_BYTES];
        input.push(b'\n');
        let lines = decode_all(&input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text.len(), MAX_LINE_BYTES);
    }

    #[test]
    fn overlong_split_keeps_multibyte_characters_intact() {
        let mut input = vec![b'x'; MAX_LINE_BYTES - 1];
        input.extend_from_slice("é tail\n".as_bytes());
        let lines = decode_all(&input);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.malformed));
        assert_eq!(lines[0].text.len(), MAX_LINE_BYTES - 1);
        assert_eq!(lines[1].text, "é tail");
    }

    #[test]
    fn carriage_return_inside_an_overlong_line_is_kept() {
        let mut input = vec![b'x'; MAX_LINE_BYTES - 1];
        input.extend_from_slice(b"\ryz\n");
        let lines = decode_all(&input);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].text.ends_with('\r'));
        assert_eq!(lines[0].text.len(), MAX_LINE_BYTES);
        assert_eq!(lines[1].text, "yz");
    }

    #[tokio::test]
    async fn tags_lines_by_channel_and_keeps_per_channel_order() {
        let (mut out_w, out_r) = tokio::io::duplex(64);
        let (mut err_w, err_r) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            for i in 0..50 {
                out_w.write_all(format!("out {i}\n").as_bytes()).await.unwrap();
                if i % 3 == 0 {
                    err_w.write_all(format!("err {i}\n").as_bytes()).await.unwrap();
                }
            }
        });

        let events: Vec<OutputEvent> = multiplex(out_r, err_r)
            .map(|res| res.unwrap())
            .collect()
            .await;
        writer.await.unwrap();

        let stdout: Vec<_> = events
            .iter()
            .filter(|e| e.channel == Channel::Stdout)
            .map(|e| e.line.clone())
            .collect();
        let stderr: Vec<_> = events
            .iter()
            .filter(|e| e.channel == Channel::Stderr)
            .map(|e| e.line.clone())
            .collect();
        assert_eq!(stdout, (0..50).map(|i| format!("out {i}")).collect::<Vec<_>>());
        assert_eq!(
            stderr,
            (0..50)
                .filter(|i| i % 3 == 0)
                .map(|i| format!("err {i}"))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn idle_channel_does_not_block_the_other() {
        let (mut out_w, out_r) = tokio::io::duplex(64);
        // Keep the stderr writer open and silent for the whole test.
        let (_err_w, err_r) = tokio::io::duplex(64);
        let mut merged = multiplex(out_r, err_r);

        out_w.write_all(b"progress 1\n").await.unwrap();
        let first = tokio::time::timeout(std::time::Duration::from_secs(1), merged.next())
            .await
            .expect("stdout line delivered while stderr is idle")
            .unwrap()
            .unwrap();
        assert_eq!(first.line, "progress 1");
        assert_eq!(first.channel, Channel::Stdout);
    }
}
