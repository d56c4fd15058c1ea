use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use ingest_api::RawMessage;

/// Результат разбора потока: очередная строка или слишком длинная строка.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Строка без `\n` (и без завершающего `\r`). Может быть пустой.
    Message(RawMessage),
    /// Строка длиннее лимита: первые `max_size` байт и исходная длина.
    Oversized { prefix: RawMessage, len: usize },
}

/// Newline framing для входящих соединений.
///
/// Сообщения выдаются по мере появления `\n`, не дожидаясь закрытия
/// соединения. Хвост длинной строки не буферизуется: кодек хранит только
/// первые `max_size` байт и считает остальные до разделителя.
pub struct MessageCodec {
    max_size: usize,
    /// Сколько байт буфера уже проверено на `\n`.
    next_index: usize,
    discarding: Option<Discard>,
}

struct Discard {
    prefix: Vec<u8>,
    len: usize,
    last: Option<u8>,
}

impl Discard {
    fn finish(self) -> Frame {
        // \r перед \n не входит в сообщение
        let len = if self.last == Some(b'\r') { self.len - 1 } else { self.len };
        Frame::Oversized { prefix: RawMessage::new(self.prefix), len }
    }
}

impl MessageCodec {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            next_index: 0,
            discarding: None,
        }
    }

    fn line_frame(&self, mut line: BytesMut) -> Frame {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.max_size {
            let len = line.len();
            line.truncate(self.max_size);
            Frame::Oversized { prefix: RawMessage::new(line.to_vec()), len }
        } else {
            Frame::Message(RawMessage::new(line.to_vec()))
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(discard) = self.discarding.as_mut() {
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    if pos > 0 {
                        discard.last = Some(buf[pos - 1]);
                    }
                    discard.len += pos;
                    buf.advance(pos + 1);
                    return Ok(self.discarding.take().map(Discard::finish));
                }
                None => {
                    if let Some(&b) = buf.last() {
                        discard.last = Some(b);
                    }
                    discard.len += buf.len();
                    buf.clear();
                    return Ok(None);
                }
            }
        }

        let start = self.next_index.min(buf.len());
        if let Some(offset) = buf[start..].iter().position(|&b| b == b'\n') {
            let pos = start + offset;
            self.next_index = 0;
            let mut line = buf.split_to(pos + 1);
            line.truncate(pos);
            return Ok(Some(self.line_frame(line)));
        }

        // +1: последний байт может оказаться \r от CRLF
        if buf.len() > self.max_size + 1 {
            let prefix = buf.split_to(self.max_size).to_vec();
            self.discarding = Some(Discard {
                prefix,
                len: self.max_size + buf.len(),
                last: buf.last().copied(),
            });
            buf.clear();
            self.next_index = 0;
        } else {
            self.next_index = buf.len();
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if let Some(discard) = self.discarding.take() {
            buf.clear();
            return Ok(Some(discard.finish()));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Последняя строка без \n
        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(self.line_frame(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(bytes: &[u8]) -> Frame {
        Frame::Message(RawMessage::from(bytes))
    }

    #[test]
    fn splits_on_newline_incrementally() {
        let mut codec = MessageCodec::new(16);
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"lo\nwor");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"hello")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"ld\n\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"world")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn strips_carriage_return() {
        let mut codec = MessageCodec::new(16);
        let mut buf = BytesMut::from(&b"ping\r\n\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"ping")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"")));
    }

    #[test]
    fn trailing_bytes_at_eof_form_a_message() {
        let mut codec = MessageCodec::new(16);
        let mut buf = BytesMut::from(&b"a\nlast"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(message(b"a")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(message(b"last")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn exact_limit_is_not_oversized() {
        let mut codec = MessageCodec::new(4);
        let mut buf = BytesMut::from(&b"abcd\r"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"abcd")));
    }

    #[test]
    fn oversized_in_one_chunk() {
        let mut codec = MessageCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefg\nok\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Oversized { prefix: RawMessage::from(&b"abcd"[..]), len: 7 })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"ok")));
    }

    #[test]
    fn oversized_tail_is_counted_not_buffered() {
        let mut codec = MessageCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(&[b'x'; 100]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"yz\r\nnext\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Oversized { prefix: RawMessage::from(&b"abcd"[..]), len: 110 })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(message(b"next")));
    }

    #[test]
    fn oversized_at_eof_without_newline() {
        let mut codec = MessageCodec::new(4);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(Frame::Oversized { prefix: RawMessage::from(&b"0123"[..]), len: 10 })
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }
}
