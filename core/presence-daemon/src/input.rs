//! Inbound queue: newline-delimited requests read off stdin on a dedicated
//! thread and handed to the main loop in arrival order.

use std::io::{self, BufRead, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use presence_protocol::{codes, ErrorInfo, Request, MAX_REQUEST_BYTES};
use tracing::{debug, warn};

const DRAIN_CHUNK_SIZE: u64 = 4096;

#[derive(Debug)]
pub enum Inbound {
    Request(Request),
    Rejected(ErrorInfo),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Eof,
    Bytes(Vec<u8>),
    TooLarge,
}

/// Reads one line of at most `MAX_REQUEST_BYTES`. An oversized line is
/// consumed up to its newline and reported as `TooLarge`.
pub fn next_line<R: BufRead>(reader: &mut R) -> io::Result<Line> {
    let mut buffer = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_REQUEST_BYTES as u64 + 1)
        .read_until(b'\n', &mut buffer)?;
    if read == 0 {
        return Ok(Line::Eof);
    }

    if buffer.last() != Some(&b'\n') && buffer.len() > MAX_REQUEST_BYTES {
        let mut sink = Vec::new();
        loop {
            sink.clear();
            let n = reader
                .by_ref()
                .take(DRAIN_CHUNK_SIZE)
                .read_until(b'\n', &mut sink)?;
            if n == 0 || sink.last() == Some(&b'\n') {
                break;
            }
        }
        return Ok(Line::TooLarge);
    }

    Ok(Line::Bytes(buffer))
}

/// Blank lines yield `Ok(None)`.
pub fn parse_request(bytes: &[u8]) -> Result<Option<Request>, ErrorInfo> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    serde_json::from_slice(bytes).map(Some).map_err(|err| {
        ErrorInfo::new(
            codes::INVALID_JSON,
            format!("request was not valid JSON: {}", err),
        )
    })
}

/// Spawns the reader thread. The receiver closes when the input ends.
pub fn spawn_reader<R>(reader: R) -> Receiver<Inbound>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = reader;
        loop {
            let inbound = match next_line(&mut reader) {
                Ok(Line::Eof) => {
                    debug!("Input closed");
                    break;
                }
                Ok(Line::TooLarge) => Inbound::Rejected(ErrorInfo::new(
                    codes::REQUEST_TOO_LARGE,
                    "request exceeded maximum size",
                )),
                Ok(Line::Bytes(bytes)) => match parse_request(&bytes) {
                    Ok(Some(request)) => Inbound::Request(request),
                    Ok(None) => continue,
                    Err(err) => Inbound::Rejected(err),
                },
                Err(err) => {
                    warn!(error = %err, "Failed to read input");
                    break;
                }
            };
            if tx.send(inbound).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_lines_in_order() {
        let mut reader = Cursor::new(b"one\ntwo\n".to_vec());
        assert_eq!(next_line(&mut reader).unwrap(), Line::Bytes(b"one\n".to_vec()));
        assert_eq!(next_line(&mut reader).unwrap(), Line::Bytes(b"two\n".to_vec()));
        assert_eq!(next_line(&mut reader).unwrap(), Line::Eof);
    }

    #[test]
    fn accepts_final_line_without_newline() {
        let mut reader = Cursor::new(b"last".to_vec());
        assert_eq!(next_line(&mut reader).unwrap(), Line::Bytes(b"last".to_vec()));
    }

    #[test]
    fn oversized_line_is_rejected_and_skipped() {
        let mut input = vec![b'x'; MAX_REQUEST_BYTES + 10];
        input.extend_from_slice(b"\nnext\n");
        let mut reader = Cursor::new(input);
        assert_eq!(next_line(&mut reader).unwrap(), Line::TooLarge);
        assert_eq!(next_line(&mut reader).unwrap(), Line::Bytes(b"next\n".to_vec()));
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(parse_request(b"   \n").unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert_eq!(parse_request(b"{nope}\n").unwrap_err().code, "invalid_json");
    }

    #[test]
    fn reader_thread_delivers_requests() {
        let input = b"{\"protocol_version\":1,\"method\":\"get_health\"}\n\n{bad}\n".to_vec();
        let rx = spawn_reader(Cursor::new(input));
        let items: Vec<Inbound> = rx.iter().collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Inbound::Request(_)));
        assert!(matches!(items[1], Inbound::Rejected(_)));
    }
}
