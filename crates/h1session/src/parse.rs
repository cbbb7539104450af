use crate::scan::{fields, find_crlf, parse_hex_ascii, parse_int_ascii, starts_with_at, trim_sp_ht};
use crate::state::{
    H1Options,
    HeaderPolicy,
    Message,
    MessageKind,
    ParseError,
    ParseErrorKind,
    ParseState,
    ParseStatus,
    Stream,
};
use crate::trace_warn;

/// Result of a single state-machine step.
enum Step {
    /// State advanced; keep looping over the buffer.
    Continue,
    /// Parsing stops here with the given status.
    Done(ParseStatus),
}

/// Drive the parser over the stream's buffered bytes.
///
/// Returns [`ParseStatus::Complete`] as soon as one message finishes — the
/// caller takes it with [`Stream::finish_message`] and calls again, since
/// pipelined messages may follow in the same buffer. Returns
/// [`ParseStatus::NeedMore`] when the buffer ends mid-message (all progress
/// is kept) and [`ParseStatus::Invalid`] when the bytes cannot be HTTP, in
/// which case the caller should discard the stream.
pub fn parse_message(stream: &mut Stream, opts: &H1Options) -> ParseStatus {
    if stream.message.is_none() {
        return ParseStatus::NeedMore;
    }
    while stream.parse_offset < stream.data.len() {
        let step = match stream.state {
            ParseState::Start => first_line(stream),
            ParseState::Headers => headers(stream, opts),
            ParseState::BodyFixed => body_fixed(stream),
            ParseState::ChunkedLen => chunk_len(stream),
            ParseState::ChunkedData => chunk_data(stream),
            ParseState::ChunkedFinalCrlf => final_crlf(stream),
        };
        match step {
            Step::Continue => {}
            Step::Done(status) => return status,
        }
    }
    ParseStatus::NeedMore
}

fn invalid(kind: ParseErrorKind) -> Step {
    Step::Done(ParseStatus::Invalid(ParseError::new(kind)))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// First line: decide request vs response and parse version, method/target
/// or status code/phrase.
fn first_line(stream: &mut Stream) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };
    m.start = stream.parse_offset;
    let Some(eol) = find_crlf(&stream.data, stream.parse_offset) else {
        return Step::Done(ParseStatus::NeedMore);
    };
    let line = &stream.data[stream.parse_offset..eol];

    // The shortest conceivable first line ("GET / ...", "HTTP/1.0...") is
    // 8 bytes; anything shorter cannot be HTTP.
    if line.len() < 8 {
        trace_warn!("first line too short, not HTTP");
        return invalid(ParseErrorKind::FirstLineTooShort);
    }

    let version: &[u8];
    if &line[..5] == b"HTTP/" {
        m.kind = MessageKind::Response;
        version = &line[5..8];
        // Status code and phrase live after "HTTP/x.y " (position 9).
        let rest = line.get(9..).unwrap_or(&[]);
        let Some(sp) = rest.iter().position(|&b| b == b' ') else {
            trace_warn!("could not find a status code on the status line");
            return invalid(ParseErrorKind::StatusLineMalformed);
        };
        m.status_code = parse_int_ascii(&rest[..sp]) as u16;
        // The phrase is whatever follows the last space, so a multi-word
        // phrase keeps only its final word.
        let last_sp = rest.iter().rposition(|&b| b == b' ').unwrap_or(sp);
        m.status_phrase = lossy(&rest[last_sp + 1..]);
    } else {
        let tokens = fields(line);
        if tokens.len() != 3 {
            trace_warn!("request line does not have three tokens");
            return invalid(ParseErrorKind::RequestLineMalformed);
        }
        if tokens[2].len() < 5 || &tokens[2][..5] != b"HTTP/" {
            trace_warn!("request line does not end in an HTTP version");
            return invalid(ParseErrorKind::RequestLineMalformed);
        }
        m.kind = MessageKind::Request;
        m.method = lossy(tokens[0]);
        m.request_target = lossy(tokens[1]);
        m.first_line = lossy(line);
        version = &tokens[2][5..];
    }

    (m.version_major, m.version_minor) = parse_version(version);

    stream.parse_offset = eol + 2;
    m.header_offset = stream.parse_offset;
    stream.state = ParseState::Headers;
    Step::Continue
}

/// Version digits are read positionally from "x.y": byte 0 is the major,
/// byte 2 the minor, each truncated to a single ASCII digit (a non-digit
/// reads as 0). Shorter version strings fall back to 1.0.
fn parse_version(v: &[u8]) -> (u8, u8) {
    if v.len() < 3 {
        return (1, 0);
    }
    let digit = |b: u8| if b.is_ascii_digit() { b - b'0' } else { 0 };
    (digit(v[0]), digit(v[2]))
}

/// Header block: one field per entry, until the empty line picks the body
/// framing.
fn headers(stream: &mut Stream, opts: &H1Options) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };

    if stream.data.len() - stream.parse_offset >= 2
        && starts_with_at(&stream.data, stream.parse_offset, b"\r\n")
    {
        // End of headers.
        stream.parse_offset += 2;
        m.body_offset = stream.parse_offset;

        if m.kind == MessageKind::Response
            && ((100..200).contains(&m.status_code)
                || m.status_code == 204
                || m.status_code == 304)
        {
            // These statuses are terminated by the first empty line after
            // the header fields.
            m.end = stream.parse_offset;
            return Step::Done(ParseStatus::Complete);
        }
        if m.transfer_encoding == "chunked" {
            // Transfer-Encoding overrides Content-Length.
            stream.state = ParseState::ChunkedLen;
            return Step::Continue;
        }
        if m.content_length == 0 && (m.kind == MessageKind::Request || m.has_content_length) {
            m.end = stream.parse_offset;
            return Step::Done(ParseStatus::Complete);
        }
        stream.state = ParseState::BodyFixed;
        return Step::Continue;
    }

    match header_field(m, &stream.data[stream.parse_offset..], opts) {
        Some(consumed) => {
            stream.parse_offset += consumed;
            Step::Continue
        }
        None => Step::Done(ParseStatus::NeedMore),
    }
}

/// Parse one header field starting at the beginning of `data`.
///
/// Returns the number of bytes consumed, or `None` when the field is not
/// complete within the buffer. The value runs to the first CRLF not
/// followed by SP/HT (RFC line folding); a CRLF sitting at the very end of
/// the buffer is treated as undecided so a folded continuation arriving in
/// the next segment is not cut off.
fn header_field(m: &mut Message, data: &[u8], opts: &H1Options) -> Option<usize> {
    let colon = data.iter().position(|&b| b == b':')?;

    let mut p = colon + 1;
    let value_end = loop {
        let crlf = find_crlf(data, p)?;
        match data.get(crlf + 2) {
            None => return None,
            Some(&b' ') | Some(&b'\t') => p = crlf + 2,
            Some(_) => break crlf,
        }
    };

    let name = lossy(&data[..colon]).to_ascii_lowercase();
    let value = lossy(trim_sp_ht(&data[colon + 1..value_end]));

    // Headers the framing logic needs are always captured, whatever the
    // retention policy says.
    match name.as_str() {
        "content-length" => {
            m.content_length = parse_int_ascii(value.as_bytes());
            m.has_content_length = true;
        }
        "transfer-encoding" => m.transfer_encoding = value.clone(),
        "connection" => m.connection = value.clone(),
        _ => {}
    }
    if opts
        .client_ip_header
        .as_deref()
        .is_some_and(|h| h == name)
    {
        m.client_ip = Some(value.clone());
    }

    let keep = match &opts.header_policy {
        HeaderPolicy::None => false,
        HeaderPolicy::All => true,
        HeaderPolicy::Allowlist(names) => names.contains(&name),
    };
    if keep {
        m.headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    Some(value_end + 2)
}

/// Content-Length or connection-close framed body.
fn body_fixed(stream: &mut Stream) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };
    let available = stream.data.len() - stream.parse_offset;

    let close_framed = !m.has_content_length
        && (m.connection == "close"
            || (m.version_major == 1 && m.version_minor == 0 && m.connection != "keep-alive"));
    if close_framed {
        // No length on the wire: the body runs until the connection ends,
        // so swallow everything and let finish_at_close() complete it.
        stream.body_received += available;
        m.content_length += available;
        stream.parse_offset = stream.data.len();
        return Step::Done(ParseStatus::NeedMore);
    }

    let remaining = m.content_length.saturating_sub(stream.body_received);
    if available >= remaining {
        stream.parse_offset += remaining;
        m.end = stream.parse_offset;
        Step::Done(ParseStatus::Complete)
    } else {
        stream.body_received += available;
        stream.parse_offset = stream.data.len();
        Step::Done(ParseStatus::NeedMore)
    }
}

/// Chunk-size line, possibly carrying chunk extensions after the hex run.
fn chunk_len(stream: &mut Stream) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };
    let Some(eol) = find_crlf(&stream.data, stream.parse_offset) else {
        return Step::Done(ParseStatus::NeedMore);
    };
    let Some(len) = parse_hex_ascii(&stream.data[stream.parse_offset..eol]) else {
        trace_warn!("failed to parse chunk-size line");
        return invalid(ParseErrorKind::ChunkLengthInvalid);
    };
    stream.parse_offset = eol + 2;

    if len == 0 {
        // Last chunk; the message ends with one more CRLF.
        if stream.data.len() - stream.parse_offset < 2 {
            stream.state = ParseState::ChunkedFinalCrlf;
            return Step::Done(ParseStatus::NeedMore);
        }
        if !starts_with_at(&stream.data, stream.parse_offset, b"\r\n") {
            trace_warn!("expected CRLF sequence at end of message");
            return invalid(ParseErrorKind::FinalCrlfMissing);
        }
        stream.parse_offset += 2;
        m.end = stream.parse_offset;
        return Step::Done(ParseStatus::Complete);
    }

    stream.chunk_len = len;
    stream.body_received = 0;
    stream.state = ParseState::ChunkedData;
    Step::Continue
}

/// One chunk's data plus its trailing CRLF.
fn chunk_data(stream: &mut Stream) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };
    let available = stream.data.len() - stream.parse_offset;
    let want = stream.chunk_len.saturating_sub(stream.body_received);

    if available >= want + 2 {
        m.chunked_body
            .extend_from_slice(&stream.data[stream.parse_offset..stream.parse_offset + want]);
        stream.parse_offset += want + 2; // data plus its CRLF
        m.content_length += stream.chunk_len;
        stream.state = ParseState::ChunkedLen;
        Step::Continue
    } else if available >= want {
        // The data is all here but its trailing CRLF is not. Consuming now
        // would under-read on the next call, so wait without consuming.
        Step::Done(ParseStatus::NeedMore)
    } else {
        m.chunked_body
            .extend_from_slice(&stream.data[stream.parse_offset..]);
        stream.body_received += available;
        stream.parse_offset = stream.data.len();
        Step::Done(ParseStatus::NeedMore)
    }
}

/// The CRLF that ends a chunked message when it was split off the
/// zero-length chunk line.
fn final_crlf(stream: &mut Stream) -> Step {
    let Some(m) = stream.message.as_mut() else {
        return Step::Done(ParseStatus::NeedMore);
    };
    if stream.data.len() - stream.parse_offset < 2 {
        return Step::Done(ParseStatus::NeedMore);
    }
    if !starts_with_at(&stream.data, stream.parse_offset, b"\r\n") {
        trace_warn!("expected CRLF sequence at end of message");
        return invalid(ParseErrorKind::FinalCrlfMissing);
    }
    stream.parse_offset += 2;
    m.end = stream.parse_offset;
    Step::Done(ParseStatus::Complete)
}
