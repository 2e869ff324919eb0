// src/mcp/sse.rs

use std::io::{self, BufRead};

/// Frame one JSON payload as a single server-sent event.
pub fn encode_event(data: &str) -> String {
    format!("event: message\ndata: {}\n\n", data)
}

/// Return the first non-empty `data:` payload in an event stream, reading no further.
pub fn first_data_payload<R: BufRead>(reader: R) -> io::Result<Option<String>> {
    for line in reader.lines() {
        let line = line?;
        if let Some(rest) = line.strip_prefix("data:") {
            let payload = rest.trim();
            if !payload.is_empty() {
                return Ok(Some(payload.to_string()));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_only_the_first_event() {
        let stream = "event: message\ndata: {\"a\":1}\n\nevent: message\ndata: {\"a\":2}\n\n";
        let got = first_data_payload(Cursor::new(stream)).unwrap();
        assert_eq!(got.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn skips_empty_data_lines() {
        let stream = ": keepalive\ndata:\ndata:   \ndata: {}\n";
        let got = first_data_payload(Cursor::new(stream)).unwrap();
        assert_eq!(got.as_deref(), Some("{}"));
    }

    #[test]
    fn no_event_is_none() {
        assert_eq!(first_data_payload(Cursor::new("event: message\n\n")).unwrap(), None);
    }

    #[test]
    fn encode_then_read() {
        let framed = encode_event(r#"{"id":"x"}"#);
        assert_eq!(
            first_data_payload(Cursor::new(framed)).unwrap().as_deref(),
            Some(r#"{"id":"x"}"#)
        );
    }
}
