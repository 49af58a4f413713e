//! GTP line codec.
//!
//! Requests are single lines prefixed with a numeric id; responses are
//! `=`/`?` blocks terminated by a blank line, optionally echoing the id of
//! the request they answer.

use std::io::BufRead;

use super::GtpError;

/// A single outgoing GTP request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpRequest {
    /// Numeric id used for response correlation
    pub id: u32,

    /// The command text, e.g. `genmove b`
    pub command: String,
}

impl GtpRequest {
    /// Create a request. Embedded newlines are collapsed to spaces; GTP
    /// requests are one line by definition.
    pub fn new(id: u32, command: &str) -> Self {
        let command = command.split_whitespace().collect::<Vec<_>>().join(" ");
        Self { id, command }
    }

    /// First token of the command, for logs.
    pub fn command_name(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }

    /// Wire form, id prefix and trailing newline included.
    pub fn to_wire(&self) -> String {
        format!("{} {}\n", self.id, self.command)
    }
}

/// A parsed GTP response block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpResponse {
    /// Id echoed from the request, if the engine sent one
    pub id: Option<u32>,

    /// `true` for `=` responses, `false` for `?` responses
    pub success: bool,

    /// Response content with the status prefix stripped; multi-line content
    /// is joined with `\n`
    pub content: String,
}

impl GtpResponse {
    /// Parse a complete response block (everything up to the blank-line
    /// terminator, terminator excluded).
    pub fn parse(block: &str) -> Result<Self, GtpError> {
        let mut lines = block.lines();
        let first = lines
            .next()
            .ok_or_else(|| GtpError::MalformedResponse(String::new()))?
            .trim_end();

        let (success, rest) = match first.chars().next() {
            Some('=') => (true, &first[1..]),
            Some('?') => (false, &first[1..]),
            _ => return Err(GtpError::MalformedResponse(first.to_string())),
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let (id, first_content) = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| GtpError::MalformedResponse(first.to_string()))?;
            (Some(id), rest[digits..].trim_start())
        } else {
            (None, rest.trim_start())
        };

        let mut content = first_content.to_string();
        for line in lines {
            content.push('\n');
            content.push_str(line.trim_end());
        }

        Ok(Self { id, success, content })
    }
}

/// Pulls complete response blocks from the engine's output stream.
#[derive(Debug)]
pub struct ResponseReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> ResponseReader<R> {
    /// Wrap a buffered reader over the engine's output.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next complete response block. `Ok(None)` at EOF.
    ///
    /// Stray blank lines between blocks are skipped; a block cut short by EOF
    /// is parsed as-is.
    pub fn read_response(&mut self) -> Result<Option<GtpResponse>, GtpError> {
        let mut block = String::new();
        loop {
            let mut line = String::new();
            let n = self.inner.read_line(&mut line)?;
            if n == 0 {
                if block.is_empty() {
                    return Ok(None);
                }
                break;
            }
            let line = line.trim_end();
            if line.is_empty() {
                if block.is_empty() {
                    continue;
                }
                break;
            }
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(line);
        }
        GtpResponse::parse(&block).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_request_wire_form() {
        let request = GtpRequest::new(7, "play b c3");
        assert_eq!(request.to_wire(), "7 play b c3\n");
        assert_eq!(request.command_name(), "play");
    }

    #[test]
    fn test_request_collapses_whitespace() {
        let request = GtpRequest::new(1, "  genmove \n w ");
        assert_eq!(request.command, "genmove w");
    }

    #[test]
    fn test_parse_success_with_id() {
        let response = GtpResponse::parse("=12 A4").unwrap();
        assert_eq!(response.id, Some(12));
        assert!(response.success);
        assert_eq!(response.content, "A4");
    }

    #[test]
    fn test_parse_failure_with_id() {
        let response = GtpResponse::parse("?3 illegal move").unwrap();
        assert_eq!(response.id, Some(3));
        assert!(!response.success);
        assert_eq!(response.content, "illegal move");
    }

    #[test]
    fn test_parse_without_id() {
        let response = GtpResponse::parse("= 2.0").unwrap();
        assert_eq!(response.id, None);
        assert!(response.success);
        assert_eq!(response.content, "2.0");
    }

    #[test]
    fn test_parse_empty_content() {
        let response = GtpResponse::parse("=5").unwrap();
        assert_eq!(response.id, Some(5));
        assert_eq!(response.content, "");
    }

    #[test]
    fn test_parse_multiline_content() {
        let response = GtpResponse::parse("=1 list_commands\nplay\ngenmove").unwrap();
        assert_eq!(response.content, "list_commands\nplay\ngenmove");
    }

    #[test]
    fn test_parse_rejects_missing_status_prefix() {
        assert!(matches!(
            GtpResponse::parse("hello"),
            Err(GtpError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_reader_yields_blocks_and_eof() {
        let stream = Cursor::new("=1 first\n\n\n?2 second\nmore\n\n");
        let mut reader = ResponseReader::new(stream);

        let first = reader.read_response().unwrap().unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(first.content, "first");

        let second = reader.read_response().unwrap().unwrap();
        assert_eq!(second.id, Some(2));
        assert!(!second.success);
        assert_eq!(second.content, "second\nmore");

        assert!(reader.read_response().unwrap().is_none());
    }

    #[test]
    fn test_reader_handles_crlf() {
        let stream = Cursor::new("=9 pass\r\n\r\n");
        let mut reader = ResponseReader::new(stream);

        let response = reader.read_response().unwrap().unwrap();
        assert_eq!(response.id, Some(9));
        assert_eq!(response.content, "pass");
    }

    #[test]
    fn test_reader_parses_block_cut_short_by_eof() {
        let stream = Cursor::new("=4 done");
        let mut reader = ResponseReader::new(stream);

        let response = reader.read_response().unwrap().unwrap();
        assert_eq!(response.id, Some(4));
        assert_eq!(response.content, "done");
        assert!(reader.read_response().unwrap().is_none());
    }
}
