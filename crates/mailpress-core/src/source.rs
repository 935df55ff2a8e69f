//! Mail folder reader
//!
//! Parses RFC 5322 messages with the mail-parser crate and adapts them into
//! the closed [`Message`] model. A folder is either an mbox file (messages
//! separated by `From ` lines) or a directory of `.eml` files, read in
//! sorted name order. Messages that fail to parse are skipped with a
//! warning rather than aborting the folder.

use crate::error::SourceError;
use crate::message::{BodyPart, Header, Mailbox, Message};
use mail_parser::{MessageParser, MimeHeaders};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Read a mail folder from disk.
///
/// # Errors
///
/// Returns an error if the path is neither a file nor a directory, on I/O
/// failure, or when no message in the folder could be parsed.
pub fn read_folder(path: &Path) -> Result<Vec<Message>, SourceError> {
    let messages = if path.is_dir() {
        read_eml_dir(path)?
    } else if path.is_file() {
        let content = fs::read_to_string(path)?;
        parse_mbox(&content)
    } else {
        return Err(SourceError::NotAFolder(path.display().to_string()));
    };

    if messages.is_empty() {
        return Err(SourceError::NoMessages(path.display().to_string()));
    }
    Ok(messages)
}

fn read_eml_dir(dir: &Path) -> Result<Vec<Message>, SourceError> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml")))
        .collect();
    files.sort();

    let mut messages = Vec::new();
    for file in files {
        let raw = fs::read_to_string(&file)?;
        match parse_message(&raw) {
            Some(msg) => messages.push(msg),
            None => warn!(file = %file.display(), "skipping unparseable message"),
        }
    }
    Ok(messages)
}

/// Split mbox content on `From ` separator lines and parse each message
fn parse_mbox(content: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut in_message = false;

    for line in content.lines() {
        if line.starts_with("From ") {
            flush_mbox_message(&mut messages, &mut current, in_message);
            in_message = true;
            continue;
        }
        if in_message {
            current.push_str(line);
            current.push('\n');
        }
    }
    flush_mbox_message(&mut messages, &mut current, in_message);
    messages
}

fn flush_mbox_message(messages: &mut Vec<Message>, current: &mut String, in_message: bool) {
    if in_message && !current.is_empty() {
        match parse_message(current) {
            Some(msg) => messages.push(msg),
            None => warn!(index = messages.len(), "skipping unparseable mbox message"),
        }
    }
    current.clear();
}

/// Parse one raw message into the closed model
#[must_use]
pub fn parse_message(raw: &str) -> Option<Message> {
    let parsed = MessageParser::default().parse(raw.as_bytes())?;

    let timestamp = parsed
        .date()
        .map(mail_parser::DateTime::to_timestamp)
        .unwrap_or_default();

    let headers = parsed
        .headers_raw()
        .map(|(name, value)| Header {
            name: name.trim().to_string(),
            value: unfold(value),
        })
        .collect();

    let from = address_list(parsed.from());
    let to = address_list(parsed.to());
    let cc = address_list(parsed.cc());
    let bcc = address_list(parsed.bcc());
    let sender = address_list(parsed.sender());

    let body = body_tree(&parsed);

    Some(Message {
        timestamp,
        message_id: parsed.message_id().map(str::to_string),
        subject: parsed.subject().map(str::to_string),
        headers,
        from,
        to,
        cc,
        bcc,
        sender,
        body,
        raw: raw.to_string(),
    })
}

/// Collapse folded header continuation lines into single-space runs
fn unfold(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn address_list(addrs: Option<&mail_parser::Address>) -> Vec<Mailbox> {
    addrs
        .map(|list| {
            list.iter()
                .map(|addr| Mailbox {
                    name: addr.name().map(str::to_string),
                    address: addr.address().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build the body tree: decoded text bodies first, then attachment leaves.
/// A single part stays a bare leaf; anything else is wrapped in a `mixed`
/// container.
fn body_tree(parsed: &mail_parser::Message) -> BodyPart {
    let mut parts = Vec::new();

    let mut idx = 0;
    while let Some(text) = parsed.body_text(idx) {
        parts.push(BodyPart::Leaf {
            mime: "text/plain".to_string(),
            attachment: false,
            filename: None,
            lines: text.lines().map(str::to_string).collect(),
        });
        idx += 1;
    }

    for att in parsed.attachments() {
        let mime = att.content_type().map_or_else(
            || "application/octet-stream".to_string(),
            |ct| match ct.subtype() {
                Some(sub) => format!("{}/{sub}", ct.ctype()),
                None => ct.ctype().to_string(),
            },
        );
        parts.push(BodyPart::Leaf {
            mime,
            attachment: true,
            filename: att.attachment_name().map(str::to_string),
            lines: Vec::new(),
        });
    }

    if parts.len() == 1 {
        parts.remove(0)
    } else {
        BodyPart::Multipart {
            subtype: "mixed".to_string(),
            parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AddrField;

    const SIMPLE: &str = "From: \"Jane Doe\" <jane@example.com>\r\n\
                          To: bob@example.com, carol@example.com\r\n\
                          Subject: Test Message\r\n\
                          Date: Mon, 2 Mar 2015 10:00:00 +0000\r\n\
                          Message-ID: <m1@example.com>\r\n\
                          \r\n\
                          First line.\r\n\
                          Second line.\r\n";

    #[test]
    fn test_parse_simple_message() {
        let msg = parse_message(SIMPLE).unwrap();
        assert_eq!(msg.subject.as_deref(), Some("Test Message"));
        assert_eq!(msg.from[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(msg.from[0].address, "jane@example.com");
        assert_eq!(msg.addresses(AddrField::To).len(), 2);
        assert_eq!(msg.message_id.as_deref(), Some("m1@example.com"));
        // 2015-03-02T10:00:00Z
        assert_eq!(msg.timestamp, 1_425_290_400);
    }

    #[test]
    fn test_body_lines_preserved() {
        let msg = parse_message(SIMPLE).unwrap();
        let lines = msg.primary_text().unwrap();
        assert_eq!(lines[0], "First line.");
        assert_eq!(lines[1], "Second line.");
    }

    #[test]
    fn test_raw_text_retained() {
        let msg = parse_message(SIMPLE).unwrap();
        assert!(msg.raw.contains("Subject: Test Message"));
    }

    #[test]
    fn test_parse_mbox_splits_messages() {
        let mbox = "From jane@example.com Mon Mar  2 10:00:00 2015\n\
                    From: jane@example.com\n\
                    Subject: One\n\
                    \n\
                    body one\n\
                    From bob@example.com Mon Mar  2 11:00:00 2015\n\
                    From: bob@example.com\n\
                    Subject: Two\n\
                    \n\
                    body two\n";
        let messages = parse_mbox(mbox);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject.as_deref(), Some("One"));
        assert_eq!(messages[1].subject.as_deref(), Some("Two"));
    }

    #[test]
    fn test_read_folder_rejects_missing_path() {
        let result = read_folder(Path::new("/nonexistent/mailbox"));
        assert!(matches!(result, Err(SourceError::NotAFolder(_))));
    }

    #[test]
    fn test_unfold_collapses_continuations() {
        assert_eq!(unfold("multi\r\n line\r\n\tvalue"), "multi line value");
    }
}
