//! Closed message adapter
//!
//! The rest of the system sees messages only through this model: timestamp,
//! repeatable named headers, address-list fields, and a body tree that
//! distinguishes multipart containers from leaf parts. Nothing from the
//! underlying mail parser leaks past `source`.

/// One mailbox in an address-list header
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Mailbox {
    /// Display name, if the header carried one
    pub name: Option<String>,
    /// Bare address (`user@host`)
    pub address: String,
}

impl Mailbox {
    /// Display name, falling back to the address when absent
    #[must_use]
    pub fn phrase(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// Local (user) part of the address
    #[must_use]
    pub fn user(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map_or(self.address.as_str(), |(user, _)| user)
    }

    /// Host part of the address; empty when the address has no `@`
    #[must_use]
    pub fn host(&self) -> &str {
        self.address.rsplit_once('@').map_or("", |(_, host)| host)
    }
}

/// One occurrence of a named header; headers are repeatable and kept in
/// original order
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Header {
    /// Header name as it appeared
    pub name: String,
    /// Unfolded header value
    pub value: String,
}

/// Address-list fields of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AddrField {
    From,
    To,
    Cc,
    Bcc,
    Sender,
}

impl AddrField {
    /// Header name for this field
    #[must_use]
    pub fn header_name(self) -> &'static str {
        match self {
            Self::From => "From",
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
            Self::Sender => "Sender",
        }
    }

    /// Whether this field holds at most one mailbox
    #[must_use]
    pub fn single_valued(self) -> bool {
        matches!(self, Self::Sender)
    }
}

/// Node of the body tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BodyPart {
    /// Multipart container
    Multipart {
        /// Subtype (`mixed`, `alternative`, ...)
        subtype: String,
        /// Child parts in message order
        parts: Vec<BodyPart>,
    },
    /// Leaf part
    Leaf {
        /// MIME type (`text/plain`, `application/pdf`, ...)
        mime: String,
        /// Whether the part was declared an attachment
        attachment: bool,
        /// Attachment filename, if any
        filename: Option<String>,
        /// Decoded text lines; empty for non-text leaves
        lines: Vec<String>,
    },
}

impl Default for BodyPart {
    fn default() -> Self {
        Self::Leaf {
            mime: "text/plain".to_string(),
            attachment: false,
            filename: None,
            lines: Vec::new(),
        }
    }
}

/// Attachment metadata discovered in the body tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment<'a> {
    /// Filename, if the part carried one
    pub name: Option<&'a str>,
    /// MIME type
    pub mime: &'a str,
}

/// One mail message, fully decoded
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Date header as epoch seconds (0 when the message has no usable date)
    pub timestamp: i64,
    /// Message-ID header
    pub message_id: Option<String>,
    /// Subject header
    pub subject: Option<String>,
    /// All headers, repeatable, in original order
    pub headers: Vec<Header>,
    /// From addresses
    pub from: Vec<Mailbox>,
    /// To addresses
    pub to: Vec<Mailbox>,
    /// Cc addresses
    pub cc: Vec<Mailbox>,
    /// Bcc addresses
    pub bcc: Vec<Mailbox>,
    /// Sender address (at most one in practice)
    pub sender: Vec<Mailbox>,
    /// Body tree
    pub body: BodyPart,
    /// Raw message text, for the verbatim dump
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

impl Message {
    /// Mailboxes of one address field
    #[must_use]
    pub fn addresses(&self, field: AddrField) -> &[Mailbox] {
        match field {
            AddrField::From => &self.from,
            AddrField::To => &self.to,
            AddrField::Cc => &self.cc,
            AddrField::Bcc => &self.bcc,
            AddrField::Sender => &self.sender,
        }
    }

    /// All values of a named header, case-insensitive, in order
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Leaf parts flagged as attachments, depth-first
    #[must_use]
    pub fn attachments(&self) -> Vec<Attachment<'_>> {
        let mut found = Vec::new();
        collect_attachments(&self.body, &mut found);
        found
    }

    /// Lines of the primary text part: the first non-attachment `text/plain`
    /// leaf, depth-first. `None` when the message has no identifiable text
    /// body (a recoverable condition for callers).
    #[must_use]
    pub fn primary_text(&self) -> Option<&[String]> {
        find_primary_text(&self.body)
    }
}

fn collect_attachments<'a>(part: &'a BodyPart, out: &mut Vec<Attachment<'a>>) {
    match part {
        BodyPart::Multipart { parts, .. } => {
            for child in parts {
                collect_attachments(child, out);
            }
        }
        BodyPart::Leaf {
            mime,
            attachment,
            filename,
            ..
        } => {
            if *attachment {
                out.push(Attachment {
                    name: filename.as_deref(),
                    mime,
                });
            }
        }
    }
}

fn find_primary_text(part: &BodyPart) -> Option<&[String]> {
    match part {
        BodyPart::Multipart { parts, .. } => parts.iter().find_map(find_primary_text),
        BodyPart::Leaf {
            mime,
            attachment: false,
            lines,
            ..
        } if mime == "text/plain" => Some(lines.as_slice()),
        BodyPart::Leaf { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(mime: &str, attachment: bool, name: Option<&str>, lines: &[&str]) -> BodyPart {
        BodyPart::Leaf {
            mime: mime.to_string(),
            attachment,
            filename: name.map(str::to_string),
            lines: lines.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_mailbox_user_and_host() {
        let mb = Mailbox {
            name: None,
            address: "jane@example.com".to_string(),
        };
        assert_eq!(mb.user(), "jane");
        assert_eq!(mb.host(), "example.com");

        let local = Mailbox {
            name: None,
            address: "postmaster".to_string(),
        };
        assert_eq!(local.user(), "postmaster");
        assert_eq!(local.host(), "");
    }

    #[test]
    fn test_phrase_falls_back_to_address() {
        let named = Mailbox {
            name: Some("Jane Doe".to_string()),
            address: "jane@example.com".to_string(),
        };
        let bare = Mailbox {
            name: None,
            address: "jane@example.com".to_string(),
        };
        assert_eq!(named.phrase(), "Jane Doe");
        assert_eq!(bare.phrase(), "jane@example.com");
    }

    #[test]
    fn test_primary_text_skips_attachments() {
        let msg = Message {
            body: BodyPart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![
                    leaf("text/plain", true, Some("notes.txt"), &["attached"]),
                    leaf("text/plain", false, None, &["hello"]),
                ],
            },
            ..Message::default()
        };
        assert_eq!(msg.primary_text(), Some(&["hello".to_string()][..]));
    }

    #[test]
    fn test_primary_text_missing() {
        let msg = Message {
            body: BodyPart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![leaf("application/pdf", true, Some("a.pdf"), &[])],
            },
            ..Message::default()
        };
        assert!(msg.primary_text().is_none());
    }

    #[test]
    fn test_attachments_depth_first() {
        let msg = Message {
            body: BodyPart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![
                    leaf("text/plain", false, None, &["body"]),
                    BodyPart::Multipart {
                        subtype: "mixed".to_string(),
                        parts: vec![leaf("image/png", true, Some("shot.png"), &[])],
                    },
                    leaf("application/pdf", true, Some("a.pdf"), &[]),
                ],
            },
            ..Message::default()
        };
        let atts = msg.attachments();
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[0].name, Some("shot.png"));
        assert_eq!(atts[1].name, Some("a.pdf"));
    }

    #[test]
    fn test_message_round_trips_through_json() {
        let msg = Message {
            timestamp: 1_425_290_400,
            message_id: Some("m1@example.com".to_string()),
            subject: Some("Test".to_string()),
            from: vec![Mailbox {
                name: Some("Jane Doe".to_string()),
                address: "jane@example.com".to_string(),
            }],
            body: leaf("text/plain", false, None, &["hello"]),
            ..Message::default()
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        // empty raw text is skipped during serialization
        assert!(!json.contains("\"raw\""));
    }

    #[test]
    fn test_header_values_case_insensitive() {
        let msg = Message {
            headers: vec![
                Header {
                    name: "X-Label".to_string(),
                    value: "one".to_string(),
                },
                Header {
                    name: "x-label".to_string(),
                    value: "two".to_string(),
                },
            ],
            ..Message::default()
        };
        let values: Vec<_> = msg.header_values("X-LABEL").collect();
        assert_eq!(values, vec!["one", "two"]);
    }
}
