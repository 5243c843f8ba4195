//-
// Copyright (c) 2025, Ketch Developers
//
// This file is part of Ketch.
//
// Ketch is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Ketch is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Ketch. If not, see <http://www.gnu.org/licenses/>.

//! Serialisation of FETCH attachments.
//!
//! Each attachment writes one `NAME value` field into the response entry for
//! the current sequence number. The raw octets are read once per message;
//! the MIME tree is parsed only when an attachment needs it.

use mail_parser::{
    Address, GetHeader, HeaderName, HeaderValue, Message, MessagePart,
    MessageParser, PartType,
};

use super::command::{FetchAtt, FetchPartial, FetchSection};
use super::lexer::PartSpecifier;
use super::response::Response;
use crate::store::{message_flag_names, wrap};
use crate::support::error::Error;

/// Extract every attachment in `atts` from `message` into `response`.
pub fn extract_all(
    response: &mut Response,
    message: &wrap::MessageWrap,
    atts: &[FetchAtt],
) -> Result<(), Error> {
    let needs_raw = atts.iter().any(|att| {
        !matches!(
            att,
            FetchAtt::Flags
                | FetchAtt::InternalDate
                | FetchAtt::Rfc822Size
                | FetchAtt::Uid
        )
    });
    let raw = if needs_raw {
        message.read_all()?
    } else {
        Vec::new()
    };

    let needs_mime = atts.iter().any(|att| {
        matches!(
            att,
            FetchAtt::Envelope
                | FetchAtt::Rfc822Text
                | FetchAtt::Body
                | FetchAtt::BodyStructure
                | FetchAtt::BodySection { .. }
        )
    });
    let parsed = if needs_mime {
        Some(
            MessageParser::default()
                .parse(&raw)
                .ok_or(Error::BadMessage)?,
        )
    } else {
        None
    };

    for att in atts {
        extract(response, message, &raw, parsed.as_ref(), att)?;
    }
    Ok(())
}

fn extract(
    response: &mut Response,
    message: &wrap::MessageWrap,
    raw: &[u8],
    parsed: Option<&Message<'_>>,
    att: &FetchAtt,
) -> Result<(), Error> {
    match att {
        FetchAtt::Envelope => {
            let parsed = parsed.ok_or(Error::BadMessage)?;
            response.put_field("ENVELOPE", &envelope_string(parsed));
        }

        FetchAtt::Flags => {
            let flags = message.provider.flags()?;
            let names = message_flag_names(flags);
            response.put_field("FLAGS", &format!("({})", names.join(" ")));
        }

        FetchAtt::InternalDate => {
            let date = message.provider.internal_date()?;
            response.put_field(
                "INTERNALDATE",
                &format!("\"{}\"", date.format("%d-%b-%Y %H:%M:%S %z")),
            );
        }

        FetchAtt::Rfc822Header => {
            let header = wrap::rfc822_header(raw);
            response.put_field(
                "RFC822.HEADER",
                &String::from_utf8_lossy(header),
            );
        }

        FetchAtt::Rfc822Size => {
            let size = message.provider.size()?;
            response.put_field("RFC822.SIZE", &size.to_string());
        }

        FetchAtt::Rfc822Text => {
            let parsed = parsed.ok_or(Error::BadMessage)?;
            let text = parsed.body_text(0).unwrap_or_default();
            response.put_field("RFC822.TEXT", &text);
        }

        FetchAtt::Body => {
            let parsed = parsed.ok_or(Error::BadMessage)?;
            response.put_field("BODY", &body_structure(parsed, 0, false));
        }

        FetchAtt::BodyStructure => {
            let parsed = parsed.ok_or(Error::BadMessage)?;
            response
                .put_field("BODYSTRUCTURE", &body_structure(parsed, 0, true));
        }

        FetchAtt::Uid => {
            response.put_field("UID", &message.uid.to_string());
        }

        FetchAtt::BodySection { section, .. } => {
            let parsed = parsed.ok_or(Error::BadMessage)?;
            let name = section_field_name(section);
            match body_section(parsed, section) {
                Some(payload) => {
                    let text = String::from_utf8_lossy(&payload);
                    if text.len() > 80 {
                        response.put_field(&name, &text);
                    } else {
                        response.put_field(&name, &quoted(&text));
                    }
                }
                None => {
                    response.put_field(&name, "NIL");
                }
            }
        }
    }

    Ok(())
}

//---- ENVELOPE ----------------------------------------------------------------

/// The RFC 3501 envelope: `(date subject from sender reply-to to cc bcc
/// in-reply-to message-id)`. Absent Sender and Reply-To default to From;
/// other absent fields render as NIL.
fn envelope_string(message: &Message<'_>) -> String {
    let from = address_list(message, HeaderName::From);
    let sender = match address_list(message, HeaderName::Sender) {
        ref s if s == "NIL" => from.clone(),
        s => s,
    };
    let reply_to = match address_list(message, HeaderName::ReplyTo) {
        ref s if s == "NIL" => from.clone(),
        s => s,
    };

    let date = message
        .date()
        .map(|d| quoted(&format_date(d)))
        .unwrap_or_else(|| "NIL".to_owned());
    let subject = nstring(message.subject());
    let in_reply_to = nstring(
        message
            .in_reply_to()
            .as_text_list()
            .map(|ids| {
                ids.iter()
                    .map(|id| format!("<{}>", id))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .as_deref(),
    );
    let message_id =
        nstring(message.message_id().map(|id| format!("<{}>", id)).as_deref());

    format!(
        "({} {} {} {} {} {} {} {} {} {})",
        date,
        subject,
        from,
        sender,
        reply_to,
        address_list(message, HeaderName::To),
        address_list(message, HeaderName::Cc),
        address_list(message, HeaderName::Bcc),
        in_reply_to,
        message_id,
    )
}

/// A parenthesised list of RFC 3501 address structures, or NIL.
fn address_list(message: &Message<'_>, header: HeaderName<'static>) -> String {
    let mut out = String::new();

    for value in message.header_values(header) {
        match value {
            HeaderValue::Address(Address::List(list)) => {
                for addr in list {
                    push_address(
                        &mut out,
                        addr.name.as_deref(),
                        addr.address.as_deref(),
                    );
                }
            }
            HeaderValue::Address(Address::Group(groups)) => {
                for group in groups {
                    // Group syntax: start marker, members, end marker
                    out.push_str(&format!(
                        "(NIL NIL {} NIL)",
                        nstring(group.name.as_deref())
                    ));
                    for addr in &group.addresses {
                        push_address(
                            &mut out,
                            addr.name.as_deref(),
                            addr.address.as_deref(),
                        );
                    }
                    out.push_str("(NIL NIL NIL NIL)");
                }
            }
            _ => {}
        }
    }

    if out.is_empty() {
        "NIL".to_owned()
    } else {
        format!("({})", out)
    }
}

fn push_address(out: &mut String, name: Option<&str>, address: Option<&str>) {
    let (mailbox, host) = match address {
        Some(address) => match address.split_once('@') {
            Some((mailbox, host)) => {
                (quoted(mailbox), quoted(host))
            }
            None => (quoted(address), "NIL".to_owned()),
        },
        None => ("NIL".to_owned(), "NIL".to_owned()),
    };
    out.push_str(&format!(
        "({} NIL {} {})",
        nstring(name),
        mailbox,
        host
    ));
}

fn format_date(date: &mail_parser::DateTime) -> String {
    static MONTHS: &[&str] = &[
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct",
        "Nov", "Dec",
    ];
    let month = MONTHS
        .get(date.month.saturating_sub(1) as usize)
        .unwrap_or(&"Jan");
    format!(
        "{} {} {} {:02}:{:02}:{:02} {}{:02}{:02}",
        date.day,
        month,
        date.year,
        date.hour,
        date.minute,
        date.second,
        if date.tz_before_gmt { '-' } else { '+' },
        date.tz_hour,
        date.tz_minute,
    )
}

//---- BODY / BODYSTRUCTURE ----------------------------------------------------

/// body = "(" (body-type-1part | body-type-mpart) ")"
fn body_structure(
    message: &Message<'_>,
    part_id: usize,
    extensions: bool,
) -> String {
    let part = match message.parts.get(part_id) {
        Some(part) => part,
        None => return "NIL".to_owned(),
    };

    if let PartType::Multipart(children) = &part.body {
        let mut out = String::from("(");
        for &child in children {
            out.push_str(&body_structure(message, child, extensions));
        }

        let subtype = content_type(part)
            .and_then(|ct| ct.c_subtype.as_ref())
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| "MIXED".to_owned());
        out.push(' ');
        out.push_str(&quoted(&subtype));

        if extensions {
            out.push(' ');
            out.push_str(&body_params(part));
        }
        out.push(')');
        return out;
    }

    single_part_structure(message, part)
}

fn single_part_structure(
    message: &Message<'_>,
    part: &MessagePart<'_>,
) -> String {
    let (media_type, media_subtype) = media_type(part);
    let body = message
        .raw_message
        .get(part.offset_body as usize..part.offset_end as usize)
        .unwrap_or_default();

    let id = nstring(
        part.headers
            .header_value(&HeaderName::ContentId)
            .and_then(|v| v.as_text())
            .map(|id| format!("<{}>", id))
            .as_deref(),
    );
    let description = nstring(
        part.headers
            .header_value(&HeaderName::ContentDescription)
            .and_then(|v| v.as_text()),
    );
    let encoding = quoted(
        &part
            .headers
            .header_value(&HeaderName::ContentTransferEncoding)
            .and_then(|v| v.as_text())
            .map(str::to_uppercase)
            .unwrap_or_else(|| "7BIT".to_owned()),
    );

    let mut out = format!(
        "({} {} {} {} {} {} {}",
        quoted(&media_type),
        quoted(&media_subtype),
        body_params(part),
        id,
        description,
        encoding,
        body.len(),
    );

    match &part.body {
        PartType::Text(_) | PartType::Html(_) => {
            out.push_str(&format!(" {}", count_lines(body)));
        }
        PartType::Message(nested) => {
            out.push_str(&format!(
                " {} {} {}",
                envelope_string(nested),
                body_structure(nested, 0, false),
                count_lines(body),
            ));
        }
        _ => {}
    }

    out.push(')');
    out
}

fn media_type(part: &MessagePart<'_>) -> (String, String) {
    if let Some(ct) = content_type(part) {
        let subtype = ct
            .c_subtype
            .as_ref()
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| default_subtype(part));
        return (ct.c_type.to_uppercase(), subtype);
    }

    match &part.body {
        PartType::Text(_) => ("TEXT".to_owned(), "PLAIN".to_owned()),
        PartType::Html(_) => ("TEXT".to_owned(), "HTML".to_owned()),
        PartType::Message(_) => ("MESSAGE".to_owned(), "RFC822".to_owned()),
        _ => ("APPLICATION".to_owned(), "OCTET-STREAM".to_owned()),
    }
}

fn default_subtype(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Html(_) => "HTML".to_owned(),
        _ => "PLAIN".to_owned(),
    }
}

fn content_type<'a>(
    part: &'a MessagePart<'_>,
) -> Option<&'a mail_parser::ContentType<'a>> {
    part.headers
        .header_value(&HeaderName::ContentType)
        .and_then(|v| v.as_content_type())
}

/// body-fld-param: `("name" "value" ...)` or NIL.
fn body_params(part: &MessagePart<'_>) -> String {
    let params: Vec<String> = content_type(part)
        .and_then(|ct| ct.attributes.as_ref())
        .map(|attributes| {
            attributes
                .iter()
                .map(|(name, value)| {
                    format!("{} {}", quoted(name), quoted(value))
                })
                .collect()
        })
        .unwrap_or_default();

    if params.is_empty() {
        "NIL".to_owned()
    } else {
        format!("({})", params.join(" "))
    }
}

fn count_lines(body: &[u8]) -> usize {
    body.iter().filter(|&&b| b == b'\n').count()
}

//---- BODY[section] -----------------------------------------------------------

/// Extract the octets a section spec describes, or `None` when the
/// addressed part does not exist.
fn body_section(
    parsed: &Message<'_>,
    section: &FetchSection,
) -> Option<Vec<u8>> {
    let mut message = parsed;
    let mut part = message.root_part();

    for (idx, &num) in section.part.iter().enumerate() {
        match &part.body {
            PartType::Multipart(children) => {
                let child = *children.get(num as usize - 1)?;
                part = message.parts.get(child)?;
            }
            PartType::Message(nested) => {
                message = nested;
                part = message.root_part();
                match &part.body {
                    PartType::Multipart(children) => {
                        let child = *children.get(num as usize - 1)?;
                        part = message.parts.get(child)?;
                    }
                    _ if num == 1 => {}
                    _ => return None,
                }
            }
            _ if num == 1 && idx == section.part.len() - 1 => {
                // Part 1 of a non-multipart message is the message itself
            }
            _ => return None,
        }
    }

    // The HEADER and TEXT specifiers address the embedded message when the
    // located part is message/rfc822
    if matches!(
        section.specifier,
        PartSpecifier::Header
            | PartSpecifier::HeaderFields
            | PartSpecifier::HeaderFieldsNot
            | PartSpecifier::Text
    ) {
        if let PartType::Message(nested) = &part.body {
            message = nested;
            part = message.root_part();
        }
    }

    let raw = message.raw_message.as_ref();
    let payload: Vec<u8> = match section.specifier {
        PartSpecifier::None => {
            let range = if section.part.is_empty() {
                part.offset_header as usize..part.offset_end as usize
            } else {
                part.offset_body as usize..part.offset_end as usize
            };
            raw.get(range)?.to_vec()
        }

        PartSpecifier::Header | PartSpecifier::Mime => raw
            .get(part.offset_header as usize..part.offset_body as usize)?
            .to_vec(),

        PartSpecifier::Text => raw
            .get(part.offset_body as usize..part.offset_end as usize)?
            .to_vec(),

        PartSpecifier::HeaderFields | PartSpecifier::HeaderFieldsNot => {
            let not =
                section.specifier == PartSpecifier::HeaderFieldsNot;
            let mut out = Vec::new();
            for header in &part.headers {
                let name = header.name.as_str();
                let wanted = section
                    .fields
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(name));
                if wanted != not {
                    out.extend_from_slice(name.as_bytes());
                    out.push(b':');
                    if let Some(value) = raw.get(
                        header.offset_start as usize
                            ..header.offset_end as usize,
                    ) {
                        out.extend_from_slice(value);
                    }
                }
            }
            out.extend_from_slice(b"\r\n");
            out
        }
    };

    Some(apply_partial(payload, section.partial))
}

fn apply_partial(payload: Vec<u8>, partial: Option<FetchPartial>) -> Vec<u8> {
    match partial {
        None => payload,
        Some(FetchPartial { from, length }) => {
            let start = (from as usize).min(payload.len());
            let end = (from as usize + length as usize).min(payload.len());
            payload[start..end].to_vec()
        }
    }
}

/// The response field name for a section fetch, e.g.
/// `BODY[1.2.HEADER.FIELDS (From To)]<0>`.
fn section_field_name(section: &FetchSection) -> String {
    let mut spec = section
        .part
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".");

    let text = match section.specifier {
        PartSpecifier::None => None,
        PartSpecifier::Header => Some("HEADER".to_owned()),
        PartSpecifier::HeaderFields => {
            Some(format!("HEADER.FIELDS ({})", section.fields.join(" ")))
        }
        PartSpecifier::HeaderFieldsNot => {
            Some(format!("HEADER.FIELDS.NOT ({})", section.fields.join(" ")))
        }
        PartSpecifier::Text => Some("TEXT".to_owned()),
        PartSpecifier::Mime => Some("MIME".to_owned()),
    };
    if let Some(text) = text {
        if !spec.is_empty() {
            spec.push('.');
        }
        spec.push_str(&text);
    }

    match section.partial {
        Some(partial) => format!("BODY[{}]<{}>", spec, partial.from),
        None => format!("BODY[{}]", spec),
    }
}

//---- Helpers -----------------------------------------------------------------

fn quoted(text: &str) -> String {
    format!(
        "\"{}\"",
        text.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

fn nstring(value: Option<&str>) -> String {
    match value {
        Some(value) => quoted(value),
        None => "NIL".to_owned(),
    }
}
