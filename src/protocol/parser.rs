//! Parsers for query replies and notifications.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::ParseError;
use crate::protocol::command::CRLF;
use crate::types::{
    DeviceDetails, DeviceTarget, DeviceUpdate, INTEGRATION_ID_NOT_SET, IntegrationIdKind,
    IntegrationIdRecord, SerialNumber,
};

const DETAILS_PREFIX: &[u8] = b"~DETAILS,";
const INTEGRATION_ID_PREFIX: &[u8] = b"~INTEGRATIONID,";
const DEVICE_PREFIX: &[u8] = b"~DEVICE,";

/// Splits a reply into its lines, requiring the last one to end with CRLF.
fn split_lines<'a>(
    data: &'a [u8],
    what: &'static str,
) -> Result<impl Iterator<Item = &'a [u8]>, ParseError> {
    let body = if data.is_empty() {
        data
    } else {
        data.strip_suffix(CRLF)
            .ok_or(ParseError::Unterminated { what })?
    };
    let mut rest = (!data.is_empty()).then_some(body);
    Ok(std::iter::from_fn(move || {
        let current = rest?;
        match crate::protocol::frame::find(current, CRLF) {
            Some(pos) => {
                rest = Some(&current[pos + CRLF.len()..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    }))
}

fn parse_u32(token: &[u8]) -> Option<u32> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn serial(token: &[u8]) -> Result<SerialNumber, ParseError> {
    SerialNumber::parse(token)
        .map_err(|_| ParseError::BadSerialNumber(Bytes::copy_from_slice(token)))
}

fn required<'a>(
    attrs: &'a BTreeMap<Bytes, Bytes>,
    key: &'static str,
) -> Result<&'a Bytes, ParseError> {
    attrs
        .get(key.as_bytes())
        .ok_or(ParseError::MissingKey { key })
}

/// Parses a reply to `?DETAILS`.
///
/// Format, one line per device:
/// ```text
/// ~DETAILS,SN:0x00f535eb,INTEGRATIONID:(Not Set),FAMILY:KEYPAD(1),PRODUCT:QSWS2-GB(1),CODE:...,BOOT:...,HW:...\r\n
/// ```
/// Values are split from keys at the first colon, so they may contain colons.
pub fn parse_details(data: &[u8]) -> Result<Vec<DeviceDetails>, ParseError> {
    let mut devices = Vec::new();

    for line in split_lines(data, "details")? {
        let bad_line = || ParseError::BadLine {
            what: "details",
            line: Bytes::copy_from_slice(line),
        };
        let body = line.strip_prefix(DETAILS_PREFIX).ok_or_else(bad_line)?;

        let mut raw_attrs = BTreeMap::new();
        for pair in body.split(|&b| b == b',') {
            let colon = pair.iter().position(|&b| b == b':').ok_or_else(bad_line)?;
            raw_attrs.insert(
                Bytes::copy_from_slice(&pair[..colon]),
                Bytes::copy_from_slice(&pair[colon + 1..]),
            );
        }

        let serial_number = serial(required(&raw_attrs, "SN")?)?;
        let integration_id = required(&raw_attrs, "INTEGRATIONID")?;
        let integration_id =
            (&integration_id[..] != INTEGRATION_ID_NOT_SET).then(|| integration_id.clone());
        let family = required(&raw_attrs, "FAMILY")?.clone();
        let product = required(&raw_attrs, "PRODUCT")?.clone();

        devices.push(DeviceDetails {
            serial_number,
            integration_id,
            family,
            product,
            raw_attrs,
        });
    }

    Ok(devices)
}

fn parse_integration_id_line(line: &[u8]) -> Option<IntegrationIdRecord> {
    let body = line.strip_prefix(INTEGRATION_ID_PREFIX)?;
    let mut fields = body.split(|&b| b == b',');

    let integration_id = fields.next().filter(|iid| !iid.is_empty())?;
    let style = fields.next()?;
    let token = fields.next()?;
    let output = fields.next().map(parse_u32);
    if fields.next().is_some() {
        return None;
    }
    if token.is_empty()
        || !token
            .iter()
            .all(|&b| b.is_ascii_hexdigit() || b == b'x')
    {
        return None;
    }
    let serial_number = SerialNumber::parse(token).ok()?;

    let kind = match (style, output) {
        (_, Some(None)) => return None,
        (b"DEVICE", _) => IntegrationIdKind::Device,
        (b"OUTPUT", Some(Some(output))) => IntegrationIdKind::Output { output },
        _ => return None,
    };

    Some(IntegrationIdRecord {
        integration_id: Bytes::copy_from_slice(integration_id),
        kind,
        serial_number,
    })
}

/// Parses a reply to `?INTEGRATIONID,3`.
///
/// Format, one line per assigned id:
/// ```text
/// ~INTEGRATIONID,<iid>,DEVICE,<serial>\r\n
/// ~INTEGRATIONID,<iid>,OUTPUT,<serial>,<output>\r\n
/// ```
/// Any line that does not match fails the whole reply.
pub fn parse_integration_ids(data: &[u8]) -> Result<Vec<IntegrationIdRecord>, ParseError> {
    split_lines(data, "integration id")?
        .map(|line| {
            parse_integration_id_line(line).ok_or_else(|| ParseError::BadLine {
                what: "integration id",
                line: Bytes::copy_from_slice(line),
            })
        })
        .collect()
}

/// Parses a `~DEVICE` notification.
///
/// Format:
/// ```text
/// ~DEVICE,<serial-or-iid>,<component>,<action>[,<value>...]\r\n
/// ```
pub fn parse_device_update(message: &[u8]) -> Result<DeviceUpdate, ParseError> {
    let bad = || ParseError::BadLine {
        what: "device",
        line: Bytes::copy_from_slice(message),
    };

    let line = message
        .strip_suffix(CRLF)
        .and_then(|line| line.strip_prefix(DEVICE_PREFIX))
        .filter(|line| !line.contains(&b'\r'))
        .ok_or_else(bad)?;

    let mut fields = line.splitn(4, |&b| b == b',');
    let target = fields.next().ok_or_else(bad)?;
    let component = fields.next().and_then(parse_u32).ok_or_else(bad)?;
    let action = fields.next().and_then(parse_u32).ok_or_else(bad)?;
    let values = fields
        .next()
        .map(|rest| rest.split(|&b| b == b',').map(Bytes::copy_from_slice).collect())
        .unwrap_or_default();

    Ok(DeviceUpdate {
        target: DeviceTarget::from_token(target),
        component,
        action,
        values,
    })
}
