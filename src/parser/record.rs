use crate::error::{ProbeError, Result};
use crate::model::{Cell, Page, Record, SerialType, Value};
use crate::pager::Pager;
use crate::parser::overflow::harvest_overflow;
use crate::parser::varint::varint_at;
use crate::telemetry::{PageClass, Telemetry};

/// Assemble a cell's full payload (local bytes plus the overflow chain,
/// when present) and decode it into a record. Interior table cells carry
/// no payload and yield None.
pub fn read_record(
    pager: &Pager,
    telemetry: &Telemetry,
    page: &Page,
    cell: &Cell,
) -> Result<Option<Record>> {
    let Some((payload_size, payload_start, local_len, overflow_page)) = cell.payload() else {
        return Ok(None);
    };
    let payload_size = payload_size as usize;

    let local = page
        .data
        .get(payload_start..payload_start + local_len)
        .ok_or(ProbeError::ShortRead {
            page: page.number,
            got: page.data.len(),
            want: payload_start + local_len,
        })?;

    let mut payload = Vec::with_capacity(payload_size);
    payload.extend_from_slice(local);

    if let Some(first_page) = overflow_page {
        harvest_overflow(
            pager,
            telemetry,
            PageClass::of(page.kind()),
            page.number,
            first_page,
            payload_size - local_len,
            &mut payload,
        )?;
    }

    if payload.len() != payload_size {
        return Err(ProbeError::PayloadSizeMismatch {
            page: page.number,
            got: payload.len(),
            want: payload_size,
        });
    }

    parse_record(&payload, page.number).map(Some)
}

/// Decode a fully assembled record payload: the header-size varint, the
/// serial-type varints filling the rest of the header, then the column
/// bodies in the same order. The body must account for every byte.
pub fn parse_record(data: &[u8], page: u32) -> Result<Record> {
    let (header_size, header_varint_len) = varint_at(data, 0, page)?;
    let header_size = header_size as usize;
    if header_size > data.len() || header_size < header_varint_len {
        return Err(ProbeError::PayloadSizeMismatch {
            page,
            got: data.len(),
            want: header_size,
        });
    }

    let mut serial_types = Vec::new();
    let mut offset = header_varint_len;
    while offset < header_size {
        let (raw, len) = varint_at(data, offset, page)?;
        serial_types.push(SerialType::from_raw(raw));
        offset += len;
    }

    let mut values = Vec::with_capacity(serial_types.len());
    let mut offset = header_size;
    for &serial_type in &serial_types {
        let size = serial_type.size();
        let body = data
            .get(offset..offset + size)
            .ok_or(ProbeError::PayloadSizeMismatch {
                page,
                got: data.len(),
                want: offset + size,
            })?;
        values.push(decode_value(serial_type, body, page)?);
        offset += size;
    }

    if offset != data.len() {
        return Err(ProbeError::PayloadSizeMismatch {
            page,
            got: data.len(),
            want: offset,
        });
    }

    Ok(Record {
        serial_types,
        values,
    })
}

/// Decode one column body. Integers are big-endian two's complement and
/// sign-extend from their stored width.
fn decode_value(serial_type: SerialType, body: &[u8], page: u32) -> Result<Value> {
    let value = match serial_type {
        SerialType::Null | SerialType::Reserved(_) => Value::Null,
        SerialType::Int8 => Value::Integer(body[0] as i8 as i64),
        SerialType::Int16 => Value::Integer(i16::from_be_bytes([body[0], body[1]]) as i64),
        SerialType::Int24 => Value::Integer(sign_extend(body, 24)),
        SerialType::Int32 => {
            Value::Integer(i32::from_be_bytes([body[0], body[1], body[2], body[3]]) as i64)
        }
        SerialType::Int48 => Value::Integer(sign_extend(body, 48)),
        SerialType::Int64 => Value::Integer(i64::from_be_bytes([
            body[0], body[1], body[2], body[3], body[4], body[5], body[6], body[7],
        ])),
        SerialType::Float64 => Value::Real(f64::from_be_bytes([
            body[0], body[1], body[2], body[3], body[4], body[5], body[6], body[7],
        ])),
        SerialType::Zero => Value::Integer(0),
        SerialType::One => Value::Integer(1),
        SerialType::Blob(_) => Value::Blob(body.to_vec()),
        SerialType::Text(_) => Value::Text(
            String::from_utf8(body.to_vec()).map_err(|_| ProbeError::InvalidUtf8 { page })?,
        ),
    };
    Ok(value)
}

fn sign_extend(body: &[u8], bits: u32) -> i64 {
    let mut value: u64 = 0;
    for &byte in body {
        value = (value << 8) | byte as u64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
