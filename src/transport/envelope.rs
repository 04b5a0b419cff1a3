// src/transport/envelope.rs
//
// Decoder for OD4 envelopes as they arrive in a UDP datagram:
//
//   0x0D 0xA4 | len (u24, little endian) | Proto-encoded Envelope
//
// Envelope fields:
//   1 dataType (zigzag varint)     2 serializedData (bytes)
//   3 sent     (TimeStamp)         4 received       (TimeStamp)
//   5 sampleTimeStamp (TimeStamp)  6 senderStamp    (varint)
//
// TimeStamp is { 1 seconds, 2 microseconds }, both zigzag varints.
// Unknown fields are skipped.

use anyhow::{bail, Result};
use bytes::Buf;

pub const ENVELOPE_MAGIC: [u8; 2] = [0x0D, 0xA4];
const HEADER_LEN: usize = 5;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LENGTH_DELIMITED: u8 = 2;
const WIRE_FIXED32: u8 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeStamp {
    pub seconds: i32,
    pub microseconds: i32,
}

impl TimeStamp {
    pub fn to_micros(&self) -> i64 {
        self.seconds as i64 * 1_000_000 + self.microseconds as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub data_type: i32,
    pub serialized_data: Vec<u8>,
    pub sent: TimeStamp,
    pub received: TimeStamp,
    pub sample_time: TimeStamp,
    pub sender_stamp: u32,
}

/// Steering angle requested by whoever drives the car (message 1090).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroundSteeringRequest {
    pub ground_steering: f32,
}

impl GroundSteeringRequest {
    pub const ID: i32 = 1090;

    pub fn decode(mut payload: &[u8]) -> Result<Self> {
        let mut request = GroundSteeringRequest::default();
        while let Some((tag, value)) = next_field(&mut payload)? {
            if let (1, Field::Fixed32(bits)) = (tag, value) {
                request.ground_steering = f32::from_bits(bits);
            }
        }
        Ok(request)
    }
}

/// Decode the single envelope carried by a datagram.
pub fn decode_datagram(datagram: &[u8]) -> Result<Envelope> {
    if datagram.len() < HEADER_LEN {
        bail!("datagram too short for an envelope header: {} bytes", datagram.len());
    }
    if datagram[..2] != ENVELOPE_MAGIC {
        bail!(
            "bad envelope magic {:02x} {:02x}",
            datagram[0],
            datagram[1]
        );
    }

    let length = u32::from_le_bytes([datagram[2], datagram[3], datagram[4], 0]) as usize;
    let body = &datagram[HEADER_LEN..];
    if body.len() < length {
        bail!(
            "envelope announces {} bytes but only {} arrived",
            length,
            body.len()
        );
    }

    decode_envelope(&body[..length])
}

fn decode_envelope(mut body: &[u8]) -> Result<Envelope> {
    let mut envelope = Envelope::default();
    while let Some((tag, value)) = next_field(&mut body)? {
        match (tag, value) {
            (1, Field::Varint(v)) => envelope.data_type = zigzag_decode(v) as i32,
            (2, Field::Bytes(data)) => envelope.serialized_data = data.to_vec(),
            (3, Field::Bytes(data)) => envelope.sent = decode_timestamp(data)?,
            (4, Field::Bytes(data)) => envelope.received = decode_timestamp(data)?,
            (5, Field::Bytes(data)) => envelope.sample_time = decode_timestamp(data)?,
            (6, Field::Varint(v)) => envelope.sender_stamp = v as u32,
            _ => {}
        }
    }
    Ok(envelope)
}

fn decode_timestamp(mut data: &[u8]) -> Result<TimeStamp> {
    let mut ts = TimeStamp::default();
    while let Some((tag, value)) = next_field(&mut data)? {
        match (tag, value) {
            (1, Field::Varint(v)) => ts.seconds = zigzag_decode(v) as i32,
            (2, Field::Varint(v)) => ts.microseconds = zigzag_decode(v) as i32,
            _ => {}
        }
    }
    Ok(ts)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

fn next_field<'a>(buf: &mut &'a [u8]) -> Result<Option<(u32, Field<'a>)>> {
    if !buf.has_remaining() {
        return Ok(None);
    }

    let key = read_varint(buf)?;
    let tag = (key >> 3) as u32;
    let wire_type = (key & 0x07) as u8;

    let field = match wire_type {
        WIRE_VARINT => Field::Varint(read_varint(buf)?),
        WIRE_FIXED64 => {
            if buf.remaining() < 8 {
                bail!("truncated fixed64 field {}", tag);
            }
            Field::Fixed64(buf.get_u64_le())
        }
        WIRE_LENGTH_DELIMITED => {
            let len = read_varint(buf)? as usize;
            if buf.remaining() < len {
                bail!("truncated length-delimited field {}", tag);
            }
            let whole: &'a [u8] = *buf;
            let (data, rest) = whole.split_at(len);
            *buf = rest;
            Field::Bytes(data)
        }
        WIRE_FIXED32 => {
            if buf.remaining() < 4 {
                bail!("truncated fixed32 field {}", tag);
            }
            Field::Fixed32(buf.get_u32_le())
        }
        other => bail!("unsupported wire type {} for field {}", other, tag),
    };

    Ok(Some((tag, field)))
}

fn read_varint(buf: &mut &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            bail!("truncated varint");
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    bail!("varint longer than 64 bits")
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
