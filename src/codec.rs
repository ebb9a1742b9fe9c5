//! Frame Codec: pure functions turning application operations into wire
//! packets, and wire responses into typed results. No state lives here.

use crate::error::EngineError;
use bytes::Bytes;
use num_enum::IntoPrimitive;

/// Maximum payload carried by a single text-display chunk.
pub const TEXT_CHUNK_SIZE: usize = 180;
/// Maximum payload carried by a single JSON-config chunk.
pub const JSON_CHUNK_SIZE: usize = 180;
/// Maximum payload carried by a single bitmap chunk.
pub const BITMAP_CHUNK_SIZE: usize = 194;

const ACK_BYTE: u8 = 0xC9;

/// A decoded response, typed just enough that catalogue-level callers
/// never need to downcast a generic payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// `0xC9`/`0x00` acknowledgement, as `true`/`false`.
    Ack(bool),
    Battery(u8),
    Firmware(String),
    /// Accepted but not yet given a richer typed decode (audio/whitelist
    /// frames the engine only needs to drop or forward).
    Unit,
}

/// Which OS the host battery query is issued on behalf of (wire tag, not
/// related to [`crate::side::Side`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum HostTag {
    Android = 0x01,
    Ios = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum DashboardMode {
    Full = 0x00,
    Dual = 0x01,
    Minimal = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum DashboardSubmode {
    Stock = 0x00,
    Notes = 0x01,
}

/// Which JSON-config opcode a chunked JSON transfer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonConfigKind {
    Whitelist,
    Notifications,
}

impl JsonConfigKind {
    fn opcode(self) -> u8 {
        match self {
            JsonConfigKind::Whitelist => 0x04,
            JsonConfigKind::Notifications => 0x4B,
        }
    }
}

/// Decode the shared `0xC9`/`0x00` acknowledgement body that follows most
/// response prefixes.
pub fn decode_ack(response: &[u8], prefix_len: usize) -> Result<DecodedValue, EngineError> {
    let ack_byte = response
        .get(prefix_len)
        .ok_or_else(|| EngineError::DecodeError("response shorter than matched prefix".to_string()))?;
    Ok(DecodedValue::Ack(*ack_byte == ACK_BYTE))
}

/// Brightness scaling: clamp `level` to `[0,100]` (else fallback 30), then
/// `floor(level * 63 / 100)` to a 6-bit device value.
pub fn scale_brightness(level: u8) -> u8 {
    let level = if level > 100 { 30 } else { level };
    ((level as u32 * 63) / 100) as u8
}

pub fn encode_brightness(level: u8, auto: bool) -> Bytes {
    Bytes::copy_from_slice(&[0x01, scale_brightness(level), auto as u8])
}

/// Head-up angle: clamp to `[0,60]`, single byte, trailing constant `0x01`.
pub fn encode_head_up_angle(degrees: u8) -> Bytes {
    let degrees = degrees.min(60);
    Bytes::copy_from_slice(&[0x0B, degrees, 0x01])
}

/// Heartbeat: `[0x25, length_lo, length_hi, seq, 0x04, (seq+1) mod 256]`
/// with `length = 6` little-endian.
pub fn encode_heartbeat(seq: u8) -> Bytes {
    let length: u16 = 6;
    let [length_lo, length_hi] = length.to_le_bytes();
    Bytes::copy_from_slice(&[0x25, length_lo, length_hi, seq, 0x04, seq.wrapping_add(1)])
}

/// Dashboard mode: `[0x06, 0x07, 0x00, 0x00, 0x06, mode, submode]`.
/// `InvalidArgument` if `mode == MINIMAL` and `submode != NOTES`.
pub fn encode_dashboard_mode(mode: DashboardMode, submode: DashboardSubmode) -> Result<Bytes, EngineError> {
    if mode == DashboardMode::Minimal && submode != DashboardSubmode::Notes {
        return Err(EngineError::InvalidArgument(
            "MINIMAL dashboard mode requires the NOTES submode",
        ));
    }
    Ok(Bytes::copy_from_slice(&[
        0x06,
        0x07,
        0x00,
        0x00,
        0x06,
        u8::from(mode),
        u8::from(submode),
    ]))
}

/// Battery query: request `[0x2C, host_tag]`.
pub fn encode_battery_query(host: HostTag) -> Bytes {
    Bytes::copy_from_slice(&[0x2C, host.into()])
}

/// Battery percentage from a matched response: `data[2]`.
pub fn decode_battery(response: &[u8]) -> Result<DecodedValue, EngineError> {
    let pct = response
        .get(2)
        .ok_or_else(|| EngineError::DecodeError("battery response shorter than 3 bytes".to_string()))?;
    Ok(DecodedValue::Battery(*pct))
}

/// Firmware info request. The wire table's `0x6E 0x74` is authoritative
/// over §4.1's shorthand `[0x23]` (which collides with the quick-restart
/// opcode `0x23 0x72` elsewhere in the same table) — see DESIGN.md.
pub fn encode_firmware_info_request() -> Bytes {
    Bytes::copy_from_slice(&[0x6E, 0x74])
}

/// Response prefix for firmware info: the 9 ASCII bytes `"net build"`.
pub const FIRMWARE_RESPONSE_PREFIX: &[u8] = b"net build";

/// `"{b0}.{b1}.{b2}.{b3}"` from the four bytes immediately following the
/// matched `"net build"` prefix.
pub fn decode_firmware_info(response: &[u8]) -> Result<DecodedValue, EngineError> {
    let prefix_len = FIRMWARE_RESPONSE_PREFIX.len();
    let version_bytes = response.get(prefix_len..prefix_len + 4).ok_or_else(|| {
        EngineError::DecodeError("firmware response too short for a 4-byte version".to_string())
    })?;
    Ok(DecodedValue::Firmware(format!(
        "{}.{}.{}.{}",
        version_bytes[0], version_bytes[1], version_bytes[2], version_bytes[3]
    )))
}

pub fn encode_mic_enable(on: bool) -> Bytes {
    Bytes::copy_from_slice(&[0x0E, on as u8])
}

pub fn encode_clear() -> Bytes {
    Bytes::copy_from_slice(&[0x18])
}

pub fn encode_silent_mode(on: bool) -> Bytes {
    Bytes::copy_from_slice(&[0x03, on as u8])
}

pub fn encode_wear_detect(on: bool) -> Bytes {
    Bytes::copy_from_slice(&[0x27, on as u8])
}

pub fn encode_quick_restart() -> Bytes {
    Bytes::copy_from_slice(&[0x23, 0x72])
}

pub fn encode_connect() -> Bytes {
    Bytes::copy_from_slice(&[0x4D, 0xFB])
}

fn chunks_of(data: &[u8], max_len: usize) -> Vec<&[u8]> {
    if data.is_empty() {
        vec![&[]]
    } else {
        data.chunks(max_len).collect()
    }
}

fn check_chunk_count(count: usize) -> Result<u8, EngineError> {
    if count > 255 {
        Err(EngineError::PayloadTooLarge { chunks: count })
    } else {
        Ok(count as u8)
    }
}

/// Text display (`0x4E`): UTF-8-encode, split into <=180-byte chunks,
/// emit packet `i` of `N` as
/// `[0x4E, i, N, i, 0x71, 0x00, 0x00, i+1, N, ...chunk]`.
///
/// The source advertises response prefix `[0x04]` for this operation
/// while the protocol table says `0x4E`; this is the discrepancy flagged
/// in spec.md §9. This codec uses `[0x4E]`, see `TEXT_RESPONSE_PREFIX`.
pub fn encode_text_display(text: &str) -> Result<Vec<Bytes>, EngineError> {
    let bytes = text.as_bytes();
    let parts = chunks_of(bytes, TEXT_CHUNK_SIZE);
    let total = check_chunk_count(parts.len())?;

    Ok(parts
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let i = idx as u8;
            let mut packet = Vec::with_capacity(9 + chunk.len());
            packet.extend_from_slice(&[0x4E, i, total, i, 0x71, 0x00, 0x00, i + 1, total]);
            packet.extend_from_slice(chunk);
            Bytes::from(packet)
        })
        .collect())
}

/// Response prefix shared by all text-display chunks (see discrepancy
/// note on [`encode_text_display`]).
pub const TEXT_RESPONSE_PREFIX: &[u8] = &[0x4E];

/// JSON config (`0x04` whitelist, `0x4B` notifications): split into
/// <=180-byte chunks, packet `[opcode, totalChunks, index, ...chunk]`.
pub fn encode_json_config(kind: JsonConfigKind, json: &[u8]) -> Result<Vec<Bytes>, EngineError> {
    let parts = chunks_of(json, JSON_CHUNK_SIZE);
    let total = check_chunk_count(parts.len())?;
    let opcode = kind.opcode();

    Ok(parts
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let mut packet = Vec::with_capacity(3 + chunk.len());
            packet.extend_from_slice(&[opcode, total, idx as u8]);
            packet.extend_from_slice(chunk);
            Bytes::from(packet)
        })
        .collect())
}

pub fn json_config_response_prefix(kind: JsonConfigKind) -> [u8; 1] {
    [kind.opcode()]
}

/// Bitmap transfer (`0x15`): split into <=194-byte chunks. The first
/// chunk is prefixed with `[0x15, 0x00, 0x00, 0x1C, 0x00, 0x00]`
/// (opcode, seq=0, 4-byte address header); subsequent chunks are
/// `[0x15, i, ...chunk]`.
pub fn encode_bitmap_transfer(bitmap: &[u8]) -> Result<Vec<Bytes>, EngineError> {
    let parts = chunks_of(bitmap, BITMAP_CHUNK_SIZE);
    check_chunk_count(parts.len())?;

    Ok(parts
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let mut packet = Vec::with_capacity(6 + chunk.len());
            if idx == 0 {
                packet.push(0x15);
                packet.push(0x00);
                packet.extend_from_slice(&crate::crc::BITMAP_ADDRESS_HEADER);
            } else {
                packet.push(0x15);
                packet.push(idx as u8);
            }
            packet.extend_from_slice(chunk);
            Bytes::from(packet)
        })
        .collect())
}

pub const BITMAP_RESPONSE_PREFIX: &[u8] = &[0x15];

/// Bitmap CRC (`0x16`): CRC-32 over the address header and bitmap
/// payload, big-endian in the packet.
pub fn encode_bitmap_crc(bitmap: &[u8]) -> Bytes {
    let crc = crate::crc::bitmap_crc32(bitmap);
    let [b3, b2, b1, b0] = crc.to_be_bytes();
    Bytes::copy_from_slice(&[0x16, b3, b2, b1, b0])
}

pub const BITMAP_CRC_RESPONSE_PREFIX: &[u8] = &[0x16];

/// End transfer: `[0x20, 0x0D, 0x0E]`.
pub fn encode_end_transfer_bmp() -> Bytes {
    Bytes::copy_from_slice(&[0x20, 0x0D, 0x0E])
}

pub const END_TRANSFER_RESPONSE_PREFIX: &[u8] = &[0x20];
