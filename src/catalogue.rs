//! Operation Catalogue: maps high-level application operations to
//! concrete [`Command`] values built from the frame codec.

use crate::codec::{self, DashboardMode, DashboardSubmode, DecodedValue, HostTag, JsonConfigKind};
use crate::command::Command;
use crate::error::EngineError;
use crate::side::{Side, Target};
use std::sync::Arc;

/// Every operation the engine can submit, independent of wire details.
#[derive(Debug, Clone)]
pub enum Operation {
    Initialize,
    SetBrightness { level: u8, auto: bool },
    SetHeadUpAngle { degrees: u8 },
    Heartbeat { seq: u8 },
    SetDashboardMode { mode: DashboardMode, submode: DashboardSubmode },
    QueryBattery { side: Side, host: HostTag },
    QueryFirmwareInfo { side: Side },
    DisplayText { text: String },
    SendJsonConfig { kind: JsonConfigKind, json: Vec<u8> },
    BeginBitmapTransfer { bitmap: Vec<u8> },
    BitmapCrcCheck { bitmap: Vec<u8> },
    EndBitmapTransfer,
    SetMicEnabled { on: bool },
    Clear,
    SetSilentMode { on: bool },
    SetWearDetect { on: bool },
    QuickRestart,
}

fn ack_decoder(prefix_len: usize) -> Arc<dyn Fn(&[u8]) -> Result<DecodedValue, EngineError> + Send + Sync> {
    Arc::new(move |data: &[u8]| codec::decode_ack(data, prefix_len))
}

/// Builds a [`Command`] for `op`, fixing its target selector, wire
/// packets and response prefix. This is the one seam between application
/// intent and the byte-level codec.
pub fn build(op: Operation) -> Result<Command, EngineError> {
    match op {
        Operation::Initialize => {
            let packet = codec::encode_connect();
            Ok(Command::new(vec![packet], one_byte(0x4D), Target::Both, ack_decoder(1)))
        }

        Operation::SetBrightness { level, auto } => {
            let packet = codec::encode_brightness(level, auto);
            Ok(Command::new(vec![packet], one_byte(0x01), Target::Both, ack_decoder(1)))
        }

        Operation::SetHeadUpAngle { degrees } => {
            let packet = codec::encode_head_up_angle(degrees);
            Ok(Command::new(vec![packet], one_byte(0x0B), Target::Both, ack_decoder(1)))
        }

        Operation::Heartbeat { seq } => {
            let packet = codec::encode_heartbeat(seq);
            Ok(Command::new(vec![packet], one_byte(0x25), Target::Both, ack_decoder(1)))
        }

        Operation::SetDashboardMode { mode, submode } => {
            let packet = codec::encode_dashboard_mode(mode, submode)?;
            Ok(Command::new(vec![packet], one_byte(0x06), Target::Both, ack_decoder(1)))
        }

        Operation::QueryBattery { side, host } => {
            let packet = codec::encode_battery_query(host);
            let decoder: Arc<dyn Fn(&[u8]) -> Result<DecodedValue, EngineError> + Send + Sync> =
                Arc::new(codec::decode_battery);
            Ok(Command::new(vec![packet], one_byte(0x2C), Target::One(side), decoder))
        }

        Operation::QueryFirmwareInfo { side } => {
            let packet = codec::encode_firmware_info_request();
            let decoder: Arc<dyn Fn(&[u8]) -> Result<DecodedValue, EngineError> + Send + Sync> =
                Arc::new(codec::decode_firmware_info);
            Ok(Command::new(
                vec![packet],
                bytes::Bytes::copy_from_slice(codec::FIRMWARE_RESPONSE_PREFIX),
                Target::One(side),
                decoder,
            ))
        }

        Operation::DisplayText { text } => {
            let packets = codec::encode_text_display(&text)?;
            Ok(Command::new(
                packets,
                bytes::Bytes::copy_from_slice(codec::TEXT_RESPONSE_PREFIX),
                Target::One(Side::Left),
                ack_decoder(codec::TEXT_RESPONSE_PREFIX.len()),
            ))
        }

        Operation::SendJsonConfig { kind, json } => {
            let packets = codec::encode_json_config(kind, &json)?;
            let prefix = codec::json_config_response_prefix(kind);
            Ok(Command::new(
                packets,
                bytes::Bytes::copy_from_slice(&prefix),
                Target::One(Side::Left),
                ack_decoder(prefix.len()),
            ))
        }

        Operation::BeginBitmapTransfer { bitmap } => {
            let packets = codec::encode_bitmap_transfer(&bitmap)?;
            Ok(Command::new(
                packets,
                bytes::Bytes::copy_from_slice(codec::BITMAP_RESPONSE_PREFIX),
                Target::One(Side::Left),
                ack_decoder(codec::BITMAP_RESPONSE_PREFIX.len()),
            ))
        }

        Operation::BitmapCrcCheck { bitmap } => {
            let packet = codec::encode_bitmap_crc(&bitmap);
            Ok(Command::new(
                vec![packet],
                bytes::Bytes::copy_from_slice(codec::BITMAP_CRC_RESPONSE_PREFIX),
                Target::One(Side::Left),
                ack_decoder(codec::BITMAP_CRC_RESPONSE_PREFIX.len()),
            ))
        }

        Operation::EndBitmapTransfer => {
            let packet = codec::encode_end_transfer_bmp();
            Ok(Command::new(
                vec![packet],
                bytes::Bytes::copy_from_slice(codec::END_TRANSFER_RESPONSE_PREFIX),
                Target::One(Side::Left),
                ack_decoder(codec::END_TRANSFER_RESPONSE_PREFIX.len()),
            ))
        }

        Operation::SetMicEnabled { on } => {
            let packet = codec::encode_mic_enable(on);
            Ok(Command::new(vec![packet], one_byte(0x0E), Target::Both, ack_decoder(1)))
        }

        Operation::Clear => {
            let packet = codec::encode_clear();
            Ok(Command::new(vec![packet], one_byte(0x18), Target::Both, ack_decoder(1)))
        }

        Operation::SetSilentMode { on } => {
            let packet = codec::encode_silent_mode(on);
            Ok(Command::new(vec![packet], one_byte(0x03), Target::Both, ack_decoder(1)))
        }

        Operation::SetWearDetect { on } => {
            let packet = codec::encode_wear_detect(on);
            Ok(Command::new(vec![packet], one_byte(0x27), Target::Both, ack_decoder(1)))
        }

        Operation::QuickRestart => {
            let packet = codec::encode_quick_restart();
            Ok(Command::new(vec![packet], one_byte(0x23), Target::Both, ack_decoder(1)))
        }
    }
}

fn one_byte(b: u8) -> bytes::Bytes {
    bytes::Bytes::copy_from_slice(&[b])
}
