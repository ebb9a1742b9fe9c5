//! Standard event listeners: the `0xF5`-prefixed unsolicited frames
//! (taps, long-press, pairing, case and battery events) from spec.md §4.4.

use crate::listener::{EventValue, ListenerTable, TapKind};
use crate::side::Side;

const EVENT_PREFIX: u8 = 0xF5;

fn is_event(data: &[u8], second_byte: u8) -> bool {
    data.len() >= 2 && data[0] == EVENT_PREFIX && data[1] == second_byte
}

/// Battery percentage parser: `min(data[2], 64) * 100 / 64`.
pub fn parse_battery_percent(data: &[u8]) -> u8 {
    let raw = data.get(2).copied().unwrap_or(0);
    (raw.min(64) as u32 * 100 / 64) as u8
}

/// Registers every standard `0xF5` listener against `table`, each firing
/// `handler` with the parsed [`EventValue`] and the side it arrived on.
///
/// Two source ambiguities are resolved here rather than reproduced (see
/// DESIGN.md):
/// - single tap is matched on `data[1] == 0x01` (the table's documented
///   second byte), not the source's `0x00` (which collides with double
///   tap and is flagged in spec.md as a likely copy-paste bug);
/// - "long-press held" is matched only on `0x17`; `0x18` is reserved for
///   "long-press release" so the two remain distinguishable under
///   first-match dispatch (the source's own table lists `0x18` for both).
pub fn install_standard_listeners<H>(table: &ListenerTable, handler: H)
where
    H: Fn(EventValue, Side) + Clone + Send + Sync + 'static,
{
    let register = |second_byte: u8, parse: fn(&[u8]) -> EventValue, handler: H| {
        table.register(
            move |data, _side| is_event(data, second_byte),
            move |data, _side| parse(data),
            move |value, side| handler(value, side),
        );
    };

    register(0x01, |_| EventValue::Tap(TapKind::Single), handler.clone());
    register(0x00, |_| EventValue::Tap(TapKind::Double), handler.clone());
    register(0x05, |_| EventValue::Tap(TapKind::Triple), handler.clone());
    register(0x17, |_| EventValue::LongPressHeld, handler.clone());
    register(0x18, |_| EventValue::LongPressRelease, handler.clone());
    register(0x11, |_| EventValue::BlePairedSuccess, handler.clone());
    register(0x08, |_| EventValue::CaseOpen, handler.clone());
    register(0x0A, |data| EventValue::GlassesBattery(parse_battery_percent(data)), handler.clone());
    register(0x0B, |_| EventValue::CaseClosed, handler.clone());
    register(0x0E, |_| EventValue::CaseCharging, handler.clone());
    register(0x0F, |data| EventValue::CaseBattery(parse_battery_percent(data)), handler);
}
