//! The two physical sides of the pair, and their connection lifecycle.

use strum_macros::Display;

/// One physical device of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Side {
    #[strum(to_string = "LEFT")]
    Left,
    #[strum(to_string = "RIGHT")]
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];
}

/// The target selector a [`crate::command::Command`] is submitted with.
///
/// `Both` is not a physical side: it means "dispatch to both sides'
/// registries and complete on the first matching response" (spec I1 is
/// what makes that well-defined without a shared request id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    One(Side),
    Both,
}

impl Target {
    /// The set of physical sides this target resolves to.
    pub fn sides(&self) -> &'static [Side] {
        match self {
            Target::One(Side::Left) => &[Side::Left],
            Target::One(Side::Right) => &[Side::Right],
            Target::Both => &Side::ALL,
        }
    }
}

/// Per-side connection lifecycle, driven by the transport.
///
/// `Disconnected -> Connecting -> Connected -> Initialized -> Disconnected`,
/// with any state able to fall back to `Disconnected` on a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Disconnected,
    Connecting,
    Connected,
    Initialized,
}

impl SideState {
    pub fn is_initialized(&self) -> bool {
        matches!(self, SideState::Initialized)
    }
}
