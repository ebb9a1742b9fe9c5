pub mod catalogue;
pub mod codec;
pub mod command;
pub mod crc;
pub mod engine;
pub mod error;
pub mod events;
pub mod listener;
pub mod registry;
pub mod side;
pub mod transport;

pub use catalogue::{build, Operation};
pub use codec::{DashboardMode, DashboardSubmode, DecodedValue, HostTag, JsonConfigKind};
pub use command::{Command, CommandCompletion, CommandId, Completion, DecoderFn};
pub use engine::{ProtocolEngine, SubmittedCommand};
pub use error::EngineError;
pub use events::{install_standard_listeners, parse_battery_percent};
pub use listener::{EventValue, ListenerId, ListenerTable, TapKind};
pub use side::{Side, SideState, Target};
pub use transport::Transport;
