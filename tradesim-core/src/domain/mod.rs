//! Domain types shared by the simulator and the execution engine.

pub mod bar;
pub mod fill;
pub mod instrument;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, BarError};
pub use fill::{Fill, FillAction};
pub use instrument::{round_to_lot, Instrument, DEFAULT_LOT_SIZE};
pub use portfolio::Portfolio;
pub use position::{Position, PositionSide};
pub use signal::{Direction, OrderDescriptor, OrderKind, OrderSide, Signal, SignalError};
pub use trade::{trade_return, ExitReason, TradeRecord};
