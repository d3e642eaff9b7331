//! Input shaping: bar alignment and per-bar signal tables.

pub mod align;
pub mod signals;

pub use align::{align_bars, AlignedBars};
pub use signals::SignalTable;
