//! Pure computation engines: FIFO trade reconstruction and regime labeling.
//!
//! Nothing in this module performs I/O; both engines are deterministic
//! functions over in-memory slices.

pub mod fifo;
pub mod regime;

pub use fifo::{reconstruct_trades, ReconstructedTrade, QTY_EPSILON};
pub use regime::{label_bars, RegimePoint};
