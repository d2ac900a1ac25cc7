//! Daily regime labeling.
//!
//! Turns canonical crisis records into a Normal / Crisis / Recovery label for
//! every observation date:
//! - Crisis: between the detected crisis start and end
//! - Normal: 30 days before a crisis start, and every unclaimed day
//! - Recovery: 30 days after a crisis end

pub mod labeler;
pub mod report;

pub use labeler::{changed_days, Regime, RegimeDay, RegimeLabeler, RegimeLabelerConfig};
pub use report::{CrisisPeriod, RegimeReport};
