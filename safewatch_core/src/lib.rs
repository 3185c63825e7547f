mod address;
mod aggregate;
mod chain;
mod chart;
mod error;
mod event;
mod granularity;
mod record;

pub use address::*;
pub use aggregate::*;
pub use chain::*;
pub use chart::*;
pub use error::*;
pub use event::*;
pub use granularity::*;
pub use record::*;
