//! Ports - 抽象化レイヤー
//!
//! Queue logic depends only on these traits; `impls` provides the concrete
//! adapters.

pub mod clock;
pub mod id_generator;
pub mod status_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::status_store::StatusStore;
