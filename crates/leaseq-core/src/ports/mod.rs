//! Ports - 抽象化レイヤー
//!
//! store のロジックが外部（時刻・ID・ディスク）に直接依存しないよう、
//! ここで trait として切り出します。テストでは差し替え可能です。

pub mod clock;
pub mod id_generator;
pub mod snapshot_store;

pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::snapshot_store::SnapshotStore;
