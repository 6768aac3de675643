//! leaseq-core
//!
//! Lease (visibility timeout) 方式のタスクキューサーバーの中核。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, SnapshotStore）
//! - **queue**: キューの状態（pending / in-flight, sweep, snapshot）
//! - **protocol**: 行ベースのテキストプロトコル（Command / Response）
//! - **app**: QueueService, Server, ReaperLoop
//! - **impls**: FileSnapshotStore, InMemorySnapshotStore
//! - **config**: ServerConfig（YAML + CLI 上書き）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod protocol;
pub mod queue;

pub use app::{QueueService, ReaperLoop, Server};
pub use config::{ConfigError, ServerConfig};
pub use domain::{LeaseqError, LeasedTask, QueueName, TaskId};
