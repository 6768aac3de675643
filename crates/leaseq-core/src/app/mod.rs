//! App - アプリケーション層
//!
//! store・clock・snapshot store を組み合わせて、サーバーとしての振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **QueueService**: 1 リクエスト = sweep + 1 操作（ロックで直列化）
//! - **Server**: TCP listener と接続ごとの行ループ
//! - **ReaperLoop**: Lease 期限切れの定期回収（任意）

pub mod reaper_loop;
pub mod server;
pub mod service;

pub use self::reaper_loop::ReaperLoop;
pub use self::server::Server;
pub use self::service::QueueService;
