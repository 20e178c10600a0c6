//! 翻译编排
//!
//! 把可见性事件、手动触发和子树变更汇入同一个单元状态机，
//! 负责译文写回、膨胀重译、配置变更失效以及全部恢复。

pub mod dedup;
pub mod events;
pub mod render;
pub mod session;
pub mod state;

pub use dedup::{fingerprint, InFlightSet};
pub use events::{
    MutationFeed, MutationRecord, RecordingFeed, VisibilityEvent, VisibilityFeed, VisibilityOptions,
};
pub use session::{Session, SessionBuilder, SessionStatus};
pub use state::{transition, Phase, UnitEvent, UnitId};
