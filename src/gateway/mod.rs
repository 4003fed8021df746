//! 网关层：每条客人消息进入系统后的前半程
//!
//! - **facts**：从自由文本中抽取客人事实（姓名、房间号、饮食偏好、维修问题）
//! - **intent**：加权关键词 + 直达短语 + 换话题启发式，决定由哪个部门接待
//! - **session / session_store**：会话状态与按会话加锁的内存存储
//! - **sweeper**：空闲会话周期清扫

pub mod facts;
pub mod intent;
mod session;
mod session_store;
mod sweeper;

pub use facts::{FactSet, IssueCategory, MaintenanceIssue};
pub use intent::{route, RoutingDecision, RoutingRule};
pub use session::{generate_session_id, Session, SessionId, SessionSummary};
pub use session_store::{MemorySessionStore, SessionSlot, SessionStore};
pub use sweeper::SessionSweeper;
