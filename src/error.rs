//! 错误类型定义
//!
//! 缓存层只有两类错误：
//!
//! - 构造期的配置错误：[`Error`]，可恢复，通过 [`Result`] 返回
//! - 运行期的致命故障：[`CacheFault`]，不可恢复，直接 panic

use core::fmt;

use crate::types::{BlockKey, BufId};

/// 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 无效参数
    InvalidInput,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

/// 致命故障
///
/// 对应内核里的 `panic("bget: no buffers")` 一类调用。
/// 这些情况永远不会作为普通返回值向上传播：缓存检测到后立即记录日志并 panic，
/// panic 消息即为 `Display` 输出，测试可以据此区分故障类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFault {
    /// 完整遍历所有桶后仍找不到 `refcnt == 0` 的缓存块
    Exhausted {
        /// 请求的块
        key: BlockKey,
    },
    /// 引用计数将减到负数（重复释放 / 多余的 unpin）
    RefUnderflow {
        /// 出问题的缓存块
        id: BufId,
    },
    /// 被引用的缓存块不在其块号所映射的桶中
    Detached {
        /// 出问题的缓存块
        id: BufId,
        /// 调用方认为它持有的块
        key: BlockKey,
    },
}

impl CacheFault {
    /// 记录日志并终止当前执行上下文
    #[cold]
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        log::error!("[BCACHE] fatal: {}", self);
        panic!("{}", self)
    }
}

impl fmt::Display for CacheFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFault::Exhausted { key } => {
                write!(f, "bget: no buffers (requested {})", key)
            }
            CacheFault::RefUnderflow { id } => {
                write!(f, "brelse: refcnt underflow on buf {}", id)
            }
            CacheFault::Detached { id, key } => {
                write!(f, "brelse: buf {} holding {} not found in its bucket", id, key)
            }
        }
    }
}
