//! Ingestion 错误类型

use contracts::{ContractError, SourceTag};
use thiserror::Error;

/// Ingestion 错误
///
/// 只在构建阶段出现（客户端、密钥、数据源类型）；运行期的抓取失败
/// 通过 `FetchOutcome` 表达，不会以错误的形式向上传播。
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 并发闸门已关闭
    #[error("concurrency gate closed")]
    GateClosed,

    /// HTTP 客户端构建失败
    #[error("failed to build http client: {message}")]
    HttpClient {
        /// 错误消息
        message: String,
    },

    /// 缺少 API 密钥
    #[error("missing api key: environment variable {var} is not set")]
    MissingApiKey {
        /// 环境变量名
        var: String,
    },

    /// 数据源类型与通道不匹配
    #[error("source kind '{kind}' cannot serve the {tag} lane")]
    UnsupportedSource {
        /// 通道
        tag: SourceTag,
        /// 数据源类型
        kind: String,
    },

    /// 参数非法
    #[error("invalid source parameter '{key}': {message}")]
    InvalidParam {
        /// 参数名
        key: String,
        /// 错误消息
        message: String,
    },

    /// 契约错误
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
