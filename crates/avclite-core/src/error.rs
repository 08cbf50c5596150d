//! 统一错误类型定义.
//!
//! 所有 avclite crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// avclite 统一错误类型
#[derive(Debug, Error)]
pub enum AvcError {
    /// 读取越过缓冲区末尾
    #[error("比特流耗尽: 需要 {needed} 位, 剩余 {remaining} 位")]
    BitstreamExhausted { needed: usize, remaining: usize },

    /// 在码表最大码长内未匹配到任何码字
    #[error("无效的变长码: {0}")]
    MalformedVlcCode(String),

    /// 码流使用了不支持的特性 (CABAC, B 片, I_PCM 等)
    #[error("不支持的特性: {0}")]
    UnsupportedFeature(String),

    /// 语法元素取值非法
    #[error("无效的字段值: {0}")]
    InvalidFieldValue(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl AvcError {
    /// 是否为致命的码流错误 (解码单元必须整体丢弃)
    pub fn is_bitstream_error(&self) -> bool {
        matches!(
            self,
            Self::BitstreamExhausted { .. } | Self::MalformedVlcCode(_) | Self::InvalidFieldValue(_)
        )
    }
}

/// avclite 统一 Result 类型
pub type AvcResult<T> = Result<T, AvcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AvcError::BitstreamExhausted {
            needed: 8,
            remaining: 3,
        };
        assert_eq!(err.to_string(), "比特流耗尽: 需要 8 位, 剩余 3 位");
        assert!(err.is_bitstream_error());
        assert!(!AvcError::UnsupportedFeature("CABAC".into()).is_bitstream_error());
    }
}
