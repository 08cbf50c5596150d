//! # avclite
//!
//! 纯 Rust 实现的 H.264 Baseline (CAVLC, 4:2:0, 逐行帧) 编解码器.
//!
//! # 快速开始
//!
//! ```rust
//! use avclite::codec::{DecoderSession, EncoderConfig, EncoderSession};
//! use avclite::core::Picture;
//!
//! let mut encoder = EncoderSession::new(EncoderConfig::default()).unwrap();
//! let picture = Picture::new(48, 32).unwrap();
//! let packet = encoder.encode_picture(&picture).unwrap();
//!
//! let mut decoder = DecoderSession::default();
//! let pictures = decoder.decode_annex_b(&packet.data).unwrap();
//! assert_eq!(pictures.len(), 1);
//! assert_eq!(pictures[0].picture.width(), 48);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `avclite-core` | 比特流读写, 错误类型, 图像平面 |
//! | `avclite-codec` | H.264 Baseline 编解码 |

/// 核心类型与工具
pub use avclite_core as core;

/// H.264 Baseline 编解码器
pub use avclite_codec as codec;

pub mod logging;

/// 获取 avclite 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
