//! # avclite-core
//!
//! avclite 核心库, 提供比特流读写、统一错误类型与 YUV 4:2:0 图像平面.
//!
//! 本 crate 不依赖任何编解码语义, 为 `avclite-codec` 提供底层基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod picture;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{AvcError, AvcResult};
pub use picture::{Picture, Plane};
