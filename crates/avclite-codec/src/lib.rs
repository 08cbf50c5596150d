//! # avclite-codec
//!
//! H.264/AVC Baseline 编解码器的最小实现.
//!
//! ## 支持范围
//!
//! - **熵编码**: CAVLC (coeff_token, level, total_zeros, run_before)
//! - **宏块**: I_16x16 (四种亮度模式与四种色度模式), P_L0_16x16, P_Skip
//! - **变换**: 4x4 整数变换, 亮度 DC 4x4 Hadamard, 色度 DC 2x2 Hadamard
//! - **码流**: Annex B, SPS/PPS/片头/AUD 的解析与写出
//!
//! 不支持 CABAC, I_NxN, B 片, 环路滤波与分数像素插值.
//!
//! ## 使用示例
//!
//! ```rust
//! use avclite_codec::{DecoderSession, EncoderConfig, EncoderSession};
//! use avclite_core::Picture;
//!
//! let mut encoder = EncoderSession::new(EncoderConfig::default()).unwrap();
//! let packet = encoder.encode_picture(&Picture::new(32, 32).unwrap()).unwrap();
//!
//! let mut decoder = DecoderSession::default();
//! let pictures = decoder.decode_annex_b(&packet.data).unwrap();
//! assert_eq!(pictures.len(), 1);
//! assert_eq!(pictures[0].picture.width(), 32);
//! ```

pub mod aud;
pub mod cavlc;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod inter;
pub mod intra;
pub mod macroblock;
pub mod nal;
pub mod packet;
pub mod parameter_sets;
pub mod reconstruct;
pub mod slice_header;
pub mod tables;
pub mod transform;
pub mod zigzag;

// 重导出常用类型
pub use config::{DecoderConfig, EncoderConfig, RbspEndPolicy};
pub use decoder::{DecodedPicture, Decoder, DecoderSession, MbMode};
pub use encoder::{Encoder, EncoderSession};
pub use frame::{Frame, PictureType};
pub use nal::{AnnexBWriter, NalPayload, NalUnit, NalUnitType, split_annex_b};
pub use packet::Packet;
pub use parameter_sets::{ParameterSetTable, Pps, Sps};
pub use slice_header::{SliceHeader, SliceType};
