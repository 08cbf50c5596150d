//! H.264 Baseline 解码器.
//!
//! [`DecoderSession`] 持有参数集表与参考帧, 按 NAL 单元驱动片解码;
//! 同时实现数据包级的 [`Decoder`] trait.

mod session;
mod slice;

pub use session::{DecodedPicture, DecoderSession, MbMode, ResidualPlane};

use avclite_core::AvcResult;

use crate::frame::Frame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `send_packet()` 送入 Annex B 数据
/// 2. 调用 `receive_frame()` 取出解码后的帧
/// 3. 送入空包 (flush) 以取出未完整的帧, 之后 `receive_frame()` 返回 `Eof`
pub trait Decoder: Send {
    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 送入一个压缩数据包进行解码
    ///
    /// 送入空包表示刷新 (flush).
    fn send_packet(&mut self, packet: &Packet) -> AvcResult<()>;

    /// 从解码器取出一帧解码数据
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(AvcError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(AvcError::Eof)`: 所有帧已取出
    fn receive_frame(&mut self) -> AvcResult<Frame>;

    /// 刷新解码器, 清空内部状态
    fn flush(&mut self);
}
