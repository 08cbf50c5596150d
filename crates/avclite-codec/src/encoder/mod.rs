//! H.264 Baseline 编码器.
//!
//! IDR 帧全部使用 Intra16x16 宏块, P 帧使用零运动矢量的 P_L0_16x16 或 P_Skip.
//! 编码端的环内重建与解码端共用同一套重建函数.

mod macroblock;
mod session;
mod slice;

pub use session::EncoderSession;
pub use slice::{CodedSlice, SliceMb};

use avclite_core::AvcResult;

use crate::frame::Frame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. 调用 `send_frame()` 送入原始帧
/// 2. 调用 `receive_packet()` 取出压缩数据包 (一个访问单元)
/// 3. 送入 None 表示编码结束, 之后 `receive_packet()` 返回 `Eof`
pub trait Encoder: Send {
    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 送入一帧原始数据进行编码, `None` 表示刷新 (flush)
    fn send_frame(&mut self, frame: Option<&Frame>) -> AvcResult<()>;

    /// 从编码器取出一个压缩数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功取出一个数据包
    /// - `Err(AvcError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(AvcError::Eof)`: 所有数据包已取出
    fn receive_packet(&mut self) -> AvcResult<Packet>;

    /// 刷新编码器, 清空内部状态
    fn flush(&mut self);
}
