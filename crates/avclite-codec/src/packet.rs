//! 压缩数据包 (Packet).
//!
//! 一个 Packet 承载一段 Annex B 字节流, 通常是一个访问单元 (一帧) 的全部 NAL 单元.

use bytes::Bytes;

/// 未设置时间戳
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 压缩数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// Annex B 字节流
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 是否为关键帧 (含 IDR 片)
    pub is_keyframe: bool,
}

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            is_keyframe: false,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_packet() {
        let pkt = Packet::empty();
        assert!(pkt.is_empty());
        assert_eq!(pkt.pts, NOPTS_VALUE);
    }

    #[test]
    fn test_from_data() {
        let pkt = Packet::from_data(vec![0, 0, 1, 0x09, 0x10]);
        assert_eq!(pkt.size(), 5);
        assert!(!pkt.is_empty());
        assert!(!pkt.is_keyframe);
    }
}
