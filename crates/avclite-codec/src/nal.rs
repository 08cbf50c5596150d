//! H.264 NAL (Network Abstraction Layer) 单元封装与解析.
//!
//! # Annex B 格式
//!
//! Annex B 使用起始码 (start code) 分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 头部之后为 RBSP, 其中连续两个 0x00 后若出现 0x00..=0x03, 需要插入防竞争字节 0x03.

use std::io::Write;

use avclite_core::{AvcError, AvcResult, BitWriter};
use bytes::{BufMut, Bytes, BytesMut};
use log::{trace, warn};

/// 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// 非 IDR 图像切片
    Slice,
    /// 数据分区 A
    SliceDpa,
    /// 数据分区 B
    SliceDpb,
    /// 数据分区 C
    SliceDpc,
    /// IDR 图像切片
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 访问单元分隔符
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// 其他类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为 IDR 切片
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 解析后的 NAL 单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (0-3)
    pub ref_idc: u8,
    /// 去除防竞争字节后的 RBSP (不含头部字节)
    pub rbsp: Vec<u8>,
}

impl NalUnit {
    /// 从 NAL 数据 (含头部字节, 不含起始码) 解析
    pub fn parse(data: &[u8]) -> AvcResult<Self> {
        let Some(&header) = data.first() else {
            return Err(AvcError::BitstreamExhausted {
                needed: 8,
                remaining: 0,
            });
        };

        let forbidden = (header >> 7) & 1;
        if forbidden != 0 {
            return Err(AvcError::InvalidFieldValue(format!(
                "forbidden_zero_bit 非法, value={}",
                forbidden
            )));
        }

        Ok(Self {
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            rbsp: remove_emulation_prevention(&data[1..]),
        })
    }

    /// NAL 头部字节
    pub fn header_byte(&self) -> u8 {
        (self.ref_idc << 5) | self.nal_type.type_id()
    }
}

/// 可序列化为 NAL 单元 RBSP 的语法结构
pub trait NalPayload {
    /// 该结构对应的 NAL 单元类型
    fn nal_unit_type(&self) -> NalUnitType;

    /// 按语法顺序写入字段 (不含 rbsp_trailing_bits)
    fn serialize(&self, writer: &mut BitWriter) -> AvcResult<()>;

    /// 生成完整的 RBSP, 以 rbsp_trailing_bits 结尾
    fn to_rbsp(&self) -> AvcResult<Vec<u8>> {
        let mut bw = BitWriter::new();
        self.serialize(&mut bw)?;
        bw.write_rbsp_trailing_bits();
        Ok(bw.finish())
    }
}

/// Annex B 字节流写入器
///
/// 每个 NAL 单元写为 `00 00 00 01` + 头部字节 + 插入防竞争字节后的 RBSP.
#[derive(Debug, Default)]
pub struct AnnexBWriter {
    buf: BytesMut,
}

impl AnnexBWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 序列化一个语法结构并作为 NAL 单元追加
    pub fn write_payload(&mut self, ref_idc: u8, payload: &dyn NalPayload) -> AvcResult<()> {
        let rbsp = payload.to_rbsp()?;
        self.write_nal(payload.nal_unit_type(), ref_idc, &rbsp)
    }

    /// 追加一个 NAL 单元, `rbsp` 应已包含 rbsp_trailing_bits
    pub fn write_nal(&mut self, nal_type: NalUnitType, ref_idc: u8, rbsp: &[u8]) -> AvcResult<()> {
        if ref_idc > 3 {
            return Err(AvcError::InvalidArgument(format!(
                "nal_ref_idc 超出范围: {}",
                ref_idc
            )));
        }
        let escaped = add_emulation_prevention(rbsp);
        self.buf.reserve(START_CODE.len() + 1 + escaped.len());
        self.buf.put_slice(&START_CODE);
        self.buf.put_u8((ref_idc << 5) | nal_type.type_id());
        self.buf.put_slice(&escaped);
        trace!(
            "写入 NAL: type={}, ref_idc={}, rbsp={} 字节, 转义后={} 字节",
            nal_type,
            ref_idc,
            rbsp.len(),
            escaped.len()
        );
        Ok(())
    }

    /// 已写入的字节数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 取出已写入的数据, 写入器被清空
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// 把已写入的数据输出到 `out` 并清空写入器
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> AvcResult<()> {
        out.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 支持 3 字节 (00 00 01) 和 4 字节 (00 00 00 01) 起始码. 头部非法的单元被跳过.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit> {
    let offsets = find_start_codes(data);
    let mut nalus = Vec::new();

    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());

        let nal_start = skip_start_code(data, start);
        if nal_start >= end {
            continue;
        }

        // 去除尾部的 0 字节 (trailing_zero_8bits)
        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }

        if nal_end > nal_start {
            match NalUnit::parse(&data[nal_start..nal_end]) {
                Ok(nalu) => nalus.push(nalu),
                Err(e) => warn!("跳过非法 NAL 单元 (offset={}): {}", nal_start, e),
            }
        }
    }

    trace!("Annex B 分割: {} 字节, {} 个 NAL 单元", data.len(), nalus.len());
    nalus
}

// ============================================================
// 内部工具函数
// ============================================================

/// 查找所有起始码的位置
fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push(i);
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}

/// 跳过起始码, 返回 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&START_CODE) {
        pos + 4
    } else if data[pos..].starts_with(&START_CODE[1..]) {
        pos + 3
    } else {
        pos
    }
}

/// 移除防竞争字节 (`00 00 03` → `00 00`)
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3;
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}

/// 插入防竞争字节: 连续两个 0x00 之后的 0x00..=0x03 前插入 0x03
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64 + 1);
    let mut zeros = 0usize;

    for &b in rbsp {
        if zeros >= 2 && b <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0x00 { zeros + 1 } else { 0 };
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Raw(Vec<u8>);

    impl NalPayload for Raw {
        fn nal_unit_type(&self) -> NalUnitType {
            NalUnitType::Sei
        }

        fn serialize(&self, writer: &mut BitWriter) -> AvcResult<()> {
            writer.write_bytes(&self.0);
            Ok(())
        }
    }

    #[test]
    fn test_nal_type_type_id() {
        for id in 0..=31 {
            assert_eq!(NalUnitType::from_type_id(id).type_id(), id);
        }
        assert_eq!(NalUnitType::from_type_id(7), NalUnitType::Sps);
        assert_eq!(NalUnitType::from_type_id(20), NalUnitType::Unknown(20));
    }

    #[test]
    fn test_nal_type_property() {
        assert!(NalUnitType::SliceIdr.is_vcl());
        assert!(NalUnitType::SliceIdr.is_idr());
        assert!(NalUnitType::Slice.is_vcl());
        assert!(!NalUnitType::Slice.is_idr());
        assert!(!NalUnitType::Sps.is_vcl());
        assert!(!NalUnitType::Aud.is_vcl());
    }

    #[test]
    fn test_nal_unit_parse() {
        // 0b0_11_00111: ref_idc=3, type=7
        let nalu = NalUnit::parse(&[0x67, 0x42, 0x00, 0x00, 0x03, 0x01, 0xAA]).unwrap();
        assert_eq!(nalu.nal_type, NalUnitType::Sps);
        assert_eq!(nalu.ref_idc, 3);
        assert_eq!(nalu.rbsp, vec![0x42, 0x00, 0x00, 0x01, 0xAA]);
        assert_eq!(nalu.header_byte(), 0x67);
    }

    #[test]
    fn test_nal_unit_parse_errors() {
        assert!(matches!(
            NalUnit::parse(&[]),
            Err(AvcError::BitstreamExhausted { .. })
        ));
        let err = NalUnit::parse(&[0xE7]).unwrap_err();
        assert!(format!("{err}").contains("forbidden_zero_bit"));
    }

    #[test]
    fn test_annex_b_split_mixed_start_codes() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // SPS (4 字节起始码)
            0x00, 0x00, 0x01, 0x68, 0xBB, 0x00, // PPS (3 字节起始码, 尾随 0)
            0x00, 0x00, 0x01, 0x65, 0xDD, 0xEE, // IDR
        ];
        let nalus = split_annex_b(&data);
        assert_eq!(nalus.len(), 3);
        assert_eq!(nalus[0].nal_type, NalUnitType::Sps);
        assert_eq!(nalus[1].nal_type, NalUnitType::Pps);
        assert_eq!(nalus[1].rbsp, vec![0xBB]);
        assert_eq!(nalus[2].nal_type, NalUnitType::SliceIdr);
    }

    #[test]
    fn test_annex_b_split_skips_forbidden_bit() {
        let data = [0x00, 0x00, 0x01, 0xE7, 0x11, 0x00, 0x00, 0x01, 0x68, 0x22];
        let nalus = split_annex_b(&data);
        assert_eq!(nalus.len(), 1);
        assert_eq!(nalus[0].nal_type, NalUnitType::Pps);
    }

    #[test]
    fn test_emulation_prevention() {
        assert_eq!(
            add_emulation_prevention(&[0x00, 0x00, 0x01]),
            vec![0x00, 0x00, 0x03, 0x01]
        );
        assert_eq!(
            add_emulation_prevention(&[0x00, 0x00, 0x00, 0x00]),
            vec![0x00, 0x00, 0x03, 0x00, 0x00]
        );
        assert_eq!(
            add_emulation_prevention(&[0x00, 0x00, 0x04]),
            vec![0x00, 0x00, 0x04]
        );
        let raw = [0x01, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x02, 0x80];
        assert_eq!(remove_emulation_prevention(&add_emulation_prevention(&raw)), raw);
    }

    #[test]
    fn test_emulation_prevention_remove() {
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01];
        assert_eq!(
            remove_emulation_prevention(&data),
            vec![0x00, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_annex_b_writer() {
        let mut writer = AnnexBWriter::new();
        writer
            .write_payload(0, &Raw(vec![0x00, 0x00, 0x01]))
            .unwrap();
        writer
            .write_nal(NalUnitType::Pps, 3, &[0xCE, 0x80])
            .unwrap();
        assert!(writer.write_nal(NalUnitType::Pps, 4, &[0x80]).is_err());

        let bytes = writer.take();
        assert!(writer.is_empty());
        assert_eq!(
            &bytes[..9],
            &[0x00, 0x00, 0x00, 0x01, 0x06, 0x00, 0x00, 0x03, 0x01]
        );

        let nalus = split_annex_b(&bytes);
        assert_eq!(nalus.len(), 2);
        assert_eq!(nalus[0].nal_type, NalUnitType::Sei);
        assert_eq!(nalus[0].rbsp, vec![0x00, 0x00, 0x01, 0x80]);
        assert_eq!(nalus[1].ref_idc, 3);
        assert_eq!(nalus[1].rbsp, vec![0xCE, 0x80]);
    }

    #[test]
    fn test_annex_b_writer_flush_to() {
        let mut writer = AnnexBWriter::new();
        writer.write_nal(NalUnitType::Aud, 0, &[0xF0]).unwrap();
        let mut out = Vec::new();
        writer.flush_to(&mut out).unwrap();
        assert_eq!(out, vec![0x00, 0x00, 0x00, 0x01, 0x09, 0xF0]);
        assert_eq!(writer.len(), 0);
    }
}
