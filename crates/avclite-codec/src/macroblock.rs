//! 宏块级语法模型.
//!
//! 包含邻居可用性, I/P 片的 mb_type 映射, coded_block_pattern 的 `me(v)` 映射,
//! 以及 CAVLC 使用的 nC 上下文网格.

use avclite_core::{AvcError, AvcResult, BitReader, BitWriter};
use bitflags::bitflags;

use crate::cavlc::{ResidualKind, decode_block, encode_block};
use crate::inter::MotionVector;
use crate::intra::{Intra16x16Mode, IntraChromaMode};
use crate::slice_header::SliceType;
use crate::tables::{CBP_INTER, CBP_INTRA};
use crate::transform::{Block2x2, Block4x4};
use crate::zigzag::zigzag_4x4;

bitflags! {
    /// 当前宏块的相邻宏块可用性 (同一片内且已解码)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Neighbors: u8 {
        /// 左侧宏块 (A)
        const LEFT      = 1 << 0;
        /// 上方宏块 (B)
        const TOP       = 1 << 1;
        /// 右上宏块 (C)
        const TOP_RIGHT = 1 << 2;
        /// 左上宏块 (D)
        const TOP_LEFT  = 1 << 3;
    }
}

impl Neighbors {
    /// 按光栅顺序计算宏块 `mb_addr` 的邻居可用性
    ///
    /// 地址小于 `first_mb_in_slice` 的宏块属于其他片, 视为不可用.
    pub fn for_macroblock(mb_addr: usize, mb_width: usize, first_mb_in_slice: usize) -> Self {
        let mb_x = mb_addr % mb_width;
        let mb_y = mb_addr / mb_width;
        let in_slice = |addr: usize| addr >= first_mb_in_slice;

        let mut flags = Self::empty();
        if mb_x > 0 && in_slice(mb_addr - 1) {
            flags |= Self::LEFT;
        }
        if mb_y > 0 {
            if in_slice(mb_addr - mb_width) {
                flags |= Self::TOP;
            }
            if mb_x + 1 < mb_width && in_slice(mb_addr + 1 - mb_width) {
                flags |= Self::TOP_RIGHT;
            }
            if mb_x > 0 && in_slice(mb_addr - mb_width - 1) {
                flags |= Self::TOP_LEFT;
            }
        }
        flags
    }
}

// ============================================================
// 宏块类型
// ============================================================

/// 宏块分区预测模式 (MbPartPredMode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbPartPredMode {
    /// Intra_16x16
    Intra16x16,
    /// 单向 L0 预测
    PredL0,
}

/// 已支持的宏块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbType {
    /// I_16x16_<pred>_<cbpChroma>_<cbpLuma>
    I16x16 {
        pred_mode: Intra16x16Mode,
        cbp_luma: u8,
        cbp_chroma: u8,
    },
    /// P_L0_16x16
    PL016x16,
    /// P_Skip (由 mb_skip_run 推导)
    PSkip,
}

impl MbType {
    /// I 片 mb_type 映射
    pub fn from_i_slice(mb_type: u32) -> AvcResult<Self> {
        match mb_type {
            0 => Err(AvcError::UnsupportedFeature("I_NxN 宏块".into())),
            1..=24 => {
                let t = mb_type - 1;
                Ok(Self::I16x16 {
                    pred_mode: Intra16x16Mode::try_from(t % 4)?,
                    cbp_chroma: ((t / 4) % 3) as u8,
                    cbp_luma: if mb_type >= 13 { 15 } else { 0 },
                })
            }
            25 => Err(AvcError::UnsupportedFeature("I_PCM 宏块".into())),
            _ => Err(AvcError::InvalidFieldValue(format!(
                "I 片 mb_type 超出范围: {}",
                mb_type,
            ))),
        }
    }

    /// P 片 mb_type 映射, 5 及以上为帧内宏块
    pub fn from_p_slice(mb_type: u32) -> AvcResult<Self> {
        match mb_type {
            0 => Ok(Self::PL016x16),
            1..=4 => Err(AvcError::UnsupportedFeature(format!(
                "P 宏块子分区, mb_type={}",
                mb_type,
            ))),
            5..=30 => Self::from_i_slice(mb_type - 5),
            _ => Err(AvcError::InvalidFieldValue(format!(
                "P 片 mb_type 超出范围: {}",
                mb_type,
            ))),
        }
    }

    /// I 片中的 mb_type 码号 (仅帧内宏块)
    pub fn i_slice_code(&self) -> Option<u32> {
        match *self {
            Self::I16x16 {
                pred_mode,
                cbp_luma,
                cbp_chroma,
            } => Some(
                1 + pred_mode as u32
                    + 4 * u32::from(cbp_chroma)
                    + if cbp_luma == 15 { 12 } else { 0 },
            ),
            _ => None,
        }
    }

    /// P 片中的 mb_type 码号 (P_Skip 不编码 mb_type)
    pub fn p_slice_code(&self) -> Option<u32> {
        match self {
            Self::PL016x16 => Some(0),
            Self::PSkip => None,
            intra => intra.i_slice_code().map(|code| code + 5),
        }
    }

    /// 分区预测模式
    pub fn pred_mode(&self) -> MbPartPredMode {
        match self {
            Self::I16x16 { .. } => MbPartPredMode::Intra16x16,
            Self::PL016x16 | Self::PSkip => MbPartPredMode::PredL0,
        }
    }

    /// 是否为帧内宏块
    pub fn is_intra(&self) -> bool {
        self.pred_mode() == MbPartPredMode::Intra16x16
    }
}

// ============================================================
// coded_block_pattern
// ============================================================

/// 由 `me(v)` 码号得到 coded_block_pattern
pub fn decode_cbp(code_num: u32, intra: bool) -> AvcResult<u8> {
    let table = if intra { &CBP_INTRA } else { &CBP_INTER };
    table.get(code_num as usize).copied().ok_or_else(|| {
        AvcError::InvalidFieldValue(format!("coded_block_pattern 码号超出范围: {}", code_num))
    })
}

/// 由 coded_block_pattern 得到 `me(v)` 码号
pub fn encode_cbp(cbp: u8, intra: bool) -> AvcResult<u32> {
    let table = if intra { &CBP_INTRA } else { &CBP_INTER };
    table
        .iter()
        .position(|&v| v == cbp)
        .map(|pos| pos as u32)
        .ok_or_else(|| AvcError::InvalidArgument(format!("coded_block_pattern 无效: {}", cbp)))
}

/// 按 mb_qp_delta 更新 QP: `(prev + delta + 52) % 52`
pub fn apply_qp_delta(prev_qp: i32, mb_qp_delta: i32) -> AvcResult<i32> {
    if !(-26..=25).contains(&mb_qp_delta) {
        return Err(AvcError::InvalidFieldValue(format!(
            "mb_qp_delta 超出范围 [-26, 25]: {}",
            mb_qp_delta,
        )));
    }
    Ok((prev_qp + mb_qp_delta + 52) % 52)
}

// ============================================================
// 块索引
// ============================================================

/// luma4x4BlkIdx 在宏块内的像素偏移 (x, y)
pub const LUMA4X4_BLOCK_OFFSET: [(usize, usize); 16] = {
    let mut out = [(0usize, 0usize); 16];
    let mut b = 0;
    while b < 16 {
        out[b] = (
            ((b / 4) % 2) * 8 + ((b % 4) % 2) * 4,
            ((b / 4) / 2) * 8 + ((b % 4) / 2) * 4,
        );
        b += 1;
    }
    out
};

/// 色度 4x4 块在 8x8 宏块色度内的像素偏移 (x, y)
pub const CHROMA4X4_BLOCK_OFFSET: [(usize, usize); 4] = [(0, 0), (4, 0), (0, 4), (4, 4)];

// ============================================================
// nC 上下文
// ============================================================

/// nC 网格平面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcPlane {
    /// 亮度, 每宏块 4x4 个块
    Luma,
    /// Cb AC, 每宏块 2x2 个块
    Cb,
    /// Cr AC, 每宏块 2x2 个块
    Cr,
}

/// 按 4x4 块记录已解码块的 TotalCoeff, 生命周期为一个片
///
/// `None` 表示该块尚未在本片中解码 (不可用).
#[derive(Debug, Clone)]
pub struct NcGrid {
    luma: Vec<Option<u8>>,
    cb: Vec<Option<u8>>,
    cr: Vec<Option<u8>>,
    luma_stride: usize,
    chroma_stride: usize,
}

impl NcGrid {
    /// 为 mb_width x mb_height 个宏块的图像创建网格
    pub fn new(mb_width: usize, mb_height: usize) -> Self {
        let luma_stride = mb_width * 4;
        let chroma_stride = mb_width * 2;
        Self {
            luma: vec![None; luma_stride * mb_height * 4],
            cb: vec![None; chroma_stride * mb_height * 2],
            cr: vec![None; chroma_stride * mb_height * 2],
            luma_stride,
            chroma_stride,
        }
    }

    fn plane(&self, plane: NcPlane) -> (&[Option<u8>], usize) {
        match plane {
            NcPlane::Luma => (&self.luma, self.luma_stride),
            NcPlane::Cb => (&self.cb, self.chroma_stride),
            NcPlane::Cr => (&self.cr, self.chroma_stride),
        }
    }

    fn get(&self, plane: NcPlane, bx: isize, by: isize) -> Option<u8> {
        let (data, stride) = self.plane(plane);
        if bx < 0 || by < 0 || bx as usize >= stride {
            return None;
        }
        data.get(by as usize * stride + bx as usize).copied().flatten()
    }

    /// 计算 (bx, by) 处块的 nC (以该平面的 4x4 块为单位)
    ///
    /// 左侧 nA 与上方 nB 均可用时为 `(nA + nB + 1) >> 1`, 仅一个可用时取该值, 均不可用为 0.
    pub fn nc(&self, plane: NcPlane, bx: usize, by: usize) -> i32 {
        let left = self.get(plane, bx as isize - 1, by as isize);
        let top = self.get(plane, bx as isize, by as isize - 1);
        match (left, top) {
            (Some(a), Some(b)) => (i32::from(a) + i32::from(b) + 1) >> 1,
            (Some(a), None) => i32::from(a),
            (None, Some(b)) => i32::from(b),
            (None, None) => 0,
        }
    }

    /// 记录 (bx, by) 处块的 TotalCoeff
    pub fn set(&mut self, plane: NcPlane, bx: usize, by: usize, total_coeff: u8) {
        let (data, stride) = match plane {
            NcPlane::Luma => (&mut self.luma, self.luma_stride),
            NcPlane::Cb => (&mut self.cb, self.chroma_stride),
            NcPlane::Cr => (&mut self.cr, self.chroma_stride),
        };
        data[by * stride + bx] = Some(total_coeff);
    }

    /// 把整个宏块的所有块记为给定值 (用于 P_Skip 等无残差宏块)
    pub fn fill_macroblock(&mut self, mb_x: usize, mb_y: usize, total_coeff: u8) {
        for by in 0..4 {
            for bx in 0..4 {
                self.set(NcPlane::Luma, mb_x * 4 + bx, mb_y * 4 + by, total_coeff);
            }
        }
        for plane in [NcPlane::Cb, NcPlane::Cr] {
            for by in 0..2 {
                for bx in 0..2 {
                    self.set(plane, mb_x * 2 + bx, mb_y * 2 + by, total_coeff);
                }
            }
        }
    }

    /// 清空全部记录 (新片开始)
    pub fn reset(&mut self) {
        self.luma.fill(None);
        self.cb.fill(None);
        self.cr.fill(None);
    }
}

// ============================================================
// 残差与宏块层
// ============================================================

/// 一个宏块的残差系数级 (频域, 已反扫描)
///
/// Intra16x16 与色度 AC 块的 `[0][0]` 恒为 0, 其 DC 分别放在 `luma_dc` / `chroma_dc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MbResidual {
    /// Intra16x16 亮度 DC (Hadamard 域)
    pub luma_dc: Block4x4,
    /// 亮度 4x4 块, 按 luma4x4BlkIdx 索引
    pub luma: [Block4x4; 16],
    /// Cb / Cr 的 2x2 DC
    pub chroma_dc: [Block2x2; 2],
    /// Cb / Cr 的 AC 块, 按 chroma4x4BlkIdx 索引
    pub chroma_ac: [[Block4x4; 4]; 2],
}

impl MbResidual {
    /// 全零残差
    pub const ZERO: Self = Self {
        luma_dc: [[0; 4]; 4],
        luma: [[[0; 4]; 4]; 16],
        chroma_dc: [[[0; 2]; 2]; 2],
        chroma_ac: [[[[0; 4]; 4]; 4]; 2],
    };

    /// 是否所有系数都为零
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// macroblock_layer() 语法结构 (不含 P_Skip, 跳过宏块由 mb_skip_run 表达)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroblockLayer {
    pub mb_type: MbType,
    pub intra_chroma_pred_mode: IntraChromaMode,
    pub ref_idx_l0: u32,
    pub mvd_l0: MotionVector,
    /// 帧间宏块显式编码; Intra16x16 由 mb_type 推导
    pub coded_block_pattern: u8,
    pub mb_qp_delta: i32,
    pub residual: MbResidual,
}

impl MacroblockLayer {
    /// (CodedBlockPatternLuma, CodedBlockPatternChroma)
    pub fn cbp(&self) -> (u8, u8) {
        match self.mb_type {
            MbType::I16x16 {
                cbp_luma,
                cbp_chroma,
                ..
            } => (cbp_luma, cbp_chroma),
            _ => (self.coded_block_pattern & 0x0f, self.coded_block_pattern >> 4),
        }
    }

    /// 读取一个宏块层, 并用各块的 TotalCoeff 更新 nC 网格
    pub fn read(
        br: &mut BitReader,
        slice_type: SliceType,
        num_ref_idx_l0_active_minus1: u32,
        nc: &mut NcGrid,
        mb_x: usize,
        mb_y: usize,
    ) -> AvcResult<Self> {
        let code = br.read_ue()?;
        let mb_type = match slice_type {
            SliceType::I => MbType::from_i_slice(code)?,
            SliceType::P => MbType::from_p_slice(code)?,
            other => {
                return Err(AvcError::UnsupportedFeature(format!(
                    "片类型 {} 中的宏块",
                    other
                )));
            }
        };

        let mut mb = Self {
            mb_type,
            intra_chroma_pred_mode: IntraChromaMode::Dc,
            ref_idx_l0: 0,
            mvd_l0: MotionVector::ZERO,
            coded_block_pattern: 0,
            mb_qp_delta: 0,
            residual: MbResidual::ZERO,
        };

        match mb_type {
            MbType::I16x16 {
                cbp_luma,
                cbp_chroma,
                ..
            } => {
                mb.intra_chroma_pred_mode = IntraChromaMode::try_from(br.read_ue()?)?;
                mb.coded_block_pattern = (cbp_chroma << 4) | cbp_luma;
            }
            MbType::PL016x16 => {
                if num_ref_idx_l0_active_minus1 > 0 {
                    mb.ref_idx_l0 = br.read_te(num_ref_idx_l0_active_minus1)?;
                    if mb.ref_idx_l0 > 0 {
                        return Err(AvcError::UnsupportedFeature(format!(
                            "多参考帧, ref_idx_l0={}",
                            mb.ref_idx_l0
                        )));
                    }
                }
                let x = br.read_se()?;
                let y = br.read_se()?;
                mb.mvd_l0 = MotionVector::new(x, y);
                mb.coded_block_pattern = decode_cbp(br.read_ue()?, false)?;
            }
            MbType::PSkip => {
                return Err(AvcError::InvalidFieldValue(
                    "P_Skip 不能出现在 macroblock_layer 中".into(),
                ));
            }
        }

        let (cbp_luma, cbp_chroma) = mb.cbp();
        if mb_type.is_intra() || cbp_luma > 0 || cbp_chroma > 0 {
            mb.mb_qp_delta = br.read_se()?;
            mb.residual = read_residual(br, mb_type, cbp_luma, cbp_chroma, nc, mb_x, mb_y)?;
        } else {
            nc.fill_macroblock(mb_x, mb_y, 0);
        }
        Ok(mb)
    }

    /// 写出宏块层, 与 [`MacroblockLayer::read`] 对称
    pub fn write(
        &self,
        bw: &mut BitWriter,
        slice_type: SliceType,
        num_ref_idx_l0_active_minus1: u32,
        nc: &mut NcGrid,
        mb_x: usize,
        mb_y: usize,
    ) -> AvcResult<()> {
        let code = match slice_type {
            SliceType::I => self.mb_type.i_slice_code(),
            SliceType::P => self.mb_type.p_slice_code(),
            _ => None,
        }
        .ok_or_else(|| {
            AvcError::InvalidArgument(format!(
                "宏块类型 {:?} 不能写入 {} 片",
                self.mb_type, slice_type
            ))
        })?;
        bw.write_ue(code);

        let (cbp_luma, cbp_chroma) = self.cbp();
        if self.mb_type.is_intra() {
            bw.write_ue(self.intra_chroma_pred_mode as u32);
        } else {
            if num_ref_idx_l0_active_minus1 > 0 {
                bw.write_te(self.ref_idx_l0, num_ref_idx_l0_active_minus1);
            }
            bw.write_se(self.mvd_l0.x);
            bw.write_se(self.mvd_l0.y);
            bw.write_ue(encode_cbp(self.coded_block_pattern, false)?);
        }

        if self.mb_type.is_intra() || cbp_luma > 0 || cbp_chroma > 0 {
            if !(-26..=25).contains(&self.mb_qp_delta) {
                return Err(AvcError::InvalidArgument(format!(
                    "mb_qp_delta 超出范围: {}",
                    self.mb_qp_delta
                )));
            }
            bw.write_se(self.mb_qp_delta);
            write_residual(bw, self, cbp_luma, cbp_chroma, nc, mb_x, mb_y)?;
        } else {
            nc.fill_macroblock(mb_x, mb_y, 0);
        }
        Ok(())
    }
}

fn luma_block_pos(blk: usize, mb_x: usize, mb_y: usize) -> (usize, usize) {
    let (x, y) = LUMA4X4_BLOCK_OFFSET[blk];
    (mb_x * 4 + x / 4, mb_y * 4 + y / 4)
}

fn chroma_block_pos(blk: usize, mb_x: usize, mb_y: usize) -> (usize, usize) {
    let (x, y) = CHROMA4X4_BLOCK_OFFSET[blk];
    (mb_x * 2 + x / 4, mb_y * 2 + y / 4)
}

const CHROMA_PLANES: [NcPlane; 2] = [NcPlane::Cb, NcPlane::Cr];

fn read_residual(
    br: &mut BitReader,
    mb_type: MbType,
    cbp_luma: u8,
    cbp_chroma: u8,
    nc: &mut NcGrid,
    mb_x: usize,
    mb_y: usize,
) -> AvcResult<MbResidual> {
    let mut res = MbResidual::ZERO;
    let intra = mb_type.is_intra();

    if intra {
        let n = nc.nc(NcPlane::Luma, mb_x * 4, mb_y * 4);
        res.luma_dc = decode_block(br, n, ResidualKind::LumaDc.max_coeff())?.to_block_4x4();
    }
    let luma_kind = if intra {
        ResidualKind::LumaAc
    } else {
        ResidualKind::Luma4x4
    };
    for blk in 0..16 {
        let (bx, by) = luma_block_pos(blk, mb_x, mb_y);
        if cbp_luma & (1 << (blk / 4)) != 0 {
            let n = nc.nc(NcPlane::Luma, bx, by);
            let block = decode_block(br, n, luma_kind.max_coeff())?;
            res.luma[blk] = block.to_block_4x4();
            nc.set(NcPlane::Luma, bx, by, block.total_coeff as u8);
        } else {
            nc.set(NcPlane::Luma, bx, by, 0);
        }
    }

    if cbp_chroma > 0 {
        for dc in res.chroma_dc.iter_mut() {
            *dc = decode_block(br, -1, ResidualKind::ChromaDc.max_coeff())?.to_block_2x2();
        }
    }
    for (c, plane) in CHROMA_PLANES.into_iter().enumerate() {
        for blk in 0..4 {
            let (bx, by) = chroma_block_pos(blk, mb_x, mb_y);
            if cbp_chroma == 2 {
                let n = nc.nc(plane, bx, by);
                let block = decode_block(br, n, ResidualKind::ChromaAc.max_coeff())?;
                res.chroma_ac[c][blk] = block.to_block_4x4();
                nc.set(plane, bx, by, block.total_coeff as u8);
            } else {
                nc.set(plane, bx, by, 0);
            }
        }
    }
    Ok(res)
}

fn write_residual(
    bw: &mut BitWriter,
    mb: &MacroblockLayer,
    cbp_luma: u8,
    cbp_chroma: u8,
    nc: &mut NcGrid,
    mb_x: usize,
    mb_y: usize,
) -> AvcResult<()> {
    let res = &mb.residual;
    let intra = mb.mb_type.is_intra();

    if intra {
        let n = nc.nc(NcPlane::Luma, mb_x * 4, mb_y * 4);
        encode_block(bw, n, &zigzag_4x4(&res.luma_dc))?;
    }
    for blk in 0..16 {
        let (bx, by) = luma_block_pos(blk, mb_x, mb_y);
        if cbp_luma & (1 << (blk / 4)) != 0 {
            let n = nc.nc(NcPlane::Luma, bx, by);
            let scan = zigzag_4x4(&res.luma[blk]);
            let scan = if intra { &scan[1..] } else { &scan[..] };
            let total_coeff = encode_block(bw, n, scan)?;
            nc.set(NcPlane::Luma, bx, by, total_coeff as u8);
        } else {
            nc.set(NcPlane::Luma, bx, by, 0);
        }
    }

    if cbp_chroma > 0 {
        for dc in &res.chroma_dc {
            encode_block(bw, -1, &[dc[0][0], dc[0][1], dc[1][0], dc[1][1]])?;
        }
    }
    for (c, plane) in CHROMA_PLANES.into_iter().enumerate() {
        for blk in 0..4 {
            let (bx, by) = chroma_block_pos(blk, mb_x, mb_y);
            if cbp_chroma == 2 {
                let n = nc.nc(plane, bx, by);
                let scan = zigzag_4x4(&res.chroma_ac[c][blk]);
                let total_coeff = encode_block(bw, n, &scan[1..])?;
                nc.set(plane, bx, by, total_coeff as u8);
            } else {
                nc.set(plane, bx, by, 0);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_raster() {
        // 3x2 宏块
        assert_eq!(Neighbors::for_macroblock(0, 3, 0), Neighbors::empty());
        assert_eq!(Neighbors::for_macroblock(1, 3, 0), Neighbors::LEFT);
        assert_eq!(
            Neighbors::for_macroblock(3, 3, 0),
            Neighbors::TOP | Neighbors::TOP_RIGHT
        );
        assert_eq!(Neighbors::for_macroblock(4, 3, 0), Neighbors::all());
        assert_eq!(
            Neighbors::for_macroblock(5, 3, 0),
            Neighbors::LEFT | Neighbors::TOP | Neighbors::TOP_LEFT
        );
        // 片从地址 4 开始: 地址 5 只有左邻居可用
        assert_eq!(Neighbors::for_macroblock(5, 3, 4), Neighbors::LEFT);
    }

    #[test]
    fn test_i_slice_mb_types() {
        assert_eq!(
            MbType::from_i_slice(1).unwrap(),
            MbType::I16x16 {
                pred_mode: Intra16x16Mode::Vertical,
                cbp_luma: 0,
                cbp_chroma: 0
            }
        );
        assert_eq!(
            MbType::from_i_slice(24).unwrap(),
            MbType::I16x16 {
                pred_mode: Intra16x16Mode::Plane,
                cbp_luma: 15,
                cbp_chroma: 2
            }
        );
        assert!(matches!(
            MbType::from_i_slice(0),
            Err(AvcError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            MbType::from_i_slice(25),
            Err(AvcError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            MbType::from_i_slice(26),
            Err(AvcError::InvalidFieldValue(_))
        ));
    }

    #[test]
    fn test_mb_type_codes_roundtrip() {
        for code in 1..=24 {
            let mb = MbType::from_i_slice(code).unwrap();
            assert_eq!(mb.i_slice_code(), Some(code));
            assert_eq!(mb.p_slice_code(), Some(code + 5));
            assert_eq!(MbType::from_p_slice(code + 5).unwrap(), mb);
        }
        assert_eq!(MbType::from_p_slice(0).unwrap(), MbType::PL016x16);
        assert!(matches!(
            MbType::from_p_slice(3),
            Err(AvcError::UnsupportedFeature(_))
        ));
        assert_eq!(MbType::PSkip.p_slice_code(), None);
        assert!(!MbType::PSkip.is_intra());
    }

    #[test]
    fn test_cbp_mapping() {
        assert_eq!(decode_cbp(0, true).unwrap(), 47);
        assert_eq!(decode_cbp(0, false).unwrap(), 0);
        assert_eq!(decode_cbp(3, true).unwrap(), 0);
        for cbp in 0..48u8 {
            for intra in [true, false] {
                let code = encode_cbp(cbp, intra).unwrap();
                assert_eq!(decode_cbp(code, intra).unwrap(), cbp);
            }
        }
        assert!(decode_cbp(48, true).is_err());
        assert!(encode_cbp(48, false).is_err());
    }

    #[test]
    fn test_apply_qp_delta() {
        assert_eq!(apply_qp_delta(26, 0).unwrap(), 26);
        assert_eq!(apply_qp_delta(50, 5).unwrap(), 3);
        assert_eq!(apply_qp_delta(0, -26).unwrap(), 26);
        assert!(apply_qp_delta(26, 26).is_err());
    }

    #[test]
    fn test_luma_block_offsets() {
        assert_eq!(LUMA4X4_BLOCK_OFFSET[0], (0, 0));
        assert_eq!(LUMA4X4_BLOCK_OFFSET[1], (4, 0));
        assert_eq!(LUMA4X4_BLOCK_OFFSET[2], (0, 4));
        assert_eq!(LUMA4X4_BLOCK_OFFSET[4], (8, 0));
        assert_eq!(LUMA4X4_BLOCK_OFFSET[10], (0, 12));
        assert_eq!(LUMA4X4_BLOCK_OFFSET[15], (12, 12));
    }

    #[test]
    fn test_nc_raster_traversal() {
        let mut grid = NcGrid::new(2, 2);
        // 左上角没有邻居
        assert_eq!(grid.nc(NcPlane::Luma, 0, 0), 0);

        // 第一行只有左邻居参与
        grid.set(NcPlane::Luma, 0, 0, 5);
        assert_eq!(grid.nc(NcPlane::Luma, 1, 0), 5);

        // 第一列只有上邻居参与
        assert_eq!(grid.nc(NcPlane::Luma, 0, 1), 5);

        // 两者都可用时取平均 (向上取整)
        grid.set(NcPlane::Luma, 1, 0, 2);
        grid.set(NcPlane::Luma, 0, 1, 3);
        assert_eq!(grid.nc(NcPlane::Luma, 1, 1), 3);

        // 尚未解码的块不参与
        assert_eq!(grid.nc(NcPlane::Luma, 3, 1), 0);
        grid.reset();
        assert_eq!(grid.nc(NcPlane::Luma, 1, 0), 0);
    }

    #[test]
    fn test_nc_chroma_planes_are_separate() {
        let mut grid = NcGrid::new(1, 1);
        grid.set(NcPlane::Cb, 0, 0, 4);
        assert_eq!(grid.nc(NcPlane::Cb, 1, 0), 4);
        assert_eq!(grid.nc(NcPlane::Cr, 1, 0), 0);
        grid.fill_macroblock(0, 0, 0);
        assert_eq!(grid.nc(NcPlane::Cb, 1, 1), 0);
        assert_eq!(grid.nc(NcPlane::Luma, 3, 3), 0);
    }
    fn intra_dc_layer() -> MacroblockLayer {
        let mut residual = MbResidual::ZERO;
        residual.luma_dc[0][0] = 2;
        MacroblockLayer {
            mb_type: MbType::I16x16 {
                pred_mode: Intra16x16Mode::Dc,
                cbp_luma: 0,
                cbp_chroma: 0,
            },
            intra_chroma_pred_mode: IntraChromaMode::Dc,
            ref_idx_l0: 0,
            mvd_l0: MotionVector::ZERO,
            coded_block_pattern: 0,
            mb_qp_delta: 0,
            residual,
        }
    }

    #[test]
    fn test_write_intra_dc_macroblock_bits() {
        // mb_type ue(3) | chroma ue(0) | qp_delta se(0) | DC: 000101 1 1
        let mut bw = BitWriter::new();
        let mut nc = NcGrid::new(1, 1);
        intra_dc_layer()
            .write(&mut bw, SliceType::I, 0, &mut nc, 0, 0)
            .unwrap();
        assert_eq!(bw.bits_written(), 15);
        bw.write_rbsp_trailing_bits();
        assert_eq!(bw.finish(), vec![0x26, 0x2f]);
        // 亮度 DC 不计入 nC
        assert_eq!(nc.nc(NcPlane::Luma, 1, 0), 0);
    }

    #[test]
    fn test_read_intra_dc_macroblock() {
        let data = [0x26, 0x2f];
        let mut br = BitReader::new(&data);
        let mut nc = NcGrid::new(1, 1);
        let mb = MacroblockLayer::read(&mut br, SliceType::I, 0, &mut nc, 0, 0).unwrap();
        assert_eq!(mb, intra_dc_layer());
        assert_eq!(mb.cbp(), (0, 0));
        assert_eq!(br.bits_read(), 15);
    }

    #[test]
    fn test_inter_macroblock_write_read() {
        let mut residual = MbResidual::ZERO;
        residual.luma[0][0][0] = 5;
        residual.luma[3][1][2] = -1;
        residual.chroma_dc[0][0][1] = 3;
        residual.chroma_ac[1][2][0][1] = 1;
        let mb = MacroblockLayer {
            mb_type: MbType::PL016x16,
            intra_chroma_pred_mode: IntraChromaMode::Dc,
            ref_idx_l0: 0,
            mvd_l0: MotionVector::new(3, -2),
            coded_block_pattern: 0x21,
            mb_qp_delta: -3,
            residual,
        };

        let mut bw = BitWriter::new();
        let mut nc_w = NcGrid::new(2, 1);
        mb.write(&mut bw, SliceType::P, 1, &mut nc_w, 1, 0).unwrap();
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        let mut nc_r = NcGrid::new(2, 1);
        let back = MacroblockLayer::read(&mut br, SliceType::P, 1, &mut nc_r, 1, 0).unwrap();
        assert_eq!(back, mb);
        assert_eq!(back.cbp(), (1, 2));
        // 块 0 在网格 (4, 0), 块 3 在 (5, 1)
        assert_eq!(nc_r.nc(NcPlane::Luma, 5, 0), 1);
        assert_eq!(nc_r.nc(NcPlane::Luma, 6, 1), 1);
        assert_eq!(nc_r.nc(NcPlane::Cr, 3, 1), 1);
        assert_eq!(nc_r.nc(NcPlane::Cb, 3, 1), 0);
    }

    #[test]
    fn test_uncoded_inter_macroblock_has_no_qp_delta() {
        let mb = MacroblockLayer {
            mb_type: MbType::PL016x16,
            intra_chroma_pred_mode: IntraChromaMode::Dc,
            ref_idx_l0: 0,
            mvd_l0: MotionVector::new(-1, 0),
            coded_block_pattern: 0,
            mb_qp_delta: 0,
            residual: MbResidual::ZERO,
        };
        let mut bw = BitWriter::new();
        let mut nc = NcGrid::new(1, 1);
        mb.write(&mut bw, SliceType::P, 0, &mut nc, 0, 0).unwrap();
        // ue(0) | se(-1) | se(0) | cbp ue(0)
        assert_eq!(bw.bits_written(), 1 + 3 + 1 + 1);
    }

    #[test]
    fn test_second_reference_rejected() {
        let mut bw = BitWriter::new();
        bw.write_ue(0);
        bw.write_te(1, 1);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut nc = NcGrid::new(1, 1);
        assert!(matches!(
            MacroblockLayer::read(&mut br, SliceType::P, 1, &mut nc, 0, 0),
            Err(AvcError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_skip_cannot_be_written() {
        let mut mb = intra_dc_layer();
        mb.mb_type = MbType::PSkip;
        let mut bw = BitWriter::new();
        let mut nc = NcGrid::new(1, 1);
        assert!(matches!(
            mb.write(&mut bw, SliceType::P, 0, &mut nc, 0, 0),
            Err(AvcError::InvalidArgument(_))
        ));
    }
}
