//! 宏块级编码决策: 预测, 正向变换量化, 环内重建.

use avclite_core::{AvcResult, Picture};

use crate::cavlc::MAX_CODABLE_LEVEL;
use crate::inter::{
    MotionVector, MvNeighbors, motion_compensate_16x16, predict_mv_16x16, predict_p_skip_mv,
};
use crate::intra::{
    IntraChromaMode, IntraNeighbors, predict_chroma_8x8, select_chroma_mode, select_luma_mode,
};
use crate::macroblock::{
    CHROMA4X4_BLOCK_OFFSET, LUMA4X4_BLOCK_OFFSET, MacroblockLayer, MbResidual, MbType, Neighbors,
};
use crate::reconstruct::{MbPrediction, reconstruct_inter, reconstruct_intra16x16};
use crate::transform::{
    Block2x2, Block4x4, forward_4x4, forward_chroma_dc, forward_core_4x4, forward_luma_dc,
};

use super::slice::SliceMb;

/// 宏块编码所需的量化参数
#[derive(Debug, Clone, Copy)]
pub(super) struct MbQuant {
    pub(super) qp: i32,
    pub(super) chroma_qp: i32,
}

fn clamp_levels<const N: usize>(block: [[i32; N]; N]) -> [[i32; N]; N] {
    block.map(|row| row.map(|v| v.clamp(-MAX_CODABLE_LEVEL, MAX_CODABLE_LEVEL)))
}

fn is_zero<const N: usize>(block: &[[i32; N]; N]) -> bool {
    block.iter().flatten().all(|&v| v == 0)
}

fn diff_4x4<const N: usize>(
    src: &[[u8; N]; N],
    pred: &[[u8; N]; N],
    x0: usize,
    y0: usize,
) -> Block4x4 {
    let mut out = [[0i32; 4]; 4];
    for (dy, row) in out.iter_mut().enumerate() {
        for (dx, v) in row.iter_mut().enumerate() {
            *v = i32::from(src[y0 + dy][x0 + dx]) - i32::from(pred[y0 + dy][x0 + dx]);
        }
    }
    out
}

/// 对一个 8x8 色度分量做 DC/AC 分离的变换量化
fn code_chroma(
    src: &[[u8; 8]; 8],
    pred: &[[u8; 8]; 8],
    chroma_qp: i32,
) -> (Block2x2, [Block4x4; 4]) {
    let mut dc = [[0i32; 2]; 2];
    let mut ac = [[[0i32; 4]; 4]; 4];
    for (blk, &(bx, by)) in CHROMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let diff = diff_4x4(src, pred, bx, by);
        dc[by / 4][bx / 4] = forward_core_4x4(&diff)[0][0];
        let mut levels = clamp_levels(forward_4x4(&diff, chroma_qp));
        levels[0][0] = 0;
        ac[blk] = levels;
    }
    (clamp_levels(forward_chroma_dc(&dc, chroma_qp)), ac)
}

/// 填充色度残差并返回 CodedBlockPatternChroma
fn code_both_chroma(
    res: &mut MbResidual,
    src: &Picture,
    pred: &MbPrediction,
    mb_x: usize,
    mb_y: usize,
    chroma_qp: i32,
) -> u8 {
    let src_cb = src.cb.block::<8>(mb_x * 8, mb_y * 8);
    let src_cr = src.cr.block::<8>(mb_x * 8, mb_y * 8);
    let (dc_cb, ac_cb) = code_chroma(&src_cb, &pred.cb, chroma_qp);
    let (dc_cr, ac_cr) = code_chroma(&src_cr, &pred.cr, chroma_qp);
    res.chroma_dc = [dc_cb, dc_cr];
    res.chroma_ac = [ac_cb, ac_cr];

    if res.chroma_ac.iter().flatten().any(|b| !is_zero(b)) {
        2
    } else if res.chroma_dc.iter().any(|b| !is_zero(b)) {
        1
    } else {
        0
    }
}

/// 以 Intra16x16 编码宏块, 重建结果写入 `recon`
pub(super) fn encode_intra(
    src: &Picture,
    recon: &mut Picture,
    mb_x: usize,
    mb_y: usize,
    avail: Neighbors,
    quant: MbQuant,
) -> AvcResult<MacroblockLayer> {
    let (lx, ly, cx, cy) = (mb_x * 16, mb_y * 16, mb_x * 8, mb_y * 8);
    let src_luma = src.luma.block::<16>(lx, ly);
    let n_luma = IntraNeighbors::<16>::from_plane(&recon.luma, lx, ly, avail);
    let n_cb = IntraNeighbors::<8>::from_plane(&recon.cb, cx, cy, avail);
    let n_cr = IntraNeighbors::<8>::from_plane(&recon.cr, cx, cy, avail);

    let (luma_mode, luma_pred) = select_luma_mode(&src_luma, &n_luma);
    let chroma_mode = select_chroma_mode(
        &src.cb.block::<8>(cx, cy),
        &src.cr.block::<8>(cx, cy),
        &n_cb,
        &n_cr,
    );
    let pred = MbPrediction {
        luma: luma_pred,
        cb: predict_chroma_8x8(chroma_mode, &n_cb)?,
        cr: predict_chroma_8x8(chroma_mode, &n_cr)?,
    };

    let mut res = MbResidual::ZERO;
    let mut dc = [[0i32; 4]; 4];
    for (blk, &(bx, by)) in LUMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let diff = diff_4x4(&src_luma, &pred.luma, bx, by);
        dc[by / 4][bx / 4] = forward_core_4x4(&diff)[0][0];
        let mut levels = clamp_levels(forward_4x4(&diff, quant.qp));
        levels[0][0] = 0;
        res.luma[blk] = levels;
    }
    res.luma_dc = clamp_levels(forward_luma_dc(&dc, quant.qp));
    let cbp_luma = if res.luma.iter().any(|b| !is_zero(b)) {
        15
    } else {
        0
    };
    let cbp_chroma = code_both_chroma(&mut res, src, &pred, mb_x, mb_y, quant.chroma_qp);

    reconstruct_intra16x16(recon, mb_x, mb_y, &pred, &res, quant.qp, quant.chroma_qp);
    Ok(MacroblockLayer {
        mb_type: MbType::I16x16 {
            pred_mode: luma_mode,
            cbp_luma,
            cbp_chroma,
        },
        intra_chroma_pred_mode: chroma_mode,
        ref_idx_l0: 0,
        mvd_l0: MotionVector::ZERO,
        coded_block_pattern: (cbp_chroma << 4) | cbp_luma,
        mb_qp_delta: 0,
        residual: res,
    })
}

/// 以零运动矢量编码帧间宏块; 残差全零且 P_Skip 预测为零时输出 P_Skip
pub(super) fn encode_inter(
    src: &Picture,
    reference: &Picture,
    recon: &mut Picture,
    (mb_x, mb_y): (usize, usize),
    neighbors: &MvNeighbors,
    quant: MbQuant,
    allow_skip: bool,
) -> SliceMb {
    let pred = motion_compensate_16x16(reference, mb_x, mb_y, MotionVector::ZERO);
    let src_luma = src.luma.block::<16>(mb_x * 16, mb_y * 16);

    let mut res = MbResidual::ZERO;
    let mut cbp_luma = 0u8;
    for (blk, &(bx, by)) in LUMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let diff = diff_4x4(&src_luma, &pred.luma, bx, by);
        let levels = clamp_levels(forward_4x4(&diff, quant.qp));
        if !is_zero(&levels) {
            cbp_luma |= 1 << (blk / 4);
        }
        res.luma[blk] = levels;
    }
    let cbp_chroma = code_both_chroma(&mut res, src, &pred, mb_x, mb_y, quant.chroma_qp);

    reconstruct_inter(recon, mb_x, mb_y, &pred, &res, quant.qp, quant.chroma_qp);
    if allow_skip && res.is_zero() && predict_p_skip_mv(neighbors) == MotionVector::ZERO {
        return SliceMb::Skip;
    }
    let mvp = predict_mv_16x16(neighbors, 0);
    SliceMb::Coded(MacroblockLayer {
        mb_type: MbType::PL016x16,
        intra_chroma_pred_mode: IntraChromaMode::Dc,
        ref_idx_l0: 0,
        mvd_l0: MotionVector::ZERO - mvp,
        coded_block_pattern: (cbp_chroma << 4) | cbp_luma,
        mb_qp_delta: 0,
        residual: res,
    })
}
