//! 宏块重建: 预测样本 + 反量化反变换后的残差.
//!
//! 解码器与编码器的环内重建都走这里, 两端重建结果逐位一致.

use avclite_core::{Picture, Plane};

use crate::macroblock::{CHROMA4X4_BLOCK_OFFSET, LUMA4X4_BLOCK_OFFSET, MbResidual};
use crate::transform::{
    Block4x4, add_residual, dequant_4x4, idct_4x4, inverse_4x4, inverse_chroma_dc,
    inverse_luma_dc, reconstruct_p_residual,
};

/// 一个宏块的预测样本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbPrediction {
    pub luma: [[u8; 16]; 16],
    pub cb: [[u8; 8]; 8],
    pub cr: [[u8; 8]; 8],
}

/// 亮度残差 (诊断用), 与宏块亮度样本一一对应
pub type LumaResidual = [[i32; 16]; 16];

fn sub_block<const N: usize>(block: &[[u8; N]; N], x0: usize, y0: usize) -> [[u8; 4]; 4] {
    let mut out = [[0u8; 4]; 4];
    for (dy, row) in out.iter_mut().enumerate() {
        row.copy_from_slice(&block[y0 + dy][x0..x0 + 4]);
    }
    out
}

fn put_sub_block(plane: &mut Plane, x0: usize, y0: usize, block: &[[u8; 4]; 4]) {
    plane.put_block::<4>(x0, y0, block);
}

/// 色度重建 (帧内与帧间相同): DC 经 2x2 反变换后填入各 4x4 块
fn reconstruct_chroma(
    plane: &mut Plane,
    x0: usize,
    y0: usize,
    pred: &[[u8; 8]; 8],
    dc_levels: &[[i32; 2]; 2],
    ac_levels: &[Block4x4; 4],
    chroma_qp: i32,
) {
    let dc = inverse_chroma_dc(dc_levels, chroma_qp);
    for (blk, &(bx, by)) in CHROMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let mut coeffs = dequant_4x4(&ac_levels[blk], chroma_qp, true);
        coeffs[0][0] = dc[by / 4][bx / 4];
        let samples = add_residual(&sub_block(pred, bx, by), &idct_4x4(&coeffs));
        put_sub_block(plane, x0 + bx, y0 + by, &samples);
    }
}

/// 重建 Intra_16x16 宏块, 返回亮度残差
pub fn reconstruct_intra16x16(
    picture: &mut Picture,
    mb_x: usize,
    mb_y: usize,
    pred: &MbPrediction,
    residual: &MbResidual,
    qp: i32,
    chroma_qp: i32,
) -> LumaResidual {
    let dc = inverse_luma_dc(&residual.luma_dc, qp);
    let mut diag = [[0i32; 16]; 16];
    for (blk, &(bx, by)) in LUMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let mut coeffs = dequant_4x4(&residual.luma[blk], qp, true);
        coeffs[0][0] = dc[by / 4][bx / 4];
        let res = idct_4x4(&coeffs);
        let samples = add_residual(&sub_block(&pred.luma, bx, by), &res);
        put_sub_block(&mut picture.luma, mb_x * 16 + bx, mb_y * 16 + by, &samples);
        for (dy, row) in res.iter().enumerate() {
            diag[by + dy][bx..bx + 4].copy_from_slice(row);
        }
    }
    reconstruct_both_chroma(picture, mb_x, mb_y, pred, residual, chroma_qp);
    diag
}

/// 重建帧间宏块 (P_L0_16x16 / P_Skip), 返回亮度残差
pub fn reconstruct_inter(
    picture: &mut Picture,
    mb_x: usize,
    mb_y: usize,
    pred: &MbPrediction,
    residual: &MbResidual,
    qp: i32,
    chroma_qp: i32,
) -> LumaResidual {
    let mut diag = [[0i32; 16]; 16];
    for (blk, &(bx, by)) in LUMA4X4_BLOCK_OFFSET.iter().enumerate() {
        let levels = &residual.luma[blk];
        let samples = reconstruct_p_residual(levels, qp, &sub_block(&pred.luma, bx, by));
        put_sub_block(&mut picture.luma, mb_x * 16 + bx, mb_y * 16 + by, &samples);
        if levels.iter().flatten().any(|&v| v != 0) {
            let res = inverse_4x4(levels, qp);
            for (dy, row) in res.iter().enumerate() {
                diag[by + dy][bx..bx + 4].copy_from_slice(row);
            }
        }
    }
    reconstruct_both_chroma(picture, mb_x, mb_y, pred, residual, chroma_qp);
    diag
}

fn reconstruct_both_chroma(
    picture: &mut Picture,
    mb_x: usize,
    mb_y: usize,
    pred: &MbPrediction,
    residual: &MbResidual,
    chroma_qp: i32,
) {
    let (x0, y0) = (mb_x * 8, mb_y * 8);
    reconstruct_chroma(
        &mut picture.cb,
        x0,
        y0,
        &pred.cb,
        &residual.chroma_dc[0],
        &residual.chroma_ac[0],
        chroma_qp,
    );
    reconstruct_chroma(
        &mut picture.cr,
        x0,
        y0,
        &pred.cr,
        &residual.chroma_dc[1],
        &residual.chroma_ac[1],
        chroma_qp,
    );
}
