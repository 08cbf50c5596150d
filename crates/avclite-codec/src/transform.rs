//! 4x4 整数变换与量化.
//!
//! 正向: 核心变换 `Cf·X·Cfᵀ` 与 `MF(QP)` 缩放量化, 亮度 DC 使用 4x4 Hadamard, 色度 DC 使用 2x2 Hadamard.
//! 反向: `LevelScale(QP)` 反量化, 蝶形反变换, 最终 `(x + 32) >> 6`.
//!
//! 全部为整数运算, 编码端的重建与解码端逐位一致.

/// 4x4 系数或残差块 (行优先)
pub type Block4x4 = [[i32; 4]; 4];

/// 2x2 色度 DC 块
pub type Block2x2 = [[i32; 2]; 2];

// ============================================================
// 量化参数表
// ============================================================

/// 正向量化乘数 MF: [qP_rem][位置类别], 类别 0=偶行偶列, 1=奇行奇列, 2=其余
const QUANT_MF: [[i32; 3]; 6] = [
    [13107, 5243, 8066],
    [11916, 4660, 7490],
    [10082, 4194, 6554],
    [9362, 3647, 5825],
    [8192, 3355, 5243],
    [7282, 2893, 4559],
];

/// LevelScale 表 (H.264 Table 8-14): [qP_rem][scale_index]
/// scale_index: 0=偶行偶列, 1=偶行奇列/奇行偶列, 2=奇行奇列
const LEVEL_SCALE: [[i32; 3]; 6] = [
    [10, 13, 16],
    [11, 14, 18],
    [13, 16, 20],
    [14, 18, 23],
    [16, 20, 25],
    [18, 23, 29],
];

/// Chroma QP 映射表 (H.264 Table 8-15)
#[rustfmt::skip]
const CHROMA_QP_TABLE: [i32; 52] = [
     0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15,
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 29, 30,
    31, 32, 32, 33, 34, 34, 35, 35, 36, 36, 37, 37, 37, 38, 38, 38,
    39, 39, 39, 39,
];

/// 核心变换矩阵 Cf
const CORE: [[i32; 4]; 4] = [[1, 1, 1, 1], [2, 1, -1, -2], [1, -1, -1, 1], [1, -2, 2, -1]];

/// 4x4 Hadamard 矩阵 (对称)
const HADAMARD: [[i32; 4]; 4] = [[1, 1, 1, 1], [1, 1, -1, -1], [1, -1, -1, 1], [1, -1, 1, -1]];

/// Luma QP → Chroma QP 映射 (H.264 Table 8-15)
pub fn chroma_qp(qp: i32, offset: i32) -> i32 {
    let qpc = (qp + offset).clamp(0, 51);
    CHROMA_QP_TABLE[qpc as usize]
}

#[inline]
fn mf_index(row: usize, col: usize) -> usize {
    match (row & 1, col & 1) {
        (0, 0) => 0,
        (1, 1) => 1,
        _ => 2,
    }
}

/// 根据 4x4 块内位置确定缩放因子索引
#[inline]
fn scale_index(row: usize, col: usize) -> usize {
    match (row & 1, col & 1) {
        (0, 0) => 0,
        (1, 1) => 2,
        _ => 1,
    }
}

/// 四舍五入 (远离零) 的缩放右移: `sign(v) * ((|v| * m + 2^(shift-1)) >> shift)`
#[inline]
fn quant(v: i32, m: i32, shift: u32) -> i32 {
    let mag = ((i64::from(v).abs() * i64::from(m) + (1i64 << (shift - 1))) >> shift) as i32;
    if v < 0 { -mag } else { mag }
}

fn mul4(a: &Block4x4, b: &Block4x4) -> Block4x4 {
    let mut out = [[0i32; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn transpose4(a: &Block4x4) -> Block4x4 {
    let mut out = [[0i32; 4]; 4];
    for (i, row) in a.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            out[j][i] = v;
        }
    }
    out
}

// ============================================================
// 正向变换
// ============================================================

/// 正向核心变换 `Cf·X·Cfᵀ` (未缩放)
pub fn forward_core_4x4(x: &Block4x4) -> Block4x4 {
    mul4(&mul4(&CORE, x), &transpose4(&CORE))
}

/// 正向变换并量化一个 4x4 残差块
///
/// `Y = round(W ⊙ MF(QP) / 2^(15 + QP/6))`
pub fn forward_4x4(x: &Block4x4, qp: i32) -> Block4x4 {
    let w = forward_core_4x4(x);
    let qbits = 15 + (qp / 6) as u32;
    let mf = &QUANT_MF[(qp % 6) as usize];
    let mut out = [[0i32; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = quant(w[i][j], mf[mf_index(i, j)], qbits);
        }
    }
    out
}

/// 亮度 DC 正向 Hadamard 变换并量化
///
/// 输入为 16 个 4x4 块核心变换后的 DC 系数 (按块位置排列).
/// Hadamard 输出的除以 2 并入量化位移, 按 `qbits + 2` 量化.
pub fn forward_luma_dc(dc: &Block4x4, qp: i32) -> Block4x4 {
    let y = mul4(&mul4(&HADAMARD, dc), &HADAMARD);
    let qbits = 15 + (qp / 6) as u32;
    let mf = QUANT_MF[(qp % 6) as usize][0];
    y.map(|row| row.map(|v| quant(v, mf, qbits + 2)))
}

/// 色度 DC 正向 2x2 Hadamard 变换并量化
pub fn forward_chroma_dc(dc: &Block2x2, qp: i32) -> Block2x2 {
    let [[a, b], [c, d]] = *dc;
    let y = [[a + b + c + d, a - b + c - d], [a + b - c - d, a - b - c + d]];
    let qbits = 15 + (qp / 6) as u32;
    let mf = QUANT_MF[(qp % 6) as usize][0];
    y.map(|row| row.map(|v| quant(v, mf, qbits + 1)))
}

// ============================================================
// 反变换
// ============================================================

/// 4x4 系数反量化
///
/// `skip_dc` 为 true 时 (0,0) 位置保持不变, 由独立的 DC 路径提供.
pub fn dequant_4x4(levels: &Block4x4, qp: i32, skip_dc: bool) -> Block4x4 {
    let qp_per = qp / 6;
    let scale = &LEVEL_SCALE[(qp % 6) as usize];
    let mut out = *levels;
    for (i, row) in out.iter_mut().enumerate() {
        for (j, c) in row.iter_mut().enumerate() {
            if skip_dc && i == 0 && j == 0 {
                continue;
            }
            *c = (*c * scale[scale_index(i, j)]) << qp_per;
        }
    }
    out
}

/// 4x4 反整数 DCT 变换, 输出残差
pub fn idct_4x4(coeffs: &Block4x4) -> Block4x4 {
    let mut temp = [[0i32; 4]; 4];

    // 行变换
    for (i, row) in coeffs.iter().enumerate() {
        let [s0, s1, s2, s3] = *row;
        let e0 = s0 + s2;
        let e1 = s0 - s2;
        let e2 = (s1 >> 1) - s3;
        let e3 = s1 + (s3 >> 1);
        temp[i] = [e0 + e3, e1 + e2, e1 - e2, e0 - e3];
    }

    // 列变换
    let mut out = [[0i32; 4]; 4];
    for j in 0..4 {
        let s0 = temp[0][j];
        let s1 = temp[1][j];
        let s2 = temp[2][j];
        let s3 = temp[3][j];
        let e0 = s0 + s2;
        let e1 = s0 - s2;
        let e2 = (s1 >> 1) - s3;
        let e3 = s1 + (s3 >> 1);
        // 结果需要右移 6 位 (DCT 归一化)
        out[0][j] = (e0 + e3 + 32) >> 6;
        out[1][j] = (e1 + e2 + 32) >> 6;
        out[2][j] = (e1 - e2 + 32) >> 6;
        out[3][j] = (e0 - e3 + 32) >> 6;
    }
    out
}

/// 反量化并反变换一个完整 4x4 块
pub fn inverse_4x4(levels: &Block4x4, qp: i32) -> Block4x4 {
    idct_4x4(&dequant_4x4(levels, qp, false))
}

/// 4x4 Luma DC 反 Hadamard 变换 (I_16x16)
pub fn inverse_hadamard_4x4(block: &Block4x4) -> Block4x4 {
    let mut temp = [[0i32; 4]; 4];

    // 行变换
    for (i, row) in block.iter().enumerate() {
        let a = row[0] + row[2];
        let b = row[0] - row[2];
        let c = row[1] - row[3];
        let d = row[1] + row[3];
        temp[i] = [a + d, b + c, b - c, a - d];
    }

    // 列变换
    let mut out = [[0i32; 4]; 4];
    for j in 0..4 {
        let a = temp[0][j] + temp[2][j];
        let b = temp[0][j] - temp[2][j];
        let c = temp[1][j] - temp[3][j];
        let d = temp[1][j] + temp[3][j];
        out[0][j] = a + d;
        out[1][j] = b + c;
        out[2][j] = b - c;
        out[3][j] = a - d;
    }
    out
}

/// 亮度 DC 反变换与反量化 (I_16x16)
///
/// 输出第 (by, bx) 项即亮度 4x4 块 (bx, by) 反量化后的 DC 系数.
pub fn inverse_luma_dc(levels: &Block4x4, qp: i32) -> Block4x4 {
    let f = inverse_hadamard_4x4(levels);
    let qp_per = qp / 6;
    let scale = LEVEL_SCALE[(qp % 6) as usize][0];
    f.map(|row| {
        row.map(|c| {
            if qp_per >= 2 {
                (c * scale) << (qp_per - 2)
            } else {
                (c * scale + (1 << (1 - qp_per))) >> (2 - qp_per)
            }
        })
    })
}

/// 色度 DC 反 2x2 Hadamard 变换与反量化 (4:2:0)
pub fn inverse_chroma_dc(levels: &Block2x2, qp: i32) -> Block2x2 {
    let [[c0, c1], [c2, c3]] = *levels;
    let f = [[c0 + c1 + c2 + c3, c0 - c1 + c2 - c3], [c0 + c1 - c2 - c3, c0 - c1 - c2 + c3]];
    let qp_per = qp / 6;
    let scale = LEVEL_SCALE[(qp % 6) as usize][0];
    f.map(|row| {
        row.map(|c| {
            if qp_per >= 1 {
                (c * scale) << (qp_per - 1)
            } else {
                (c * scale) >> 1
            }
        })
    })
}

/// 残差叠加到预测并裁剪到 [0, 255]
pub fn add_residual(pred: &[[u8; 4]; 4], residual: &Block4x4) -> [[u8; 4]; 4] {
    let mut out = [[0u8; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (i32::from(pred[i][j]) + residual[i][j]).clamp(0, 255) as u8;
        }
    }
    out
}

/// P 宏块残差重建
///
/// inter 块的 DC 与 AC 一同反量化 (不存在独立的 DC 路径), 反变换后叠加运动补偿预测.
/// 与 Intra16x16 路径分开实现, 后者的 DC 来自 [`inverse_luma_dc`].
pub fn reconstruct_p_residual(levels: &Block4x4, qp: i32, pred: &[[u8; 4]; 4]) -> [[u8; 4]; 4] {
    add_residual(pred, &inverse_4x4(levels, qp))
}
