//! 帧内预测.
//!
//! 提供 Intra_16x16 亮度预测与 8x8 色度预测 (各 4 种模式), 以及编码端基于 SAE 的模式选择.
//! 预测只读取邻居样本, 结果以块数组返回, 由调用方叠加残差后写回平面.

use avclite_core::{AvcError, AvcResult, Plane};

use crate::macroblock::Neighbors;

/// Intra_16x16 亮度预测模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intra16x16Mode {
    Vertical = 0,
    Horizontal = 1,
    Dc = 2,
    Plane = 3,
}

impl Intra16x16Mode {
    /// 按模式编号排列的全部模式
    pub const ALL: [Self; 4] = [Self::Vertical, Self::Horizontal, Self::Dc, Self::Plane];
}

impl TryFrom<u32> for Intra16x16Mode {
    type Error = AvcError;

    fn try_from(value: u32) -> AvcResult<Self> {
        Self::ALL.get(value as usize).copied().ok_or_else(|| {
            AvcError::InvalidFieldValue(format!("Intra16x16 预测模式无效: {}", value))
        })
    }
}

/// 色度帧内预测模式 (intra_chroma_pred_mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntraChromaMode {
    Dc = 0,
    Horizontal = 1,
    Vertical = 2,
    Plane = 3,
}

impl IntraChromaMode {
    /// 按模式编号排列的全部模式
    pub const ALL: [Self; 4] = [Self::Dc, Self::Horizontal, Self::Vertical, Self::Plane];
}

impl TryFrom<u32> for IntraChromaMode {
    type Error = AvcError;

    fn try_from(value: u32) -> AvcResult<Self> {
        Self::ALL.get(value as usize).copied().ok_or_else(|| {
            AvcError::InvalidFieldValue(format!("intra_chroma_pred_mode 无效: {}", value))
        })
    }
}

/// N x N 块的相邻重建样本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntraNeighbors<const N: usize> {
    /// 上方一行 p[x, -1]
    pub top: Option<[u8; N]>,
    /// 左侧一列 p[-1, y]
    pub left: Option<[u8; N]>,
    /// 左上角 p[-1, -1]
    pub top_left: Option<u8>,
}

impl<const N: usize> IntraNeighbors<N> {
    /// 无任何邻居
    pub const NONE: Self = Self {
        top: None,
        left: None,
        top_left: None,
    };

    /// 从已重建平面中收集 (x0, y0) 处块的邻居
    pub fn from_plane(plane: &Plane, x0: usize, y0: usize, avail: Neighbors) -> Self {
        let top = (avail.contains(Neighbors::TOP) && y0 > 0).then(|| {
            let mut row = [0u8; N];
            for (i, v) in row.iter_mut().enumerate() {
                *v = plane.get(x0 + i, y0 - 1);
            }
            row
        });
        let left = (avail.contains(Neighbors::LEFT) && x0 > 0).then(|| {
            let mut col = [0u8; N];
            for (i, v) in col.iter_mut().enumerate() {
                *v = plane.get(x0 - 1, y0 + i);
            }
            col
        });
        let top_left = (avail.contains(Neighbors::TOP_LEFT) && x0 > 0 && y0 > 0)
            .then(|| plane.get(x0 - 1, y0 - 1));
        Self {
            top,
            left,
            top_left,
        }
    }
}

/// DC 预测值: 可用邻居的四舍五入平均, 无邻居时为 128
pub fn predict_dc(top: Option<&[u8]>, left: Option<&[u8]>) -> u8 {
    let mut sum = 0u32;
    let mut count = 0u32;
    for side in [top, left].into_iter().flatten() {
        sum += side.iter().map(|&v| u32::from(v)).sum::<u32>();
        count += side.len() as u32;
    }
    if count == 0 {
        128
    } else {
        ((sum + count / 2) / count) as u8
    }
}

fn missing(what: &str, mode: impl std::fmt::Debug) -> AvcError {
    AvcError::InvalidFieldValue(format!("{:?} 预测缺少{}邻居", mode, what))
}

fn fill<const N: usize>(value: u8) -> [[u8; N]; N] {
    [[value; N]; N]
}

fn vertical<const N: usize>(top: &[u8; N]) -> [[u8; N]; N] {
    [*top; N]
}

fn horizontal<const N: usize>(left: &[u8; N]) -> [[u8; N]; N] {
    let mut out = [[0u8; N]; N];
    for (row, &v) in out.iter_mut().zip(left.iter()) {
        *row = [v; N];
    }
    out
}

/// 平面预测, N=16 (亮度) 或 N=8 (色度)
fn plane<const N: usize>(top: &[u8; N], left: &[u8; N], corner: u8) -> [[u8; N]; N] {
    let half = N / 2;
    let center = half as i32 - 1;
    // i = -1 时取左上角
    let t = |i: i32| i32::from(if i < 0 { corner } else { top[i as usize] });
    let l = |i: i32| i32::from(if i < 0 { corner } else { left[i as usize] });

    let mut h = 0i32;
    let mut v = 0i32;
    for i in 0..half as i32 {
        h += (i + 1) * (t(half as i32 + i) - t(half as i32 - 2 - i));
        v += (i + 1) * (l(half as i32 + i) - l(half as i32 - 2 - i));
    }
    let scale = if N == 16 { 5 } else { 34 };
    let b = (scale * h + 32) >> 6;
    let c = (scale * v + 32) >> 6;
    let a = 16 * (i32::from(left[N - 1]) + i32::from(top[N - 1]));

    let mut out = [[0u8; N]; N];
    for (y, row) in out.iter_mut().enumerate() {
        for (x, px) in row.iter_mut().enumerate() {
            let val = (a + b * (x as i32 - center) + c * (y as i32 - center) + 16) >> 5;
            *px = val.clamp(0, 255) as u8;
        }
    }
    out
}

/// Intra_16x16 亮度预测
///
/// 请求的模式缺少所需邻居时返回 `InvalidFieldValue`.
pub fn predict_luma_16x16(
    mode: Intra16x16Mode,
    n: &IntraNeighbors<16>,
) -> AvcResult<[[u8; 16]; 16]> {
    match mode {
        Intra16x16Mode::Vertical => n
            .top
            .as_ref()
            .map(vertical)
            .ok_or_else(|| missing("上方", mode)),
        Intra16x16Mode::Horizontal => n
            .left
            .as_ref()
            .map(horizontal)
            .ok_or_else(|| missing("左侧", mode)),
        Intra16x16Mode::Dc => Ok(fill(predict_dc(
            n.top.as_ref().map(|t| &t[..]),
            n.left.as_ref().map(|l| &l[..]),
        ))),
        Intra16x16Mode::Plane => match (&n.top, &n.left, n.top_left) {
            (Some(top), Some(left), Some(corner)) => Ok(plane(top, left, corner)),
            _ => Err(missing("上方/左侧/左上", mode)),
        },
    }
}

/// 色度 DC: 每个 4x4 子块单独计算
fn chroma_dc(n: &IntraNeighbors<8>) -> [[u8; 8]; 8] {
    let mut out = [[0u8; 8]; 8];
    for (bx, by) in [(0usize, 0usize), (4, 0), (0, 4), (4, 4)] {
        let top = n.top.as_ref().map(|t| &t[bx..bx + 4]);
        let left = n.left.as_ref().map(|l| &l[by..by + 4]);
        let dc = match (bx, by) {
            // 右上子块优先使用上方, 左下子块优先使用左侧
            (4, 0) => predict_dc(top.or(left), None),
            (0, 4) => predict_dc(left.or(top), None),
            _ => predict_dc(top, left),
        };
        for row in out.iter_mut().skip(by).take(4) {
            row[bx..bx + 4].fill(dc);
        }
    }
    out
}

/// 8x8 色度预测
pub fn predict_chroma_8x8(mode: IntraChromaMode, n: &IntraNeighbors<8>) -> AvcResult<[[u8; 8]; 8]> {
    match mode {
        IntraChromaMode::Dc => Ok(chroma_dc(n)),
        IntraChromaMode::Horizontal => n
            .left
            .as_ref()
            .map(horizontal)
            .ok_or_else(|| missing("左侧", mode)),
        IntraChromaMode::Vertical => n
            .top
            .as_ref()
            .map(vertical)
            .ok_or_else(|| missing("上方", mode)),
        IntraChromaMode::Plane => match (&n.top, &n.left, n.top_left) {
            (Some(top), Some(left), Some(corner)) => Ok(plane(top, left, corner)),
            _ => Err(missing("上方/左侧/左上", mode)),
        },
    }
}

/// 绝对误差和
pub fn sae<const N: usize>(src: &[[u8; N]; N], pred: &[[u8; N]; N]) -> u32 {
    src.iter()
        .flatten()
        .zip(pred.iter().flatten())
        .map(|(&a, &b)| u32::from(a.abs_diff(b)))
        .sum()
}

/// 选择 SAE 最小的亮度模式, 相同代价时取编号较小者
pub fn select_luma_mode(
    src: &[[u8; 16]; 16],
    n: &IntraNeighbors<16>,
) -> (Intra16x16Mode, [[u8; 16]; 16]) {
    let mut best_mode = Intra16x16Mode::Dc;
    let mut best_pred = fill(predict_dc(
        n.top.as_ref().map(|t| &t[..]),
        n.left.as_ref().map(|l| &l[..]),
    ));
    let mut best_cost = sae(src, &best_pred);

    for mode in Intra16x16Mode::ALL {
        let Ok(pred) = predict_luma_16x16(mode, n) else {
            continue;
        };
        let cost = sae(src, &pred);
        if cost < best_cost || (cost == best_cost && (mode as u8) < (best_mode as u8)) {
            best_mode = mode;
            best_pred = pred;
            best_cost = cost;
        }
    }
    (best_mode, best_pred)
}

/// 选择 Cb 与 Cr 合计 SAE 最小的色度模式, 相同代价时取编号较小者
pub fn select_chroma_mode(
    src_cb: &[[u8; 8]; 8],
    src_cr: &[[u8; 8]; 8],
    n_cb: &IntraNeighbors<8>,
    n_cr: &IntraNeighbors<8>,
) -> IntraChromaMode {
    let mut best_mode = IntraChromaMode::Dc;
    let mut best_cost = u32::MAX;
    for mode in IntraChromaMode::ALL {
        let (Ok(cb), Ok(cr)) = (predict_chroma_8x8(mode, n_cb), predict_chroma_8x8(mode, n_cr))
        else {
            continue;
        };
        let cost = sae(src_cb, &cb) + sae(src_cr, &cr);
        if cost < best_cost {
            best_mode = mode;
            best_cost = cost;
        }
    }
    best_mode
}
