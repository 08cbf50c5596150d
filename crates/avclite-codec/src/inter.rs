//! 帧间预测: 运动矢量预测, P_Skip 推导与整像素运动补偿.

use avclite_core::{Picture, Plane};

use crate::macroblock::Neighbors;
use crate::reconstruct::MbPrediction;

/// 运动矢量, 单位为 1/4 亮度像素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MotionVector {
    pub x: i32,
    pub y: i32,
}

impl MotionVector {
    /// 零矢量
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 亮度整像素偏移
    pub fn luma_offset(&self) -> (isize, isize) {
        ((self.x >> 2) as isize, (self.y >> 2) as isize)
    }

    /// 色度整像素偏移 (4:2:0, 1/8 色度像素)
    pub fn chroma_offset(&self) -> (isize, isize) {
        ((self.x >> 3) as isize, (self.y >> 3) as isize)
    }
}

impl std::ops::Add for MotionVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for MotionVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 相邻宏块的运动信息
///
/// 帧内宏块以 `ref_idx = -1` 与零矢量表示.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionInfo {
    pub ref_idx: i32,
    pub mv: MotionVector,
}

impl MotionInfo {
    /// 帧内宏块的运动信息
    pub const INTRA: Self = Self {
        ref_idx: -1,
        mv: MotionVector::ZERO,
    };

    pub fn new(ref_idx: i32, mv: MotionVector) -> Self {
        Self { ref_idx, mv }
    }
}

/// 运动矢量预测使用的 A/B/C/D 邻居, `None` 为不可用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MvNeighbors {
    pub a: Option<MotionInfo>,
    pub b: Option<MotionInfo>,
    pub c: Option<MotionInfo>,
    pub d: Option<MotionInfo>,
}

fn median3(a: i32, b: i32, c: i32) -> i32 {
    a.max(b).min(a.min(b).max(c))
}

/// 16x16 分区的运动矢量预测 mvp
pub fn predict_mv_16x16(n: &MvNeighbors, ref_idx: i32) -> MotionVector {
    let unavailable = MotionInfo::INTRA;
    let c_or_d = n.c.or(n.d);

    let (a, b, c) = match (n.a, n.b, c_or_d) {
        // 只有 A 可用时 B/C 取 A
        (Some(a), None, None) => (a, a, a),
        (a, b, c) => (
            a.unwrap_or(unavailable),
            b.unwrap_or(unavailable),
            c.unwrap_or(unavailable),
        ),
    };

    let matches = [a, b, c]
        .iter()
        .filter(|info| info.ref_idx == ref_idx)
        .count();
    if matches == 1 {
        if a.ref_idx == ref_idx {
            return a.mv;
        }
        if b.ref_idx == ref_idx {
            return b.mv;
        }
        return c.mv;
    }

    MotionVector::new(
        median3(a.mv.x, b.mv.x, c.mv.x),
        median3(a.mv.y, b.mv.y, c.mv.y),
    )
}

/// P_Skip 宏块的运动矢量
///
/// A 或 B 不可用, 或其中任一为参考 0 且零矢量时为零矢量, 否则为 mvp.
pub fn predict_p_skip_mv(n: &MvNeighbors) -> MotionVector {
    let zero_ref0 = |info: &MotionInfo| info.ref_idx == 0 && info.mv == MotionVector::ZERO;
    match (n.a, n.b) {
        (Some(a), Some(b)) if !zero_ref0(&a) && !zero_ref0(&b) => predict_mv_16x16(n, 0),
        _ => MotionVector::ZERO,
    }
}

/// 一帧内每个宏块的运动信息
#[derive(Debug, Clone)]
pub struct MvGrid {
    mb_width: usize,
    entries: Vec<Option<MotionInfo>>,
}

impl MvGrid {
    pub fn new(mb_width: usize, mb_height: usize) -> Self {
        Self {
            mb_width,
            entries: vec![None; mb_width * mb_height],
        }
    }

    /// 记录宏块的运动信息
    pub fn set(&mut self, mb_addr: usize, info: MotionInfo) {
        if let Some(slot) = self.entries.get_mut(mb_addr) {
            *slot = Some(info);
        }
    }

    pub fn get(&self, mb_addr: usize) -> Option<MotionInfo> {
        self.entries.get(mb_addr).copied().flatten()
    }

    /// 按可用性收集宏块 `mb_addr` 的 A/B/C/D 邻居
    pub fn neighbors(&self, mb_addr: usize, avail: Neighbors) -> MvNeighbors {
        let w = self.mb_width;
        let pick = |flag: Neighbors, addr: Option<usize>| {
            if avail.contains(flag) {
                addr.and_then(|a| self.get(a))
            } else {
                None
            }
        };
        MvNeighbors {
            a: pick(Neighbors::LEFT, mb_addr.checked_sub(1)),
            b: pick(Neighbors::TOP, mb_addr.checked_sub(w)),
            c: pick(Neighbors::TOP_RIGHT, (mb_addr + 1).checked_sub(w)),
            d: pick(Neighbors::TOP_LEFT, mb_addr.checked_sub(w + 1)),
        }
    }

    /// 清空 (新帧开始)
    pub fn reset(&mut self) {
        self.entries.fill(None);
    }
}

/// 整像素运动补偿, 参考区域越界时按边缘样本扩展
pub fn motion_compensate<const N: usize>(
    reference: &Plane,
    x0: usize,
    y0: usize,
    offset: (isize, isize),
) -> [[u8; N]; N] {
    let mut out = [[0u8; N]; N];
    let base_x = x0 as isize + offset.0;
    let base_y = y0 as isize + offset.1;
    for (dy, row) in out.iter_mut().enumerate() {
        for (dx, px) in row.iter_mut().enumerate() {
            *px = reference.get_clamped(base_x + dx as isize, base_y + dy as isize);
        }
    }
    out
}

/// 宏块 (mb_x, mb_y) 的亮度与色度整像素运动补偿
pub fn motion_compensate_16x16(
    reference: &Picture,
    mb_x: usize,
    mb_y: usize,
    mv: MotionVector,
) -> MbPrediction {
    let chroma = mv.chroma_offset();
    MbPrediction {
        luma: motion_compensate(&reference.luma, mb_x * 16, mb_y * 16, mv.luma_offset()),
        cb: motion_compensate(&reference.cb, mb_x * 8, mb_y * 8, chroma),
        cr: motion_compensate(&reference.cr, mb_x * 8, mb_y * 8, chroma),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(x: i32, y: i32) -> MotionVector {
        MotionVector::new(x, y)
    }

    fn ref0(x: i32, y: i32) -> Option<MotionInfo> {
        Some(MotionInfo::new(0, mv(x, y)))
    }

    #[test]
    fn test_median_prediction() {
        let n = MvNeighbors {
            a: ref0(4, 1),
            b: ref0(8, -3),
            c: ref0(-2, 5),
            d: None,
        };
        assert_eq!(predict_mv_16x16(&n, 0), mv(4, 1));
    }

    #[test]
    fn test_c_falls_back_to_d() {
        let n = MvNeighbors {
            a: ref0(0, 0),
            b: ref0(10, 10),
            c: None,
            d: ref0(20, 20),
        };
        assert_eq!(predict_mv_16x16(&n, 0), mv(10, 10));
    }

    #[test]
    fn test_only_left_available() {
        let n = MvNeighbors {
            a: ref0(6, -2),
            ..Default::default()
        };
        assert_eq!(predict_mv_16x16(&n, 0), mv(6, -2));
    }

    #[test]
    fn test_single_matching_reference() {
        // 只有 B 为参考 0, 其余为帧内
        let n = MvNeighbors {
            a: Some(MotionInfo::INTRA),
            b: ref0(12, -4),
            c: Some(MotionInfo::INTRA),
            d: None,
        };
        assert_eq!(predict_mv_16x16(&n, 0), mv(12, -4));
    }

    #[test]
    fn test_no_neighbors_predicts_zero() {
        assert_eq!(predict_mv_16x16(&MvNeighbors::default(), 0), MotionVector::ZERO);
    }

    #[test]
    fn test_p_skip_rules() {
        // 边缘宏块: 零矢量
        let n = MvNeighbors {
            a: ref0(8, 8),
            ..Default::default()
        };
        assert_eq!(predict_p_skip_mv(&n), MotionVector::ZERO);

        // A 为参考 0 零矢量: 零矢量
        let n = MvNeighbors {
            a: ref0(0, 0),
            b: ref0(8, 8),
            c: ref0(8, 8),
            d: None,
        };
        assert_eq!(predict_p_skip_mv(&n), MotionVector::ZERO);

        // 否则为中值预测
        let n = MvNeighbors {
            a: ref0(4, 4),
            b: ref0(8, 8),
            c: ref0(12, 0),
            d: None,
        };
        assert_eq!(predict_p_skip_mv(&n), mv(8, 4));
    }

    #[test]
    fn test_motion_field_neighbors() {
        let mut field = MvGrid::new(3, 2);
        for addr in 0..3 {
            field.set(addr, MotionInfo::new(0, mv(addr as i32, 0)));
        }
        field.set(3, MotionInfo::INTRA);
        let n = field.neighbors(4, Neighbors::all());
        assert_eq!(n.a, Some(MotionInfo::INTRA));
        assert_eq!(n.b.map(|i| i.mv), Some(mv(1, 0)));
        assert_eq!(n.c.map(|i| i.mv), Some(mv(2, 0)));
        assert_eq!(n.d.map(|i| i.mv), Some(mv(0, 0)));

        let n = field.neighbors(4, Neighbors::LEFT);
        assert!(n.b.is_none() && n.c.is_none() && n.d.is_none());
        field.reset();
        assert_eq!(field.get(0), None);
    }

    #[test]
    fn test_offsets_floor_fractional_part() {
        assert_eq!(mv(7, -5).luma_offset(), (1, -2));
        assert_eq!(mv(16, -8).chroma_offset(), (2, -1));
    }

    #[test]
    fn test_motion_compensate_16x16_zero_mv_copies() {
        let mut reference = Picture::new(32, 32).unwrap();
        reference.luma.set(16, 16, 7);
        reference.cb.set(8, 8, 9);
        let pred = motion_compensate_16x16(&reference, 1, 1, MotionVector::ZERO);
        assert_eq!(pred.luma[0][0], 7);
        assert_eq!(pred.cb[0][0], 9);
        assert_eq!(pred.cr[0][0], 128);

        // 亮度偏移 (-4, 0), 色度偏移 (-2, 0)
        let pred = motion_compensate_16x16(&reference, 1, 1, MotionVector::new(-16, 0));
        assert_eq!(pred.luma[0][4], 7);
        assert_eq!(pred.cb[0][2], 9);
    }

    #[test]
    fn test_motion_compensate_clamps() {
        let mut plane = Plane::filled(16, 16, 0);
        for y in 0..16 {
            for x in 0..16 {
                plane.set(x, y, (x + 16 * y) as u8);
            }
        }
        let block: [[u8; 4]; 4] = motion_compensate(&plane, 0, 0, (1, 2));
        assert_eq!(block[0][0], 33);
        assert_eq!(block[3][3], 4 + 16 * 5);

        // 左上越界: 全部为 (0, 0)
        let block: [[u8; 4]; 4] = motion_compensate(&plane, 0, 0, (-10, -10));
        assert!(block.iter().flatten().all(|&v| v == 0));

        // 右下越界: 全部为 (15, 15)
        let block: [[u8; 4]; 4] = motion_compensate(&plane, 12, 12, (30, 30));
        assert!(block.iter().flatten().all(|&v| v == 255));
    }
}
