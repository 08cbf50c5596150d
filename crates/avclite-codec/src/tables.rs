//! CAVLC 与宏块语法使用的静态码表.
//!
//! 所有码表以 `(码长, 码字)` 常量给出, 下标即解码后的符号. 解码时由常量构建按
//! `(码长, 码字)` 排序的 [`VlcTable`], 按码长从短到长逐级二分查找, 首个匹配即为结果.

use std::sync::OnceLock;

use avclite_core::{AvcError, AvcResult, BitReader};

/// coeff_token 码表, 按 nC 分 4 类, 下标为 `[nC 类别][TotalCoeff][TrailingOnes]`, 值为 `(码长, 码字)`.
///
/// 码长为 0 表示该组合不存在. 第 4 类 (`nC >= 8`) 为 6 位定长码.
pub const COEFF_TOKEN: [[[(u8, u16); 4]; 17]; 4] = [
    [
        [(1, 1), (0, 0), (0, 0), (0, 0)],
        [(6, 5), (2, 1), (0, 0), (0, 0)],
        [(8, 7), (6, 4), (3, 1), (0, 0)],
        [(9, 7), (8, 6), (7, 5), (5, 3)],
        [(10, 7), (9, 6), (8, 5), (6, 3)],
        [(11, 7), (10, 6), (9, 5), (7, 4)],
        [(13, 15), (11, 6), (10, 5), (8, 4)],
        [(13, 11), (13, 14), (11, 5), (9, 4)],
        [(13, 8), (13, 10), (13, 13), (10, 4)],
        [(14, 15), (14, 14), (13, 9), (11, 4)],
        [(14, 11), (14, 10), (14, 13), (13, 12)],
        [(15, 15), (15, 14), (14, 9), (14, 12)],
        [(15, 11), (15, 10), (15, 13), (14, 8)],
        [(16, 15), (15, 1), (15, 9), (15, 12)],
        [(16, 11), (16, 14), (16, 13), (15, 8)],
        [(16, 7), (16, 10), (16, 9), (16, 12)],
        [(16, 4), (16, 6), (16, 5), (16, 8)],
    ],
    [
        [(2, 3), (0, 0), (0, 0), (0, 0)],
        [(6, 11), (2, 2), (0, 0), (0, 0)],
        [(6, 7), (5, 7), (3, 3), (0, 0)],
        [(7, 7), (6, 10), (6, 9), (4, 5)],
        [(8, 7), (6, 6), (6, 5), (4, 4)],
        [(8, 4), (7, 6), (7, 5), (5, 6)],
        [(9, 7), (8, 6), (8, 5), (6, 8)],
        [(11, 15), (9, 6), (9, 5), (6, 4)],
        [(11, 11), (11, 14), (11, 13), (7, 4)],
        [(12, 15), (11, 10), (11, 9), (9, 4)],
        [(12, 11), (12, 14), (12, 13), (11, 12)],
        [(12, 8), (12, 10), (12, 9), (11, 8)],
        [(13, 15), (13, 14), (13, 13), (12, 12)],
        [(13, 11), (13, 10), (13, 9), (13, 12)],
        [(13, 7), (14, 11), (13, 6), (13, 8)],
        [(14, 9), (14, 8), (14, 10), (13, 1)],
        [(14, 7), (14, 6), (14, 5), (14, 4)],
    ],
    [
        [(4, 15), (0, 0), (0, 0), (0, 0)],
        [(6, 15), (4, 14), (0, 0), (0, 0)],
        [(6, 11), (5, 15), (4, 13), (0, 0)],
        [(6, 8), (5, 12), (5, 14), (4, 12)],
        [(7, 15), (5, 10), (5, 11), (4, 11)],
        [(7, 11), (5, 8), (5, 9), (4, 10)],
        [(7, 9), (6, 14), (6, 13), (4, 9)],
        [(7, 8), (6, 10), (6, 9), (4, 8)],
        [(8, 15), (7, 14), (7, 13), (5, 13)],
        [(8, 11), (8, 14), (7, 10), (6, 12)],
        [(9, 15), (8, 10), (8, 13), (7, 12)],
        [(9, 11), (9, 14), (8, 9), (8, 12)],
        [(9, 8), (9, 10), (9, 13), (8, 8)],
        [(10, 13), (9, 7), (9, 9), (9, 12)],
        [(10, 9), (10, 12), (10, 11), (10, 10)],
        [(10, 5), (10, 8), (10, 7), (10, 6)],
        [(10, 1), (10, 4), (10, 3), (10, 2)],
    ],
    [
        [(6, 3), (0, 0), (0, 0), (0, 0)],
        [(6, 0), (6, 1), (0, 0), (0, 0)],
        [(6, 4), (6, 5), (6, 6), (0, 0)],
        [(6, 8), (6, 9), (6, 10), (6, 11)],
        [(6, 12), (6, 13), (6, 14), (6, 15)],
        [(6, 16), (6, 17), (6, 18), (6, 19)],
        [(6, 20), (6, 21), (6, 22), (6, 23)],
        [(6, 24), (6, 25), (6, 26), (6, 27)],
        [(6, 28), (6, 29), (6, 30), (6, 31)],
        [(6, 32), (6, 33), (6, 34), (6, 35)],
        [(6, 36), (6, 37), (6, 38), (6, 39)],
        [(6, 40), (6, 41), (6, 42), (6, 43)],
        [(6, 44), (6, 45), (6, 46), (6, 47)],
        [(6, 48), (6, 49), (6, 50), (6, 51)],
        [(6, 52), (6, 53), (6, 54), (6, 55)],
        [(6, 56), (6, 57), (6, 58), (6, 59)],
        [(6, 60), (6, 61), (6, 62), (6, 63)],
    ],
];

/// 色度 DC (`nC == -1`) 的 coeff_token 码表, 下标为 `[TotalCoeff][TrailingOnes]`.
pub const CHROMA_DC_COEFF_TOKEN: [[(u8, u16); 4]; 5] = [
    [(2, 1), (0, 0), (0, 0), (0, 0)],
    [(6, 7), (1, 1), (0, 0), (0, 0)],
    [(6, 4), (6, 6), (3, 1), (0, 0)],
    [(6, 3), (7, 3), (7, 2), (6, 5)],
    [(6, 2), (8, 3), (8, 2), (7, 0)],
];

/// 4x4 块的 total_zeros 码表, 下标为 `[TotalCoeff - 1][total_zeros]`.
pub const TOTAL_ZEROS_4X4: [[(u8, u8); 16]; 15] = [
    [(1, 1), (3, 3), (3, 2), (4, 3), (4, 2), (5, 3), (5, 2), (6, 3), (6, 2), (7, 3), (7, 2), (8, 3), (8, 2), (9, 3), (9, 2), (9, 1)],
    [(3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (4, 5), (4, 4), (4, 3), (4, 2), (5, 3), (5, 2), (6, 3), (6, 2), (6, 1), (6, 0), (0, 0)],
    [(4, 5), (3, 7), (3, 6), (3, 5), (4, 4), (4, 3), (3, 4), (3, 3), (4, 2), (5, 3), (5, 2), (6, 1), (5, 1), (6, 0), (0, 0), (0, 0)],
    [(5, 3), (3, 7), (4, 5), (4, 4), (3, 6), (3, 5), (3, 4), (4, 3), (3, 3), (4, 2), (5, 2), (5, 1), (5, 0), (0, 0), (0, 0), (0, 0)],
    [(4, 5), (4, 4), (4, 3), (3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (4, 2), (5, 1), (4, 1), (5, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(6, 1), (5, 1), (3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (3, 2), (4, 1), (3, 1), (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(6, 1), (5, 1), (3, 5), (3, 4), (3, 3), (2, 3), (3, 2), (4, 1), (3, 1), (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(6, 1), (4, 1), (5, 1), (3, 3), (2, 3), (2, 2), (3, 2), (3, 1), (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(6, 1), (6, 0), (4, 1), (2, 3), (2, 2), (3, 1), (2, 1), (5, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(5, 1), (5, 0), (3, 1), (2, 3), (2, 2), (2, 1), (4, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(4, 0), (4, 1), (3, 1), (3, 2), (1, 1), (3, 3), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(4, 0), (4, 1), (2, 1), (1, 1), (3, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(3, 0), (3, 1), (1, 1), (2, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(2, 0), (2, 1), (1, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(1, 0), (1, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
];

/// 色度 DC 的 total_zeros 码表, 下标为 `[TotalCoeff - 1][total_zeros]`.
pub const TOTAL_ZEROS_CHROMA_DC: [[(u8, u8); 4]; 3] = [
    [(1, 1), (2, 1), (3, 1), (3, 0)],
    [(1, 1), (2, 1), (2, 0), (0, 0)],
    [(1, 1), (1, 0), (0, 0), (0, 0)],
];

/// run_before 码表, 下标为 `[min(zerosLeft, 7) - 1][run_before]`.
pub const RUN_BEFORE: [[(u8, u8); 15]; 7] = [
    [(1, 1), (1, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(1, 1), (2, 1), (2, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(2, 3), (2, 2), (2, 1), (2, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(2, 3), (2, 2), (2, 1), (3, 1), (3, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(2, 3), (2, 2), (3, 3), (3, 2), (3, 1), (3, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(2, 3), (3, 0), (3, 1), (3, 3), (3, 2), (3, 5), (3, 4), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)],
    [(3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (3, 2), (3, 1), (4, 1), (5, 1), (6, 1), (7, 1), (8, 1), (9, 1), (10, 1), (11, 1)],
];

/// Intra 宏块 coded_block_pattern 的 `me(v)` 映射, 下标为码号
pub const CBP_INTRA: [u8; 48] = [
    47, 31, 15, 0, 23, 27, 29, 30, 7, 11, 13, 14, 39, 43, 45, 46, 16, 3, 5, 10, 12, 19, 21, 26,
    28, 35, 37, 42, 44, 1, 2, 4, 8, 17, 18, 20, 24, 6, 9, 22, 25, 32, 33, 34, 36, 40, 38, 41,
];

/// Inter 宏块 coded_block_pattern 的 `me(v)` 映射, 下标为码号
pub const CBP_INTER: [u8; 48] = [
    0, 16, 1, 2, 4, 8, 32, 3, 5, 10, 12, 15, 47, 7, 11, 13, 14, 6, 9, 31, 35, 37, 42, 44, 33, 34,
    36, 40, 39, 43, 45, 46, 17, 18, 20, 24, 19, 21, 26, 28, 23, 27, 29, 30, 22, 25, 38, 41,
];

// ============================================================
// VLC 查找
// ============================================================

/// VLC 表项
#[derive(Debug, Clone, Copy)]
struct VlcEntry {
    /// 码长 (bits)
    len: u8,
    /// 码字
    code: u32,
    /// 符号
    symbol: u16,
}

/// 按 `(码长, 码字)` 排序的 VLC 表
#[derive(Debug, Clone)]
pub struct VlcTable {
    name: &'static str,
    entries: Vec<VlcEntry>,
    min_len: u8,
    max_len: u8,
}

impl VlcTable {
    /// 由 `(码长, 码字, 符号)` 三元组构建, 码长为 0 的项被忽略
    fn build(name: &'static str, items: impl IntoIterator<Item = (u8, u32, u16)>) -> Self {
        let mut entries: Vec<VlcEntry> = items
            .into_iter()
            .filter(|&(len, _, _)| len > 0)
            .map(|(len, code, symbol)| VlcEntry { len, code, symbol })
            .collect();
        entries.sort_by_key(|e| (e.len, e.code));
        let min_len = entries.first().map_or(0, |e| e.len);
        let max_len = entries.last().map_or(0, |e| e.len);
        Self {
            name,
            entries,
            min_len,
            max_len,
        }
    }

    /// 最大码长
    pub fn max_len(&self) -> u8 {
        self.max_len
    }

    /// 从比特流中解码一个符号
    ///
    /// 依次窥视 `min_len..=max_len` 位, 命中即消耗对应位数.
    /// 超过最大码长仍未命中返回 [`AvcError::MalformedVlcCode`].
    pub fn decode(&self, br: &mut BitReader) -> AvcResult<u16> {
        for len in self.min_len..=self.max_len {
            if len as usize > br.bits_left() {
                return Err(AvcError::BitstreamExhausted {
                    needed: len as usize,
                    remaining: br.bits_left(),
                });
            }
            let code = br.peek_bits(u32::from(len))?;
            if let Ok(idx) = self
                .entries
                .binary_search_by_key(&(len, code), |e| (e.len, e.code))
            {
                br.skip_bits(u32::from(len))?;
                return Ok(self.entries[idx].symbol);
            }
        }
        Err(AvcError::MalformedVlcCode(format!(
            "{}: {} 位内无匹配码字",
            self.name, self.max_len,
        )))
    }
}

/// coeff_token 码表类别 (由 nC 选择)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoeffTokenClass {
    /// `nC == -1`, 色度 DC
    ChromaDc,
    /// `0 <= nC < 2`
    Nc0,
    /// `2 <= nC < 4`
    Nc2,
    /// `4 <= nC < 8`
    Nc4,
    /// `nC >= 8`, 6 位定长码
    Nc8,
}

impl CoeffTokenClass {
    /// 由 nC 选择码表
    pub fn from_nc(nc: i32) -> Self {
        match nc {
            i32::MIN..=-1 => Self::ChromaDc,
            0..=1 => Self::Nc0,
            2..=3 => Self::Nc2,
            4..=7 => Self::Nc4,
            _ => Self::Nc8,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Nc0 => 0,
            Self::Nc2 => 1,
            Self::Nc4 => 2,
            Self::Nc8 => 3,
            Self::ChromaDc => 4,
        }
    }
}

/// 打包 coeff_token 符号: `TotalCoeff * 4 + TrailingOnes`
#[inline]
pub fn coeff_token_symbol(total_coeff: usize, trailing_ones: usize) -> u16 {
    (total_coeff * 4 + trailing_ones) as u16
}

/// coeff_token 的 `(码长, 码字)`, 不存在的组合返回 None
pub fn coeff_token_code(
    class: CoeffTokenClass,
    total_coeff: usize,
    trailing_ones: usize,
) -> Option<(u8, u32)> {
    if trailing_ones > 3 || trailing_ones > total_coeff {
        return None;
    }
    let (len, code) = match class {
        CoeffTokenClass::ChromaDc => *CHROMA_DC_COEFF_TOKEN.get(total_coeff)?.get(trailing_ones)?,
        other => *COEFF_TOKEN[other.index()]
            .get(total_coeff)?
            .get(trailing_ones)?,
    };
    (len > 0).then_some((len, u32::from(code)))
}

/// total_zeros 的 `(码长, 码字)`
pub fn total_zeros_code(chroma_dc: bool, total_coeff: usize, total_zeros: usize) -> Option<(u8, u32)> {
    let row = total_coeff.checked_sub(1)?;
    let (len, code) = if chroma_dc {
        *TOTAL_ZEROS_CHROMA_DC.get(row)?.get(total_zeros)?
    } else {
        *TOTAL_ZEROS_4X4.get(row)?.get(total_zeros)?
    };
    (len > 0).then_some((len, u32::from(code)))
}

/// run_before 的 `(码长, 码字)`
pub fn run_before_code(zeros_left: usize, run_before: usize) -> Option<(u8, u32)> {
    let row = zeros_left.min(7).checked_sub(1)?;
    let (len, code) = *RUN_BEFORE[row].get(run_before)?;
    (len > 0 && run_before <= zeros_left).then_some((len, u32::from(code)))
}

struct CavlcTables {
    coeff_token: Vec<VlcTable>,
    total_zeros_4x4: Vec<VlcTable>,
    total_zeros_chroma_dc: Vec<VlcTable>,
    run_before: Vec<VlcTable>,
}

static CAVLC_TABLES: OnceLock<CavlcTables> = OnceLock::new();

fn cavlc_tables() -> &'static CavlcTables {
    CAVLC_TABLES.get_or_init(|| {
        let mut coeff_token: Vec<VlcTable> = COEFF_TOKEN
            .iter()
            .map(|table| {
                VlcTable::build(
                    "coeff_token",
                    table.iter().enumerate().flat_map(|(tc, row)| {
                        row.iter().enumerate().map(move |(t1, &(len, code))| {
                            (len, u32::from(code), coeff_token_symbol(tc, t1))
                        })
                    }),
                )
            })
            .collect();
        coeff_token.push(VlcTable::build(
            "coeff_token (色度 DC)",
            CHROMA_DC_COEFF_TOKEN
                .iter()
                .enumerate()
                .flat_map(|(tc, row)| {
                    row.iter().enumerate().map(move |(t1, &(len, code))| {
                        (len, u32::from(code), coeff_token_symbol(tc, t1))
                    })
                }),
        ));

        fn rows<const N: usize>(name: &'static str, rows: &[[(u8, u8); N]]) -> Vec<VlcTable> {
            rows.iter()
                .map(|row| {
                    VlcTable::build(
                        name,
                        row.iter()
                            .enumerate()
                            .map(|(sym, &(len, code))| (len, u32::from(code), sym as u16)),
                    )
                })
                .collect()
        }

        CavlcTables {
            coeff_token,
            total_zeros_4x4: rows("total_zeros", &TOTAL_ZEROS_4X4),
            total_zeros_chroma_dc: rows("total_zeros (色度 DC)", &TOTAL_ZEROS_CHROMA_DC),
            run_before: rows("run_before", &RUN_BEFORE),
        }
    })
}

/// 获取 coeff_token 解码表
pub fn coeff_token_vlc(class: CoeffTokenClass) -> &'static VlcTable {
    &cavlc_tables().coeff_token[class.index()]
}

/// 获取 total_zeros 解码表 (`total_coeff >= 1`)
pub fn total_zeros_vlc(chroma_dc: bool, total_coeff: usize) -> &'static VlcTable {
    let tables = cavlc_tables();
    if chroma_dc {
        &tables.total_zeros_chroma_dc[total_coeff - 1]
    } else {
        &tables.total_zeros_4x4[total_coeff - 1]
    }
}

/// 获取 run_before 解码表 (`zeros_left >= 1`)
pub fn run_before_vlc(zeros_left: usize) -> &'static VlcTable {
    &cavlc_tables().run_before[zeros_left.min(7) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use avclite_core::BitWriter;

    fn assert_prefix_free(table: &VlcTable) {
        for a in &table.entries {
            for b in &table.entries {
                if a.len < b.len {
                    let prefix = b.code >> (b.len - a.len);
                    assert_ne!(prefix, a.code, "{} 非前缀码: {:?} / {:?}", table.name, a, b);
                }
            }
        }
    }

    #[test]
    fn test_tables_are_prefix_free() {
        let tables = cavlc_tables();
        for t in tables
            .coeff_token
            .iter()
            .chain(&tables.total_zeros_4x4)
            .chain(&tables.total_zeros_chroma_dc)
            .chain(&tables.run_before)
        {
            assert_prefix_free(t);
        }
    }

    #[test]
    fn test_coeff_token_entry_counts() {
        let tables = cavlc_tables();
        for t in &tables.coeff_token[..4] {
            assert_eq!(t.entries.len(), 62);
        }
        assert_eq!(tables.coeff_token[4].entries.len(), 14);
        assert_eq!(coeff_token_vlc(CoeffTokenClass::Nc0).max_len(), 16);
        assert_eq!(coeff_token_vlc(CoeffTokenClass::Nc8).max_len(), 6);
    }

    #[test]
    fn test_class_from_nc() {
        assert_eq!(CoeffTokenClass::from_nc(-1), CoeffTokenClass::ChromaDc);
        assert_eq!(CoeffTokenClass::from_nc(0), CoeffTokenClass::Nc0);
        assert_eq!(CoeffTokenClass::from_nc(1), CoeffTokenClass::Nc0);
        assert_eq!(CoeffTokenClass::from_nc(3), CoeffTokenClass::Nc2);
        assert_eq!(CoeffTokenClass::from_nc(7), CoeffTokenClass::Nc4);
        assert_eq!(CoeffTokenClass::from_nc(16), CoeffTokenClass::Nc8);
    }

    #[test]
    fn test_decode_every_coeff_token() {
        for class in [
            CoeffTokenClass::Nc0,
            CoeffTokenClass::Nc2,
            CoeffTokenClass::Nc4,
            CoeffTokenClass::Nc8,
            CoeffTokenClass::ChromaDc,
        ] {
            let max_tc = if class == CoeffTokenClass::ChromaDc { 4 } else { 16 };
            for tc in 0..=max_tc {
                for t1 in 0..=tc.min(3) {
                    let (len, code) = coeff_token_code(class, tc, t1).unwrap();
                    let mut bw = BitWriter::new();
                    bw.write_bits(code, u32::from(len));
                    bw.write_rbsp_trailing_bits();
                    let data = bw.finish();
                    let mut br = BitReader::new(&data);
                    let sym = coeff_token_vlc(class).decode(&mut br).unwrap();
                    assert_eq!(sym, coeff_token_symbol(tc, t1));
                    assert_eq!(br.bits_read(), len as usize);
                }
            }
        }
    }

    #[test]
    fn test_fixed_length_coeff_token() {
        // 0b000011 表示 TotalCoeff = 0
        assert_eq!(coeff_token_code(CoeffTokenClass::Nc8, 0, 0), Some((6, 3)));
        // xxxxyy: xxxx = TotalCoeff - 1, yy = TrailingOnes
        assert_eq!(coeff_token_code(CoeffTokenClass::Nc8, 5, 2), Some((6, 0b0100_10)));
        assert_eq!(coeff_token_code(CoeffTokenClass::Nc8, 1, 2), None);
    }

    #[test]
    fn test_malformed_code() {
        // 16 个 0 之后不存在合法的 coeff_token
        let data = [0x00, 0x00, 0xFF];
        let mut br = BitReader::new(&data);
        assert!(matches!(
            coeff_token_vlc(CoeffTokenClass::Nc0).decode(&mut br),
            Err(AvcError::MalformedVlcCode(_))
        ));
    }

    #[test]
    fn test_exhausted_during_lookup() {
        let data = [0x00];
        let mut br = BitReader::new(&data);
        assert!(matches!(
            coeff_token_vlc(CoeffTokenClass::Nc0).decode(&mut br),
            Err(AvcError::BitstreamExhausted { .. })
        ));
    }

    #[test]
    fn test_cbp_tables_are_permutations() {
        for table in [&CBP_INTRA, &CBP_INTER] {
            let mut seen = [false; 48];
            for &cbp in table.iter() {
                assert!(!seen[cbp as usize]);
                seen[cbp as usize] = true;
            }
        }
    }

    #[test]
    fn test_run_before_code_bounds() {
        assert_eq!(run_before_code(1, 1), Some((1, 0)));
        assert_eq!(run_before_code(1, 2), None);
        assert_eq!(run_before_code(14, 14), Some((11, 1)));
        assert_eq!(run_before_code(9, 14), None);
        assert_eq!(run_before_code(0, 0), None);
    }
}
