//! CAVLC 残差块编解码.
//!
//! 每次处理一个系数块 (扫描顺序), 块长度为 16 (4x4), 15 (去掉 DC 的 AC 块) 或 4 (色度 DC).
//! 编码与解码共用 [`crate::tables`] 中的码表.

use avclite_core::{AvcError, AvcResult, BitReader, BitWriter};
use log::trace;

use crate::tables::{
    CoeffTokenClass, coeff_token_code, coeff_token_vlc, run_before_code, run_before_vlc,
    total_zeros_code, total_zeros_vlc,
};
use crate::zigzag::unzigzag_4x4;

/// Baseline 码流中 level_prefix 的最大值
const MAX_LEVEL_PREFIX: u32 = 15;

/// 任意后缀长度状态下都能以 12 位转义编码的最大系数幅值
pub const MAX_CODABLE_LEVEL: i32 = 2063;

// ============================================================
// 块类别定义
// ============================================================

/// 残差块类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualKind {
    /// Intra16x16 亮度 DC
    LumaDc,
    /// Intra16x16 亮度 AC
    LumaAc,
    /// 完整 4x4 亮度块 (inter)
    Luma4x4,
    /// 色度 DC (2x2)
    ChromaDc,
    /// 色度 AC
    ChromaAc,
}

impl ResidualKind {
    /// 最大系数数量
    pub fn max_coeff(self) -> usize {
        match self {
            Self::LumaDc | Self::Luma4x4 => 16,
            Self::LumaAc | Self::ChromaAc => 15,
            Self::ChromaDc => 4,
        }
    }
}

// ============================================================
// 解码
// ============================================================

/// 解码得到的系数块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CavlcBlock {
    /// 扫描顺序的系数, 仅前 `max_num_coeff` 项有效
    pub coeffs: [i32; 16],
    /// 块长度 (4, 15 或 16)
    pub max_num_coeff: usize,
    /// 非零系数个数
    pub total_coeff: usize,
    /// 拖尾 ±1 个数
    pub trailing_ones: usize,
    /// 本块消耗的比特数
    pub bits_consumed: usize,
}

impl CavlcBlock {
    /// 扫描顺序的有效系数
    pub fn scan(&self) -> &[i32] {
        &self.coeffs[..self.max_num_coeff]
    }

    /// 还原为 4x4 块 (15 系数块在位置 0 补一个隐含的 0)
    pub fn to_block_4x4(&self) -> [[i32; 4]; 4] {
        if self.max_num_coeff == 15 {
            let mut full = [0i32; 16];
            full[1..].copy_from_slice(&self.coeffs[..15]);
            unzigzag_4x4(&full)
        } else {
            unzigzag_4x4(self.scan())
        }
    }

    /// 还原为 2x2 色度 DC 块 (光栅顺序)
    pub fn to_block_2x2(&self) -> [[i32; 2]; 2] {
        [
            [self.coeffs[0], self.coeffs[1]],
            [self.coeffs[2], self.coeffs[3]],
        ]
    }
}

fn check_max_num_coeff(nc: i32, max_num_coeff: usize) -> AvcResult<()> {
    let valid = match max_num_coeff {
        4 => nc == -1,
        15 | 16 => nc >= 0,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AvcError::InvalidArgument(format!(
            "CAVLC 块参数无效: nC={}, maxNumCoeff={}",
            nc, max_num_coeff,
        )))
    }
}

/// 读取 level_prefix (前导零个数)
fn read_level_prefix(br: &mut BitReader) -> AvcResult<u32> {
    let mut prefix = 0u32;
    while br.read_bit()? == 0 {
        prefix += 1;
        if prefix > MAX_LEVEL_PREFIX {
            return Err(AvcError::MalformedVlcCode(format!(
                "level_prefix 超出范围: > {}",
                MAX_LEVEL_PREFIX,
            )));
        }
    }
    Ok(prefix)
}

/// 从比特流解码一个系数块
///
/// - `nc`: 码表选择上下文, 色度 DC 为 -1
/// - `max_num_coeff`: 4, 15 或 16
pub fn decode_block(br: &mut BitReader, nc: i32, max_num_coeff: usize) -> AvcResult<CavlcBlock> {
    check_max_num_coeff(nc, max_num_coeff)?;
    let start = br.bits_read();
    let chroma_dc = nc == -1;

    let symbol = coeff_token_vlc(CoeffTokenClass::from_nc(nc)).decode(br)? as usize;
    let total_coeff = symbol / 4;
    let trailing_ones = symbol % 4;
    if total_coeff > max_num_coeff {
        return Err(AvcError::InvalidFieldValue(format!(
            "TotalCoeff={} 超过 maxNumCoeff={}",
            total_coeff, max_num_coeff,
        )));
    }

    let mut block = CavlcBlock {
        coeffs: [0; 16],
        max_num_coeff,
        total_coeff,
        trailing_ones,
        bits_consumed: 0,
    };
    if total_coeff == 0 {
        block.bits_consumed = br.bits_read() - start;
        return Ok(block);
    }

    // 系数幅值, 高频在前
    let mut levels = [0i32; 16];
    for level in levels.iter_mut().take(trailing_ones) {
        *level = if br.read_flag()? { -1 } else { 1 };
    }

    let mut suffix_length: u32 = if total_coeff > 10 && trailing_ones < 3 {
        1
    } else {
        0
    };
    for i in trailing_ones..total_coeff {
        let prefix = read_level_prefix(br)?;
        let suffix_size = if prefix == 14 && suffix_length == 0 {
            4
        } else if prefix == 15 {
            12
        } else {
            suffix_length
        };

        let mut level_code = (prefix << suffix_length) as i32;
        if suffix_size > 0 {
            level_code += br.read_bits(suffix_size)? as i32;
        }
        if prefix == 15 && suffix_length == 0 {
            level_code += 15;
        }
        if i == trailing_ones && trailing_ones < 3 {
            level_code += 2;
        }

        levels[i] = if level_code % 2 == 0 {
            (level_code + 2) >> 1
        } else {
            (-level_code - 1) >> 1
        };

        if suffix_length == 0 {
            suffix_length = 1;
        }
        if levels[i].abs() > (3 << (suffix_length - 1)) && suffix_length < 6 {
            suffix_length += 1;
        }
    }

    let total_zeros = if total_coeff < max_num_coeff {
        total_zeros_vlc(chroma_dc, total_coeff).decode(br)? as usize
    } else {
        0
    };
    if total_zeros + total_coeff > max_num_coeff {
        return Err(AvcError::InvalidFieldValue(format!(
            "total_zeros={} 与 TotalCoeff={} 超出块长度 {}",
            total_zeros, total_coeff, max_num_coeff,
        )));
    }

    let mut runs = [0usize; 16];
    let mut zeros_left = total_zeros;
    for run in runs.iter_mut().take(total_coeff - 1) {
        if zeros_left == 0 {
            break;
        }
        let run_before = run_before_vlc(zeros_left).decode(br)? as usize;
        if run_before > zeros_left {
            return Err(AvcError::InvalidFieldValue(format!(
                "run_before={} 超过剩余零个数 {}",
                run_before, zeros_left,
            )));
        }
        *run = run_before;
        zeros_left -= run_before;
    }
    runs[total_coeff - 1] = zeros_left;

    // 从低频开始放置: levels[total_coeff - 1] 是最低频的非零系数
    let mut pos: isize = -1;
    for i in (0..total_coeff).rev() {
        pos += 1 + runs[i] as isize;
        block.coeffs[pos as usize] = levels[i];
    }

    block.bits_consumed = br.bits_read() - start;
    trace!(
        "CAVLC 块: nC={}, TotalCoeff={}, T1s={}, total_zeros={}, bits={}",
        nc, total_coeff, trailing_ones, total_zeros, block.bits_consumed,
    );
    Ok(block)
}

// ============================================================
// 编码
// ============================================================

fn write_code(bw: &mut BitWriter, code: Option<(u8, u32)>, what: &str) -> AvcResult<()> {
    let (len, bits) =
        code.ok_or_else(|| AvcError::InvalidArgument(format!("{} 不存在对应码字", what)))?;
    bw.write_bits(bits, u32::from(len));
    Ok(())
}

/// 写入一个系数幅值 (level_prefix + level_suffix)
fn write_level(bw: &mut BitWriter, level_code: i32, suffix_length: u32) -> AvcResult<()> {
    let (prefix, suffix, suffix_size) = if suffix_length == 0 {
        if level_code < 14 {
            (level_code as u32, 0, 0)
        } else if level_code < 30 {
            (14, (level_code - 14) as u32, 4)
        } else {
            (15, (level_code - 30) as u32, 12)
        }
    } else if level_code < (15 << suffix_length) {
        (
            (level_code >> suffix_length) as u32,
            (level_code & ((1 << suffix_length) - 1)) as u32,
            suffix_length,
        )
    } else {
        (15, (level_code - (15 << suffix_length)) as u32, 12)
    };
    if suffix >= 1 << suffix_size && suffix_size > 0 {
        return Err(AvcError::InvalidArgument(format!(
            "系数幅值过大, levelCode={} 无法用 12 位转义表示",
            level_code,
        )));
    }
    bw.write_bits(0, prefix);
    bw.write_bit(1);
    bw.write_bits(suffix, suffix_size);
    Ok(())
}

/// 把一个扫描顺序的系数块编码到比特流, 返回 TotalCoeff
///
/// `scan.len()` 即 maxNumCoeff (4, 15 或 16).
pub fn encode_block(bw: &mut BitWriter, nc: i32, scan: &[i32]) -> AvcResult<usize> {
    let max_num_coeff = scan.len();
    check_max_num_coeff(nc, max_num_coeff)?;
    let chroma_dc = nc == -1;

    // 非零系数位置, 高频在前
    let nonzero: Vec<usize> = (0..max_num_coeff).rev().filter(|&i| scan[i] != 0).collect();
    let total_coeff = nonzero.len();
    let trailing_ones = nonzero
        .iter()
        .take(3)
        .take_while(|&&i| scan[i].abs() == 1)
        .count();

    write_code(
        bw,
        coeff_token_code(CoeffTokenClass::from_nc(nc), total_coeff, trailing_ones),
        "coeff_token",
    )?;
    if total_coeff == 0 {
        return Ok(0);
    }

    let mut suffix_length: u32 = if total_coeff > 10 && trailing_ones < 3 {
        1
    } else {
        0
    };
    for (i, &pos) in nonzero.iter().enumerate() {
        let level = scan[pos];
        if i < trailing_ones {
            bw.write_flag(level < 0);
            continue;
        }
        let mut level_code = if level > 0 {
            2 * level - 2
        } else {
            -2 * level - 1
        };
        if i == trailing_ones && trailing_ones < 3 {
            level_code -= 2;
        }
        write_level(bw, level_code, suffix_length)?;

        if suffix_length == 0 {
            suffix_length = 1;
        }
        if level.abs() > (3 << (suffix_length - 1)) && suffix_length < 6 {
            suffix_length += 1;
        }
    }

    let total_zeros = nonzero[0] + 1 - total_coeff;
    if total_coeff < max_num_coeff {
        write_code(
            bw,
            total_zeros_code(chroma_dc, total_coeff, total_zeros),
            "total_zeros",
        )?;
    }

    let mut zeros_left = total_zeros;
    for pair in nonzero.windows(2) {
        if zeros_left == 0 {
            break;
        }
        let run_before = pair[0] - pair[1] - 1;
        write_code(bw, run_before_code(zeros_left, run_before), "run_before")?;
        zeros_left -= run_before;
    }

    Ok(total_coeff)
}

/// 把一个系数块单独编码为字节串, 返回 `(数据, 有效位数)`
///
/// 末尾不足一字节的部分以 0 填充.
pub fn encode_to_bytes(nc: i32, scan: &[i32]) -> AvcResult<(Vec<u8>, usize)> {
    let mut bw = BitWriter::new();
    encode_block(&mut bw, nc, scan)?;
    let bits = bw.bits_written();
    Ok((bw.finish(), bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zigzag::zigzag_4x4;

    /// 把 "0101..." 字符串打包为字节
    fn bits_to_bytes(bits: &str) -> Vec<u8> {
        let mut bw = BitWriter::new();
        for c in bits.chars() {
            bw.write_bit(u32::from(c == '1'));
        }
        bw.finish()
    }

    fn decode_str(bits: &str, nc: i32, max: usize) -> CavlcBlock {
        let data = bits_to_bytes(bits);
        let mut br = BitReader::new(&data);
        decode_block(&mut br, nc, max).unwrap()
    }

    #[test]
    fn test_decode_published_example_1() {
        let block = decode_str("000010001110010111101101", 0, 16);
        assert_eq!(block.total_coeff, 5);
        assert_eq!(block.trailing_ones, 3);
        assert_eq!(block.bits_consumed, 24);
        assert_eq!(
            block.to_block_4x4(),
            [[0, 3, -1, 0], [0, -1, 1, 0], [1, 0, 0, 0], [0, 0, 0, 0]]
        );
    }

    #[test]
    fn test_decode_published_example_2() {
        let block = decode_str("000000011010001001000010111001100", 0, 16);
        assert_eq!(block.total_coeff, 5);
        assert_eq!(block.trailing_ones, 1);
        assert_eq!(block.bits_consumed, 33);
        assert_eq!(
            block.to_block_4x4(),
            [[-2, 4, 0, -1], [3, 0, 0, 0], [-3, 0, 0, 0], [0, 0, 0, 0]]
        );
    }

    #[test]
    fn test_decode_published_example_3() {
        let block = decode_str("0001110001110010", 0, 16);
        assert_eq!(block.total_coeff, 3);
        assert_eq!(block.trailing_ones, 3);
        assert_eq!(block.bits_consumed, 16);
        assert_eq!(
            block.to_block_4x4(),
            [[0, 0, 1, 0], [0, 0, 0, 0], [1, 0, 0, 0], [-1, 0, 0, 0]]
        );
    }

    #[test]
    fn test_decode_ac_block_prepends_dc_zero() {
        let block = decode_str("000111000110001", 0, 15);
        assert_eq!(block.total_coeff, 3);
        assert_eq!(block.bits_consumed, 15);
        assert_eq!(&block.scan()[..10], &[1, 1, 0, 0, 0, 0, 0, 0, 0, -1]);
        assert_eq!(
            block.to_block_4x4(),
            [[0, 1, 0, 0], [1, 0, 0, 0], [0, 0, 0, 0], [0, -1, 0, 0]]
        );

        let empty = decode_str("1", 0, 15);
        assert_eq!(empty.total_coeff, 0);
        assert_eq!(empty.bits_consumed, 1);
    }

    #[test]
    fn test_decode_chroma_dc() {
        let block = decode_str("11101000010000110000", -1, 4);
        assert_eq!(block.total_coeff, 1);
        assert_eq!(block.trailing_ones, 1);
        assert_eq!(block.bits_consumed, 3);
        assert_eq!(block.to_block_2x2(), [[-1, 0], [0, 0]]);
    }

    #[test]
    fn test_roundtrip_reference_block() {
        let block = [[-2, 4, 0, -1], [3, 0, 0, 0], [-3, 0, 0, 0], [0, 0, 0, 0]];
        let scan = zigzag_4x4(&block);
        let (data, bits) = encode_to_bytes(0, &scan).unwrap();
        assert_eq!(bits, 33);

        let mut br = BitReader::new(&data);
        let decoded = decode_block(&mut br, 0, 16).unwrap();
        assert_eq!(decoded.to_block_4x4(), block);
        assert_eq!(decoded.bits_consumed, bits);
    }

    #[test]
    fn test_encode_matches_published_bits() {
        let block = [[0, 3, -1, 0], [0, -1, 1, 0], [1, 0, 0, 0], [0, 0, 0, 0]];
        let (data, bits) = encode_to_bytes(0, &zigzag_4x4(&block)).unwrap();
        assert_eq!(bits, 24);
        assert_eq!(data, bits_to_bytes("000010001110010111101101"));
    }

    #[test]
    fn test_roundtrip_large_levels_and_dense_blocks() {
        let cases: Vec<(i32, Vec<i32>)> = vec![
            (0, vec![2063, -2063, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
            (1, vec![-40, 22, -15, 14, 13, -3, 3, 2, -2, 1, 1, 0, -1, 0, 0, 0]),
            (3, vec![7, -6, 5, -4, 3, -2, 1, -1, 1, 2, 3, 4, 5, 6, 7, 8]),
            (5, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 100]),
            (8, vec![1, -1, 1, -1, 1, -1, 1, -1, 1, -1, 1, -1, 1, -1, 1]),
            (12, vec![300, -29, 30, 31, -14, 15, 16, 0, 0, 0, 0, 0, 0, 0, -700, 9]),
            (-1, vec![-500, 0, 1, 1]),
            (-1, vec![0, 0, 0, 3]),
        ];
        for (nc, scan) in cases {
            let (data, bits) = encode_to_bytes(nc, &scan).unwrap();
            let mut br = BitReader::new(&data);
            let decoded = decode_block(&mut br, nc, scan.len()).unwrap();
            assert_eq!(decoded.scan(), scan.as_slice(), "nC={}", nc);
            assert_eq!(decoded.bits_consumed, bits);
            assert_eq!(decoded.total_coeff, scan.iter().filter(|&&v| v != 0).count());
        }
    }

    #[test]
    fn test_level_prefix_overflow_is_malformed() {
        // coeff_token (TotalCoeff=1, T1s=0) = 000101, 然后 16 个 0
        let data = bits_to_bytes("000101000000000000000001");
        let mut br = BitReader::new(&data);
        assert!(matches!(
            decode_block(&mut br, 0, 16),
            Err(AvcError::MalformedVlcCode(_))
        ));
    }

    #[test]
    fn test_encode_rejects_uncodable_level() {
        let mut scan = [0i32; 16];
        scan[0] = 5000;
        assert!(matches!(
            encode_to_bytes(0, &scan),
            Err(AvcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_block_shape() {
        let data = [0xFF];
        let mut br = BitReader::new(&data);
        assert!(decode_block(&mut br, 0, 8).is_err());
        assert!(decode_block(&mut br, 0, 4).is_err());
        assert!(encode_to_bytes(-1, &[0; 16]).is_err());
    }

    #[test]
    fn test_truncated_block_is_exhausted() {
        // coeff_token (TotalCoeff=1, T1s=0) 之后只剩两个填充位
        let data = bits_to_bytes("000101");
        let mut br = BitReader::new(&data);
        assert!(matches!(
            decode_block(&mut br, 0, 16),
            Err(AvcError::BitstreamExhausted { .. })
        ));
    }

    #[test]
    fn test_residual_kind_sizes() {
        assert_eq!(ResidualKind::LumaDc.max_coeff(), 16);
        assert_eq!(ResidualKind::LumaAc.max_coeff(), 15);
        assert_eq!(ResidualKind::ChromaDc.max_coeff(), 4);
    }
}
