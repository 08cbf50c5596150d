//! 比特流读取器.
//!
//! 从 RBSP 字节缓冲区中按位读取语法元素, 覆盖 H.264 使用的 `u(n)`, `ue(v)`, `se(v)`
//! 描述符以及 `more_rbsp_data()` 判定.
//!
//! 按大端位序读取 (MSB first).

use crate::{AvcError, AvcResult};

/// Exp-Golomb 前导零的最大个数, 超过即视为损坏的码字
const MAX_EXP_GOLOMB_ZEROS: u32 = 31;

/// 比特流读取器
///
/// 读取位置永远不会超过缓冲区长度, 越界读取返回 [`AvcError::BitstreamExhausted`].
///
/// # 示例
/// ```
/// use avclite_core::bitreader::BitReader;
///
/// let data = [0b1010_0110];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_ue().unwrap(), 0);
/// assert_eq!(br.read_ue().unwrap(), 1);
/// assert_eq!(br.read_se().unwrap(), -1);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    fn exhausted(&self, needed: usize) -> AvcError {
        AvcError::BitstreamExhausted {
            needed,
            remaining: self.bits_left(),
        }
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> AvcResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(self.exhausted(1));
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 位标志 `u(1)`
    pub fn read_flag(&mut self) -> AvcResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 `u(n)` (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> AvcResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(AvcError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(self.exhausted(n as usize));
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取无符号 Exp-Golomb 编码 `ue(v)`
    ///
    /// 统计前导零个数 L, 再读取 L 位后缀, 值为 `2^L - 1 + suffix`.
    pub fn read_ue(&mut self) -> AvcResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > MAX_EXP_GOLOMB_ZEROS {
                return Err(AvcError::MalformedVlcCode(format!(
                    "Exp-Golomb 前导零过多: {}",
                    leading_zeros,
                )));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = u64::from(self.read_bits(leading_zeros)?);
        let value = (1u64 << leading_zeros) - 1 + suffix;
        u32::try_from(value)
            .map_err(|_| AvcError::MalformedVlcCode(format!("Exp-Golomb 值溢出: {}", value)))
    }

    /// 读取有符号 Exp-Golomb 编码 `se(v)`
    ///
    /// 偶数码号映射为 `-k/2`, 奇数码号映射为 `(k+1)/2`.
    pub fn read_se(&mut self) -> AvcResult<i32> {
        let code_num = i64::from(self.read_ue()?);
        let value = if code_num & 1 == 1 {
            (code_num + 1) / 2
        } else {
            -(code_num / 2)
        };
        Ok(value as i32)
    }

    /// 读取截断 Exp-Golomb 编码 `te(v)`
    ///
    /// `max` 为语法元素允许的最大值; `max == 1` 时为单个取反位.
    pub fn read_te(&mut self, max: u32) -> AvcResult<u32> {
        if max == 1 {
            Ok(1 - self.read_bit()?)
        } else {
            self.read_ue()
        }
    }

    /// 窥视 N 个位 (不移动位置)
    pub fn peek_bits(&self, n: u32) -> AvcResult<u32> {
        self.clone().read_bits(n)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> AvcResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(self.exhausted(n as usize));
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 判定 RBSP 中是否还有语法数据 (`more_rbsp_data()`)
    ///
    /// 当前位置之后, 除最后一个 `1` (rbsp_stop_one_bit) 及其后的零填充外仍有数据时返回 true.
    pub fn more_rbsp_data(&self) -> bool {
        let Some(last) = self.data.iter().rposition(|&b| b != 0) else {
            return false;
        };
        let stop_bit_pos = last * 8 + 7 - self.data[last].trailing_zeros() as usize;
        self.bits_read() < stop_bit_pos
    }

    /// 读取 `rbsp_trailing_bits()` 并校验停止位
    pub fn read_rbsp_trailing_bits(&mut self) -> AvcResult<()> {
        if self.read_bit()? != 1 {
            return Err(AvcError::InvalidFieldValue(
                "rbsp_stop_one_bit 必须为 1".into(),
            ));
        }
        while !self.is_byte_aligned() {
            if self.read_bit()? != 0 {
                return Err(AvcError::InvalidFieldValue(
                    "rbsp_alignment_zero_bit 必须为 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
