//! 比特流写入器.
//!
//! 向字节缓冲区按位写入 H.264 语法元素, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//!
//! 按大端位序写入 (MSB first).

/// 比特流写入器
///
/// # 示例
/// ```
/// use avclite_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_ue(3);
/// bw.write_se(-1);
/// bw.write_rbsp_trailing_bits();
/// assert_eq!(bw.finish(), vec![0b0010_0011, 0b1000_0000]);
/// ```
#[derive(Debug, Clone)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_count == 0
    }

    fn push_current_byte(&mut self) {
        self.data.push(self.current_byte);
        self.current_byte = 0;
        self.bit_count = 0;
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.write_bits(bit & 1, 1);
    }

    /// 写入 1 位标志 `u(1)`
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bits(u32::from(flag), 1);
    }

    /// 写入 N 个位 `u(n)` (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        let mut remaining = n;
        while remaining > 0 {
            let take = remaining.min(8 - u32::from(self.bit_count));
            let chunk = (value >> (remaining - take)) & ((1u32 << take) - 1);
            self.current_byte = ((u32::from(self.current_byte) << take) | chunk) as u8;
            self.bit_count += take as u8;
            remaining -= take;
            if self.bit_count == 8 {
                self.push_current_byte();
            }
        }
    }

    /// 写入无符号 Exp-Golomb 编码 `ue(v)`
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        self.write_bits(0, len - 1);
        if len > 32 {
            // 仅 value = u32::MAX: codeNum + 1 = 2^32
            self.write_bit(1);
            self.write_bits(code as u32, 32);
        } else {
            self.write_bits(code as u32, len);
        }
    }

    /// 写入有符号 Exp-Golomb 编码 `se(v)`
    pub fn write_se(&mut self, value: i32) {
        let code_num = if value > 0 {
            2 * i64::from(value) - 1
        } else {
            -2 * i64::from(value)
        };
        self.write_ue(code_num as u32);
    }

    /// 写入截断 Exp-Golomb 编码 `te(v)`
    pub fn write_te(&mut self, value: u32, max: u32) {
        if max == 1 {
            self.write_bit(1 - (value & 1));
        } else {
            self.write_ue(value);
        }
    }

    /// 写入 `rbsp_trailing_bits()`: 一个停止位 1, 然后以 0 填充到字节边界
    pub fn write_rbsp_trailing_bits(&mut self) {
        self.write_bit(1);
        self.align_to_byte();
    }

    /// 用 0 填充到字节边界
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.push_current_byte();
        }
    }

    /// 完成写入, 不足一字节的部分以 0 补齐
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_byte_aligned() {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_write_bits_basic() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b1011, 4);
        bw.write_bits(0b0001, 4);
        let data = bw.finish();
        assert_eq!(data, vec![0b10110001]);
    }

    #[test]
    fn test_write_bits_32_bit() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFF00FF00, 32);
        let data = bw.finish();
        assert_eq!(data, vec![0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_write_ue_code_words() {
        let mut bw = BitWriter::new();
        for value in [0, 1, 2, 3, 4, 7] {
            bw.write_ue(value);
        }
        assert_eq!(bw.finish(), vec![0b1010_0110, 0b0100_0010, 0b1000_1000]);
    }

    #[test]
    fn test_rbsp_trailing_bits() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_rbsp_trailing_bits();
        assert!(bw.is_byte_aligned());
        assert_eq!(bw.finish(), vec![0b1011_0000]);

        // 已对齐时仍写入完整的停止字节
        let mut bw = BitWriter::new();
        bw.write_bits(0xAB, 8);
        bw.write_rbsp_trailing_bits();
        assert_eq!(bw.finish(), vec![0xAB, 0x80]);
    }

    #[test]
    fn test_read_write_roundtrip_exp_golomb() {
        let unsigned = [0u32, 1, 5, 30, 255, 65_535, 1 << 20, u32::MAX - 1];
        let signed = [0i32, 1, -1, 26, -26, 1000, -1000, i32::MAX, -i32::MAX];

        let mut bw = BitWriter::new();
        for &v in &unsigned {
            bw.write_ue(v);
        }
        for &v in &signed {
            bw.write_se(v);
        }
        bw.write_te(0, 1);
        bw.write_te(3, 5);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        for &v in &unsigned {
            assert_eq!(br.read_ue().unwrap(), v);
        }
        for &v in &signed {
            assert_eq!(br.read_se().unwrap(), v);
        }
        assert_eq!(br.read_te(1).unwrap(), 0);
        assert_eq!(br.read_te(5).unwrap(), 3);
        assert!(!br.more_rbsp_data());
        br.read_rbsp_trailing_bits().unwrap();
    }

    #[test]
    fn test_write_bytes_unaligned() {
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_bytes(&[0xFF]);
        let data = bw.finish();
        assert_eq!(data, vec![0b1111_1111, 0b1000_0000]);
    }
}
