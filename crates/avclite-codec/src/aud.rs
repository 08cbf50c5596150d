//! 访问单元分隔符 (Access Unit Delimiter).

use avclite_core::{AvcError, AvcResult, BitReader, BitWriter};

use crate::nal::{NalPayload, NalUnitType};

/// 访问单元分隔符, 只携带 primary_pic_type
///
/// primary_pic_type 指示该访问单元中可能出现的片类型: 0 为仅 I, 1 为 I/P, 2 为 I/P/B,
/// 3..=7 为含 SP/SI 的组合.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnitDelimiter {
    pub primary_pic_type: u8,
}

impl AccessUnitDelimiter {
    /// 仅含 I 片
    pub const INTRA: Self = Self {
        primary_pic_type: 0,
    };
    /// 含 I 片与 P 片
    pub const INTRA_PREDICTED: Self = Self {
        primary_pic_type: 1,
    };

    pub fn parse(rbsp: &[u8]) -> AvcResult<Self> {
        let mut br = BitReader::new(rbsp);
        let primary_pic_type = br.read_bits(3)? as u8;
        Ok(Self { primary_pic_type })
    }
}

impl NalPayload for AccessUnitDelimiter {
    fn nal_unit_type(&self) -> NalUnitType {
        NalUnitType::Aud
    }

    fn serialize(&self, writer: &mut BitWriter) -> AvcResult<()> {
        if self.primary_pic_type > 7 {
            return Err(AvcError::InvalidArgument(format!(
                "primary_pic_type 超出范围: {}",
                self.primary_pic_type
            )));
        }
        writer.write_bits(u32::from(self.primary_pic_type), 3);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aud_rbsp() {
        assert_eq!(AccessUnitDelimiter::INTRA.to_rbsp().unwrap(), vec![0x10]);
        assert_eq!(
            AccessUnitDelimiter::INTRA_PREDICTED.to_rbsp().unwrap(),
            vec![0x30]
        );
        let aud = AccessUnitDelimiter::parse(&[0x50]).unwrap();
        assert_eq!(aud.primary_pic_type, 2);
        assert!(AccessUnitDelimiter::parse(&[]).is_err());
        let bad = AccessUnitDelimiter {
            primary_pic_type: 8,
        };
        assert!(bad.to_rbsp().is_err());
    }
}
