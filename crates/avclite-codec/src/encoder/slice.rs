use avclite_core::{AvcError, AvcResult, BitWriter};

use crate::macroblock::{MacroblockLayer, NcGrid};
use crate::nal::{NalPayload, NalUnitType};
use crate::parameter_sets::{Pps, Sps};
use crate::slice_header::{SliceHeader, SliceType};

/// 片中的一个宏块
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceMb {
    /// P_Skip, 计入 mb_skip_run
    Skip,
    Coded(MacroblockLayer),
}

/// 一个待写出的片: 片头 + 按光栅顺序的宏块
#[derive(Debug, Clone)]
pub struct CodedSlice {
    pub header: SliceHeader,
    pub sps: Sps,
    pub pps: Pps,
    pub macroblocks: Vec<SliceMb>,
}

impl NalPayload for CodedSlice {
    fn nal_unit_type(&self) -> NalUnitType {
        self.header.nal_unit_type()
    }

    fn serialize(&self, writer: &mut BitWriter) -> AvcResult<()> {
        let first_mb = self.header.first_mb_in_slice as usize;
        if first_mb + self.macroblocks.len() > self.sps.mb_count() {
            return Err(AvcError::InvalidArgument(format!(
                "片宏块数 {} (起始 {}) 超出图像宏块数 {}",
                self.macroblocks.len(),
                first_mb,
                self.sps.mb_count(),
            )));
        }
        self.header.write(writer, &self.sps, &self.pps)?;

        let slice_type = self.header.slice_type;
        let p_slice = slice_type == SliceType::P;
        let mb_width = self.sps.mb_width();
        let mut nc = NcGrid::new(mb_width, self.sps.mb_height());
        let mut skip_run = 0u32;

        for (i, mb) in self.macroblocks.iter().enumerate() {
            let addr = first_mb + i;
            let (mb_x, mb_y) = (addr % mb_width, addr / mb_width);
            match mb {
                SliceMb::Skip if p_slice => {
                    nc.fill_macroblock(mb_x, mb_y, 0);
                    skip_run += 1;
                }
                SliceMb::Skip => {
                    return Err(AvcError::InvalidArgument(format!(
                        "{} 片中不能出现 P_Skip",
                        slice_type
                    )));
                }
                SliceMb::Coded(layer) => {
                    if p_slice {
                        writer.write_ue(skip_run);
                        skip_run = 0;
                    }
                    layer.write(
                        writer,
                        slice_type,
                        self.header.num_ref_idx_l0_active_minus1,
                        &mut nc,
                        mb_x,
                        mb_y,
                    )?;
                }
            }
        }
        if skip_run > 0 {
            writer.write_ue(skip_run);
        }
        Ok(())
    }
}
