//! 片头 (slice_header) 的解析与序列化.

use avclite_core::{AvcError, AvcResult, BitReader, BitWriter};
use log::debug;

use crate::nal::NalUnitType;
use crate::parameter_sets::{ParameterSetTable, Pps, Sps};

/// 片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceType {
    P = 0,
    B = 1,
    I = 2,
    Sp = 3,
    Si = 4,
}

impl SliceType {
    /// 从 slice_type 语法值解析, 返回类型及是否为 5..=9 的形式
    pub fn from_code(code: u32) -> AvcResult<(Self, bool)> {
        let ty = match code % 5 {
            0 => Self::P,
            1 => Self::B,
            2 => Self::I,
            3 => Self::Sp,
            _ => Self::Si,
        };
        if code > 9 {
            return Err(AvcError::InvalidFieldValue(format!("slice_type 超出范围: {}", code)));
        }
        Ok((ty, code >= 5))
    }

    /// 是否为帧内片
    pub fn is_intra(&self) -> bool {
        matches!(self, Self::I | Self::Si)
    }
}

impl std::fmt::Display for SliceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::P => "P",
            Self::B => "B",
            Self::I => "I",
            Self::Sp => "SP",
            Self::Si => "SI",
        };
        f.write_str(name)
    }
}

/// 片头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    /// 所在 NAL 单元是否为 IDR
    pub idr: bool,
    /// 所在 NAL 单元的 nal_ref_idc
    pub nal_ref_idc: u8,
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    /// slice_type 使用 5..=9 形式 (同图像所有片类型相同)
    pub slice_type_fixed: bool,
    pub pps_id: u32,
    pub frame_num: u32,
    /// 仅 IDR
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub no_output_of_prior_pics_flag: bool,
    pub long_term_reference_flag: bool,
    pub slice_qp_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
}

impl SliceHeader {
    /// 构造一个最简片头 (帧内片为 IDR)
    pub fn new(slice_type: SliceType, pps_id: u32, frame_num: u32) -> Self {
        let idr = slice_type.is_intra();
        Self {
            idr,
            nal_ref_idc: 3,
            first_mb_in_slice: 0,
            slice_type,
            slice_type_fixed: false,
            pps_id,
            frame_num,
            idr_pic_id: 0,
            pic_order_cnt_lsb: 0,
            delta_pic_order_cnt_bottom: 0,
            delta_pic_order_cnt: [0; 2],
            redundant_pic_cnt: 0,
            num_ref_idx_active_override_flag: false,
            num_ref_idx_l0_active_minus1: 0,
            no_output_of_prior_pics_flag: false,
            long_term_reference_flag: false,
            slice_qp_delta: 0,
            disable_deblocking_filter_idc: 0,
            slice_alpha_c0_offset_div2: 0,
            slice_beta_offset_div2: 0,
        }
    }

    /// 按语法顺序解析片头, 读取器停在 slice_data 起始处
    pub fn parse(
        br: &mut BitReader,
        nal_type: NalUnitType,
        nal_ref_idc: u8,
        sets: &ParameterSetTable,
    ) -> AvcResult<Self> {
        let idr = nal_type.is_idr();
        let first_mb_in_slice = br.read_ue()?;
        let (slice_type, slice_type_fixed) = SliceType::from_code(br.read_ue()?)?;
        match slice_type {
            SliceType::P | SliceType::I => {}
            other => {
                return Err(AvcError::UnsupportedFeature(format!("{} 片", other)));
            }
        }
        if idr && slice_type != SliceType::I {
            return Err(AvcError::InvalidFieldValue(format!(
                "IDR 图像中出现 {} 片",
                slice_type
            )));
        }

        let pps_id = br.read_ue()?;
        let (sps, pps) = sets.active(pps_id)?;
        if first_mb_in_slice as usize >= sps.mb_count() {
            return Err(AvcError::InvalidFieldValue(format!(
                "first_mb_in_slice 超出范围: {} (共 {} 个宏块)",
                first_mb_in_slice,
                sps.mb_count()
            )));
        }

        let mut hdr = Self::new(slice_type, pps_id, 0);
        hdr.idr = idr;
        hdr.nal_ref_idc = nal_ref_idc;
        hdr.first_mb_in_slice = first_mb_in_slice;
        hdr.slice_type_fixed = slice_type_fixed;
        hdr.frame_num = br.read_bits(sps.log2_max_frame_num())?;

        if idr {
            hdr.idr_pic_id = br.read_ue()?;
        }

        if sps.pic_order_cnt_type == 0 {
            hdr.pic_order_cnt_lsb = br.read_bits(sps.log2_max_pic_order_cnt_lsb())?;
            if pps.bottom_field_pic_order_in_frame_present_flag {
                hdr.delta_pic_order_cnt_bottom = br.read_se()?;
            }
        } else if sps.pic_order_cnt_type == 1 && !sps.delta_pic_order_always_zero_flag {
            hdr.delta_pic_order_cnt[0] = br.read_se()?;
            if pps.bottom_field_pic_order_in_frame_present_flag {
                hdr.delta_pic_order_cnt[1] = br.read_se()?;
            }
        }

        if pps.redundant_pic_cnt_present_flag {
            hdr.redundant_pic_cnt = br.read_ue()?;
        }

        hdr.num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1;
        if slice_type == SliceType::P {
            hdr.num_ref_idx_active_override_flag = br.read_flag()?;
            if hdr.num_ref_idx_active_override_flag {
                hdr.num_ref_idx_l0_active_minus1 = br.read_ue()?;
                if hdr.num_ref_idx_l0_active_minus1 > 31 {
                    return Err(AvcError::InvalidFieldValue(format!(
                        "num_ref_idx_l0_active_minus1 超出范围: {}",
                        hdr.num_ref_idx_l0_active_minus1
                    )));
                }
            }

            // ref_pic_list_modification()
            if br.read_flag()? {
                return Err(AvcError::UnsupportedFeature("参考列表重排序".into()));
            }

            if pps.weighted_pred_flag {
                return Err(AvcError::UnsupportedFeature("加权预测".into()));
            }
        }

        // dec_ref_pic_marking()
        if nal_ref_idc != 0 {
            if idr {
                hdr.no_output_of_prior_pics_flag = br.read_flag()?;
                hdr.long_term_reference_flag = br.read_flag()?;
            } else if br.read_flag()? {
                return Err(AvcError::UnsupportedFeature("自适应参考图像标记".into()));
            }
        }

        hdr.slice_qp_delta = br.read_se()?;
        let qp = hdr.slice_qp(pps);
        if !(0..=51).contains(&qp) {
            return Err(AvcError::InvalidFieldValue(format!("SliceQPY 超出范围: {}", qp)));
        }

        if pps.deblocking_filter_control_present_flag {
            hdr.disable_deblocking_filter_idc = br.read_ue()?;
            if hdr.disable_deblocking_filter_idc > 2 {
                return Err(AvcError::InvalidFieldValue(format!(
                    "disable_deblocking_filter_idc 超出范围: {}",
                    hdr.disable_deblocking_filter_idc
                )));
            }
            if hdr.disable_deblocking_filter_idc != 1 {
                hdr.slice_alpha_c0_offset_div2 = br.read_se()?;
                hdr.slice_beta_offset_div2 = br.read_se()?;
            }
        }

        debug!(
            "片头: type={}, first_mb={}, frame_num={}, pps={}, qp={}, idr={}",
            hdr.slice_type, hdr.first_mb_in_slice, hdr.frame_num, hdr.pps_id, qp, hdr.idr
        );
        Ok(hdr)
    }

    /// 按语法顺序写入片头
    pub fn write(&self, bw: &mut BitWriter, sps: &Sps, pps: &Pps) -> AvcResult<()> {
        if !matches!(self.slice_type, SliceType::P | SliceType::I) {
            return Err(AvcError::UnsupportedFeature(format!("{} 片", self.slice_type)));
        }
        let max_frame_num = 1u32 << sps.log2_max_frame_num();
        if self.frame_num >= max_frame_num {
            return Err(AvcError::InvalidArgument(format!(
                "frame_num {} 超出 MaxFrameNum {}",
                self.frame_num, max_frame_num
            )));
        }

        bw.write_ue(self.first_mb_in_slice);
        let code = self.slice_type as u32 + if self.slice_type_fixed { 5 } else { 0 };
        bw.write_ue(code);
        bw.write_ue(self.pps_id);
        bw.write_bits(self.frame_num, sps.log2_max_frame_num());
        if self.idr {
            bw.write_ue(self.idr_pic_id);
        }

        if sps.pic_order_cnt_type == 0 {
            bw.write_bits(self.pic_order_cnt_lsb, sps.log2_max_pic_order_cnt_lsb());
            if pps.bottom_field_pic_order_in_frame_present_flag {
                bw.write_se(self.delta_pic_order_cnt_bottom);
            }
        } else if sps.pic_order_cnt_type == 1 && !sps.delta_pic_order_always_zero_flag {
            bw.write_se(self.delta_pic_order_cnt[0]);
            if pps.bottom_field_pic_order_in_frame_present_flag {
                bw.write_se(self.delta_pic_order_cnt[1]);
            }
        }

        if pps.redundant_pic_cnt_present_flag {
            bw.write_ue(self.redundant_pic_cnt);
        }

        if self.slice_type == SliceType::P {
            bw.write_flag(self.num_ref_idx_active_override_flag);
            if self.num_ref_idx_active_override_flag {
                bw.write_ue(self.num_ref_idx_l0_active_minus1);
            }
            // ref_pic_list_modification_flag_l0
            bw.write_flag(false);
        }

        if self.nal_ref_idc != 0 {
            if self.idr {
                bw.write_flag(self.no_output_of_prior_pics_flag);
                bw.write_flag(self.long_term_reference_flag);
            } else {
                // adaptive_ref_pic_marking_mode_flag
                bw.write_flag(false);
            }
        }

        bw.write_se(self.slice_qp_delta);

        if pps.deblocking_filter_control_present_flag {
            bw.write_ue(self.disable_deblocking_filter_idc);
            if self.disable_deblocking_filter_idc != 1 {
                bw.write_se(self.slice_alpha_c0_offset_div2);
                bw.write_se(self.slice_beta_offset_div2);
            }
        }
        Ok(())
    }

    /// SliceQPY = 26 + pic_init_qp_minus26 + slice_qp_delta
    pub fn slice_qp(&self, pps: &Pps) -> i32 {
        pps.pic_init_qp() + self.slice_qp_delta
    }

    /// NAL 单元类型
    pub fn nal_unit_type(&self) -> NalUnitType {
        if self.idr {
            NalUnitType::SliceIdr
        } else {
            NalUnitType::Slice
        }
    }
}
