//! SPS / PPS 参数集.
//!
//! 只接受 Baseline 可表达的语法: 帧编码, CAVLC, 单个 slice group, 无 VUI.
//! 结构体保存语法元素的原始值, 解析与序列化按标准字段顺序进行, 可逐位往返.

use avclite_core::{AvcError, AvcResult, BitReader, BitWriter};
use log::debug;

use crate::nal::{NalPayload, NalUnitType};

/// 带扩展字段 (chroma_format_idc 等) 的 profile
const HIGH_PROFILES: [u8; 12] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134];

fn out_of_range(field: &str, value: impl std::fmt::Display) -> AvcError {
    AvcError::InvalidFieldValue(format!("{} 超出范围, value={}", field, value))
}

/// 帧裁剪偏移 (4:2:0 下单位为 2 个亮度像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCropping {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// 序列参数集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (66 = Baseline)
    pub profile_idc: u8,
    /// constraint_set0..5 标志与 2 位保留位
    pub constraint_set_flags: u8,
    /// level_idc (30 = 3.0)
    pub level_idc: u8,
    pub sps_id: u32,
    pub log2_max_frame_num_minus4: u32,
    /// 0, 1 或 2
    pub pic_order_cnt_type: u32,
    /// 仅 `pic_order_cnt_type == 0`
    pub log2_max_pic_order_cnt_lsb_minus4: u32,
    /// 以下 4 项仅 `pic_order_cnt_type == 1`
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub offset_for_ref_frame: Vec<i32>,
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub frame_cropping: Option<FrameCropping>,
    pub vui_parameters_present_flag: bool,
}

impl Sps {
    /// 为给定像素尺寸构造 Baseline SPS, 非 16 倍数的尺寸通过裁剪表达
    pub fn for_picture(width: usize, height: usize, level_idc: u8) -> AvcResult<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(AvcError::InvalidArgument(format!(
                "图像尺寸必须为正偶数: {}x{}",
                width, height
            )));
        }
        let mb_width = width.div_ceil(16);
        let mb_height = height.div_ceil(16);
        let crop_right = ((mb_width * 16 - width) / 2) as u32;
        let crop_bottom = ((mb_height * 16 - height) / 2) as u32;
        let frame_cropping = (crop_right > 0 || crop_bottom > 0).then_some(FrameCropping {
            left: 0,
            right: crop_right,
            top: 0,
            bottom: crop_bottom,
        });

        Ok(Self {
            profile_idc: 66,
            // constraint_set0_flag | constraint_set1_flag
            constraint_set_flags: 0xC0,
            level_idc,
            sps_id: 0,
            log2_max_frame_num_minus4: 0,
            pic_order_cnt_type: 2,
            log2_max_pic_order_cnt_lsb_minus4: 0,
            delta_pic_order_always_zero_flag: false,
            offset_for_non_ref_pic: 0,
            offset_for_top_to_bottom_field: 0,
            offset_for_ref_frame: Vec::new(),
            max_num_ref_frames: 1,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_width_in_mbs_minus1: (mb_width - 1) as u32,
            pic_height_in_map_units_minus1: (mb_height - 1) as u32,
            frame_mbs_only_flag: true,
            direct_8x8_inference_flag: true,
            frame_cropping,
            vui_parameters_present_flag: false,
        })
    }

    /// 从 RBSP (不含 NAL 头部) 解析
    pub fn parse(rbsp: &[u8]) -> AvcResult<Self> {
        let mut br = BitReader::new(rbsp);

        let profile_idc = br.read_bits(8)? as u8;
        let constraint_set_flags = br.read_bits(8)? as u8;
        let level_idc = br.read_bits(8)? as u8;
        let sps_id = br.read_ue()?;
        if sps_id > 31 {
            return Err(out_of_range("seq_parameter_set_id", sps_id));
        }
        if HIGH_PROFILES.contains(&profile_idc) {
            return Err(AvcError::UnsupportedFeature(format!(
                "profile_idc={} 的扩展 SPS 字段",
                profile_idc
            )));
        }

        let log2_max_frame_num_minus4 = br.read_ue()?;
        if log2_max_frame_num_minus4 > 12 {
            return Err(out_of_range("log2_max_frame_num_minus4", log2_max_frame_num_minus4));
        }

        let pic_order_cnt_type = br.read_ue()?;
        let mut log2_max_pic_order_cnt_lsb_minus4 = 0;
        let mut delta_pic_order_always_zero_flag = false;
        let mut offset_for_non_ref_pic = 0;
        let mut offset_for_top_to_bottom_field = 0;
        let mut offset_for_ref_frame = Vec::new();
        match pic_order_cnt_type {
            0 => {
                log2_max_pic_order_cnt_lsb_minus4 = br.read_ue()?;
                if log2_max_pic_order_cnt_lsb_minus4 > 12 {
                    return Err(out_of_range(
                        "log2_max_pic_order_cnt_lsb_minus4",
                        log2_max_pic_order_cnt_lsb_minus4,
                    ));
                }
            }
            1 => {
                delta_pic_order_always_zero_flag = br.read_flag()?;
                offset_for_non_ref_pic = br.read_se()?;
                offset_for_top_to_bottom_field = br.read_se()?;
                let cycle = br.read_ue()?;
                if cycle > 255 {
                    return Err(out_of_range("num_ref_frames_in_pic_order_cnt_cycle", cycle));
                }
                for _ in 0..cycle {
                    offset_for_ref_frame.push(br.read_se()?);
                }
            }
            2 => {}
            _ => return Err(out_of_range("pic_order_cnt_type", pic_order_cnt_type)),
        }

        let max_num_ref_frames = br.read_ue()?;
        if max_num_ref_frames > 16 {
            return Err(out_of_range("max_num_ref_frames", max_num_ref_frames));
        }
        let gaps_in_frame_num_value_allowed_flag = br.read_flag()?;
        let pic_width_in_mbs_minus1 = br.read_ue()?;
        let pic_height_in_map_units_minus1 = br.read_ue()?;

        let frame_mbs_only_flag = br.read_flag()?;
        if !frame_mbs_only_flag {
            return Err(AvcError::UnsupportedFeature("场编码 (frame_mbs_only_flag=0)".into()));
        }
        let direct_8x8_inference_flag = br.read_flag()?;

        let frame_cropping = if br.read_flag()? {
            Some(FrameCropping {
                left: br.read_ue()?,
                right: br.read_ue()?,
                top: br.read_ue()?,
                bottom: br.read_ue()?,
            })
        } else {
            None
        };

        let vui_parameters_present_flag = br.read_flag()?;
        if vui_parameters_present_flag {
            return Err(AvcError::UnsupportedFeature("VUI 参数".into()));
        }

        let sps = Self {
            profile_idc,
            constraint_set_flags,
            level_idc,
            sps_id,
            log2_max_frame_num_minus4,
            pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb_minus4,
            delta_pic_order_always_zero_flag,
            offset_for_non_ref_pic,
            offset_for_top_to_bottom_field,
            offset_for_ref_frame,
            max_num_ref_frames,
            gaps_in_frame_num_value_allowed_flag,
            pic_width_in_mbs_minus1,
            pic_height_in_map_units_minus1,
            frame_mbs_only_flag,
            direct_8x8_inference_flag,
            frame_cropping,
            vui_parameters_present_flag,
        };

        if let Some(crop) = sps.frame_cropping {
            let crop_x = 2 * (u64::from(crop.left) + u64::from(crop.right));
            let crop_y = 2 * (u64::from(crop.top) + u64::from(crop.bottom));
            if crop_x >= sps.width() as u64 || crop_y >= sps.height() as u64 {
                return Err(AvcError::InvalidFieldValue(format!(
                    "裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
                    sps.width(),
                    sps.height(),
                    crop_x,
                    crop_y
                )));
            }
        }

        debug!(
            "SPS: id={}, profile={}, level={}, {}x{} (显示 {}x{}), poc_type={}",
            sps.sps_id,
            sps.profile_idc,
            sps.level_idc,
            sps.width(),
            sps.height(),
            sps.display_width(),
            sps.display_height(),
            sps.pic_order_cnt_type
        );
        Ok(sps)
    }

    /// 宽度 (宏块)
    pub fn mb_width(&self) -> usize {
        self.pic_width_in_mbs_minus1 as usize + 1
    }

    /// 高度 (宏块)
    pub fn mb_height(&self) -> usize {
        self.pic_height_in_map_units_minus1 as usize + 1
    }

    /// 每帧宏块数
    pub fn mb_count(&self) -> usize {
        self.mb_width() * self.mb_height()
    }

    /// 解码图像宽度 (PicWidthInSamples)
    pub fn width(&self) -> usize {
        self.mb_width() * 16
    }

    /// 解码图像高度
    pub fn height(&self) -> usize {
        self.mb_height() * 16
    }

    /// 裁剪后的显示宽度
    pub fn display_width(&self) -> usize {
        let crop = self.frame_cropping.unwrap_or_default();
        self.width()
            .saturating_sub(2 * (crop.left as usize + crop.right as usize))
    }

    /// 裁剪后的显示高度
    pub fn display_height(&self) -> usize {
        let crop = self.frame_cropping.unwrap_or_default();
        self.height()
            .saturating_sub(2 * (crop.top as usize + crop.bottom as usize))
    }

    /// frame_num 的位宽
    pub fn log2_max_frame_num(&self) -> u32 {
        self.log2_max_frame_num_minus4 + 4
    }

    /// pic_order_cnt_lsb 的位宽
    pub fn log2_max_pic_order_cnt_lsb(&self) -> u32 {
        self.log2_max_pic_order_cnt_lsb_minus4 + 4
    }
}

impl NalPayload for Sps {
    fn nal_unit_type(&self) -> NalUnitType {
        NalUnitType::Sps
    }

    fn serialize(&self, bw: &mut BitWriter) -> AvcResult<()> {
        bw.write_bits(u32::from(self.profile_idc), 8);
        bw.write_bits(u32::from(self.constraint_set_flags), 8);
        bw.write_bits(u32::from(self.level_idc), 8);
        bw.write_ue(self.sps_id);
        bw.write_ue(self.log2_max_frame_num_minus4);
        bw.write_ue(self.pic_order_cnt_type);
        match self.pic_order_cnt_type {
            0 => bw.write_ue(self.log2_max_pic_order_cnt_lsb_minus4),
            1 => {
                bw.write_flag(self.delta_pic_order_always_zero_flag);
                bw.write_se(self.offset_for_non_ref_pic);
                bw.write_se(self.offset_for_top_to_bottom_field);
                bw.write_ue(self.offset_for_ref_frame.len() as u32);
                for &offset in &self.offset_for_ref_frame {
                    bw.write_se(offset);
                }
            }
            2 => {}
            other => return Err(out_of_range("pic_order_cnt_type", other)),
        }
        bw.write_ue(self.max_num_ref_frames);
        bw.write_flag(self.gaps_in_frame_num_value_allowed_flag);
        bw.write_ue(self.pic_width_in_mbs_minus1);
        bw.write_ue(self.pic_height_in_map_units_minus1);
        if !self.frame_mbs_only_flag {
            return Err(AvcError::UnsupportedFeature("场编码 (frame_mbs_only_flag=0)".into()));
        }
        bw.write_flag(true);
        bw.write_flag(self.direct_8x8_inference_flag);
        bw.write_flag(self.frame_cropping.is_some());
        if let Some(crop) = self.frame_cropping {
            bw.write_ue(crop.left);
            bw.write_ue(crop.right);
            bw.write_ue(crop.top);
            bw.write_ue(crop.bottom);
        }
        if self.vui_parameters_present_flag {
            return Err(AvcError::UnsupportedFeature("VUI 参数".into()));
        }
        bw.write_flag(false);
        Ok(())
    }
}

/// 图像参数集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pps {
    pub pps_id: u32,
    pub sps_id: u32,
    /// 必须为 false (CAVLC)
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
    pub num_ref_idx_l0_default_active_minus1: u32,
    pub num_ref_idx_l1_default_active_minus1: u32,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u32,
    pub pic_init_qp_minus26: i32,
    pub pic_init_qs_minus26: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
}

impl Pps {
    /// 构造引用 `sps_id` 的最简 PPS
    pub fn baseline(pps_id: u32, sps_id: u32, pic_init_qp: i32, chroma_qp_index_offset: i32) -> Self {
        Self {
            pps_id,
            sps_id,
            entropy_coding_mode_flag: false,
            bottom_field_pic_order_in_frame_present_flag: false,
            num_ref_idx_l0_default_active_minus1: 0,
            num_ref_idx_l1_default_active_minus1: 0,
            weighted_pred_flag: false,
            weighted_bipred_idc: 0,
            pic_init_qp_minus26: pic_init_qp - 26,
            pic_init_qs_minus26: 0,
            chroma_qp_index_offset,
            deblocking_filter_control_present_flag: true,
            constrained_intra_pred_flag: false,
            redundant_pic_cnt_present_flag: false,
        }
    }

    /// 从 RBSP (不含 NAL 头部) 解析
    pub fn parse(rbsp: &[u8]) -> AvcResult<Self> {
        let mut br = BitReader::new(rbsp);

        let pps_id = br.read_ue()?;
        if pps_id > 255 {
            return Err(out_of_range("pic_parameter_set_id", pps_id));
        }
        let sps_id = br.read_ue()?;
        if sps_id > 31 {
            return Err(out_of_range("seq_parameter_set_id", sps_id));
        }

        let entropy_coding_mode_flag = br.read_flag()?;
        if entropy_coding_mode_flag {
            return Err(AvcError::UnsupportedFeature("CABAC 熵编码".into()));
        }
        let bottom_field_pic_order_in_frame_present_flag = br.read_flag()?;

        let num_slice_groups_minus1 = br.read_ue()?;
        if num_slice_groups_minus1 > 0 {
            return Err(AvcError::UnsupportedFeature(format!(
                "多个 slice group (num_slice_groups_minus1={})",
                num_slice_groups_minus1
            )));
        }

        let num_ref_idx_l0_default_active_minus1 = br.read_ue()?;
        if num_ref_idx_l0_default_active_minus1 > 31 {
            return Err(out_of_range(
                "num_ref_idx_l0_default_active_minus1",
                num_ref_idx_l0_default_active_minus1,
            ));
        }
        let num_ref_idx_l1_default_active_minus1 = br.read_ue()?;
        if num_ref_idx_l1_default_active_minus1 > 31 {
            return Err(out_of_range(
                "num_ref_idx_l1_default_active_minus1",
                num_ref_idx_l1_default_active_minus1,
            ));
        }

        let weighted_pred_flag = br.read_flag()?;
        let weighted_bipred_idc = br.read_bits(2)?;
        if weighted_bipred_idc > 2 {
            return Err(out_of_range("weighted_bipred_idc", weighted_bipred_idc));
        }

        let pic_init_qp_minus26 = br.read_se()?;
        if !(-26..=25).contains(&pic_init_qp_minus26) {
            return Err(out_of_range("pic_init_qp_minus26", pic_init_qp_minus26));
        }
        let pic_init_qs_minus26 = br.read_se()?;
        if !(-26..=25).contains(&pic_init_qs_minus26) {
            return Err(out_of_range("pic_init_qs_minus26", pic_init_qs_minus26));
        }
        let chroma_qp_index_offset = br.read_se()?;
        if !(-12..=12).contains(&chroma_qp_index_offset) {
            return Err(out_of_range("chroma_qp_index_offset", chroma_qp_index_offset));
        }

        let deblocking_filter_control_present_flag = br.read_flag()?;
        let constrained_intra_pred_flag = br.read_flag()?;
        let redundant_pic_cnt_present_flag = br.read_flag()?;

        if br.more_rbsp_data() {
            return Err(AvcError::UnsupportedFeature(
                "PPS 扩展字段 (transform_8x8_mode_flag 等)".into(),
            ));
        }

        debug!(
            "PPS: id={}, sps_id={}, pic_init_qp={}, chroma_qp_index_offset={}",
            pps_id,
            sps_id,
            26 + pic_init_qp_minus26,
            chroma_qp_index_offset
        );

        Ok(Self {
            pps_id,
            sps_id,
            entropy_coding_mode_flag,
            bottom_field_pic_order_in_frame_present_flag,
            num_ref_idx_l0_default_active_minus1,
            num_ref_idx_l1_default_active_minus1,
            weighted_pred_flag,
            weighted_bipred_idc,
            pic_init_qp_minus26,
            pic_init_qs_minus26,
            chroma_qp_index_offset,
            deblocking_filter_control_present_flag,
            constrained_intra_pred_flag,
            redundant_pic_cnt_present_flag,
        })
    }

    /// 图像初始 QP
    pub fn pic_init_qp(&self) -> i32 {
        26 + self.pic_init_qp_minus26
    }
}

impl NalPayload for Pps {
    fn nal_unit_type(&self) -> NalUnitType {
        NalUnitType::Pps
    }

    fn serialize(&self, bw: &mut BitWriter) -> AvcResult<()> {
        if self.entropy_coding_mode_flag {
            return Err(AvcError::UnsupportedFeature("CABAC 熵编码".into()));
        }
        bw.write_ue(self.pps_id);
        bw.write_ue(self.sps_id);
        bw.write_flag(false);
        bw.write_flag(self.bottom_field_pic_order_in_frame_present_flag);
        // num_slice_groups_minus1
        bw.write_ue(0);
        bw.write_ue(self.num_ref_idx_l0_default_active_minus1);
        bw.write_ue(self.num_ref_idx_l1_default_active_minus1);
        bw.write_flag(self.weighted_pred_flag);
        bw.write_bits(self.weighted_bipred_idc, 2);
        bw.write_se(self.pic_init_qp_minus26);
        bw.write_se(self.pic_init_qs_minus26);
        bw.write_se(self.chroma_qp_index_offset);
        bw.write_flag(self.deblocking_filter_control_present_flag);
        bw.write_flag(self.constrained_intra_pred_flag);
        bw.write_flag(self.redundant_pic_cnt_present_flag);
        Ok(())
    }
}

/// 按 id 索引的 SPS / PPS 表
///
/// 同 id 的新参数集覆盖旧值. 激活 (查找) 时才检查 PPS 引用的 SPS 是否存在.
#[derive(Debug, Clone)]
pub struct ParameterSetTable {
    sps: [Option<Sps>; 32],
    pps: Box<[Option<Pps>; 256]>,
}

impl Default for ParameterSetTable {
    fn default() -> Self {
        Self {
            sps: std::array::from_fn(|_| None),
            pps: Box::new(std::array::from_fn(|_| None)),
        }
    }
}

impl ParameterSetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sps(&mut self, sps: Sps) {
        let id = sps.sps_id as usize;
        if let Some(slot) = self.sps.get_mut(id) {
            *slot = Some(sps);
        }
    }

    pub fn insert_pps(&mut self, pps: Pps) {
        let id = pps.pps_id as usize;
        if let Some(slot) = self.pps.get_mut(id) {
            *slot = Some(pps);
        }
    }

    pub fn sps(&self, id: u32) -> Option<&Sps> {
        self.sps.get(id as usize).and_then(Option::as_ref)
    }

    pub fn pps(&self, id: u32) -> Option<&Pps> {
        self.pps.get(id as usize).and_then(Option::as_ref)
    }

    /// 查找 `pps_id` 及其引用的 SPS
    pub fn active(&self, pps_id: u32) -> AvcResult<(&Sps, &Pps)> {
        let pps = self.pps(pps_id).ok_or_else(|| {
            AvcError::InvalidFieldValue(format!("引用了不存在的 PPS: id={}", pps_id))
        })?;
        let sps = self.sps(pps.sps_id).ok_or_else(|| {
            AvcError::InvalidFieldValue(format!(
                "PPS {} 引用了不存在的 SPS: id={}",
                pps_id, pps.sps_id
            ))
        })?;
        Ok((sps, pps))
    }

    /// 清空全部参数集
    pub fn clear(&mut self) {
        self.sps.iter_mut().for_each(|s| *s = None);
        self.pps.iter_mut().for_each(|p| *p = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SPS: [u8; 8] = [0x42, 0xC0, 0x1E, 0xDB, 0x02, 0x00, 0x41, 0x90];
    const SAMPLE_PPS: [u8; 4] = [0xCA, 0x83, 0xCB, 0x20];

    #[test]
    fn test_parse_sample_sps() {
        let sps = Sps::parse(&SAMPLE_SPS).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.constraint_set_flags, 0xC0);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.sps_id, 0);
        assert_eq!(sps.log2_max_frame_num(), 4);
        assert_eq!(sps.pic_order_cnt_type, 2);
        assert_eq!(sps.max_num_ref_frames, 2);
        assert_eq!(sps.width(), 512);
        assert_eq!(sps.height(), 512);
        assert_eq!(sps.mb_count(), 1024);
        assert!(sps.frame_cropping.is_none());
        assert_eq!(sps.display_width(), 512);
    }

    #[test]
    fn test_sample_sps_serialize_roundtrip() {
        let sps = Sps::parse(&SAMPLE_SPS).unwrap();
        assert_eq!(sps.to_rbsp().unwrap(), SAMPLE_SPS.to_vec());
    }

    #[test]
    fn test_parse_sample_pps() {
        let pps = Pps::parse(&SAMPLE_PPS).unwrap();
        assert_eq!(pps.pps_id, 0);
        assert_eq!(pps.sps_id, 0);
        assert!(!pps.entropy_coding_mode_flag);
        assert_eq!(pps.num_ref_idx_l0_default_active_minus1, 1);
        assert_eq!(pps.pic_init_qp(), 23);
        assert_eq!(pps.chroma_qp_index_offset, -2);
        assert!(pps.deblocking_filter_control_present_flag);
        assert_eq!(pps.to_rbsp().unwrap(), SAMPLE_PPS.to_vec());
    }

    #[test]
    fn test_for_picture_cropping() {
        let sps = Sps::for_picture(100, 36, 30).unwrap();
        assert_eq!(sps.mb_width(), 7);
        assert_eq!(sps.mb_height(), 3);
        assert_eq!(
            sps.frame_cropping,
            Some(FrameCropping {
                left: 0,
                right: 6,
                top: 0,
                bottom: 6
            })
        );
        assert_eq!(sps.display_width(), 100);
        assert_eq!(sps.display_height(), 36);

        let parsed = Sps::parse(&sps.to_rbsp().unwrap()).unwrap();
        assert_eq!(parsed, sps);
        assert!(Sps::for_picture(15, 16, 30).is_err());
    }

    #[test]
    fn test_poc_type_variants_roundtrip() {
        let mut sps = Sps::for_picture(32, 32, 30).unwrap();
        sps.pic_order_cnt_type = 1;
        sps.offset_for_non_ref_pic = -2;
        sps.offset_for_ref_frame = vec![3, -1];
        assert_eq!(Sps::parse(&sps.to_rbsp().unwrap()).unwrap(), sps);

        sps.pic_order_cnt_type = 0;
        sps.offset_for_non_ref_pic = 0;
        sps.offset_for_ref_frame.clear();
        sps.log2_max_pic_order_cnt_lsb_minus4 = 2;
        assert_eq!(Sps::parse(&sps.to_rbsp().unwrap()).unwrap(), sps);
    }

    #[test]
    fn test_sps_rejects_unsupported() {
        let mut sps = Sps::for_picture(32, 32, 30).unwrap();
        sps.vui_parameters_present_flag = true;
        let mut bw = BitWriter::new();
        assert!(matches!(
            sps.serialize(&mut bw),
            Err(AvcError::UnsupportedFeature(_))
        ));

        // 把最后的 vui_parameters_present_flag 置 1
        let mut rbsp = Sps::for_picture(32, 32, 30).unwrap().to_rbsp().unwrap();
        let last = rbsp.len() - 1;
        let stop = rbsp[last].trailing_zeros();
        rbsp[last] |= 1 << (stop + 1);
        rbsp.push(0x80);
        assert!(matches!(
            Sps::parse(&rbsp),
            Err(AvcError::UnsupportedFeature(_))
        ));

        // High profile
        assert!(matches!(
            Sps::parse(&[100, 0, 40, 0x80]),
            Err(AvcError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_pps_rejects_cabac() {
        let mut pps = Pps::baseline(0, 0, 26, 0);
        let mut bw = BitWriter::new();
        pps.serialize(&mut bw).unwrap();
        // pps_id='1', sps_id='1', 然后 entropy_coding_mode_flag
        let mut rbsp = pps.to_rbsp().unwrap();
        rbsp[0] |= 0b0010_0000;
        assert!(matches!(
            Pps::parse(&rbsp),
            Err(AvcError::UnsupportedFeature(_))
        ));
        pps.entropy_coding_mode_flag = true;
        assert!(pps.to_rbsp().is_err());
    }

    #[test]
    fn test_parameter_set_table() {
        let mut table = ParameterSetTable::new();
        assert!(matches!(
            table.active(0),
            Err(AvcError::InvalidFieldValue(_))
        ));
        table.insert_pps(Pps::baseline(3, 1, 26, 0));
        assert!(table.active(3).is_err());

        let mut sps = Sps::for_picture(32, 32, 30).unwrap();
        sps.sps_id = 1;
        table.insert_sps(sps);
        let (sps, pps) = table.active(3).unwrap();
        assert_eq!(sps.sps_id, 1);
        assert_eq!(pps.pps_id, 3);

        table.insert_pps(Pps::baseline(3, 1, 30, 0));
        assert_eq!(table.pps(3).unwrap().pic_init_qp(), 30);
        table.clear();
        assert!(table.sps(1).is_none());
    }

    #[test]
    fn test_truncated_sps_is_exhausted() {
        assert!(matches!(
            Sps::parse(&SAMPLE_SPS[..3]),
            Err(AvcError::BitstreamExhausted { .. })
        ));
    }
}
