use std::collections::VecDeque;

use avclite_core::{AvcError, AvcResult, BitReader, Picture};
use log::{debug, trace, warn};

use super::Decoder;
use super::slice::{PictureContext, SliceParams, decode_slice_data};
use crate::aud::AccessUnitDelimiter;
use crate::config::DecoderConfig;
use crate::frame::{Frame, PictureType};
use crate::inter::MotionVector;
use crate::intra::{Intra16x16Mode, IntraChromaMode};
use crate::nal::{NalUnit, NalUnitType, split_annex_b};
use crate::packet::{NOPTS_VALUE, Packet};
use crate::parameter_sets::{ParameterSetTable, Pps, Sps};
use crate::reconstruct::LumaResidual;
use crate::slice_header::{SliceHeader, SliceType};

// ============================================================
// 输出类型
// ============================================================

/// 宏块的预测方式 (诊断信息)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbMode {
    Intra16x16 {
        luma: Intra16x16Mode,
        chroma: IntraChromaMode,
    },
    /// P_L0_16x16, 携带最终运动矢量
    Inter { mv: MotionVector },
    /// P_Skip, 携带推导出的运动矢量
    Skip { mv: MotionVector },
}

/// 逐样本的亮度残差平面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<i32>,
}

impl ResidualPlane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.data[y * self.width + x]
    }

    /// 写入一个宏块的残差
    pub fn put_macroblock(&mut self, mb_x: usize, mb_y: usize, residual: &LumaResidual) {
        for (dy, row) in residual.iter().enumerate() {
            let start = (mb_y * 16 + dy) * self.width + mb_x * 16;
            self.data[start..start + 16].copy_from_slice(row);
        }
    }

    /// 裁剪到左上角 width x height
    pub fn cropped(&self, width: usize, height: usize) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let start = y * self.width;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// 一幅解码完成 (或被截断) 的图像
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    /// 按 SPS 裁剪后的显示图像
    pub picture: Picture,
    pub frame_num: u32,
    /// 包含任一 P 片时为 P
    pub slice_type: SliceType,
    pub idr: bool,
    pub pts: i64,
    /// 是否所有宏块都已解码
    pub complete: bool,
    /// 按光栅顺序的宏块预测方式, 未解码的宏块为 `None`
    pub mode_map: Vec<Option<MbMode>>,
    /// 亮度残差 (需开启 `keep_diagnostics`)
    pub residual: Option<ResidualPlane>,
}

// ============================================================
// 解码会话
// ============================================================

/// H.264 Baseline 解码会话
///
/// 持有 SPS/PPS 表, 最近一幅参考图像 (宏块对齐尺寸) 以及正在解码的图像.
pub struct DecoderSession {
    config: DecoderConfig,
    sets: ParameterSetTable,
    reference: Option<Picture>,
    current: Option<PictureContext>,
    /// 被新图像打断而提前输出的图像
    interrupted: VecDeque<DecodedPicture>,
    /// `Decoder` trait 的输出队列
    output: VecDeque<Frame>,
    packet_pts: i64,
    flushing: bool,
}

impl Default for DecoderSession {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl DecoderSession {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            sets: ParameterSetTable::new(),
            reference: None,
            current: None,
            interrupted: VecDeque::new(),
            output: VecDeque::new(),
            packet_pts: NOPTS_VALUE,
            flushing: false,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 已登记的参数集
    pub fn parameter_sets(&self) -> &ParameterSetTable {
        &self.sets
    }

    /// 当前参考图像 (宏块对齐尺寸)
    pub fn reference(&self) -> Option<&Picture> {
        self.reference.as_ref()
    }

    /// 指定 P 片使用的参考图像
    pub fn set_reference(&mut self, picture: Picture) {
        self.reference = Some(picture);
    }

    /// 处理一个 NAL 单元, 图像完成时返回该图像
    pub fn decode_nal(&mut self, nal: &NalUnit) -> AvcResult<Option<DecodedPicture>> {
        trace!(
            "NAL: type={}, ref_idc={}, rbsp={} 字节",
            nal.nal_type,
            nal.ref_idc,
            nal.rbsp.len()
        );
        match nal.nal_type {
            NalUnitType::Sps => {
                let sps = Sps::parse(&nal.rbsp)?;
                if sps.mb_count() > self.config.max_macroblocks as usize {
                    return Err(AvcError::UnsupportedFeature(format!(
                        "图像宏块数 {} 超过上限 {}",
                        sps.mb_count(),
                        self.config.max_macroblocks,
                    )));
                }
                self.sets.insert_sps(sps);
                Ok(None)
            }
            NalUnitType::Pps => {
                self.sets.insert_pps(Pps::parse(&nal.rbsp)?);
                Ok(None)
            }
            NalUnitType::Slice | NalUnitType::SliceIdr => self.decode_slice(nal),
            NalUnitType::SliceDpa | NalUnitType::SliceDpb | NalUnitType::SliceDpc => Err(
                AvcError::UnsupportedFeature(format!("数据分割片 ({})", nal.nal_type)),
            ),
            NalUnitType::Aud => {
                let aud = AccessUnitDelimiter::parse(&nal.rbsp)?;
                trace!("AUD: primary_pic_type={}", aud.primary_pic_type);
                Ok(None)
            }
            other => {
                trace!("忽略 NAL: {}", other);
                Ok(None)
            }
        }
    }

    /// 解码一个片, 使用会话中的参考图像
    ///
    /// 片完成整幅图像时返回该图像; 参考图像随之更新 (nal_ref_idc != 0).
    pub fn decode_slice(&mut self, nal: &NalUnit) -> AvcResult<Option<DecodedPicture>> {
        let mut br = BitReader::new(&nal.rbsp);
        let header = SliceHeader::parse(&mut br, nal.nal_type, nal.ref_idc, &self.sets)?;
        let (sps, pps) = self.sets.active(header.pps_id)?;
        let (sps, pps) = (sps.clone(), pps.clone());

        if header.redundant_pic_cnt > 0 {
            debug!(
                "跳过冗余片, redundant_pic_cnt={}, frame_num={}",
                header.redundant_pic_cnt, header.frame_num
            );
            return Ok(None);
        }
        debug!(
            "片: {} first_mb={} frame_num={} qp={} idr={}",
            header.slice_type,
            header.first_mb_in_slice,
            header.frame_num,
            header.slice_qp(&pps),
            header.idr,
        );
        if header.disable_deblocking_filter_idc != 1 {
            debug!(
                "码流请求环路滤波 (disable_deblocking_filter_idc={}), 输出未经滤波",
                header.disable_deblocking_filter_idc
            );
        }

        let continues = self
            .current
            .as_ref()
            .is_some_and(|ctx| ctx.accepts(&header) && ctx.sps == sps);
        if !continues {
            if let Some(ctx) = self.current.take() {
                warn!(
                    "图像 frame_num={} 未完整解码 ({}/{} 宏块), 提前输出",
                    ctx.frame_num,
                    ctx.decoded_count,
                    ctx.mode_map.len()
                );
                let pic = self.finish_picture(ctx);
                self.interrupted.push_back(pic);
            }
            if header.idr {
                self.reference = None;
            }
            self.current = Some(PictureContext::new(
                &sps,
                &header,
                self.packet_pts,
                self.config.keep_diagnostics,
            )?);
        }

        let Some(ctx) = self.current.as_mut() else {
            return Ok(None);
        };
        if header.slice_type == SliceType::P {
            ctx.slice_type = SliceType::P;
        }
        let params = SliceParams {
            header: &header,
            pps: &pps,
            reference: self.reference.as_ref(),
            rbsp_end: self.config.rbsp_end,
        };
        let decoded = match decode_slice_data(ctx, &mut br, &params) {
            Ok(n) => n,
            Err(err) => {
                // 上下文已被部分写入, 整幅图像作废
                self.current = None;
                return Err(err);
            }
        };
        trace!("片解码完成: {} 个宏块", decoded);

        if ctx.is_complete()
            && let Some(ctx) = self.current.take()
        {
            return Ok(Some(self.finish_picture(ctx)));
        }
        Ok(None)
    }

    /// 解码一段 Annex B 字节流, 返回其中完成的图像
    pub fn decode_annex_b(&mut self, data: &[u8]) -> AvcResult<Vec<DecodedPicture>> {
        let mut pictures = Vec::new();
        for nal in split_annex_b(data) {
            let done = self.decode_nal(&nal)?;
            pictures.extend(self.interrupted.drain(..));
            pictures.extend(done);
        }
        Ok(pictures)
    }

    /// 输出尚未完成的图像 (流结束时调用)
    pub fn finish(&mut self) -> Option<DecodedPicture> {
        let ctx = self.current.take()?;
        if !ctx.is_complete() {
            warn!(
                "流结束时图像 frame_num={} 仅解码 {}/{} 宏块",
                ctx.frame_num,
                ctx.decoded_count,
                ctx.mode_map.len()
            );
        }
        Some(self.finish_picture(ctx))
    }

    fn finish_picture(&mut self, ctx: PictureContext) -> DecodedPicture {
        let (w, h) = (ctx.sps.display_width(), ctx.sps.display_height());
        let complete = ctx.is_complete();
        if ctx.nal_ref_idc != 0 {
            self.reference = Some(ctx.picture.clone());
        }
        DecodedPicture {
            picture: ctx.picture.cropped(w, h),
            frame_num: ctx.frame_num,
            slice_type: ctx.slice_type,
            idr: ctx.idr,
            pts: ctx.pts,
            complete,
            mode_map: ctx.mode_map,
            residual: ctx.residual.map(|r| r.cropped(w, h)),
        }
    }

    fn push_frame(&mut self, pic: DecodedPicture) {
        let picture_type = match pic.slice_type {
            SliceType::P => PictureType::P,
            _ => PictureType::I,
        };
        self.output.push_back(Frame {
            picture: pic.picture,
            pts: pic.pts,
            is_keyframe: pic.idr,
            picture_type,
        });
    }
}

impl Decoder for DecoderSession {
    fn name(&self) -> &str {
        "avclite-h264"
    }

    fn send_packet(&mut self, packet: &Packet) -> AvcResult<()> {
        if packet.is_empty() {
            self.flushing = true;
            if let Some(pic) = self.finish() {
                self.push_frame(pic);
            }
            return Ok(());
        }
        self.packet_pts = packet.pts;
        for nal in split_annex_b(&packet.data) {
            let result = self.decode_nal(&nal);
            while let Some(pic) = self.interrupted.pop_front() {
                self.push_frame(pic);
            }
            match result {
                Ok(Some(pic)) => self.push_frame(pic),
                Ok(None) => {}
                Err(err) if err.is_bitstream_error() => {
                    warn!("丢弃损坏的 NAL ({}): {}", nal.nal_type, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> AvcResult<Frame> {
        if let Some(frame) = self.output.pop_front() {
            Ok(frame)
        } else if self.flushing {
            Err(AvcError::Eof)
        } else {
            Err(AvcError::NeedMoreData)
        }
    }

    fn flush(&mut self) {
        self.reference = None;
        self.current = None;
        self.interrupted.clear();
        self.output.clear();
        self.packet_pts = NOPTS_VALUE;
        self.flushing = false;
    }
}
