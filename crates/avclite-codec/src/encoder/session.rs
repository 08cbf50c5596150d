use std::collections::VecDeque;

use avclite_core::{AvcError, AvcResult, Picture};
use bytes::Bytes;
use log::{debug, trace};

use super::Encoder;
use super::macroblock::{MbQuant, encode_inter, encode_intra};
use super::slice::{CodedSlice, SliceMb};
use crate::aud::AccessUnitDelimiter;
use crate::config::EncoderConfig;
use crate::frame::Frame;
use crate::inter::{MotionInfo, MotionVector, MvGrid};
use crate::macroblock::Neighbors;
use crate::nal::AnnexBWriter;
use crate::packet::Packet;
use crate::parameter_sets::{Pps, Sps};
use crate::slice_header::{SliceHeader, SliceType};
use crate::transform::chroma_qp;

/// H.264 Baseline 编码会话
///
/// 每帧输出一个访问单元: [AUD] [SPS PPS] 片.
/// SPS/PPS 在首帧时按其尺寸创建, 并在每个 IDR 前重复写出.
pub struct EncoderSession {
    config: EncoderConfig,
    sps: Option<Sps>,
    pps: Option<Pps>,
    /// 上一帧的重建图像 (宏块对齐尺寸)
    reference: Option<Picture>,
    frame_num: u32,
    idr_pic_id: u32,
    frames_since_idr: u32,
    output: VecDeque<Packet>,
    flushing: bool,
}

impl EncoderSession {
    pub fn new(config: EncoderConfig) -> AvcResult<Self> {
        if !(0..=51).contains(&config.qp) {
            return Err(AvcError::InvalidArgument(format!(
                "QP 超出范围 [0, 51]: {}",
                config.qp
            )));
        }
        if !(-12..=12).contains(&config.chroma_qp_index_offset) {
            return Err(AvcError::InvalidArgument(format!(
                "chroma_qp_index_offset 超出范围 [-12, 12]: {}",
                config.chroma_qp_index_offset
            )));
        }
        Ok(Self {
            config,
            sps: None,
            pps: None,
            reference: None,
            frame_num: 0,
            idr_pic_id: 0,
            frames_since_idr: 0,
            output: VecDeque::new(),
            flushing: false,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// 当前 SPS (首帧编码后可用)
    pub fn sps(&self) -> Option<&Sps> {
        self.sps.as_ref()
    }

    pub fn pps(&self) -> Option<&Pps> {
        self.pps.as_ref()
    }

    /// 最近一帧的重建图像 (宏块对齐尺寸, 与解码端参考帧一致)
    pub fn reconstruction(&self) -> Option<&Picture> {
        self.reference.as_ref()
    }

    /// 下一帧强制编码为 IDR
    pub fn request_idr(&mut self) {
        self.reference = None;
    }

    fn parameter_sets(&mut self, picture: &Picture) -> AvcResult<(Sps, Pps)> {
        if let (Some(sps), Some(pps)) = (&self.sps, &self.pps) {
            if sps.display_width() != picture.width() || sps.display_height() != picture.height() {
                return Err(AvcError::InvalidArgument(format!(
                    "帧尺寸 {}x{} 与编码器尺寸 {}x{} 不一致",
                    picture.width(),
                    picture.height(),
                    sps.display_width(),
                    sps.display_height(),
                )));
            }
            return Ok((sps.clone(), pps.clone()));
        }
        let sps = Sps::for_picture(picture.width(), picture.height(), self.config.level_idc)?;
        let pps = Pps::baseline(0, sps.sps_id, self.config.qp, self.config.chroma_qp_index_offset);
        debug!(
            "编码器参数集: {}x{} ({}x{} 宏块), qp={}",
            picture.width(),
            picture.height(),
            sps.mb_width(),
            sps.mb_height(),
            self.config.qp
        );
        self.sps = Some(sps.clone());
        self.pps = Some(pps.clone());
        Ok((sps, pps))
    }

    /// 编码一帧, 返回该访问单元的 Annex B 数据包
    pub fn encode_picture(&mut self, picture: &Picture) -> AvcResult<Packet> {
        let (sps, pps) = self.parameter_sets(picture)?;
        let interval = self.config.idr_interval;
        let idr = self.reference.is_none() || (interval > 0 && self.frames_since_idr >= interval);
        let src = picture.padded(sps.width(), sps.height());
        let quant = MbQuant {
            qp: self.config.qp,
            chroma_qp: chroma_qp(self.config.qp, self.config.chroma_qp_index_offset),
        };

        let mut header = if idr {
            self.frame_num = 0;
            let mut h = SliceHeader::new(SliceType::I, pps.pps_id, 0);
            h.idr_pic_id = self.idr_pic_id;
            self.idr_pic_id = (self.idr_pic_id + 1) % 65536;
            h
        } else {
            SliceHeader::new(SliceType::P, pps.pps_id, self.frame_num)
        };
        header.nal_ref_idc = 3;
        header.disable_deblocking_filter_idc = 1;
        header.slice_qp_delta = self.config.qp - pps.pic_init_qp();

        let mut recon = Picture::new(sps.width(), sps.height())?;
        let macroblocks = match self.reference.as_ref().filter(|_| !idr) {
            None => encode_idr_macroblocks(&src, &mut recon, &sps, quant)?,
            Some(reference) => {
                encode_p_macroblocks(&src, reference, &mut recon, &sps, quant, self.config.p_skip)
            }
        };
        let skipped = macroblocks
            .iter()
            .filter(|mb| matches!(mb, SliceMb::Skip))
            .count();

        let mut writer = AnnexBWriter::new();
        if self.config.emit_aud {
            let aud = if idr {
                AccessUnitDelimiter::INTRA
            } else {
                AccessUnitDelimiter::INTRA_PREDICTED
            };
            writer.write_payload(0, &aud)?;
        }
        if idr {
            writer.write_payload(3, &sps)?;
            writer.write_payload(3, &pps)?;
        }
        let slice = CodedSlice {
            header,
            sps: sps.clone(),
            pps,
            macroblocks,
        };
        writer.write_payload(slice.header.nal_ref_idc, &slice)?;
        let data: Bytes = writer.take();
        trace!(
            "编码帧: {} frame_num={} 跳过宏块={} 字节={}",
            slice.header.slice_type,
            slice.header.frame_num,
            skipped,
            data.len()
        );

        let max_frame_num = 1u32 << sps.log2_max_frame_num();
        self.frame_num = (slice.header.frame_num + 1) % max_frame_num;
        self.frames_since_idr = if idr { 1 } else { self.frames_since_idr + 1 };
        self.reference = Some(recon);

        let mut packet = Packet::from_data(data);
        packet.is_keyframe = idr;
        Ok(packet)
    }
}

fn encode_idr_macroblocks(
    src: &Picture,
    recon: &mut Picture,
    sps: &Sps,
    quant: MbQuant,
) -> AvcResult<Vec<SliceMb>> {
    let mb_width = sps.mb_width();
    (0..sps.mb_count())
        .map(|addr| {
            let avail = Neighbors::for_macroblock(addr, mb_width, 0);
            let layer = encode_intra(src, recon, addr % mb_width, addr / mb_width, avail, quant)?;
            Ok(SliceMb::Coded(layer))
        })
        .collect()
}

fn encode_p_macroblocks(
    src: &Picture,
    reference: &Picture,
    recon: &mut Picture,
    sps: &Sps,
    quant: MbQuant,
    allow_skip: bool,
) -> Vec<SliceMb> {
    let mb_width = sps.mb_width();
    let mut mv_grid = MvGrid::new(mb_width, sps.mb_height());
    let mut out = Vec::with_capacity(sps.mb_count());
    for addr in 0..sps.mb_count() {
        let avail = Neighbors::for_macroblock(addr, mb_width, 0);
        let neighbors = mv_grid.neighbors(addr, avail);
        let mb = encode_inter(
            src,
            reference,
            recon,
            (addr % mb_width, addr / mb_width),
            &neighbors,
            quant,
            allow_skip,
        );
        mv_grid.set(addr, MotionInfo::new(0, MotionVector::ZERO));
        out.push(mb);
    }
    out
}

impl Encoder for EncoderSession {
    fn name(&self) -> &str {
        "avclite-h264"
    }

    fn send_frame(&mut self, frame: Option<&Frame>) -> AvcResult<()> {
        let Some(frame) = frame else {
            self.flushing = true;
            return Ok(());
        };
        let mut packet = self.encode_picture(&frame.picture)?;
        packet.pts = frame.pts;
        packet.dts = frame.pts;
        self.output.push_back(packet);
        Ok(())
    }

    fn receive_packet(&mut self) -> AvcResult<Packet> {
        if let Some(packet) = self.output.pop_front() {
            Ok(packet)
        } else if self.flushing {
            Err(AvcError::Eof)
        } else {
            Err(AvcError::NeedMoreData)
        }
    }

    fn flush(&mut self) {
        self.output.clear();
        self.reference = None;
        self.frame_num = 0;
        self.frames_since_idr = 0;
        self.flushing = false;
    }
}
