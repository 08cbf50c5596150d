use avclite_core::{AvcError, AvcResult, BitReader, Picture};
use log::trace;

use super::session::{MbMode, ResidualPlane};
use crate::config::RbspEndPolicy;
use crate::inter::{
    MotionInfo, MvGrid, motion_compensate_16x16, predict_mv_16x16, predict_p_skip_mv,
};
use crate::intra::{IntraNeighbors, predict_chroma_8x8, predict_luma_16x16};
use crate::macroblock::{
    MacroblockLayer, MbResidual, MbType, NcGrid, Neighbors, apply_qp_delta,
};
use crate::parameter_sets::{Pps, Sps};
use crate::reconstruct::{
    LumaResidual, MbPrediction, reconstruct_inter, reconstruct_intra16x16,
};
use crate::slice_header::{SliceHeader, SliceType};
use crate::transform::chroma_qp;

// ============================================================
// 图像解码上下文
// ============================================================

/// 正在解码的图像 (一个或多个片)
pub(super) struct PictureContext {
    pub(super) sps: Sps,
    /// 宏块对齐尺寸的重建图像
    pub(super) picture: Picture,
    pub(super) frame_num: u32,
    pub(super) slice_type: SliceType,
    pub(super) idr: bool,
    pub(super) nal_ref_idc: u8,
    pub(super) pts: i64,
    pub(super) mode_map: Vec<Option<MbMode>>,
    pub(super) residual: Option<ResidualPlane>,
    pub(super) decoded_count: usize,
    mv_grid: MvGrid,
    nc: NcGrid,
}

impl PictureContext {
    pub(super) fn new(
        sps: &Sps,
        header: &SliceHeader,
        pts: i64,
        keep_diagnostics: bool,
    ) -> AvcResult<Self> {
        let (mb_width, mb_height) = (sps.mb_width(), sps.mb_height());
        Ok(Self {
            sps: sps.clone(),
            picture: Picture::new(sps.width(), sps.height())?,
            frame_num: header.frame_num,
            slice_type: header.slice_type,
            idr: header.idr,
            nal_ref_idc: header.nal_ref_idc,
            pts,
            mode_map: vec![None; sps.mb_count()],
            residual: keep_diagnostics.then(|| ResidualPlane::new(sps.width(), sps.height())),
            decoded_count: 0,
            mv_grid: MvGrid::new(mb_width, mb_height),
            nc: NcGrid::new(mb_width, mb_height),
        })
    }

    /// 所有宏块均已解码
    pub(super) fn is_complete(&self) -> bool {
        self.decoded_count == self.mode_map.len()
    }

    /// 片头是否属于本图像
    pub(super) fn accepts(&self, header: &SliceHeader) -> bool {
        header.first_mb_in_slice != 0
            && header.frame_num == self.frame_num
            && header.idr == self.idr
    }

    fn is_intra(&self, mb_addr: usize) -> bool {
        matches!(
            self.mode_map.get(mb_addr).copied().flatten(),
            Some(MbMode::Intra16x16 { .. })
        )
    }

    /// constrained_intra_pred_flag 下只保留帧内邻居
    fn intra_only(&self, mb_addr: usize, avail: Neighbors) -> Neighbors {
        let w = self.sps.mb_width();
        let mut out = avail;
        let checks = [
            (Neighbors::LEFT, mb_addr.checked_sub(1)),
            (Neighbors::TOP, mb_addr.checked_sub(w)),
            (Neighbors::TOP_RIGHT, (mb_addr + 1).checked_sub(w)),
            (Neighbors::TOP_LEFT, mb_addr.checked_sub(w + 1)),
        ];
        for (flag, addr) in checks {
            if avail.contains(flag) && !addr.is_some_and(|a| self.is_intra(a)) {
                out.remove(flag);
            }
        }
        out
    }

    fn record(&mut self, mb_addr: usize, mode: MbMode, luma_residual: &LumaResidual) {
        let slot = &mut self.mode_map[mb_addr];
        if slot.is_none() {
            self.decoded_count += 1;
        }
        *slot = Some(mode);
        if let Some(plane) = self.residual.as_mut() {
            let w = self.sps.mb_width();
            plane.put_macroblock(mb_addr % w, mb_addr / w, luma_residual);
        }
    }
}

// ============================================================
// 片数据状态机
// ============================================================

/// 片级解码参数
pub(super) struct SliceParams<'a> {
    pub(super) header: &'a SliceHeader,
    pub(super) pps: &'a Pps,
    pub(super) reference: Option<&'a Picture>,
    pub(super) rbsp_end: RbspEndPolicy,
}

fn more_data(br: &BitReader, policy: RbspEndPolicy) -> bool {
    match policy {
        RbspEndPolicy::Exact => br.more_rbsp_data(),
        RbspEndPolicy::Heuristic => br.bits_left() >= 17,
    }
}

/// 解码 slice_data(), 返回本片解码的宏块数
pub(super) fn decode_slice_data(
    ctx: &mut PictureContext,
    br: &mut BitReader,
    params: &SliceParams<'_>,
) -> AvcResult<usize> {
    let header = params.header;
    let mb_width = ctx.sps.mb_width();
    let mb_count = ctx.sps.mb_count();
    let first_mb = header.first_mb_in_slice as usize;
    let p_slice = header.slice_type == SliceType::P;

    let reference = match (p_slice, params.reference) {
        (false, _) => None,
        (true, Some(r)) => {
            if r.width() != ctx.picture.width() || r.height() != ctx.picture.height() {
                return Err(AvcError::InvalidArgument(format!(
                    "参考帧尺寸 {}x{} 与当前图像 {}x{} 不一致",
                    r.width(),
                    r.height(),
                    ctx.picture.width(),
                    ctx.picture.height(),
                )));
            }
            Some(r)
        }
        (true, None) => {
            return Err(AvcError::InvalidFieldValue("P 片缺少参考帧".into()));
        }
    };

    let mut qp = header.slice_qp(params.pps);
    let chroma_offset = params.pps.chroma_qp_index_offset;
    let constrained_intra = params.pps.constrained_intra_pred_flag;
    ctx.nc.reset();

    let mut mb_addr = first_mb;
    let mut decoded = 0usize;
    while mb_addr < mb_count {
        if let Some(reference) = reference {
            let run = br.read_ue()? as usize;
            if run > mb_count - mb_addr {
                return Err(AvcError::InvalidFieldValue(format!(
                    "mb_skip_run={} 超出剩余宏块数 {}",
                    run,
                    mb_count - mb_addr,
                )));
            }
            for _ in 0..run {
                decode_skip(ctx, reference, mb_addr, first_mb, qp, chroma_offset);
                mb_addr += 1;
                decoded += 1;
            }
            if mb_addr >= mb_count || (run > 0 && !more_data(br, params.rbsp_end)) {
                break;
            }
        }

        let (mb_x, mb_y) = (mb_addr % mb_width, mb_addr / mb_width);
        let mb = MacroblockLayer::read(
            br,
            header.slice_type,
            header.num_ref_idx_l0_active_minus1,
            &mut ctx.nc,
            mb_x,
            mb_y,
        )?;
        qp = apply_qp_delta(qp, mb.mb_qp_delta)?;
        let cqp = chroma_qp(qp, chroma_offset);
        trace!(
            "宏块 {} ({}, {}): {:?}, cbp={:#04x}, qp={}",
            mb_addr, mb_x, mb_y, mb.mb_type, mb.coded_block_pattern, qp
        );

        let avail = Neighbors::for_macroblock(mb_addr, mb_width, first_mb);
        match (mb.mb_type, reference) {
            (MbType::I16x16 { pred_mode, .. }, _) => {
                let avail = if constrained_intra && p_slice {
                    ctx.intra_only(mb_addr, avail)
                } else {
                    avail
                };
                let (lx, ly, cx, cy) = (mb_x * 16, mb_y * 16, mb_x * 8, mb_y * 8);
                let pred = MbPrediction {
                    luma: predict_luma_16x16(
                        pred_mode,
                        &IntraNeighbors::from_plane(&ctx.picture.luma, lx, ly, avail),
                    )?,
                    cb: predict_chroma_8x8(
                        mb.intra_chroma_pred_mode,
                        &IntraNeighbors::from_plane(&ctx.picture.cb, cx, cy, avail),
                    )?,
                    cr: predict_chroma_8x8(
                        mb.intra_chroma_pred_mode,
                        &IntraNeighbors::from_plane(&ctx.picture.cr, cx, cy, avail),
                    )?,
                };
                let diag = reconstruct_intra16x16(
                    &mut ctx.picture,
                    mb_x,
                    mb_y,
                    &pred,
                    &mb.residual,
                    qp,
                    cqp,
                );
                ctx.mv_grid.set(mb_addr, MotionInfo::INTRA);
                ctx.record(
                    mb_addr,
                    MbMode::Intra16x16 {
                        luma: pred_mode,
                        chroma: mb.intra_chroma_pred_mode,
                    },
                    &diag,
                );
            }
            (MbType::PL016x16, Some(reference)) => {
                let neighbors = ctx.mv_grid.neighbors(mb_addr, avail);
                let mv = predict_mv_16x16(&neighbors, mb.ref_idx_l0 as i32) + mb.mvd_l0;
                let pred = motion_compensate_16x16(reference, mb_x, mb_y, mv);
                let diag =
                    reconstruct_inter(&mut ctx.picture, mb_x, mb_y, &pred, &mb.residual, qp, cqp);
                ctx.mv_grid
                    .set(mb_addr, MotionInfo::new(mb.ref_idx_l0 as i32, mv));
                ctx.record(mb_addr, MbMode::Inter { mv }, &diag);
            }
            (other, _) => {
                return Err(AvcError::InvalidFieldValue(format!(
                    "{} 片中出现宏块类型 {:?}",
                    header.slice_type, other
                )));
            }
        }
        mb_addr += 1;
        decoded += 1;

        if !more_data(br, params.rbsp_end) {
            break;
        }
    }
    Ok(decoded)
}

/// P_Skip: 预测运动矢量做运动补偿, 无残差
fn decode_skip(
    ctx: &mut PictureContext,
    reference: &Picture,
    mb_addr: usize,
    first_mb: usize,
    qp: i32,
    chroma_offset: i32,
) {
    let mb_width = ctx.sps.mb_width();
    let (mb_x, mb_y) = (mb_addr % mb_width, mb_addr / mb_width);
    let avail = Neighbors::for_macroblock(mb_addr, mb_width, first_mb);
    let mv = predict_p_skip_mv(&ctx.mv_grid.neighbors(mb_addr, avail));
    let pred = motion_compensate_16x16(reference, mb_x, mb_y, mv);
    let diag = reconstruct_inter(
        &mut ctx.picture,
        mb_x,
        mb_y,
        &pred,
        &MbResidual::ZERO,
        qp,
        chroma_qp(qp, chroma_offset),
    );
    ctx.mv_grid.set(mb_addr, MotionInfo::new(0, mv));
    ctx.nc.fill_macroblock(mb_x, mb_y, 0);
    trace!("宏块 {} P_Skip, mv=({}, {})", mb_addr, mv.x, mv.y);
    ctx.record(mb_addr, MbMode::Skip { mv }, &diag);
}
