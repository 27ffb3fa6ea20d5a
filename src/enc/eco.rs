use super::sbac::*;
use crate::def::*;

/*****************************************************************************
 * syntax bit counting for the RDO
 *
 * Every function below mirrors one signalling path of the entropy coder.
 * The counters only ever run on the estimating coder, so nothing here
 * touches a bitstream.
 *****************************************************************************/

/* split signalling of one tree node. ctx_inc follows the count of already
 * split neighbors. */
pub(crate) fn vvce_rdo_bit_cnt_split_mode(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    split_mode: SplitMode,
    allow: &[bool; MAX_SPLIT_NUM],
    nbr_split_cnt: usize,
) {
    let can_no = allow[SplitMode::NO_SPLIT as usize];
    let can_qt = allow[SplitMode::SPLIT_QUAD as usize];
    let can_bh = allow[SplitMode::SPLIT_BI_HOR as usize];
    let can_bv = allow[SplitMode::SPLIT_BI_VER as usize];
    let can_th = allow[SplitMode::SPLIT_TRI_HOR as usize];
    let can_tv = allow[SplitMode::SPLIT_TRI_VER as usize];
    let can_mtt = can_bh || can_bv || can_th || can_tv;
    let can_split = can_qt || can_mtt;

    if can_no && can_split {
        let ctx_inc = nbr_split_cnt.min(2);
        sbac.encode_bin(
            &mut ctx.split_cu_flag[ctx_inc],
            (split_mode != SplitMode::NO_SPLIT) as u32,
        );
    }
    if split_mode == SplitMode::NO_SPLIT {
        return;
    }

    if can_qt && can_mtt {
        sbac.encode_bin(
            &mut ctx.split_qt_flag[0],
            (split_mode == SplitMode::SPLIT_QUAD) as u32,
        );
    }
    if split_mode == SplitMode::SPLIT_QUAD {
        return;
    }

    let ver = split_mode.is_vertical();
    if (can_bh || can_th) && (can_bv || can_tv) {
        sbac.encode_bin(&mut ctx.mtt_split_dir[0], ver as u32);
    }

    let is_bi = split_mode == SplitMode::SPLIT_BI_HOR || split_mode == SplitMode::SPLIT_BI_VER;
    let both = if ver { can_bv && can_tv } else { can_bh && can_th };
    if both {
        sbac.encode_bin(&mut ctx.mtt_split_binary[0], is_bi as u32);
    }
}

/* skip: skip_flag = 1 plus the merge index path */
pub(crate) fn vvce_rdo_bit_cnt_cu_skip(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    mrg_idx: u32,
    max_num_merge: u32,
    mmvd_flag: bool,
    mmvd_idx: u32,
    tool_mmvd: bool,
) {
    sbac.encode_bin(&mut ctx.skip_flag[0], 1);

    if tool_mmvd {
        sbac.encode_bin(&mut ctx.mmvd_flag[0], mmvd_flag as u32);
    }
    if mmvd_flag {
        vvce_rdo_bit_cnt_mmvd_idx(sbac, ctx, mmvd_idx);
    } else {
        sbac.write_truncate_unary_sym(
            &mut ctx.merge_idx,
            mrg_idx,
            NUM_CTX_MERGE_IDX as u32,
            max_num_merge,
        );
    }
}

fn vvce_rdo_bit_cnt_mmvd_idx(sbac: &mut RdoSbac, ctx: &mut SbacCtx, mmvd_idx: u32) {
    let base = mmvd_idx / MMVD_MAX_REFINE_NUM as u32;
    let refine = mmvd_idx % MMVD_MAX_REFINE_NUM as u32;
    let step = refine / MMVD_REFINE_DIR_NUM as u32;
    let dir = refine % MMVD_REFINE_DIR_NUM as u32;

    sbac.encode_bin(&mut ctx.mmvd_merge_idx[0], base);
    sbac.write_unary_sym_ep(step, MMVD_REFINE_STEP_NUM as u32 - 1);
    sbac.encode_bins_ep(dir, 2);
}

/* merge with residual: skip_flag = 0, merge_flag = 1 */
pub(crate) fn vvce_rdo_bit_cnt_cu_merge(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    mrg_idx: u32,
    max_num_merge: u32,
    mmvd_flag: bool,
    mmvd_idx: u32,
    ciip_flag: bool,
    tool_mmvd: bool,
    tool_ciip: bool,
) {
    sbac.encode_bin(&mut ctx.skip_flag[0], 0);
    sbac.encode_bin(&mut ctx.merge_flag[0], 1);

    if tool_mmvd {
        sbac.encode_bin(&mut ctx.mmvd_flag[0], mmvd_flag as u32);
    }
    if mmvd_flag {
        vvce_rdo_bit_cnt_mmvd_idx(sbac, ctx, mmvd_idx);
        return;
    }
    if tool_ciip {
        sbac.encode_bin(&mut ctx.ciip_flag[0], ciip_flag as u32);
    }
    sbac.write_truncate_unary_sym(
        &mut ctx.merge_idx,
        mrg_idx,
        NUM_CTX_MERGE_IDX as u32,
        max_num_merge,
    );
}

/* affine merge: skip or merge path plus the affine flag and index */
pub(crate) fn vvce_rdo_bit_cnt_cu_affine_merge(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    is_skip: bool,
) {
    sbac.encode_bin(&mut ctx.skip_flag[0], is_skip as u32);
    if !is_skip {
        sbac.encode_bin(&mut ctx.merge_flag[0], 1);
    }
    sbac.encode_bin(&mut ctx.affine_flag[0], 1);
}

/* geo partition merge: two merge indices and the partition mode */
pub(crate) fn vvce_rdo_bit_cnt_cu_geo(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    partition_idx: u32,
    mrg_idx0: u32,
    mrg_idx1: u32,
    max_num_geo: u32,
) {
    sbac.encode_bin(&mut ctx.skip_flag[0], 0);
    sbac.encode_bin(&mut ctx.merge_flag[0], 1);
    /* 64 partition modes, fixed length */
    sbac.encode_bins_ep(partition_idx, 6);
    sbac.write_truncate_unary_sym(
        &mut ctx.merge_idx,
        mrg_idx0,
        NUM_CTX_MERGE_IDX as u32,
        max_num_geo,
    );
    /* the second index never equals the first */
    sbac.write_truncate_unary_sym(
        &mut ctx.merge_idx,
        if mrg_idx1 > mrg_idx0 { mrg_idx1 - 1 } else { mrg_idx1 },
        NUM_CTX_MERGE_IDX as u32,
        max_num_geo - 1,
    );
}

#[derive(Clone, Copy)]
pub(crate) struct InterBits {
    pub(crate) inter_dir: u8,
    pub(crate) refi: [i8; REFP_NUM],
    pub(crate) mvp_idx: [u8; REFP_NUM],
    pub(crate) mvd: [[i16; MV_D]; REFP_NUM],
    pub(crate) imv: u8,
    pub(crate) bcw_idx: u8,
    pub(crate) affine: bool,
    pub(crate) affine_type: AffineModel,
    /* corner mvds when affine */
    pub(crate) affine_mvd: [[[i16; MV_D]; VER_NUM]; REFP_NUM],
}

/* explicit motion: direction, references, predictor indices and mvds */
pub(crate) fn vvce_rdo_bit_cnt_cu_inter(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    bits: &InterBits,
    num_ref_idx: &[usize; REFP_NUM],
    is_b: bool,
    tool_affine: bool,
    tool_amvr: bool,
    tool_bcw: bool,
) {
    sbac.encode_bin(&mut ctx.skip_flag[0], 0);
    sbac.encode_bin(&mut ctx.merge_flag[0], 0);

    if tool_affine {
        sbac.encode_bin(&mut ctx.affine_flag[0], bits.affine as u32);
        if bits.affine {
            sbac.encode_bin(
                &mut ctx.affine_type[0],
                (bits.affine_type == AffineModel::AFF_6_PARAM) as u32,
            );
        }
    }
    if tool_amvr && !bits.affine {
        sbac.write_unary_sym(&mut ctx.imv_flag, bits.imv as u32, NUM_CTX_IMV_FLAG as u32);
    }

    if is_b {
        /* 0: L0, 1: L1, 2: bi */
        let idc = match bits.inter_dir {
            PRED_BI => 2u32,
            PRED_L1 => 1,
            _ => 0,
        };
        sbac.encode_bin(&mut ctx.inter_dir[0], (idc == 2) as u32);
        if idc != 2 {
            sbac.encode_bin(&mut ctx.inter_dir[1], (idc == 1) as u32);
        }
    }

    for lidx in 0..REFP_NUM {
        if (bits.inter_dir & (1 << lidx)) == 0 {
            continue;
        }
        if num_ref_idx[lidx] > 1 {
            sbac.write_truncate_unary_sym(
                &mut ctx.refi,
                bits.refi[lidx] as u32,
                NUM_CTX_REF_IDX as u32,
                num_ref_idx[lidx] as u32,
            );
        }
        sbac.encode_bin(&mut ctx.mvp_idx[0], bits.mvp_idx[lidx] as u32);

        if bits.affine {
            let nv = if bits.affine_type == AffineModel::AFF_6_PARAM {
                3
            } else {
                2
            };
            for v in 0..nv {
                sbac.write_mvd_component(&mut ctx.mvd, bits.affine_mvd[lidx][v][MV_X]);
                sbac.write_mvd_component(&mut ctx.mvd, bits.affine_mvd[lidx][v][MV_Y]);
            }
        } else {
            sbac.write_mvd_component(&mut ctx.mvd, bits.mvd[lidx][MV_X]);
            sbac.write_mvd_component(&mut ctx.mvd, bits.mvd[lidx][MV_Y]);
        }
    }

    if tool_bcw && bits.inter_dir == PRED_BI {
        sbac.write_truncate_unary_sym(
            &mut ctx.bcw_idx,
            bits.bcw_idx as u32,
            NUM_CTX_BCW_IDX as u32,
            BCW_NUM as u32,
        );
    }
}

/* intra in an inter slice: pred_mode plus the luma direction */
pub(crate) fn vvce_rdo_bit_cnt_cu_intra(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    is_inter_slice: bool,
    ipm: u8,
    mpm: &[u8],
    isp_mode: u8,
    tool_isp: bool,
) {
    if is_inter_slice {
        sbac.encode_bin(&mut ctx.skip_flag[0], 0);
        sbac.encode_bin(&mut ctx.pred_mode[0], 1);
    }

    let mpm_pos = mpm.iter().position(|&m| m == ipm);
    sbac.encode_bin(&mut ctx.intra_mpm_flag[0], mpm_pos.is_some() as u32);
    match mpm_pos {
        Some(pos) => {
            sbac.write_unary_sym(&mut ctx.intra_dir, pos as u32, NUM_CTX_INTRA_PRED_MODE as u32);
        }
        None => {
            /* remainder over the non-mpm modes, fixed length */
            sbac.encode_bins_ep(ipm as u32, 6);
        }
    }

    if tool_isp {
        sbac.encode_bin(&mut ctx.isp_mode[0], (isp_mode != 0) as u32);
        if isp_mode != 0 {
            sbac.encode_bin(&mut ctx.isp_mode[1], (isp_mode == 2) as u32);
        }
    }
}

/* secondary and multiple transform selection of the block */
pub(crate) fn vvce_rdo_bit_cnt_transform_idx(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    mts_idx: u8,
    lfnst_idx: u8,
    tool_mts: bool,
    tool_lfnst: bool,
) {
    if tool_lfnst {
        sbac.write_truncate_unary_sym(
            &mut ctx.lfnst_idx,
            lfnst_idx as u32,
            NUM_CTX_LFNST_IDX as u32,
            LFNST_MAX_IDX as u32 + 1,
        );
    }
    /* MTS only competes against the primary transform */
    if tool_mts && lfnst_idx == 0 {
        sbac.write_unary_sym(&mut ctx.mts_idx, mts_idx as u32, NUM_CTX_MTS_IDX as u32);
    }
}

/* IBC: flag plus the block vector difference */
pub(crate) fn vvce_rdo_bit_cnt_cu_ibc(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    is_inter_slice: bool,
    merge_flag: bool,
    mrg_idx: u32,
    max_num_merge: u32,
    bvd: [i16; MV_D],
) {
    if is_inter_slice {
        sbac.encode_bin(&mut ctx.skip_flag[0], 0);
    }
    sbac.encode_bin(&mut ctx.ibc_flag[0], 1);
    sbac.encode_bin(&mut ctx.merge_flag[0], merge_flag as u32);
    if merge_flag {
        sbac.write_truncate_unary_sym(
            &mut ctx.merge_idx,
            mrg_idx,
            NUM_CTX_MERGE_IDX as u32,
            max_num_merge,
        );
    } else {
        sbac.write_mvd_component(&mut ctx.mvd, bvd[MV_X]);
        sbac.write_mvd_component(&mut ctx.mvd, bvd[MV_Y]);
    }
}

/* palette flag and entry count; the per-pixel run cost comes back from
 * the palette coder itself */
pub(crate) fn vvce_rdo_bit_cnt_cu_plt(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    is_inter_slice: bool,
    num_entries: u32,
    num_reused: u32,
) {
    if is_inter_slice {
        sbac.encode_bin(&mut ctx.skip_flag[0], 0);
        sbac.encode_bin(&mut ctx.pred_mode[0], 1);
    }
    sbac.encode_bin(&mut ctx.plt_flag[0], 1);
    sbac.write_unary_sym_ep(num_reused, PLT_PRED_SIZE as u32);
    sbac.write_unary_sym_ep(num_entries, PLT_PRED_SIZE as u32);
}

/* coded delta against the predicted QP: abs as unary plus a sign */
pub(crate) fn vvce_rdo_bit_cnt_delta_qp(sbac: &mut RdoSbac, ctx: &mut SbacCtx, dqp: i8) {
    let abs = dqp.abs() as u32;
    sbac.write_unary_sym(&mut ctx.delta_qp, abs, NUM_CTX_DELTA_QP as u32);
    if abs > 0 {
        sbac.encode_bin_ep((dqp < 0) as u32);
    }
}

pub(crate) fn vvce_rdo_bit_cnt_chroma_qp_offset(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    offset_idx: u8,
    list_len: u8,
) {
    sbac.encode_bin(&mut ctx.chroma_qp_offset[0], (offset_idx != 0) as u32);
    if offset_idx != 0 && list_len > 1 {
        sbac.write_truncate_unary_sym(
            &mut ctx.chroma_qp_offset[1..],
            offset_idx as u32 - 1,
            1,
            list_len as u32,
        );
    }
}

/* coded block flags of the three components */
pub(crate) fn vvce_rdo_bit_cnt_cbf(
    sbac: &mut RdoSbac,
    ctx: &mut SbacCtx,
    cbf_y: bool,
    cbf_cb: bool,
    cbf_cr: bool,
) {
    sbac.encode_bin(&mut ctx.cbf_cb[0], cbf_cb as u32);
    sbac.encode_bin(&mut ctx.cbf_cr[cbf_cb as usize], cbf_cr as u32);
    sbac.encode_bin(&mut ctx.cbf_luma[0], cbf_y as u32);
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fresh() -> (RdoSbac, SbacCtx) {
        let mut sbac = RdoSbac::default();
        sbac.bit_reset();
        (sbac, SbacCtx::default())
    }

    #[test]
    fn test_skip_cheaper_than_inter() {
        let (mut s1, mut c1) = fresh();
        vvce_rdo_bit_cnt_cu_skip(&mut s1, &mut c1, 0, 6, false, 0, true);
        let skip_bits = s1.get_bit_number();

        let (mut s2, mut c2) = fresh();
        let bits = InterBits {
            inter_dir: PRED_BI,
            refi: [0, 0],
            mvp_idx: [0, 0],
            mvd: [[17, -5], [3, 2]],
            imv: 0,
            bcw_idx: BCW_DEFAULT,
            affine: false,
            affine_type: AffineModel::AFF_4_PARAM,
            affine_mvd: [[[0; MV_D]; VER_NUM]; REFP_NUM],
        };
        vvce_rdo_bit_cnt_cu_inter(&mut s2, &mut c2, &bits, &[2, 2], true, true, true, true);
        let inter_bits = s2.get_bit_number();

        assert!(skip_bits < inter_bits);
    }

    #[test]
    fn test_merge_idx_order_monotone() {
        /* later merge indices never cost fewer bins */
        let mut prev = 0;
        for idx in 0..6 {
            let (mut s, mut c) = fresh();
            vvce_rdo_bit_cnt_cu_skip(&mut s, &mut c, idx, 6, false, 0, false);
            let b = s.get_bit_number();
            assert!(b >= prev);
            prev = b;
        }
    }

    #[test]
    fn test_delta_qp_zero_cheapest() {
        let (mut s0, mut c0) = fresh();
        vvce_rdo_bit_cnt_delta_qp(&mut s0, &mut c0, 0);
        let zero = s0.get_bit_number();

        let (mut s1, mut c1) = fresh();
        vvce_rdo_bit_cnt_delta_qp(&mut s1, &mut c1, -3);
        assert!(zero < s1.get_bit_number());
    }

    #[test]
    fn test_split_mode_no_bits_when_forced() {
        /* boundary node with a single allowed split signals nothing */
        let (mut s, mut c) = fresh();
        let mut allow = [false; MAX_SPLIT_NUM];
        allow[SplitMode::SPLIT_QUAD as usize] = true;
        vvce_rdo_bit_cnt_split_mode(&mut s, &mut c, SplitMode::SPLIT_QUAD, &allow, 0);
        assert_eq!(s.get_bit_number(), 0);
    }

    #[test]
    fn test_geo_second_index_shifted() {
        let (mut s, mut c) = fresh();
        vvce_rdo_bit_cnt_cu_geo(&mut s, &mut c, 10, 1, 0, 6);
        /* must not underflow when idx1 < idx0 */
        assert!(s.get_bit_number() > 0);
    }
}
