use super::eco::*;
use super::mode::TrialResult;
use super::*;
use crate::def::*;
use crate::mvp::*;
use crate::tbl::*;

use log::trace;

/*****************************************************************************
 * inter mode evaluators
 *
 * Every function derives its candidates through the normative engine,
 * screens them with SATD, and RD-checks the survivors. The entropy state
 * of the winning trial is left in core.s_temp_run.
 *****************************************************************************/

/* combined intra-inter gate: only mid-sized blocks benefit */
const CIIP_MIN_AREA: u32 = 64;
const CIIP_MAX_AREA: u32 = 128;

/* skip further AMVR precisions once quarter-pel already lost this badly */
const AMVR_SKIP_RATIO: f64 = 1.25;

/* bi-prediction weights are only searched on blocks of this area and up */
const BCW_MIN_AREA: u32 = 256;

/* merge candidates surviving the SATD screen that get a full RD check */
const MMVD_MAX_NUM_RDO: usize = 2;
const GEO_MAX_NUM_RDO: usize = 2;

struct TrialCtx {
    x: u16,
    y: u16,
    log2w: u8,
    log2h: u8,
    start: SbacState,
}

fn trial_ctx(ctx: &VvceCtx) -> TrialCtx {
    let wi = (ctx.core.log2_cuw - 2) as usize;
    let hi = (ctx.core.log2_cuh - 2) as usize;
    TrialCtx {
        x: ctx.core.x,
        y: ctx.core.y,
        log2w: ctx.core.log2_cuw,
        log2h: ctx.core.log2_cuh,
        start: ctx.core.s_curr_best[wi][hi],
    }
}

/* full RD of one assembled trial: syntax bits counted by `syntax`, residual
 * coded through the seam, boundary distortion folded in */
fn rd_trial<P: PredCoder, D: DeblockCost, F: FnOnce(&mut SbacState)>(
    ctx: &VvceCtx,
    pc: &mut P,
    dc: &mut D,
    tc: &TrialCtx,
    mode: &EncTestMode,
    syntax: F,
) -> (f64, ResiOutcome, SbacState) {
    let mut s = tc.start;
    s.sbac.bit_reset();
    syntax(&mut s);

    let outcome = pc.code_residual(tc.x, tc.y, tc.log2w, tc.log2h, mode);
    vvce_rdo_bit_cnt_cbf(
        &mut s.sbac,
        &mut s.ctx,
        outcome.cbf_luma,
        outcome.cbf_cb,
        outcome.cbf_cr,
    );

    let bits = s.sbac.get_bit_number() + outcome.bits;
    let delta = dc.boundary_dist_delta(tc.x, tc.y, tc.log2w, tc.log2h);
    let dist = (outcome.dist as i64 + delta).max(0) as u64;
    (ctx.rd_cost(dist, bits), outcome, s)
}

/* combined intra-inter is only signalled on mid-sized whole-block merges */
pub(crate) fn ciip_allowed(ctx: &VvceCtx, log2w: u8, log2h: u8, mrg_type: MergeType) -> bool {
    let area = 1u32 << (log2w as u32 + log2h as u32);
    ctx.sps.tool_ciip
        && area >= CIIP_MIN_AREA
        && area < CIIP_MAX_AREA
        && mrg_type == MergeType::MRG_TYPE_DEFAULT
}

fn merge_cand_mode(mrg: &MergeCtx, idx: usize, qp: i8, mode_type: EncTestModeType) -> EncTestMode {
    let mut m = EncTestMode::new(mode_type, qp);
    m.mv = [mrg.mv_field[idx][REFP_0].mv, mrg.mv_field[idx][REFP_1].mv];
    m.refi = [mrg.mv_field[idx][REFP_0].refi, mrg.mv_field[idx][REFP_1].refi];
    m.bcw_idx = mrg.bcw_idx[idx];
    m.cand_idx = idx as i32;
    m
}

/*****************************************************************************
 * skip and merge, SATD-ranked
 *****************************************************************************/
pub(crate) fn vvce_analyze_skip_merge<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    family: EncTestModeType,
    qp: i8,
) -> Option<TrialResult> {
    if ctx.sh.slice_type.is_intra() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let mrg = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_merge_cands();
    if mrg.num_valid == 0 {
        return None;
    }
    let is_skip = family == EncTestModeType::Skip;

    /* SATD ranking */
    let mut order: Vec<(usize, u64)> = Vec::with_capacity(mrg.num_valid);
    for i in 0..mrg.num_valid {
        let mode = merge_cand_mode(&mrg, i, qp, family);
        order.push((i, pc.pred_satd(tc.x, tc.y, tc.log2w, tc.log2h, &mode)));
    }
    order.sort_by_key(|&(_, satd)| satd);
    let best_satd = order[0].1;

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    for &(idx, satd) in order.iter().take(MRG_MAX_NUM_RDO) {
        /* candidates far off the leader are not worth a residual pass */
        if satd as f64 > best_satd as f64 * MRG_FAST_RATIO {
            break;
        }

        let ciip_ok = !is_skip && ciip_allowed(ctx, tc.log2w, tc.log2h, mrg.mrg_type[idx]);

        for &ciip in &[false, true] {
            if ciip && !ciip_ok {
                continue;
            }
            let mut mode = merge_cand_mode(
                &mrg,
                idx,
                qp,
                if ciip { EncTestModeType::Ciip } else { family },
            );
            mode.force_zero_resi = is_skip;

            let max_num = mrg.max_num as u32;
            let tool_mmvd = ctx.sps.tool_mmvd;
            let tool_ciip = ctx.sps.tool_ciip && ciip_ok;
            let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
                if is_skip {
                    vvce_rdo_bit_cnt_cu_skip(
                        &mut s.sbac,
                        &mut s.ctx,
                        idx as u32,
                        max_num,
                        false,
                        0,
                        tool_mmvd,
                    );
                } else {
                    vvce_rdo_bit_cnt_cu_merge(
                        &mut s.sbac,
                        &mut s.ctx,
                        idx as u32,
                        max_num,
                        false,
                        0,
                        ciip,
                        tool_mmvd,
                        tool_ciip,
                    );
                }
            });

            /* a skip trial that still needs residual is not a skip */
            if is_skip && (outcome.cbf_luma || outcome.cbf_cb || outcome.cbf_cr) {
                continue;
            }

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                let mut tr = TrialResult::new(mode, cost, outcome);
                tr.mrg_type = mrg.mrg_type[idx];
                if mrg.mrg_type[idx] == MergeType::MRG_TYPE_SUBPU_ATMVP {
                    tr.subpu_mv = mrg.subpu_mv.clone();
                } else {
                    tr.history_mi = Some(mrg.motion_info(idx));
                }
                best = Some(tr);
                best_state = s;
            }
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

/*****************************************************************************
 * merge with motion vector difference
 *****************************************************************************/
/* signalled length of one expansion index: base flag, unary step and the
 * fixed two-bin direction */
fn mmvd_idx_bits(idx: usize) -> u32 {
    let step = (idx % MMVD_MAX_REFINE_NUM) / MMVD_REFINE_DIR_NUM;
    (1 + (step + 1).min(MMVD_REFINE_STEP_NUM - 1) + 2) as u32
}

pub(crate) fn vvce_analyze_mmvd<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    if !ctx.sps.tool_mmvd || ctx.sh.slice_type.is_intra() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let mrg = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_merge_cands();
    if mrg.num_valid == 0 {
        return None;
    }

    /* the expansion is a pure function of the index; screen all of them.
     * Deep refinement steps cost real bins, so the ranking charges each
     * index its signalled length on top of the prediction error. */
    let mut order: Vec<(usize, u64)> = Vec::new();
    for idx in 0..MMVD_CAND_NUM {
        let fields = match vvc_get_mmvd_cand(&mrg, idx, &ctx.refp, ctx.poc) {
            Some((_, f)) => f,
            None => continue,
        };
        let mut mode = EncTestMode::new(EncTestModeType::Mmvd, qp);
        mode.mv = [fields[REFP_0].mv, fields[REFP_1].mv];
        mode.refi = [fields[REFP_0].refi, fields[REFP_1].refi];
        mode.cand_idx = idx as i32;
        let satd = pc.pred_satd(tc.x, tc.y, tc.log2w, tc.log2h, &mode);
        let rate = (ctx.lambda.sqrt() * mmvd_idx_bits(idx) as f64) as u64;
        order.push((idx, satd + rate));
    }
    if order.is_empty() {
        return None;
    }
    order.sort_by_key(|&(_, satd)| satd);

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    for &(idx, _) in order.iter().take(MMVD_MAX_NUM_RDO) {
        let (dir, fields) = vvc_get_mmvd_cand(&mrg, idx, &ctx.refp, ctx.poc)?;
        let mut mode = EncTestMode::new(EncTestModeType::Mmvd, qp);
        mode.mv = [fields[REFP_0].mv, fields[REFP_1].mv];
        mode.refi = [fields[REFP_0].refi, fields[REFP_1].refi];
        mode.cand_idx = idx as i32;

        let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
            vvce_rdo_bit_cnt_cu_merge(
                &mut s.sbac,
                &mut s.ctx,
                0,
                1,
                true,
                idx as u32,
                false,
                true,
                false,
            );
        });

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            let mut tr = TrialResult::new(mode, cost, outcome);
            tr.history_mi = Some(MotionInfo {
                mv: mode.mv,
                refi: mode.refi,
                inter_dir: dir,
                bcw_idx: BCW_DEFAULT,
            });
            best = Some(tr);
            best_state = s;
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

/*****************************************************************************
 * explicit motion search with AMVR and BCW ladders
 *****************************************************************************/
struct UniMotion {
    mv: [i16; MV_D],
    refi: i8,
    mvp_idx: u8,
    mvd: [i16; MV_D],
    cost: u64,
}

fn search_uni<P: PredCoder>(
    ctx: &VvceCtx,
    pc: &mut P,
    tc: &TrialCtx,
    lidx: usize,
    imv: u8,
) -> Option<UniMotion> {
    let mut best: Option<UniMotion> = None;

    for refi in 0..ctx.sh.num_ref_idx[lidx] as i8 {
        let amvp = ctx
            .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
            .get_mvp_cands(lidx, refi, imv);

        let (mv, cost) = pc.motion_search(
            tc.x,
            tc.y,
            tc.log2w,
            tc.log2h,
            lidx,
            refi,
            amvp.mv_cand[0],
            imv,
        );

        /* mvp index chosen by cheapest difference */
        let mut mvp_idx = 0u8;
        let mut best_abs = i32::max_value();
        for i in 0..amvp.num_cand {
            let abs = (mv[MV_X] as i32 - amvp.mv_cand[i][MV_X] as i32).abs()
                + (mv[MV_Y] as i32 - amvp.mv_cand[i][MV_Y] as i32).abs();
            if abs < best_abs {
                best_abs = abs;
                mvp_idx = i as u8;
            }
        }
        let mvd = [
            mv[MV_X] - amvp.mv_cand[mvp_idx as usize][MV_X],
            mv[MV_Y] - amvp.mv_cand[mvp_idx as usize][MV_Y],
        ];

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            best = Some(UniMotion {
                mv,
                refi,
                mvp_idx,
                mvd,
                cost,
            });
        }
    }
    best
}

pub(crate) fn vvce_analyze_inter_me<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    if ctx.sh.slice_type.is_intra() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let is_b = ctx.sh.slice_type.is_inter_b();
    let area = 1u32 << (tc.log2w as u32 + tc.log2h as u32);

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;
    let mut cost_imv0 = MAX_COST;

    /* exact hash match short-circuits the whole search */
    if ctx.sps.tool_hash_me {
        if let Some((mv, refi)) = pc.hash_probe(tc.x, tc.y, tc.log2w, tc.log2h) {
            let amvp = ctx
                .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
                .get_mvp_cands(REFP_0, refi, IMV_OFF);
            let mut mode = EncTestMode::new(EncTestModeType::Inter, qp);
            mode.mv = [mv, [0, 0]];
            mode.refi = [refi, REFI_INVALID];
            let ib = InterBits {
                inter_dir: PRED_L0,
                refi: mode.refi,
                mvp_idx: [0, 0],
                mvd: [
                    [mv[MV_X] - amvp.mv_cand[0][MV_X], mv[MV_Y] - amvp.mv_cand[0][MV_Y]],
                    [0, 0],
                ],
                imv: 0,
                bcw_idx: BCW_DEFAULT,
                affine: false,
                affine_type: AffineModel::AFF_4_PARAM,
                affine_mvd: [[[0; MV_D]; VER_NUM]; REFP_NUM],
            };
            let (cost, outcome, s) = count_and_rd(ctx, pc, dc, &tc, &mode, &ib, is_b);
            let mut tr = TrialResult::new(mode, cost, outcome);
            tr.history_mi = Some(inter_history_mi(&mode, PRED_L0));
            tr.inter_bits = Some(ib);
            best = Some(tr);
            best_state = s;
        }
    }

    let imv_ladder: &[u8] = if ctx.sps.tool_amvr {
        &[IMV_OFF, IMV_FPEL, IMV_4PEL, IMV_HPEL]
    } else {
        &[IMV_OFF]
    };

    for &imv in imv_ladder {
        /* coarser precisions are hopeless when quarter-pel already lost,
         * against either this block or a same-size winner of the CTU */
        if imv != IMV_OFF {
            let mut ref_cost = ctx.core.inter_cost_hint.unwrap_or(MAX_COST);
            if let Some(b) = &best {
                ref_cost = ref_cost.min(b.cost);
            }
            if cost_imv0 > ref_cost * AMVR_SKIP_RATIO {
                break;
            }
        }

        let uni0 = search_uni(ctx, pc, &tc, REFP_0, imv);
        let uni1 = if is_b {
            search_uni(ctx, pc, &tc, REFP_1, imv)
        } else {
            None
        };

        let mut configs: Vec<(u8, Option<&UniMotion>, Option<&UniMotion>, u8)> = Vec::new();
        if let Some(u0) = &uni0 {
            configs.push((PRED_L0, Some(u0), None, BCW_DEFAULT));
        }
        if let Some(u1) = &uni1 {
            configs.push((PRED_L1, None, Some(u1), BCW_DEFAULT));
        }
        if let (Some(u0), Some(u1)) = (&uni0, &uni1) {
            if ctx.sps.tool_bcw && area >= BCW_MIN_AREA {
                match ctx.core.bcw_idx_hint {
                    /* a same-size winner already settled on a weight:
                     * re-test it and the default, not the whole ladder */
                    Some(hint) => {
                        configs.push((PRED_BI, Some(u0), Some(u1), hint));
                        if hint != BCW_DEFAULT {
                            configs.push((PRED_BI, Some(u0), Some(u1), BCW_DEFAULT));
                        }
                    }
                    None => {
                        for bcw in 0..BCW_NUM as u8 {
                            configs.push((PRED_BI, Some(u0), Some(u1), bcw));
                        }
                    }
                }
            } else {
                configs.push((PRED_BI, Some(u0), Some(u1), BCW_DEFAULT));
            }
        }

        for (dir, u0, u1, bcw) in configs {
            let mut mode = EncTestMode::new(EncTestModeType::Inter, qp);
            mode.imv = imv;
            mode.bcw_idx = bcw;
            let mut ib = InterBits {
                inter_dir: dir,
                refi: [REFI_INVALID; REFP_NUM],
                mvp_idx: [0, 0],
                mvd: [[0; MV_D]; REFP_NUM],
                imv,
                bcw_idx: bcw,
                affine: false,
                affine_type: AffineModel::AFF_4_PARAM,
                affine_mvd: [[[0; MV_D]; VER_NUM]; REFP_NUM],
            };
            if let Some(u) = u0 {
                mode.mv[REFP_0] = u.mv;
                mode.refi[REFP_0] = u.refi;
                ib.refi[REFP_0] = u.refi;
                ib.mvp_idx[REFP_0] = u.mvp_idx;
                ib.mvd[REFP_0] = u.mvd;
            }
            if let Some(u) = u1 {
                mode.mv[REFP_1] = u.mv;
                mode.refi[REFP_1] = u.refi;
                ib.refi[REFP_1] = u.refi;
                ib.mvp_idx[REFP_1] = u.mvp_idx;
                ib.mvd[REFP_1] = u.mvd;
            }

            let (cost, outcome, s) = count_and_rd(ctx, pc, dc, &tc, &mode, &ib, is_b);
            if imv == IMV_OFF && cost < cost_imv0 {
                cost_imv0 = cost;
            }
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                let mut tr = TrialResult::new(mode, cost, outcome);
                tr.history_mi = Some(inter_history_mi(&mode, dir));
                tr.inter_bits = Some(ib);
                best = Some(tr);
                best_state = s;
            }
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

fn inter_history_mi(mode: &EncTestMode, dir: u8) -> MotionInfo {
    MotionInfo {
        mv: mode.mv,
        refi: mode.refi,
        inter_dir: dir,
        bcw_idx: mode.bcw_idx,
    }
}

fn count_and_rd<P: PredCoder, D: DeblockCost>(
    ctx: &VvceCtx,
    pc: &mut P,
    dc: &mut D,
    tc: &TrialCtx,
    mode: &EncTestMode,
    ib: &InterBits,
    is_b: bool,
) -> (f64, ResiOutcome, SbacState) {
    let num_ref_idx = ctx.sh.num_ref_idx;
    let tool_affine = ctx.sps.tool_affine;
    let tool_amvr = ctx.sps.tool_amvr;
    let tool_bcw = ctx.sps.tool_bcw;
    rd_trial(ctx, pc, dc, tc, mode, |s| {
        vvce_rdo_bit_cnt_cu_inter(
            &mut s.sbac,
            &mut s.ctx,
            ib,
            &num_ref_idx,
            is_b,
            tool_affine,
            tool_amvr,
            tool_bcw,
        );
    })
}

/*****************************************************************************
 * affine merge and affine search
 *****************************************************************************/
pub(crate) fn vvce_analyze_affine_merge<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    if !ctx.sps.tool_affine || ctx.sh.slice_type.is_intra() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let cand = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_affine_merge_cand()?;

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    for &is_skip in &[true, false] {
        let mut mode = EncTestMode::new(
            if is_skip {
                EncTestModeType::Skip
            } else {
                EncTestModeType::AffineMerge
            },
            qp,
        );
        mode.force_zero_resi = is_skip;
        mode.bcw_idx = cand.bcw_idx;
        mode.affine = if cand.affine_type == AffineModel::AFF_6_PARAM {
            2
        } else {
            1
        };
        for lidx in 0..REFP_NUM {
            mode.refi[lidx] = cand.mv_field[lidx][0].refi;
            mode.mv[lidx] = cand.mv_field[lidx][0].mv;
            for v in 0..VER_NUM {
                mode.affine_mv[lidx][v] = cand.mv_field[lidx][v].mv;
            }
        }
        mode.mode_type = if is_skip {
            EncTestModeType::Skip
        } else {
            EncTestModeType::AffineMerge
        };

        let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
            vvce_rdo_bit_cnt_cu_affine_merge(&mut s.sbac, &mut s.ctx, is_skip);
        });

        if is_skip && (outcome.cbf_luma || outcome.cbf_cb || outcome.cbf_cr) {
            continue;
        }

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            let mut tr = TrialResult::new(mode, cost, outcome);
            tr.affine = mode.affine;
            tr.affine_mv = mode.affine_mv;
            best = Some(tr);
            best_state = s;
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

pub(crate) fn vvce_analyze_affine_me<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    if !ctx.sps.tool_affine || ctx.sh.slice_type.is_intra() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let is_b = ctx.sh.slice_type.is_inter_b();

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    let models: &[AffineModel] = if ctx.sps.tool_affine_6param {
        &[AffineModel::AFF_4_PARAM, AffineModel::AFF_6_PARAM]
    } else {
        &[AffineModel::AFF_4_PARAM]
    };

    for &model in models {
        for lidx in 0..if is_b { 2 } else { 1 } {
            for refi in 0..ctx.sh.num_ref_idx[lidx] as i8 {
                let amvp = ctx
                    .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
                    .get_affine_mvp_cands(lidx, refi, model);
                if amvp.num_cand == 0 {
                    continue;
                }

                /* refine the top-left corner around its predictor, keep the
                 * other corners on the predictor */
                let (lt_mv, _) = pc.motion_search(
                    tc.x,
                    tc.y,
                    tc.log2w,
                    tc.log2h,
                    lidx,
                    refi,
                    amvp.mv_cand_lt[0],
                    IMV_OFF,
                );

                let corners = [lt_mv, amvp.mv_cand_rt[0], amvp.mv_cand_lb[0]];
                let mut mode = EncTestMode::new(EncTestModeType::AffineInter, qp);
                mode.affine = if model == AffineModel::AFF_6_PARAM { 2 } else { 1 };
                mode.refi[lidx] = refi;
                mode.mv[lidx] = lt_mv;
                mode.affine_mv[lidx] = corners;

                let mut ib = InterBits {
                    inter_dir: 1 << lidx,
                    refi: mode.refi,
                    mvp_idx: [0, 0],
                    mvd: [[0; MV_D]; REFP_NUM],
                    imv: 0,
                    bcw_idx: BCW_DEFAULT,
                    affine: true,
                    affine_type: model,
                    affine_mvd: [[[0; MV_D]; VER_NUM]; REFP_NUM],
                };
                let amvp_corners = [amvp.mv_cand_lt[0], amvp.mv_cand_rt[0], amvp.mv_cand_lb[0]];
                for v in 0..VER_NUM {
                    ib.affine_mvd[lidx][v] = [
                        corners[v][MV_X] - amvp_corners[v][MV_X],
                        corners[v][MV_Y] - amvp_corners[v][MV_Y],
                    ];
                }

                let (cost, outcome, s) = count_and_rd(ctx, pc, dc, &tc, &mode, &ib, is_b);
                if best.as_ref().map_or(true, |b| cost < b.cost) {
                    let mut tr = TrialResult::new(mode, cost, outcome);
                    tr.affine = mode.affine;
                    tr.affine_mv = mode.affine_mv;
                    tr.inter_bits = Some(ib);
                    best = Some(tr);
                    best_state = s;
                }
            }
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

/*****************************************************************************
 * geometric partitioning
 *****************************************************************************/
pub(crate) fn vvce_analyze_geo<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    if !ctx.sps.tool_geo || !ctx.sh.slice_type.is_inter_b() {
        return None;
    }
    let tc = trial_ctx(ctx);
    let mrg = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_merge_cands();
    if mrg.num_valid < 2 {
        return None;
    }

    /* uni candidates: parity-preferred list of each merge candidate */
    let mut uni: Vec<MvField> = Vec::new();
    for i in 0..mrg.num_valid.min(GEO_MAX_NUM_UNI_CANDS) {
        let prefer = i & 1;
        let f = if REFI_IS_VALID(mrg.mv_field[i][prefer].refi) {
            mrg.mv_field[i][prefer]
        } else {
            mrg.mv_field[i][1 - prefer]
        };
        uni.push(f);
    }

    /* SAD screen over every partition/candidate-pair combination; the
     * cheapest survivors go on to the SATD pass */
    let mut screened: Vec<(usize, usize, usize, u64)> = Vec::new();
    for part in 0..GEO_NUM_PARTITION_MODE {
        for c0 in 0..uni.len() {
            for c1 in 0..uni.len() {
                if c0 == c1 {
                    continue;
                }
                /* identical motion on both sides degenerates to plain merge */
                if uni[c0] == uni[c1] {
                    continue;
                }
                let mut mode = EncTestMode::new(EncTestModeType::Geo, qp);
                mode.cand_idx = (part * 64 + c0 * 8 + c1) as i32;
                mode.mv = [uni[c0].mv, uni[c1].mv];
                mode.refi = [uni[c0].refi, uni[c1].refi];
                let sad = pc.pred_sad(tc.x, tc.y, tc.log2w, tc.log2h, &mode);
                screened.push((part, c0, c1, sad));
            }
        }
    }
    if screened.is_empty() {
        return None;
    }
    screened.sort_by_key(|&(_, _, _, sad)| sad);
    screened.truncate(GEO_MAX_TRY_WEIGHTED_SAD);

    /* SATD re-rank of the SAD survivors */
    let mut ranked: Vec<(usize, usize, usize, u64)> = screened
        .iter()
        .take(GEO_MAX_TRY_WEIGHTED_SATD)
        .map(|&(part, c0, c1, _)| {
            let mut mode = EncTestMode::new(EncTestModeType::Geo, qp);
            mode.cand_idx = (part * 64 + c0 * 8 + c1) as i32;
            mode.mv = [uni[c0].mv, uni[c1].mv];
            mode.refi = [uni[c0].refi, uni[c1].refi];
            (
                part,
                c0,
                c1,
                pc.pred_satd(tc.x, tc.y, tc.log2w, tc.log2h, &mode),
            )
        })
        .collect();
    ranked.sort_by_key(|&(_, _, _, satd)| satd);

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    for &(part, c0, c1, _) in ranked.iter().take(GEO_MAX_NUM_RDO) {
        let mut mode = EncTestMode::new(EncTestModeType::Geo, qp);
        mode.cand_idx = (part * 64 + c0 * 8 + c1) as i32;
        mode.mv = [uni[c0].mv, uni[c1].mv];
        mode.refi = [uni[c0].refi, uni[c1].refi];

        let num_geo = uni.len() as u32;
        let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
            vvce_rdo_bit_cnt_cu_geo(
                &mut s.sbac,
                &mut s.ctx,
                part as u32,
                c0 as u32,
                c1 as u32,
                num_geo,
            );
        });

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            best = Some(TrialResult::new(mode, cost, outcome));
            best_state = s;
        }
    }

    if let Some(b) = &best {
        let part = (b.mode.cand_idx as usize) / 64;
        let [angle, dist] = vvc_tbl_geo_params[part];
        trace!(
            "geo ({},{}): {} screened, best angle {} dist {} cost {:.1}",
            tc.x,
            tc.y,
            screened.len(),
            angle,
            dist,
            b.cost
        );
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use crate::picman::VvcRefP;
    use pretty_assertions::assert_eq;

    /* deterministic stand-ins for the prediction machinery */
    struct MockCoder;

    impl PredCoder for MockCoder {
        fn pred_satd(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, mode: &EncTestMode) -> u64 {
            let m = &mode.mv[0];
            1000 + (m[0].abs() as u64 + m[1].abs() as u64) * 7
        }
        fn pred_sad(&mut self, x: u16, y: u16, w: u8, h: u8, mode: &EncTestMode) -> u64 {
            self.pred_satd(x, y, w, h, mode) + 100
        }
        fn code_residual(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, mode: &EncTestMode) -> ResiOutcome {
            let m = &mode.mv[0];
            let dist = 500 + (m[0].abs() as u64 + m[1].abs() as u64) * 3;
            if mode.force_zero_resi {
                ResiOutcome {
                    dist: dist + 40,
                    bits: 0,
                    cbf_luma: false,
                    cbf_cb: false,
                    cbf_cr: false,
                }
            } else {
                ResiOutcome {
                    dist,
                    bits: 60,
                    cbf_luma: true,
                    cbf_cb: false,
                    cbf_cr: false,
                }
            }
        }
        fn motion_search(
            &mut self,
            _x: u16,
            _y: u16,
            _w: u8,
            _h: u8,
            _lidx: usize,
            _refi: i8,
            mvp: [i16; 2],
            _imv: u8,
        ) -> ([i16; 2], u64) {
            ([mvp[0] + 1, mvp[1]], 2000)
        }
        fn hash_probe(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Option<([i16; 2], i8)> {
            None
        }
        fn ibc_search(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Option<([i16; 2], u64)> {
            None
        }
        fn palette_trial(
            &mut self,
            _x: u16,
            _y: u16,
            _w: u8,
            _h: u8,
            _qp: i8,
            _plt_pred: &[pel],
        ) -> Option<(ResiOutcome, u32, u32, Vec<pel>)> {
            None
        }
        fn intra_candidates(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Vec<u8> {
            vec![IPD_PLANAR as u8, IPD_DC as u8, 34]
        }
    }

    /* steerable double: one candidate-index family gets a prediction-error
     * edge, residual cost falls with the weight index */
    struct SteerCoder {
        favored: i32,
        scale: i32,
        tilt: u64,
    }

    impl PredCoder for SteerCoder {
        fn pred_satd(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, m: &EncTestMode) -> u64 {
            if self.scale > 0 && m.cand_idx / self.scale == self.favored {
                1000 - self.tilt
            } else {
                1000
            }
        }
        fn pred_sad(&mut self, x: u16, y: u16, w: u8, h: u8, m: &EncTestMode) -> u64 {
            self.pred_satd(x, y, w, h, m)
        }
        fn code_residual(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, m: &EncTestMode) -> ResiOutcome {
            ResiOutcome {
                dist: 3000 - m.bcw_idx as u64 * 500,
                bits: 60,
                cbf_luma: true,
                cbf_cb: false,
                cbf_cr: false,
            }
        }
        fn motion_search(
            &mut self,
            _x: u16,
            _y: u16,
            _w: u8,
            _h: u8,
            _lidx: usize,
            _refi: i8,
            mvp: [i16; 2],
            _imv: u8,
        ) -> ([i16; 2], u64) {
            ([mvp[0] + 1, mvp[1]], 2000)
        }
        fn hash_probe(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Option<([i16; 2], i8)> {
            None
        }
        fn ibc_search(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Option<([i16; 2], u64)> {
            None
        }
        fn palette_trial(
            &mut self,
            _x: u16,
            _y: u16,
            _w: u8,
            _h: u8,
            _qp: i8,
            _plt_pred: &[pel],
        ) -> Option<(ResiOutcome, u32, u32, Vec<pel>)> {
            None
        }
        fn intra_candidates(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Vec<u8> {
            vec![IPD_PLANAR as u8]
        }
    }

    struct NoDeblock;
    impl DeblockCost for NoDeblock {
        fn boundary_dist_delta(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> i64 {
            0
        }
    }

    fn test_ctx() -> VvceCtx {
        let sps = VvcSps::default();
        let pps = VvcPps::default();
        let mut sh = VvcSh::default();
        sh.num_ref_idx = [2, 2];
        let mut ctx = VvceCtx::new(sps, pps, sh, 64, 64, 8).unwrap();

        let mut refp: [Vec<VvcRefP>; REFP_NUM] = [Vec::new(), Vec::new()];
        for &p in &[4, 0] {
            let mut r = VvcRefP::new();
            r.poc = p;
            refp[REFP_0].push(r);
        }
        for &p in &[12, 16] {
            let mut r = VvcRefP::new();
            r.poc = p;
            refp[REFP_1].push(r);
        }
        ctx.set_refp(refp);

        ctx.core.x = 16;
        ctx.core.y = 16;
        ctx.core.log2_cuw = 4;
        ctx.core.log2_cuh = 4;
        ctx
    }

    fn put_left_nbr(ctx: &mut VvceCtx, mv: [i16; 2]) {
        for sy in 4..8 {
            for sx in 0..4 {
                let scup = sy * ctx.w_scu + sx;
                ctx.map_scu[scup].SET_IF_COD_QP(0, 32);
                ctx.map_mv[scup] = [mv, [0, 0]];
                ctx.map_refi[scup] = [0, REFI_INVALID];
            }
        }
    }

    #[test]
    fn test_skip_merge_picks_neighbor_motion() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [2, -1]);

        let mut pc = MockCoder;
        let mut dcb = NoDeblock;
        let tr = vvce_analyze_skip_merge(&mut ctx, &mut pc, &mut dcb, EncTestModeType::Skip, 32)
            .unwrap();

        /* the neighbor motion is the SATD leader and survives as skip */
        assert_eq!(tr.mode.mv[REFP_0], [2, -1]);
        assert!(!tr.outcome.cbf_luma);
        assert!(tr.history_mi.is_some());
    }

    #[test]
    fn test_merge_has_residual_bits() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [2, -1]);

        let mut pc = MockCoder;
        let mut dcb = NoDeblock;
        let tr = vvce_analyze_skip_merge(&mut ctx, &mut pc, &mut dcb, EncTestModeType::Merge, 32)
            .unwrap();
        assert!(tr.outcome.cbf_luma);
        assert!(tr.outcome.bits > 0);
    }

    #[test]
    fn test_mmvd_is_deterministic() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [2, -1]);
        let mut pc = MockCoder;
        let mut dcb = NoDeblock;

        let a = vvce_analyze_mmvd(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        let b = vvce_analyze_mmvd(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(a.mode.cand_idx, b.mode.cand_idx);
        assert_eq!(a.mode.mv, b.mode.mv);
    }

    #[test]
    fn test_inter_me_reports_mvd_history() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [4, 0]);
        let mut pc = MockCoder;
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_inter_me(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert!(tr.history_mi.is_some());
        assert!(REFI_IS_VALID(tr.mode.refi[REFP_0]) || REFI_IS_VALID(tr.mode.refi[REFP_1]));
    }

    #[test]
    fn test_geo_needs_two_distinct_candidates() {
        let mut ctx = test_ctx();
        /* single spatial neighbor: the rest of the list is zero fill, so
         * distinct pairs exist and geo may proceed */
        put_left_nbr(&mut ctx, [9, 9]);
        let mut pc = MockCoder;
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_geo(&mut ctx, &mut pc, &mut dcb, 32);
        assert!(tr.is_some());
        let tr = tr.unwrap();
        assert_eq!(tr.mode.mode_type, EncTestModeType::Geo);
    }

    #[test]
    fn test_affine_merge_none_without_affine_neighbor() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [2, -1]);
        let mut pc = MockCoder;
        let mut dcb = NoDeblock;
        assert!(vvce_analyze_affine_merge(&mut ctx, &mut pc, &mut dcb, 32).is_none());
    }

    #[test]
    fn test_geo_screen_reaches_late_partitions() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [9, 9]);
        /* only combinations of the last partition predict well; the SAD
         * screen has to visit them for RD to ever see them */
        let mut pc = SteerCoder {
            favored: 63,
            scale: 64,
            tilt: 999,
        };
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_geo(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(tr.mode.cand_idx / 64, 63);
    }

    #[test]
    fn test_mmvd_ranking_charges_index_bits() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [2, -1]);
        /* index 30 sits on the deepest refinement step and gets a one-point
         * prediction edge; its longer signalling must still outweigh that */
        let mut pc = SteerCoder {
            favored: 30,
            scale: 1,
            tilt: 1,
        };
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_mmvd(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        let step = (tr.mode.cand_idx as usize % MMVD_MAX_REFINE_NUM) / MMVD_REFINE_DIR_NUM;
        assert_eq!(step, 0);
    }

    #[test]
    fn test_inter_me_bcw_ladder_follows_hint() {
        let mut pc = SteerCoder {
            favored: 0,
            scale: 0,
            tilt: 0,
        };
        let mut dcb = NoDeblock;

        /* free run: the residual favors the heaviest weight */
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [4, 0]);
        let tr = vvce_analyze_inter_me(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(tr.mode.bcw_idx, BCW_NUM as u8 - 1);

        /* hinted run: only the hinted weight and the default are tested */
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [4, 0]);
        ctx.core.bcw_idx_hint = Some(0);
        let tr = vvce_analyze_inter_me(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert!(tr.mode.bcw_idx == 0 || tr.mode.bcw_idx == BCW_DEFAULT);
    }

    #[test]
    fn test_affine_me_produces_corner_mvds() {
        let mut ctx = test_ctx();
        put_left_nbr(&mut ctx, [4, 0]);
        let mut pc = MockCoder;
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_affine_me(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert!(tr.affine > 0);
        assert_eq!(tr.mode.mode_type, EncTestModeType::AffineInter);
    }
}
