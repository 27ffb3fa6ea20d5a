use super::eco::*;
use super::*;
use crate::api::*;
use crate::def::*;
use crate::util::*;

use log::{debug, trace};
use num_traits::FromPrimitive;

/*****************************************************************************
 * coding tree search
 *
 * Depth-first over quad / binary / ternary splits. A node first tries to
 * code itself as one block, then each allowed split; the winner is written
 * back into the picture maps so later blocks derive their candidates from
 * it. Entropy model state rides along in per-size-class checkpoints.
 *****************************************************************************/

/* everything the tree needs to remember about one accepted leaf trial */
pub(crate) struct TrialResult {
    pub(crate) mode: EncTestMode,
    pub(crate) cost: f64,
    pub(crate) outcome: ResiOutcome,
    pub(crate) mrg_type: MergeType,
    pub(crate) subpu_mv: Vec<[MvField; REFP_NUM]>,
    pub(crate) affine: u8,
    pub(crate) affine_mv: [[[i16; MV_D]; VER_NUM]; REFP_NUM],
    /* motion the winner contributes to the history list */
    pub(crate) history_mi: Option<MotionInfo>,
    /* resolved explicit-motion syntax, kept for replay */
    pub(crate) inter_bits: Option<InterBits>,
    /* palette table of the trial, feeds the predictor when it wins */
    pub(crate) plt_entries: Vec<pel>,
}

impl TrialResult {
    pub(crate) fn new(mode: EncTestMode, cost: f64, outcome: ResiOutcome) -> Self {
        TrialResult {
            mode,
            cost,
            outcome,
            mrg_type: MergeType::MRG_TYPE_DEFAULT,
            subpu_mv: Vec::new(),
            affine: 0,
            affine_mv: [[[0; MV_D]; VER_NUM]; REFP_NUM],
            history_mi: None,
            inter_bits: None,
            plt_entries: Vec::new(),
        }
    }
}

pub fn mode_analyze_ctu<P: PredCoder, D: DeblockCost, M: ModeCtrl>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    mc: &mut M,
    ctu_x: u16,
    ctu_y: u16,
) -> Result<f64, VvcError> {
    let log2_ctu = ctx.sps.log2_ctu_size;
    let wi = (log2_ctu - 2) as usize;

    if ctu_x == 0 && ctu_y == 0 {
        ctx.core.s_ctu = SbacState::default();
        ctx.core.qp_prev_eco = ctx.sh.qp;
    }
    ctx.core.s_curr_best[wi][wi] = ctx.core.s_ctu;
    ctx.core.dqp_curr_best[wi][wi] = ctx.core.qp_prev_eco;
    ctx.core.mode_cache.clear();
    mc.reset_ctu();

    let cost = mode_coding_tree(ctx, pc, dc, mc, ctu_x, ctu_y, log2_ctu, log2_ctu, 0, 0, ctx.sh.qp)?;

    ctx.core.s_ctu = ctx.core.s_next_best[wi][wi];
    ctx.core.qp_prev_eco = ctx.core.dqp_next_best[wi][wi];
    debug!(
        "ctu ({},{}) coded, cost {:.1}",
        ctu_x, ctu_y, cost
    );
    Ok(cost)
}

fn mode_coding_tree<P: PredCoder, D: DeblockCost, M: ModeCtrl>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    mc: &mut M,
    x0: u16,
    y0: u16,
    log2_cuw: u8,
    log2_cuh: u8,
    cud: u16,
    mtt_depth: u16,
    qp: i8,
) -> Result<f64, VvcError> {
    let wi = (log2_cuw - 2) as usize;
    let hi = (log2_cuh - 2) as usize;
    let cuw = 1u16 << log2_cuw;
    let cuh = 1u16 << log2_cuh;

    let allow = vvc_split_allowed(
        x0,
        y0,
        cuw,
        cuh,
        ctx.w,
        ctx.h,
        mtt_depth,
        ctx.sps.max_mtt_depth,
        ctx.sps.log2_min_qt_size,
        ctx.sps.log2_max_bt_size,
        ctx.sps.log2_max_tt_size,
    );
    let split_ctx = nbr_split_ctx(ctx, x0, y0, log2_cuw, log2_cuh);

    let node_start = ctx.core.s_curr_best[wi][hi];
    let dqp_start = ctx.core.dqp_curr_best[wi][hi];
    let mut best_cost = MAX_COST;
    let mut best_split = SplitMode::NO_SPLIT;
    let mut node_next = node_start;
    let mut node_next_dqp = dqp_start;
    let mut best_dqp = qp;

    /* the block itself, over the delta-QP candidates of this node */
    if allow[SplitMode::NO_SPLIT as usize] {
        let mut s = node_start;
        s.sbac.bit_reset();
        vvce_rdo_bit_cnt_split_mode(
            &mut s.sbac,
            &mut s.ctx,
            SplitMode::NO_SPLIT,
            &allow,
            split_ctx,
        );
        let split_cost = ctx.lambda * s.sbac.get_bit_number() as f64;

        for qp_cand in qp_candidates(ctx, log2_cuw, log2_cuh, qp) {
            ctx.core.s_curr_best[wi][hi] = s;
            ctx.core.dqp_curr_best[wi][hi] = dqp_start;
            match mode_analyze_cu(ctx, pc, dc, mc, x0, y0, log2_cuw, log2_cuh, qp_cand) {
                Ok(leaf_cost) => {
                    let cost = leaf_cost + split_cost;
                    if cost < best_cost {
                        best_cost = cost;
                        best_dqp = qp_cand;
                        node_next = ctx.core.s_next_best[wi][hi];
                        node_next_dqp = ctx.core.dqp_next_best[wi][hi];
                        std::mem::swap(
                            &mut ctx.core.cu_data_best[wi][hi],
                            &mut ctx.core.cu_data_temp[wi][hi],
                        );
                    }
                }
                Err(VvcError::NoEncodingFound) => {}
                Err(e) => return Err(e),
            }
        }

        if best_cost < MAX_COST {
            /* leave the leaf in the maps so split children of siblings and
             * deeper nodes see it as neighbor context */
            ctx.clear_map_region(x0, y0, log2_cuw, log2_cuh);
            ctx.copy_cu_data_to_map(wi, hi, x0, y0);
        }
    }

    /* split alternatives */
    for split_idx in 1..MAX_SPLIT_NUM {
        if !allow[split_idx] {
            continue;
        }
        let split: SplitMode = match FromPrimitive::from_usize(split_idx) {
            Some(s) => s,
            None => continue,
        };

        let mut s = node_start;
        s.sbac.bit_reset();
        vvce_rdo_bit_cnt_split_mode(&mut s.sbac, &mut s.ctx, split, &allow, split_ctx);
        let mut sum_cost = ctx.lambda * s.sbac.get_bit_number() as f64;

        /* the signalling alone already loses: recursing cannot help */
        if sum_cost >= best_cost {
            continue;
        }
        let fudge = split_cost_fudge(qp, log2_cuw, log2_cuh);

        let ss = vvc_split_get_part_structure(split, x0, y0, cuw, cuh, cud);
        let next_mtt = if split == SplitMode::SPLIT_QUAD {
            0
        } else {
            mtt_depth + 1
        };

        let mut fold = CuData::new(log2_cuw, log2_cuh);
        let mut run = s;
        let mut run_dqp = dqp_start;
        let mut ok = true;

        for part in 0..ss.part_count {
            let px = ss.x_pos[part];
            let py = ss.y_pos[part];
            if px >= ctx.w || py >= ctx.h {
                continue;
            }
            let plw = ss.log_cuw[part];
            let plh = ss.log_cuh[part];
            let pwi = (plw - 2) as usize;
            let phi = (plh - 2) as usize;

            ctx.core.s_curr_best[pwi][phi] = run;
            ctx.core.dqp_curr_best[pwi][phi] = run_dqp;
            match mode_coding_tree(ctx, pc, dc, mc, px, py, plw, plh, ss.cud[part], next_mtt, best_dqp)
            {
                Ok(c) => {
                    sum_cost += c;
                    run = ctx.core.s_next_best[pwi][phi];
                    run_dqp = ctx.core.dqp_next_best[pwi][phi];
                    fold.copy_from(
                        &ctx.core.cu_data_best[pwi][phi],
                        PEL2SCU((px - x0) as usize),
                        PEL2SCU((py - y0) as usize),
                    );
                }
                Err(VvcError::NoEncodingFound) => {
                    ok = false;
                    break;
                }
                Err(e) => return Err(e),
            }

            /* abandon a split once it cannot plausibly win anymore */
            if best_cost < MAX_COST && sum_cost > best_cost * fudge {
                ok = false;
                break;
            }
        }

        if ok && sum_cost < best_cost {
            best_cost = sum_cost;
            best_split = split;
            node_next = run;
            node_next_dqp = run_dqp;
            ctx.core.cu_data_best[wi][hi] = fold;
        }
        trace!(
            "node ({},{}) {}x{} split {:?}: {:.1} vs best {:.1}",
            x0,
            y0,
            cuw,
            cuh,
            split,
            sum_cost,
            best_cost
        );
    }

    if best_cost >= MAX_COST {
        return Err(VvcError::NoEncodingFound);
    }

    /* resolve: the winner becomes the authoritative content of the region */
    ctx.clear_map_region(x0, y0, log2_cuw, log2_cuh);
    ctx.copy_cu_data_to_map(wi, hi, x0, y0);
    ctx.core.s_next_best[wi][hi] = node_next;
    ctx.core.dqp_next_best[wi][hi] = node_next_dqp;
    ctx.core.cu_data_best[wi][hi].cost = best_cost;

    trace!(
        "node ({},{}) {}x{} resolved {:?} cost {:.1}",
        x0,
        y0,
        cuw,
        cuh,
        best_split,
        best_cost
    );
    Ok(best_cost)
}

/* QP candidates of one node: just the inherited QP unless the delta-QP
 * search is on and the node is a quantization group */
fn qp_candidates(ctx: &VvceCtx, log2_cuw: u8, log2_cuh: u8, qp: i8) -> Vec<i8> {
    if !ctx.pps.cu_qp_delta_enabled_flag
        || ctx.sh.dqp == 0
        || (log2_cuw as usize + log2_cuh as usize) < 2 * ctx.pps.cu_qp_delta_area as usize
    {
        return vec![qp];
    }

    let lo = VVC_CLIP3(MIN_QP as i8, MAX_QP as i8, ctx.sh.qp - ctx.sh.dqp);
    let hi = VVC_CLIP3(MIN_QP as i8, MAX_QP as i8, ctx.sh.qp + ctx.sh.dqp);
    (lo..=hi).collect()
}

/* predicted QP of the group containing (x, y) */
pub(crate) fn vvce_get_qp_pred(ctx: &VvceCtx, x: u16, y: u16) -> i8 {
    let x_scu = PEL2SCU(x as usize);
    let y_scu = PEL2SCU(y as usize);
    let scup = y_scu * ctx.w_scu + x_scu;

    let qp_l = if x_scu > 0 && ctx.map_scu[scup - 1].GET_COD() != 0 {
        ctx.map_scu[scup - 1].GET_QP() as i8
    } else {
        ctx.core.qp_prev_eco
    };
    let qp_a = if y_scu > 0 && ctx.map_scu[scup - ctx.w_scu].GET_COD() != 0 {
        ctx.map_scu[scup - ctx.w_scu].GET_QP() as i8
    } else {
        ctx.core.qp_prev_eco
    };

    if ctx.sh.qp_pred_median {
        let p = ctx.core.qp_prev_eco;
        qp_l.max(qp_a.min(p)).min(qp_l.min(qp_a).max(p))
    } else {
        ((qp_l as i16 + qp_a as i16 + 1) >> 1) as i8
    }
}

/* count of directly adjacent coded neighbors that are split deeper than
 * this node, used as the split flag context */
fn nbr_split_ctx(ctx: &VvceCtx, x0: u16, y0: u16, log2_cuw: u8, log2_cuh: u8) -> usize {
    let x_scu = PEL2SCU(x0 as usize);
    let y_scu = PEL2SCU(y0 as usize);
    let scup = y_scu * ctx.w_scu + x_scu;
    let mut cnt = 0;

    if x_scu > 0 && ctx.map_scu[scup - 1].GET_COD() != 0 {
        let (_, _, _, lh) = crate::mvp::cu_geo_unpack(ctx.map_cu_geo[scup - 1]);
        if lh < log2_cuh {
            cnt += 1;
        }
    }
    if y_scu > 0 && ctx.map_scu[scup - ctx.w_scu].GET_COD() != 0 {
        let (_, _, lw, _) = crate::mvp::cu_geo_unpack(ctx.map_cu_geo[scup - ctx.w_scu]);
        if lw < log2_cuw {
            cnt += 1;
        }
    }
    cnt.min(2)
}

/*****************************************************************************
 * leaf analysis: run every scheduled mode family, keep the cheapest
 *****************************************************************************/
fn mode_analyze_cu<P: PredCoder, D: DeblockCost, M: ModeCtrl>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    mc: &mut M,
    x: u16,
    y: u16,
    log2_cuw: u8,
    log2_cuh: u8,
    qp: i8,
) -> Result<f64, VvcError> {
    let wi = (log2_cuw - 2) as usize;
    let hi = (log2_cuh - 2) as usize;

    ctx.core.x = x;
    ctx.core.y = y;
    ctx.core.log2_cuw = log2_cuw;
    ctx.core.log2_cuh = log2_cuh;
    ctx.core.qp = qp;
    let scup = PEL2SCU(y as usize) * ctx.w_scu + PEL2SCU(x as usize);
    ctx.core.avail_cu = vvc_get_avail_block(
        PEL2SCU(x as usize),
        PEL2SCU(y as usize),
        ctx.w_scu,
        ctx.h_scu,
        scup,
        1 << log2_cuw,
        1 << log2_cuh,
        &ctx.map_scu,
    );

    ctx.core.cost_best = MAX_COST;
    ctx.core.s_temp_best = ctx.core.s_curr_best[wi][hi];
    /* the previous coded QP is part of the checkpoint: losing trials of a
     * sibling or a rejected subtree must not leak theirs into this node */
    ctx.core.qp_prev_eco = ctx.core.dqp_curr_best[wi][hi];
    ctx.core.cu_data_temp[wi][hi].reset();

    let hist_snapshot = ctx.core.history.clone();
    let plt_snapshot = ctx.core.plt_pred.clone();
    let is_intra_slice = ctx.sh.slice_type.is_intra();

    let area = 1u32 << (log2_cuw as u32 + log2_cuh as u32);
    ctx.core.bcw_idx_hint = mc.bcw_hint(area);
    ctx.core.inter_cost_hint = mc.inter_cost_hint(area);
    mc.init_cu_level(x, y, log2_cuw, log2_cuh, &ctx.sps, is_intra_slice);

    let mut best: Option<TrialResult> = None;

    while let Some(family) = mc.next_test_mode() {
        /* each family starts from the same entropy checkpoint, history and
         * palette predictor */
        ctx.core.s_temp_run = ctx.core.s_curr_best[wi][hi];
        ctx.core.history = hist_snapshot.clone();
        ctx.core.plt_pred = plt_snapshot.clone();

        use EncTestModeType::*;
        let res = match family {
            Skip | Merge => super::pinter::vvce_analyze_skip_merge(ctx, pc, dc, family, qp),
            Mmvd => super::pinter::vvce_analyze_mmvd(ctx, pc, dc, qp),
            Inter => super::pinter::vvce_analyze_inter_me(ctx, pc, dc, qp),
            AffineMerge => super::pinter::vvce_analyze_affine_merge(ctx, pc, dc, qp),
            AffineInter => super::pinter::vvce_analyze_affine_me(ctx, pc, dc, qp),
            Geo => super::pinter::vvce_analyze_geo(ctx, pc, dc, qp),
            Intra => super::pintra::vvce_analyze_intra(ctx, pc, dc, qp),
            Ibc => super::pibc::vvce_analyze_ibc(ctx, pc, dc, qp),
            IbcMerge => super::pibc::vvce_analyze_ibc_merge(ctx, pc, dc, qp),
            Palette => super::pibc::vvce_analyze_palette(ctx, pc, qp),
            ReuseCached => super::pibc::vvce_analyze_reuse(ctx, dc, qp),
            /* tried as a blended variant inside the merge evaluator */
            Ciip => None,
        };

        if let Some(mut tr) = res {
            /* group-level syntax rides on top of the mode cost */
            let extra = cu_level_extra_bits(ctx, wi, hi, &tr, x, y, qp);
            tr.cost += ctx.lambda * extra as f64;

            let clean_skip =
                tr.mode.mode_type == Skip && !tr.outcome.cbf_luma && !tr.outcome.cbf_cb && !tr.outcome.cbf_cr;
            mc.accept_if_better(tr.mode.mode_type, tr.cost, clean_skip, tr.mode.bcw_idx);

            if tr.cost < ctx.core.cost_best {
                ctx.core.cost_best = tr.cost;
                ctx.core.s_temp_best = ctx.core.s_temp_run;
                store_leaf(ctx, wi, hi, &tr, qp);
                best = Some(tr);
            }
        }
    }
    mc.finish_cu_level();

    let best = match best {
        Some(b) => b,
        None => return Err(VvcError::NoEncodingFound),
    };

    /* winning trial, and only it, leaves a trace in the motion history
     * and the palette predictor */
    ctx.core.history = hist_snapshot;
    if let Some(mi) = best.history_mi {
        ctx.core.history_push(mi);
    }
    ctx.core.plt_pred = plt_snapshot;
    if best.mode.mode_type == EncTestModeType::Palette {
        let entries = best.plt_entries.clone();
        ctx.core.plt_pred_update(&entries);
    }

    /* the leaf result only advances the checkpointed previous coded QP;
     * committing to ctx-wide state is the caller's RESOLVE step */
    ctx.core.qp_prev_eco = ctx.core.dqp_curr_best[wi][hi];
    if best.outcome.cbf_luma || best.outcome.cbf_cb || best.outcome.cbf_cr {
        ctx.core.qp_prev_eco = qp;
    }
    ctx.core.dqp_next_best[wi][hi] = ctx.core.qp_prev_eco;

    /* palette winners depend on the predictor state and do not replay */
    if best.mode.mode_type != EncTestModeType::Palette {
        ctx.core.mode_cache.insert(
            (x, y, log2_cuw, log2_cuh, qp),
            CachedCu {
                mode: best.mode,
                outcome: best.outcome,
                mrg_type: best.mrg_type,
                subpu_mv: best.subpu_mv.clone(),
                affine: best.affine,
                affine_mv: best.affine_mv,
                inter_bits: best.inter_bits,
                history_mi: best.history_mi,
            },
        );
    }

    ctx.core.s_next_best[wi][hi] = ctx.core.s_temp_best;
    Ok(ctx.core.cost_best)
}

/* delta-QP and chroma-QP-offset signalling of the accepted trial, counted
 * on the running entropy state */
fn cu_level_extra_bits(
    ctx: &mut VvceCtx,
    _wi: usize,
    _hi: usize,
    tr: &TrialResult,
    x: u16,
    y: u16,
    qp: i8,
) -> u32 {
    let any_cbf = tr.outcome.cbf_luma || tr.outcome.cbf_cb || tr.outcome.cbf_cr;
    if !any_cbf {
        return 0;
    }

    let qp_pred = vvce_get_qp_pred(ctx, x, y);
    let s = &mut ctx.core.s_temp_run;
    s.sbac.bit_reset();

    if ctx.pps.cu_qp_delta_enabled_flag {
        vvce_rdo_bit_cnt_delta_qp(&mut s.sbac, &mut s.ctx, qp - qp_pred);
    }
    if ctx.pps.chroma_qp_offset_list_enabled_flag && (tr.outcome.cbf_cb || tr.outcome.cbf_cr) {
        /* rate-only decision: the shortest codeword is entry zero */
        vvce_rdo_bit_cnt_chroma_qp_offset(
            &mut s.sbac,
            &mut s.ctx,
            0,
            ctx.pps.chroma_qp_offset_list_len,
        );
    }
    s.sbac.get_bit_number()
}

/* write the accepted trial into the scratch region of its size class */
fn store_leaf(ctx: &mut VvceCtx, wi: usize, hi: usize, tr: &TrialResult, qp: i8) {
    let log2_cuw = (wi + 2) as u8;
    let log2_cuh = (hi + 2) as u8;
    let scuw = 1usize << (wi as usize);
    let scuh = 1usize << (hi as usize);

    let (pred_mode, is_inter_like) = match tr.mode.mode_type {
        EncTestModeType::Intra => (PredMode::MODE_INTRA, false),
        EncTestModeType::Ibc | EncTestModeType::IbcMerge => (PredMode::MODE_IBC, false),
        EncTestModeType::Palette => (PredMode::MODE_PLT, false),
        _ => (PredMode::MODE_INTER, true),
    };
    let is_skip = tr.mode.mode_type == EncTestModeType::Skip;

    let cu = crate::mvp::SpanCu {
        x: 0,
        y: 0,
        log2_cuw,
        log2_cuh,
        w_scu: scuw,
        refi: if is_inter_like {
            tr.mode.refi
        } else {
            [REFI_INVALID; REFP_NUM]
        },
        mv: tr.mode.mv,
        bcw_idx: tr.mode.bcw_idx,
        merge_type: tr.mrg_type,
        subpu_mv: &tr.subpu_mv,
        affine: tr.affine != 0,
        affine_type: if tr.affine == 2 {
            AffineModel::AFF_6_PARAM
        } else {
            AffineModel::AFF_4_PARAM
        },
        affine_mv: tr.affine_mv,
    };

    {
        let cud = &mut ctx.core.cu_data_temp[wi][hi];
        crate::mvp::vvc_span_motion(
            &cu,
            &mut cud.mv,
            &mut cud.refi,
            &mut cud.bcw_idx,
            &mut cud.affine,
            &mut cud.cu_geo,
            &mut cud.affine_mv,
        );

        for i in 0..scuw * scuh {
            cud.pred_mode[i] = pred_mode;
            cud.skip_flag[i] = is_skip;
            cud.mrg_type[i] = tr.mrg_type;
            cud.qp[i] = qp;
            cud.ipm[i] = tr.mode.intra_mode;

            /* IBC keeps the intra flag clear; its own flag excludes it from
             * inter derivation */
            let is_ibc = tr.mode.mode_type == EncTestModeType::Ibc
                || tr.mode.mode_type == EncTestModeType::IbcMerge;
            let intra_flag = !is_inter_like && !is_ibc;
            let mut scu = MCU::default();
            scu.SET_IF_COD_QP(intra_flag as u32, qp as u8);
            if is_ibc {
                scu.SET_IBCF();
            }
            if is_skip {
                scu.SET_SF();
            }
            if tr.outcome.cbf_luma {
                scu.SET_CBFL();
            }
            cud.map_scu[i] = scu;
        }

        cud.cost = tr.cost;
        cud.dist = tr.outcome.dist;
        cud.bits = tr.outcome.bits;
    }

    /* the geometry word written by span assumed node-local coordinates;
     * overwrite it with the picture-level position */
    let x_scu = PEL2SCU(ctx.core.x as usize);
    let y_scu = PEL2SCU(ctx.core.y as usize);
    let geo = crate::mvp::cu_geo_pack(x_scu, y_scu, log2_cuw, log2_cuh);
    let cud = &mut ctx.core.cu_data_temp[wi][hi];
    for g in cud.cu_geo.iter_mut() {
        *g = geo;
    }
}

impl VvceCtx {
    /* forget everything previously resolved in the region */
    pub(crate) fn clear_map_region(&mut self, x0: u16, y0: u16, log2_cuw: u8, log2_cuh: u8) {
        let x_scu = PEL2SCU(x0 as usize);
        let y_scu = PEL2SCU(y0 as usize);
        let scuw = 1usize << (log2_cuw as usize - MIN_CU_LOG2);
        let scuh = 1usize << (log2_cuh as usize - MIN_CU_LOG2);

        for sy in 0..scuh {
            if y_scu + sy >= self.h_scu {
                break;
            }
            for sx in 0..scuw {
                if x_scu + sx >= self.w_scu {
                    break;
                }
                let scup = (y_scu + sy) * self.w_scu + (x_scu + sx);
                self.map_scu[scup] = MCU::default();
                self.map_refi[scup] = [REFI_INVALID; REFP_NUM];
                self.map_mv[scup] = [[0; MV_D]; REFP_NUM];
                self.map_bcw[scup] = BCW_DEFAULT;
                self.map_affine[scup] = 0;
                self.map_cu_geo[scup] = 0;
                self.map_ipm[scup] = 0;
            }
        }
    }

    /* flush the best region of the size class into the picture maps */
    pub(crate) fn copy_cu_data_to_map(&mut self, wi: usize, hi: usize, x0: u16, y0: u16) {
        let x_scu = PEL2SCU(x0 as usize);
        let y_scu = PEL2SCU(y0 as usize);
        let scuw = 1usize << wi;
        let scuh = 1usize << hi;

        let cud = &self.core.cu_data_best[wi][hi];
        for sy in 0..scuh {
            if y_scu + sy >= self.h_scu {
                break;
            }
            for sx in 0..scuw {
                if x_scu + sx >= self.w_scu {
                    break;
                }
                let scup = (y_scu + sy) * self.w_scu + (x_scu + sx);
                let s = sy * scuw + sx;
                /* never resurrect scus a losing deeper trial never coded */
                if cud.map_scu[s].GET_COD() == 0 {
                    continue;
                }
                self.map_scu[scup] = cud.map_scu[s];
                self.map_mv[scup] = cud.mv[s];
                self.map_refi[scup] = cud.refi[s];
                self.map_bcw[scup] = cud.bcw_idx[s];
                self.map_affine[scup] = cud.affine[s];
                self.map_cu_geo[scup] = cud.cu_geo[s];
                self.map_affine_mv[scup] = cud.affine_mv[s];
                self.map_ipm[scup] = cud.ipm[s];
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    /* residual cost rises with the trial QP, so the lowest candidate of a
     * quantization group always wins */
    struct QpCoder;

    impl PredCoder for QpCoder {
        fn pred_satd(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            1000
        }
        fn pred_sad(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            1100
        }
        fn code_residual(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, m: &EncTestMode) -> ResiOutcome {
            ResiOutcome {
                dist: 4000 + m.qp as u64 * 300,
                bits: 40,
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
            _l: usize,
            _r: i8,
            mvp: [i16; 2],
            _imv: u8,
        ) -> ([i16; 2], u64) {
            (mvp, 0)
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
            vec![IPD_PLANAR as u8, IPD_DC as u8]
        }
    }

    struct NoDeblock;
    impl DeblockCost for NoDeblock {
        fn boundary_dist_delta(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> i64 {
            0
        }
    }

    #[test]
    fn test_qp_group_winner_sets_prev_coded_qp() {
        let mut sps = VvcSps::default();
        sps.log2_ctu_size = 4;
        sps.log2_min_qt_size = 4;
        sps.max_mtt_depth = 0;
        let mut pps = VvcPps::default();
        pps.cu_qp_delta_enabled_flag = true;
        pps.cu_qp_delta_area = 4;
        let mut sh = VvcSh::default();
        sh.slice_type = SliceType::VVC_ST_I;
        sh.qp = 30;
        sh.dqp = 1;
        let mut ctx = VvceCtx::new(sps, pps, sh, 16, 16, 0).unwrap();

        let mut pc = QpCoder;
        let mut dcb = NoDeblock;
        let mut mc = RasterModeCtrl::default();
        mode_analyze_ctu(&mut ctx, &mut pc, &mut dcb, &mut mc, 0, 0).unwrap();

        /* candidates 29..=31 all code residual; only the winner, 29, may
         * become the previous coded QP of the next group */
        assert_eq!(ctx.core.qp_prev_eco, 29);
        assert_eq!(ctx.map_scu[0].GET_QP() as i8, 29);
    }

    #[test]
    fn test_qp_candidates_disabled() {
        let sps = VvcSps::default();
        let pps = VvcPps::default();
        let sh = VvcSh::default();
        let ctx = VvceCtx::new(sps, pps, sh, 64, 64, 0).unwrap();
        assert_eq!(qp_candidates(&ctx, 6, 6, 30), vec![30]);
    }

    #[test]
    fn test_qp_candidates_range() {
        let sps = VvcSps::default();
        let mut pps = VvcPps::default();
        pps.cu_qp_delta_enabled_flag = true;
        pps.cu_qp_delta_area = 5;
        let mut sh = VvcSh::default();
        sh.qp = 30;
        sh.dqp = 2;
        let ctx = VvceCtx::new(sps, pps, sh, 64, 64, 0).unwrap();

        assert_eq!(qp_candidates(&ctx, 6, 6, 30), vec![28, 29, 30, 31, 32]);
        /* below the quantization group size the inherited QP sticks */
        assert_eq!(qp_candidates(&ctx, 3, 3, 29), vec![29]);
    }

    #[test]
    fn test_qp_pred_median_vs_avg() {
        let sps = VvcSps::default();
        let pps = VvcPps::default();
        let mut sh = VvcSh::default();
        sh.qp = 32;
        let mut ctx = VvceCtx::new(sps, pps, sh, 64, 64, 0).unwrap();
        ctx.core.qp_prev_eco = 32;

        /* uncoded neighbors fall back to the previous coded QP */
        assert_eq!(vvce_get_qp_pred(&ctx, 16, 16), 32);

        ctx.map_scu[PEL2SCU(16) * ctx.w_scu + PEL2SCU(16) - 1].SET_IF_COD_QP(0, 40);
        assert_eq!(vvce_get_qp_pred(&ctx, 16, 16), 36);

        ctx.sh.qp_pred_median = true;
        /* median(40, 32, 32) */
        assert_eq!(vvce_get_qp_pred(&ctx, 16, 16), 32);
    }

    #[test]
    fn test_clear_then_copy_roundtrip() {
        let sps = VvcSps::default();
        let pps = VvcPps::default();
        let sh = VvcSh::default();
        let mut ctx = VvceCtx::new(sps, pps, sh, 64, 64, 0).unwrap();

        let wi = 2;
        let hi = 2;
        {
            let cud = &mut ctx.core.cu_data_best[wi][hi];
            for i in 0..cud.map_scu.len() {
                cud.map_scu[i].SET_IF_COD_QP(0, 30);
                cud.refi[i] = [0, REFI_INVALID];
                cud.mv[i] = [[3, 4], [0, 0]];
            }
        }
        ctx.copy_cu_data_to_map(wi, hi, 16, 16);

        let scup = PEL2SCU(16) * ctx.w_scu + PEL2SCU(16);
        assert!(ctx.map_scu[scup].IS_COD_NIF());
        assert_eq!(ctx.map_mv[scup][REFP_0], [3, 4]);

        ctx.clear_map_region(16, 16, 4, 4);
        assert_eq!(ctx.map_scu[scup].GET_COD(), 0);
        assert_eq!(ctx.map_refi[scup], [REFI_INVALID; REFP_NUM]);
    }
}
