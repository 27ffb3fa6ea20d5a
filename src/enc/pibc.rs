use super::eco::*;
use super::mode::TrialResult;
use super::*;
use crate::def::*;

/*****************************************************************************
 * intra block copy and palette evaluators
 *
 * Both modes reference only the current picture. IBC searches are cached:
 * the same block is revisited through several split paths and the search
 * result does not depend on the path taken.
 *****************************************************************************/

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

/* block-vector predictor: the first IBC merge candidate when one exists */
fn ibc_bvp(ctx: &VvceCtx, tc: &TrialCtx) -> [i16; MV_D] {
    let mrg = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_ibc_merge_cands();
    if mrg.num_valid > 0 {
        mrg.mv_field[0][REFP_0].mv
    } else {
        [0, 0]
    }
}

pub(crate) fn vvce_analyze_ibc<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    let tc = trial_ctx(ctx);
    let is_inter_slice = !ctx.sh.slice_type.is_intra();

    let key = (tc.x, tc.y, tc.log2w, tc.log2h);
    let (bv, _sad) = match ctx.core.ibc_cache.get(&key) {
        Some(&hit) => hit,
        None => {
            let found = pc.ibc_search(tc.x, tc.y, tc.log2w, tc.log2h)?;
            ctx.core.ibc_cache.insert(key, found);
            found
        }
    };

    let bvp = ibc_bvp(ctx, &tc);
    let bvd = [bv[MV_X] - bvp[MV_X], bv[MV_Y] - bvp[MV_Y]];

    let mut mode = EncTestMode::new(EncTestModeType::Ibc, qp);
    mode.mv[REFP_0] = bv;

    let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
        vvce_rdo_bit_cnt_cu_ibc(&mut s.sbac, &mut s.ctx, is_inter_slice, false, 0, 0, bvd);
    });

    ctx.core.s_temp_run = s;
    let mut tr = TrialResult::new(mode, cost, outcome);
    tr.mrg_type = MergeType::MRG_TYPE_IBC;
    Some(tr)
}

pub(crate) fn vvce_analyze_ibc_merge<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    let tc = trial_ctx(ctx);
    let is_inter_slice = !ctx.sh.slice_type.is_intra();

    let mrg = ctx
        .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
        .get_ibc_merge_cands();
    if mrg.num_valid == 0 {
        return None;
    }

    let mut best: Option<TrialResult> = None;
    let mut best_state = tc.start;

    for idx in 0..mrg.num_valid {
        let mut mode = EncTestMode::new(EncTestModeType::IbcMerge, qp);
        mode.mv[REFP_0] = mrg.mv_field[idx][REFP_0].mv;
        mode.cand_idx = idx as i32;

        let (cost, outcome, s) = rd_trial(ctx, pc, dc, &tc, &mode, |s| {
            vvce_rdo_bit_cnt_cu_ibc(
                &mut s.sbac,
                &mut s.ctx,
                is_inter_slice,
                true,
                idx as u32,
                mrg.max_num as u32,
                [0, 0],
            );
        });

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            let mut tr = TrialResult::new(mode, cost, outcome);
            tr.mrg_type = MergeType::MRG_TYPE_IBC;
            best = Some(tr);
            best_state = s;
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

pub(crate) fn vvce_analyze_palette<P: PredCoder>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    qp: i8,
) -> Option<TrialResult> {
    let tc = trial_ctx(ctx);
    let is_inter_slice = !ctx.sh.slice_type.is_intra();

    let plt_pred = ctx.core.plt_pred.clone();
    let (outcome, num_entries, num_reused, table) =
        pc.palette_trial(tc.x, tc.y, tc.log2w, tc.log2h, qp, &plt_pred)?;

    let mut s = tc.start;
    s.sbac.bit_reset();
    vvce_rdo_bit_cnt_cu_plt(&mut s.sbac, &mut s.ctx, is_inter_slice, num_entries, num_reused);
    vvce_rdo_bit_cnt_cbf(
        &mut s.sbac,
        &mut s.ctx,
        outcome.cbf_luma,
        outcome.cbf_cb,
        outcome.cbf_cr,
    );

    let bits = s.sbac.get_bit_number() + outcome.bits;
    let cost = ctx.rd_cost(outcome.dist, bits);

    ctx.core.s_temp_run = s;
    let mode = EncTestMode::new(EncTestModeType::Palette, qp);
    let mut tr = TrialResult::new(mode, cost, outcome);
    tr.plt_entries = table;
    Some(tr)
}

/*****************************************************************************
 * cached-result replay
 *
 * A block revisited through another split path already has a winner in the
 * per-CTU cache. The residual outcome is path independent and carried over;
 * the syntax bits depend on the entropy state and are recounted here.
 *****************************************************************************/
fn cached_cu_bits(ctx: &VvceCtx, tc: &TrialCtx, s: &mut SbacState, hit: &CachedCu) -> Option<()> {
    let is_inter_slice = !ctx.sh.slice_type.is_intra();
    let max_num = ctx.sh.max_num_merge_cand as u32;
    let tool_mmvd = ctx.sps.tool_mmvd;
    let idx = hit.mode.cand_idx as u32;

    match hit.mode.mode_type {
        EncTestModeType::Skip => {
            if hit.affine != 0 {
                vvce_rdo_bit_cnt_cu_affine_merge(&mut s.sbac, &mut s.ctx, true);
            } else {
                vvce_rdo_bit_cnt_cu_skip(&mut s.sbac, &mut s.ctx, idx, max_num, false, 0, tool_mmvd);
            }
        }
        EncTestModeType::Merge | EncTestModeType::Ciip => {
            let ciip = hit.mode.mode_type == EncTestModeType::Ciip;
            let tool_ciip = ctx.sps.tool_ciip
                && super::pinter::ciip_allowed(ctx, tc.log2w, tc.log2h, hit.mrg_type);
            vvce_rdo_bit_cnt_cu_merge(
                &mut s.sbac,
                &mut s.ctx,
                idx,
                max_num,
                false,
                0,
                ciip,
                tool_mmvd,
                tool_ciip,
            );
        }
        EncTestModeType::Mmvd => {
            vvce_rdo_bit_cnt_cu_merge(&mut s.sbac, &mut s.ctx, 0, 1, true, idx, false, true, false);
        }
        EncTestModeType::Geo => {
            let num_geo = (ctx.sh.max_num_merge_cand.min(GEO_MAX_NUM_UNI_CANDS)) as u32;
            let part = idx / 64;
            let c0 = (idx % 64) / 8;
            let c1 = idx % 8;
            vvce_rdo_bit_cnt_cu_geo(&mut s.sbac, &mut s.ctx, part, c0, c1, num_geo);
        }
        EncTestModeType::Inter | EncTestModeType::AffineInter => {
            let ib = hit.inter_bits.as_ref()?;
            vvce_rdo_bit_cnt_cu_inter(
                &mut s.sbac,
                &mut s.ctx,
                ib,
                &ctx.sh.num_ref_idx,
                ctx.sh.slice_type.is_inter_b(),
                ctx.sps.tool_affine,
                ctx.sps.tool_amvr,
                ctx.sps.tool_bcw,
            );
        }
        EncTestModeType::AffineMerge => {
            vvce_rdo_bit_cnt_cu_affine_merge(&mut s.sbac, &mut s.ctx, false);
        }
        EncTestModeType::Intra => {
            let mpm = super::pintra::vvce_get_mpm(ctx, tc.x, tc.y);
            vvce_rdo_bit_cnt_cu_intra(
                &mut s.sbac,
                &mut s.ctx,
                is_inter_slice,
                hit.mode.intra_mode,
                &mpm,
                hit.mode.isp_mode,
                ctx.sps.tool_isp,
            );
            vvce_rdo_bit_cnt_transform_idx(
                &mut s.sbac,
                &mut s.ctx,
                hit.mode.mts_idx,
                hit.mode.lfnst_idx,
                ctx.sps.tool_mts,
                ctx.sps.tool_lfnst,
            );
        }
        EncTestModeType::Ibc => {
            let bvp = ibc_bvp(ctx, tc);
            let bv = hit.mode.mv[REFP_0];
            let bvd = [bv[MV_X] - bvp[MV_X], bv[MV_Y] - bvp[MV_Y]];
            vvce_rdo_bit_cnt_cu_ibc(&mut s.sbac, &mut s.ctx, is_inter_slice, false, 0, 0, bvd);
        }
        EncTestModeType::IbcMerge => {
            let mrg = ctx
                .mvp_ctx(tc.x, tc.y, tc.log2w, tc.log2h)
                .get_ibc_merge_cands();
            vvce_rdo_bit_cnt_cu_ibc(
                &mut s.sbac,
                &mut s.ctx,
                is_inter_slice,
                true,
                idx,
                mrg.max_num as u32,
                [0, 0],
            );
        }
        /* the palette table depends on the predictor, which is path
         * dependent; palette winners are never cached */
        EncTestModeType::Palette | EncTestModeType::ReuseCached => return None,
    }
    Some(())
}

pub(crate) fn vvce_analyze_reuse<D: DeblockCost>(
    ctx: &mut VvceCtx,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    let tc = trial_ctx(ctx);
    let hit = ctx
        .core
        .mode_cache
        .get(&(tc.x, tc.y, tc.log2w, tc.log2h, qp))?
        .clone();

    let mut s = tc.start;
    s.sbac.bit_reset();
    cached_cu_bits(ctx, &tc, &mut s, &hit)?;
    vvce_rdo_bit_cnt_cbf(
        &mut s.sbac,
        &mut s.ctx,
        hit.outcome.cbf_luma,
        hit.outcome.cbf_cb,
        hit.outcome.cbf_cr,
    );

    let bits = s.sbac.get_bit_number() + hit.outcome.bits;
    let delta = dc.boundary_dist_delta(tc.x, tc.y, tc.log2w, tc.log2h);
    let dist = (hit.outcome.dist as i64 + delta).max(0) as u64;
    let cost = ctx.rd_cost(dist, bits);

    ctx.core.s_temp_run = s;
    let mut tr = TrialResult::new(hit.mode, cost, hit.outcome);
    tr.mrg_type = hit.mrg_type;
    tr.subpu_mv = hit.subpu_mv;
    tr.affine = hit.affine;
    tr.affine_mv = hit.affine_mv;
    tr.inter_bits = hit.inter_bits;
    tr.history_mi = hit.history_mi;
    Some(tr)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use pretty_assertions::assert_eq;

    struct CopyCoder {
        searches: u32,
        bv: [i16; 2],
        plt: Option<(u64, u32, u32)>,
    }

    impl PredCoder for CopyCoder {
        fn pred_satd(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            500
        }
        fn pred_sad(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            600
        }
        fn code_residual(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, m: &EncTestMode) -> ResiOutcome {
            let dist = match m.mode_type {
                EncTestModeType::Ibc => 200,
                EncTestModeType::IbcMerge => 250 + m.cand_idx as u64 * 10,
                _ => 400,
            };
            ResiOutcome {
                dist,
                bits: 30,
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
            self.searches += 1;
            Some((self.bv, 100))
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
            self.plt.map(|(dist, entries, reused)| {
                (
                    ResiOutcome {
                        dist,
                        bits: 20,
                        cbf_luma: true,
                        cbf_cb: false,
                        cbf_cr: false,
                    },
                    entries,
                    reused,
                    (0..entries as pel).collect(),
                )
            })
        }
        fn intra_candidates(&mut self, _x: u16, _y: u16, _w: u8, _h: u8) -> Vec<u8> {
            vec![0]
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
        sh.slice_type = SliceType::VVC_ST_I;
        let mut ctx = VvceCtx::new(sps, pps, sh, 64, 64, 0).unwrap();
        ctx.core.x = 16;
        ctx.core.y = 16;
        ctx.core.log2_cuw = 4;
        ctx.core.log2_cuh = 4;
        ctx
    }

    #[test]
    fn test_ibc_search_cached_across_revisits() {
        let mut ctx = test_ctx();
        let mut pc = CopyCoder {
            searches: 0,
            bv: [-16, 0],
            plt: None,
        };
        let mut dcb = NoDeblock;

        let a = vvce_analyze_ibc(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        let b = vvce_analyze_ibc(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(pc.searches, 1);
        assert_eq!(a.mode.mv[REFP_0], [-16, 0]);
        assert_eq!(a.mode.mv, b.mode.mv);
    }

    #[test]
    fn test_ibc_merge_none_without_neighbors() {
        let mut ctx = test_ctx();
        let mut pc = CopyCoder {
            searches: 0,
            bv: [-16, 0],
            plt: None,
        };
        let mut dcb = NoDeblock;
        assert!(vvce_analyze_ibc_merge(&mut ctx, &mut pc, &mut dcb, 32).is_none());
    }

    #[test]
    fn test_ibc_merge_uses_coded_neighbor_bv() {
        let mut ctx = test_ctx();
        /* left neighbor coded as IBC with bv (-8, -4); sampled at the
         * bottom of the left column */
        let scup = 7 * ctx.w_scu + 3;
        ctx.map_scu[scup].SET_IF_COD_QP(0, 32);
        ctx.map_scu[scup].SET_IBCF();
        ctx.map_mv[scup][REFP_0] = [-8, -4];
        ctx.map_refi[scup][REFP_0] = 0;

        let mut pc = CopyCoder {
            searches: 0,
            bv: [-16, 0],
            plt: None,
        };
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_ibc_merge(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(tr.mode.mv[REFP_0], [-8, -4]);
        assert_eq!(tr.mrg_type, MergeType::MRG_TYPE_IBC);
    }

    #[test]
    fn test_palette_none_when_trial_declines() {
        let mut ctx = test_ctx();
        let mut pc = CopyCoder {
            searches: 0,
            bv: [0, 0],
            plt: None,
        };
        assert!(vvce_analyze_palette(&mut ctx, &mut pc, 32).is_none());
    }

    #[test]
    fn test_palette_entry_reuse_split_is_rate_neutral() {
        let mut ctx = test_ctx();
        let mut fresh = CopyCoder {
            searches: 0,
            bv: [0, 0],
            plt: Some((300, 8, 0)),
        };
        let mut reused = CopyCoder {
            searches: 0,
            bv: [0, 0],
            plt: Some((300, 0, 8)),
        };

        let c_fresh = vvce_analyze_palette(&mut ctx, &mut fresh, 32).unwrap().cost;
        let mut ctx2 = test_ctx();
        let c_reused = vvce_analyze_palette(&mut ctx2, &mut reused, 32).unwrap().cost;
        /* entry and reuse counts are both unary coded, so equal counts
         * cost the same; the split between them is what the coder reports */
        assert_eq!(c_fresh, c_reused);
    }

    #[test]
    fn test_palette_trial_surfaces_table() {
        let mut ctx = test_ctx();
        let mut pc = CopyCoder {
            searches: 0,
            bv: [0, 0],
            plt: Some((300, 3, 0)),
        };
        let tr = vvce_analyze_palette(&mut ctx, &mut pc, 32).unwrap();
        assert_eq!(tr.plt_entries, vec![0, 1, 2]);
    }

    #[test]
    fn test_cached_winner_replayed_on_revisit() {
        let mut ctx = test_ctx();
        let mut dcb = NoDeblock;

        /* no entry for this block yet */
        assert!(vvce_analyze_reuse(&mut ctx, &mut dcb, 32).is_none());

        let mut mode = EncTestMode::new(EncTestModeType::Intra, 32);
        mode.intra_mode = 5;
        ctx.core.mode_cache.insert(
            (16, 16, 4, 4, 32),
            CachedCu {
                mode,
                outcome: ResiOutcome {
                    dist: 700,
                    bits: 25,
                    cbf_luma: true,
                    cbf_cb: false,
                    cbf_cr: false,
                },
                mrg_type: MergeType::MRG_TYPE_DEFAULT,
                subpu_mv: Vec::new(),
                affine: 0,
                affine_mv: [[[0; MV_D]; VER_NUM]; REFP_NUM],
                inter_bits: None,
                history_mi: None,
            },
        );

        let tr = vvce_analyze_reuse(&mut ctx, &mut dcb, 32).unwrap();
        assert_eq!(tr.mode.mode_type, EncTestModeType::Intra);
        assert_eq!(tr.mode.intra_mode, 5);
        assert_eq!(tr.outcome.dist, 700);
        assert!(tr.cost > 0.0);
    }
}
