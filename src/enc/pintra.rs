use super::eco::*;
use super::mode::TrialResult;
use super::*;
use crate::def::*;

/*****************************************************************************
 * intra mode evaluator
 *
 * Candidate directions come pre-ranked from the prediction seam; the top
 * few get a full residual pass, each over its transform variants.
 *****************************************************************************/

/* a transform variant must land within this ratio of the plain DCT cost
 * to justify trying further variants of the same direction */
const TRANSFORM_SKIP_RATIO: f64 = 1.1;

/* most probable modes of the block, from the coded left/above directions */
pub(crate) fn vvce_get_mpm(ctx: &VvceCtx, x: u16, y: u16) -> [u8; 3] {
    let x_scu = PEL2SCU(x as usize);
    let y_scu = PEL2SCU(y as usize);
    let scup = y_scu * ctx.w_scu + x_scu;

    let avail = ctx.core.avail_cu;

    let ipm_l = if x_scu > 0 && IS_AVAIL(avail, AVAIL_LE) && ctx.map_scu[scup - 1].GET_IF() != 0 {
        ctx.map_ipm[scup - 1]
    } else {
        IPD_PLANAR as u8
    };
    let ipm_a = if y_scu > 0
        && IS_AVAIL(avail, AVAIL_UP)
        && ctx.map_scu[scup - ctx.w_scu].GET_IF() != 0
    {
        ctx.map_ipm[scup - ctx.w_scu]
    } else {
        IPD_PLANAR as u8
    };

    if ipm_l == ipm_a {
        if ipm_l <= IPD_DC as u8 {
            [IPD_PLANAR as u8, IPD_DC as u8, 50]
        } else {
            /* the angular mode and its two neighbors */
            let m = ipm_l;
            [m, 2 + (m as u32 + 61) as u8 % 64, 2 + (m as u32 - 1) as u8 % 64]
        }
    } else {
        let third = if ipm_l != IPD_PLANAR as u8 && ipm_a != IPD_PLANAR as u8 {
            IPD_PLANAR as u8
        } else if ipm_l != IPD_DC as u8 && ipm_a != IPD_DC as u8 {
            IPD_DC as u8
        } else {
            50
        };
        [ipm_l, ipm_a, third]
    }
}

pub(crate) fn vvce_analyze_intra<P: PredCoder, D: DeblockCost>(
    ctx: &mut VvceCtx,
    pc: &mut P,
    dc: &mut D,
    qp: i8,
) -> Option<TrialResult> {
    let x = ctx.core.x;
    let y = ctx.core.y;
    let log2w = ctx.core.log2_cuw;
    let log2h = ctx.core.log2_cuh;
    let wi = (log2w - 2) as usize;
    let hi = (log2h - 2) as usize;
    let start = ctx.core.s_curr_best[wi][hi];
    let is_inter_slice = !ctx.sh.slice_type.is_intra();

    let mpm = vvce_get_mpm(ctx, x, y);
    let cands = pc.intra_candidates(x, y, log2w, log2h);
    if cands.is_empty() {
        return None;
    }

    let mut best: Option<TrialResult> = None;
    let mut best_state = start;

    for &ipm in cands.iter().take(IPD_RDO_CNT) {
        let mut dct_cost = MAX_COST;

        /* transform variants of this direction: plain DCT first, then MTS,
         * LFNST and ISP while they stay competitive */
        for variant in intra_transform_variants(ctx, log2w, log2h) {
            if variant != (0, 0, 0) && dct_cost >= MAX_COST {
                break;
            }

            let mut mode = EncTestMode::new(EncTestModeType::Intra, qp);
            mode.intra_mode = ipm;
            mode.mts_idx = variant.0;
            mode.lfnst_idx = variant.1;
            mode.isp_mode = variant.2;

            let mut s = start;
            s.sbac.bit_reset();
            vvce_rdo_bit_cnt_cu_intra(
                &mut s.sbac,
                &mut s.ctx,
                is_inter_slice,
                ipm,
                &mpm,
                mode.isp_mode,
                ctx.sps.tool_isp,
            );

            vvce_rdo_bit_cnt_transform_idx(
                &mut s.sbac,
                &mut s.ctx,
                mode.mts_idx,
                mode.lfnst_idx,
                ctx.sps.tool_mts,
                ctx.sps.tool_lfnst,
            );

            let outcome = pc.code_residual(x, y, log2w, log2h, &mode);
            vvce_rdo_bit_cnt_cbf(
                &mut s.sbac,
                &mut s.ctx,
                outcome.cbf_luma,
                outcome.cbf_cb,
                outcome.cbf_cr,
            );

            let bits = s.sbac.get_bit_number() + outcome.bits;
            let delta = dc.boundary_dist_delta(x, y, log2w, log2h);
            let dist = (outcome.dist as i64 + delta).max(0) as u64;
            let cost = ctx.rd_cost(dist, bits);

            if variant == (0, 0, 0) {
                dct_cost = cost;
            } else if cost > dct_cost * TRANSFORM_SKIP_RATIO {
                /* this direction resists the fancier transforms */
                break;
            }

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(TrialResult::new(mode, cost, outcome));
                best_state = s;
            }
        }
    }

    if best.is_some() {
        ctx.core.s_temp_run = best_state;
    }
    best
}

/* (mts, lfnst, isp) triples to try, the baseline first */
fn intra_transform_variants(ctx: &VvceCtx, log2w: u8, log2h: u8) -> Vec<(u8, u8, u8)> {
    let mut v = vec![(0u8, 0u8, 0u8)];

    if ctx.sps.tool_mts && log2w <= 5 && log2h <= 5 {
        for mts in 1..=MTS_MAX_IDX as u8 {
            v.push((mts, 0, 0));
        }
    }
    if ctx.sps.tool_lfnst && log2w >= 2 && log2h >= 2 {
        for lfnst in 1..=LFNST_MAX_IDX as u8 {
            v.push((0, lfnst, 0));
        }
    }
    if ctx.sps.tool_isp && log2w + log2h > 4 {
        /* 1: horizontal sub-partitions, 2: vertical */
        v.push((0, 0, 1));
        v.push((0, 0, 2));
    }
    v
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use pretty_assertions::assert_eq;

    struct FlatCoder {
        /* cost dips for this direction */
        good_ipm: u8,
    }

    impl PredCoder for FlatCoder {
        fn pred_satd(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            1000
        }
        fn pred_sad(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, _m: &EncTestMode) -> u64 {
            1100
        }
        fn code_residual(&mut self, _x: u16, _y: u16, _w: u8, _h: u8, m: &EncTestMode) -> ResiOutcome {
            let dist = if m.intra_mode == self.good_ipm { 300 } else { 900 };
            ResiOutcome {
                dist,
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
            vec![self.good_ipm, IPD_PLANAR as u8, IPD_DC as u8, 30, 40]
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
    fn test_intra_picks_cheapest_direction() {
        let mut ctx = test_ctx();
        let mut pc = FlatCoder { good_ipm: 30 };
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_intra(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        assert_eq!(tr.mode.intra_mode, 30);
        assert_eq!(tr.mode.mode_type, EncTestModeType::Intra);
    }

    #[test]
    fn test_intra_rdo_count_bound() {
        /* only the top ranked directions are residual-coded: a winner
         * outside the RDO window cannot be found */
        let mut ctx = test_ctx();
        let mut pc = FlatCoder { good_ipm: 40 };
        let mut dcb = NoDeblock;

        let tr = vvce_analyze_intra(&mut ctx, &mut pc, &mut dcb, 32).unwrap();
        /* good_ipm sits at position 4 of the candidate list, past the
         * window, so a fallback direction wins */
        assert_ne!(tr.mode.intra_mode, 40);
    }

    #[test]
    fn test_mpm_from_uncoded_neighbors() {
        let ctx = test_ctx();
        let mpm = vvce_get_mpm(&ctx, 16, 16);
        assert_eq!(mpm[0], IPD_PLANAR as u8);
        assert_eq!(mpm[1], IPD_DC as u8);
    }

    #[test]
    fn test_transform_variants_gated_by_tools() {
        let mut ctx = test_ctx();
        ctx.sps.tool_mts = false;
        ctx.sps.tool_lfnst = false;
        ctx.sps.tool_isp = false;
        assert_eq!(intra_transform_variants(&ctx, 4, 4), vec![(0, 0, 0)]);
    }
}
