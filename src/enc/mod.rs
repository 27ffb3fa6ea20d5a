use crate::api::*;
use crate::def::*;
use crate::mvp::*;
use crate::picman::*;

use std::collections::HashMap;

pub(crate) mod eco;
pub(crate) mod mode;
pub(crate) mod pibc;
pub(crate) mod pinter;
pub(crate) mod pintra;
pub(crate) mod sbac;

use eco::InterBits;
use sbac::*;

pub(crate) const MAX_COST: f64 = 1.7e308;

/* splits pay their overhead up front: a split is only re-evaluated at the
 * true cost when it survives this screen against the running best */
pub(crate) const SPLIT_COST_FUDGE: f64 = 1.047;

/* abandon threshold of a running split: a little more slack at high QP and
 * for the large blocks whose children redo the most work */
pub(crate) fn split_cost_fudge(qp: i8, log2_cuw: u8, log2_cuh: u8) -> f64 {
    let mut f = SPLIT_COST_FUDGE;
    if qp > 30 {
        f += 0.02;
    }
    if log2_cuw as usize + log2_cuh as usize >= 10 {
        f += 0.01;
    }
    f
}

/* lambda of the slice QP, the usual HEVC-style mapping */
pub(crate) fn lambda_from_qp(qp: i8) -> f64 {
    0.57 * 2.0f64.powf((qp as f64 - 12.0) / 3.0)
}

/*****************************************************************************
 * outcome of one mode trial
 *****************************************************************************/
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ResiOutcome {
    pub dist: u64,
    pub bits: u32,
    pub cbf_luma: bool,
    pub cbf_cb: bool,
    pub cbf_cr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncTestModeType {
    Skip,
    Merge,
    Mmvd,
    Ciip,
    Geo,
    Inter,
    AffineMerge,
    AffineInter,
    Intra,
    Ibc,
    IbcMerge,
    Palette,
    /* replay of the winner an earlier split path left for this block */
    ReuseCached,
}

/* one trial handed to the prediction coder. The motion fields carry the
 * already resolved candidate, so prediction never re-derives anything. */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncTestMode {
    pub mode_type: EncTestModeType,
    pub qp: i8,
    pub mv: [[i16; 2]; 2],
    pub refi: [i8; 2],
    pub bcw_idx: u8,
    pub imv: u8,
    /* merge / mmvd / geo-partition index, mode dependent */
    pub cand_idx: i32,
    pub intra_mode: u8,
    pub mts_idx: u8,
    pub lfnst_idx: u8,
    pub isp_mode: u8,
    /* skip trials code no residual */
    pub force_zero_resi: bool,
    /* 0 none, 1 four-parameter, 2 six-parameter */
    pub affine: u8,
    pub affine_mv: [[[i16; 2]; 3]; 2],
}

impl EncTestMode {
    pub fn new(mode_type: EncTestModeType, qp: i8) -> Self {
        EncTestMode {
            mode_type,
            qp,
            mv: [[0; 2]; 2],
            refi: [REFI_INVALID; 2],
            bcw_idx: BCW_DEFAULT,
            imv: 0,
            cand_idx: -1,
            intra_mode: 0,
            mts_idx: 0,
            lfnst_idx: 0,
            isp_mode: 0,
            force_zero_resi: false,
            affine: 0,
            affine_mv: [[[0; 2]; 3]; 2],
        }
    }

    pub fn is_inter(&self) -> bool {
        !matches!(
            self.mode_type,
            EncTestModeType::Intra
                | EncTestModeType::Ibc
                | EncTestModeType::IbcMerge
                | EncTestModeType::Palette
        )
    }
}

/*****************************************************************************
 * seams towards the prediction, transform and reconstruction machinery
 *****************************************************************************/
pub trait PredCoder {
    /* SATD between the source and the prediction of the trial */
    fn pred_satd(&mut self, x: u16, y: u16, log2w: u8, log2h: u8, mode: &EncTestMode) -> u64;

    /* SAD, the cheaper screen used before SATD ranking */
    fn pred_sad(&mut self, x: u16, y: u16, log2w: u8, log2h: u8, mode: &EncTestMode) -> u64;

    /* transform, quantize and reconstruct the residual of the trial,
     * returning distortion and residual bits */
    fn code_residual(
        &mut self,
        x: u16,
        y: u16,
        log2w: u8,
        log2h: u8,
        mode: &EncTestMode,
    ) -> ResiOutcome;

    /* refine one list around the predictor, returning mv and cost */
    fn motion_search(
        &mut self,
        x: u16,
        y: u16,
        log2w: u8,
        log2h: u8,
        lidx: usize,
        refi: i8,
        mvp: [i16; 2],
        imv: u8,
    ) -> ([i16; 2], u64);

    /* exact-match probe of the pre-built block hash table */
    fn hash_probe(&mut self, x: u16, y: u16, log2w: u8, log2h: u8) -> Option<([i16; 2], i8)>;

    /* block vector search inside the reconstructed area */
    fn ibc_search(&mut self, x: u16, y: u16, log2w: u8, log2h: u8) -> Option<([i16; 2], u64)>;

    /* palette clustering trial against the running predictor, None when the
     * block resists palettization. Returns the outcome, the signalled and
     * reused entry counts and the winning table for predictor maintenance. */
    fn palette_trial(
        &mut self,
        x: u16,
        y: u16,
        log2w: u8,
        log2h: u8,
        qp: i8,
        plt_pred: &[pel],
    ) -> Option<(ResiOutcome, u32, u32, Vec<pel>)>;

    /* luma intra candidates ordered by rough cost, best first */
    fn intra_candidates(&mut self, x: u16, y: u16, log2w: u8, log2h: u8) -> Vec<u8>;
}

/* in-loop filter aware refinement of the distortion at block boundaries */
pub trait DeblockCost {
    fn boundary_dist_delta(&mut self, x: u16, y: u16, log2w: u8, log2h: u8) -> i64;
}

/*****************************************************************************
 * mode scheduling
 *****************************************************************************/
pub trait ModeCtrl {
    fn init_cu_level(&mut self, x: u16, y: u16, log2w: u8, log2h: u8, sps: &VvcSps, is_intra_slice: bool);

    /* next mode family to try, None once the level is exhausted */
    fn next_test_mode(&mut self) -> Option<EncTestModeType>;

    /* informs the controller of an accepted trial; returns whether the
     * trial actually improved (strictly lower cost) */
    fn accept_if_better(
        &mut self,
        mode_type: EncTestModeType,
        cost: f64,
        is_skip_no_resi: bool,
        bcw_idx: u8,
    ) -> bool;

    fn finish_cu_level(&mut self);

    /* hints distilled from blocks of the same area already resolved in
     * this CTU; controllers without cross-node memory return None */
    fn bcw_hint(&self, _area: u32) -> Option<u8> {
        None
    }
    fn inter_cost_hint(&self, _area: u32) -> Option<f64> {
        None
    }

    /* cross-node memory is only valid within one CTU */
    fn reset_ctu(&mut self) {}
}

/* fixed-order scheduler with the customary early-outs and a small
 * per-CTU memory of what same-sized blocks settled on */
pub struct RasterModeCtrl {
    order: Vec<EncTestModeType>,
    next: usize,
    best_cost: f64,
    skip_won_clean: bool,

    /* winner of the level being analyzed, folded into the caches on finish */
    area: u32,
    won: Option<(EncTestModeType, f64, u8, bool)>,

    /* cross-node caches, reset per CTU */
    best_inter_cost: HashMap<u32, f64>,
    best_bcw: HashMap<u32, u8>,
    cu_count: u32,
    skip_count: u32,
}

impl Default for RasterModeCtrl {
    fn default() -> Self {
        RasterModeCtrl {
            order: Vec::new(),
            next: 0,
            best_cost: MAX_COST,
            skip_won_clean: false,
            area: 0,
            won: None,
            best_inter_cost: HashMap::new(),
            best_bcw: HashMap::new(),
            cu_count: 0,
            skip_count: 0,
        }
    }
}

impl ModeCtrl for RasterModeCtrl {
    fn init_cu_level(
        &mut self,
        _x: u16,
        _y: u16,
        log2w: u8,
        log2h: u8,
        sps: &VvcSps,
        is_intra_slice: bool,
    ) {
        self.order.clear();
        self.next = 0;
        self.best_cost = MAX_COST;
        self.skip_won_clean = false;
        self.area = 1u32 << (log2w as u32 + log2h as u32);
        self.won = None;

        /* once skip dominates the CTU, the satellite inter families stop
         * earning their keep */
        let skip_likely = self.cu_count >= 4 && self.skip_count * 2 > self.cu_count;

        use EncTestModeType::*;
        self.order.push(ReuseCached);
        if !is_intra_slice {
            self.order.push(Skip);
            self.order.push(Merge);
            if sps.tool_mmvd && !skip_likely {
                self.order.push(Mmvd);
            }
            self.order.push(Inter);
            if sps.tool_affine && log2w >= 3 && log2h >= 3 && !skip_likely {
                self.order.push(AffineMerge);
                self.order.push(AffineInter);
            }
            if sps.tool_geo
                && !skip_likely
                && log2w >= GEO_MIN_CU_LOG2 as u8
                && log2h >= GEO_MIN_CU_LOG2 as u8
                && log2w <= GEO_MAX_CU_LOG2 as u8
                && log2h <= GEO_MAX_CU_LOG2 as u8
                && (log2w as i16 - log2h as i16).abs() < 3
            {
                self.order.push(Geo);
            }
        }
        self.order.push(Intra);
        if sps.tool_ibc && log2w <= IBC_MAX_CU_LOG2 as u8 && log2h <= IBC_MAX_CU_LOG2 as u8 {
            self.order.push(IbcMerge);
            self.order.push(Ibc);
        }
        if sps.tool_plt && log2w <= PLT_MAX_CU_LOG2 as u8 && log2h <= PLT_MAX_CU_LOG2 as u8 {
            self.order.push(Palette);
        }
    }

    fn next_test_mode(&mut self) -> Option<EncTestModeType> {
        while self.next < self.order.len() {
            let m = self.order[self.next];
            self.next += 1;

            /* a clean skip win makes the remaining intra trials pointless */
            if self.skip_won_clean && m == EncTestModeType::Intra {
                continue;
            }
            return Some(m);
        }
        None
    }

    fn accept_if_better(
        &mut self,
        mode_type: EncTestModeType,
        cost: f64,
        is_skip_no_resi: bool,
        bcw_idx: u8,
    ) -> bool {
        if cost < self.best_cost {
            self.best_cost = cost;
            if mode_type == EncTestModeType::Skip && is_skip_no_resi {
                self.skip_won_clean = true;
            }
            self.won = Some((mode_type, cost, bcw_idx, is_skip_no_resi));
            true
        } else {
            false
        }
    }

    fn finish_cu_level(&mut self) {
        use EncTestModeType::*;
        if let Some((mode, cost, bcw, clean_skip)) = self.won.take() {
            self.cu_count += 1;
            if clean_skip {
                self.skip_count += 1;
            }
            if !matches!(mode, Intra | Ibc | IbcMerge | Palette) {
                let e = self.best_inter_cost.entry(self.area).or_insert(MAX_COST);
                if cost < *e {
                    *e = cost;
                }
                self.best_bcw.insert(self.area, bcw);
            }
        }
    }

    fn bcw_hint(&self, area: u32) -> Option<u8> {
        self.best_bcw.get(&area).copied()
    }

    fn inter_cost_hint(&self, area: u32) -> Option<f64> {
        self.best_inter_cost.get(&area).copied()
    }

    fn reset_ctu(&mut self) {
        self.best_inter_cost.clear();
        self.best_bcw.clear();
        self.cu_count = 0;
        self.skip_count = 0;
    }
}

/*****************************************************************************
 * pooled per-node mode decision state
 *
 * One CuData spans every 4x4 of its node; children are folded into the
 * parent on split resolution, and the winning tree is flushed to the
 * picture maps only once per CTU.
 *****************************************************************************/
#[derive(Default, Clone)]
pub(crate) struct CuData {
    pub(crate) log2_cuw: u8,
    pub(crate) log2_cuh: u8,

    pub(crate) pred_mode: Vec<PredMode>,
    pub(crate) skip_flag: Vec<bool>,
    pub(crate) mrg_type: Vec<MergeType>,
    pub(crate) qp: Vec<i8>,
    pub(crate) ipm: Vec<u8>,
    pub(crate) mv: Vec<[[i16; MV_D]; REFP_NUM]>,
    pub(crate) refi: Vec<[i8; REFP_NUM]>,
    pub(crate) bcw_idx: Vec<u8>,
    pub(crate) affine: Vec<u8>,
    pub(crate) affine_mv: Vec<[[[i16; MV_D]; VER_NUM]; REFP_NUM]>,
    pub(crate) cu_geo: Vec<u32>,
    pub(crate) map_scu: Vec<MCU>,

    pub(crate) cost: f64,
    pub(crate) dist: u64,
    pub(crate) bits: u32,
}

impl CuData {
    pub(crate) fn new(log2_cuw: u8, log2_cuh: u8) -> Self {
        let cnt = 1usize << (log2_cuw as usize + log2_cuh as usize - 4);
        CuData {
            log2_cuw,
            log2_cuh,
            pred_mode: vec![PredMode::MODE_INTRA; cnt],
            skip_flag: vec![false; cnt],
            mrg_type: vec![MergeType::MRG_TYPE_DEFAULT; cnt],
            qp: vec![0; cnt],
            ipm: vec![0; cnt],
            mv: vec![[[0; MV_D]; REFP_NUM]; cnt],
            refi: vec![[REFI_INVALID; REFP_NUM]; cnt],
            bcw_idx: vec![BCW_DEFAULT; cnt],
            affine: vec![0; cnt],
            affine_mv: vec![[[[0; MV_D]; VER_NUM]; REFP_NUM]; cnt],
            cu_geo: vec![0; cnt],
            map_scu: vec![MCU::default(); cnt],
            cost: MAX_COST,
            dist: 0,
            bits: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.cost = MAX_COST;
        self.dist = 0;
        self.bits = 0;
    }

    /* fold a child node into this one at (dx, dy) scu offset */
    pub(crate) fn copy_from(&mut self, src: &CuData, dx: usize, dy: usize) {
        let sw = 1usize << (src.log2_cuw as usize - MIN_CU_LOG2);
        let sh = 1usize << (src.log2_cuh as usize - MIN_CU_LOG2);
        let dwidth = 1usize << (self.log2_cuw as usize - MIN_CU_LOG2);

        for y in 0..sh {
            let d = (dy + y) * dwidth + dx;
            let s = y * sw;
            self.pred_mode[d..d + sw].copy_from_slice(&src.pred_mode[s..s + sw]);
            self.skip_flag[d..d + sw].copy_from_slice(&src.skip_flag[s..s + sw]);
            self.mrg_type[d..d + sw].copy_from_slice(&src.mrg_type[s..s + sw]);
            self.qp[d..d + sw].copy_from_slice(&src.qp[s..s + sw]);
            self.ipm[d..d + sw].copy_from_slice(&src.ipm[s..s + sw]);
            self.mv[d..d + sw].copy_from_slice(&src.mv[s..s + sw]);
            self.refi[d..d + sw].copy_from_slice(&src.refi[s..s + sw]);
            self.bcw_idx[d..d + sw].copy_from_slice(&src.bcw_idx[s..s + sw]);
            self.affine[d..d + sw].copy_from_slice(&src.affine[s..s + sw]);
            self.affine_mv[d..d + sw].copy_from_slice(&src.affine_mv[s..s + sw]);
            self.cu_geo[d..d + sw].copy_from_slice(&src.cu_geo[s..s + sw]);
            self.map_scu[d..d + sw].copy_from_slice(&src.map_scu[s..s + sw]);
        }
    }
}

/* paired arithmetic coder state and context models, checkpointed as one */
#[derive(Default, Clone, Copy)]
pub(crate) struct SbacState {
    pub(crate) sbac: RdoSbac,
    pub(crate) ctx: SbacCtx,
}

/* leaf winner remembered for replay when another split path revisits the
 * same block. Syntax bits are recounted on the live entropy state at
 * replay time; the residual outcome is carried over. */
#[derive(Clone)]
pub(crate) struct CachedCu {
    pub(crate) mode: EncTestMode,
    pub(crate) outcome: ResiOutcome,
    pub(crate) mrg_type: MergeType,
    pub(crate) subpu_mv: Vec<[MvField; REFP_NUM]>,
    pub(crate) affine: u8,
    pub(crate) affine_mv: [[[i16; MV_D]; VER_NUM]; REFP_NUM],
    pub(crate) inter_bits: Option<InterBits>,
    pub(crate) history_mi: Option<MotionInfo>,
}

/*****************************************************************************
 * per-CTU working state of the tree search
 *****************************************************************************/
pub(crate) struct VvceCore {
    /* best and scratch region per size class */
    pub(crate) cu_data_best: Vec<Vec<CuData>>,
    pub(crate) cu_data_temp: Vec<Vec<CuData>>,

    /* entropy state at the start of each size class, and the accepted one */
    pub(crate) s_curr_best: Vec<Vec<SbacState>>,
    pub(crate) s_next_best: Vec<Vec<SbacState>>,
    pub(crate) s_temp_run: SbacState,
    pub(crate) s_temp_best: SbacState,
    /* entropy state carried from the previous CTU */
    pub(crate) s_ctu: SbacState,

    /* current node while a leaf is being analyzed */
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) log2_cuw: u8,
    pub(crate) log2_cuh: u8,
    pub(crate) avail_cu: u16,
    pub(crate) qp: i8,
    pub(crate) qp_prev_eco: i8,
    pub(crate) dqp_curr_best: Vec<Vec<i8>>,
    pub(crate) dqp_next_best: Vec<Vec<i8>>,

    pub(crate) cost_best: f64,

    /* motion history snapshots threaded through the search order */
    pub(crate) history: Vec<MotionInfo>,
    /* palette predictor threaded the same way */
    pub(crate) plt_pred: Vec<pel>,

    /* IBC results are identical on re-visits through other split paths */
    pub(crate) ibc_cache: HashMap<(u16, u16, u8, u8), ([i16; MV_D], u64)>,

    /* leaf winners of this CTU, replayable when a split path revisits */
    pub(crate) mode_cache: HashMap<(u16, u16, u8, u8, i8), CachedCu>,

    /* scheduling hints of the current leaf, set before dispatch */
    pub(crate) bcw_idx_hint: Option<u8>,
    pub(crate) inter_cost_hint: Option<f64>,
}

impl VvceCore {
    pub(crate) fn new() -> Self {
        let mut cu_data_best = Vec::with_capacity(NUM_CU_LOG2);
        let mut cu_data_temp = Vec::with_capacity(NUM_CU_LOG2);
        for lw in 0..NUM_CU_LOG2 {
            let mut row_b = Vec::with_capacity(NUM_CU_LOG2);
            let mut row_t = Vec::with_capacity(NUM_CU_LOG2);
            for lh in 0..NUM_CU_LOG2 {
                row_b.push(CuData::new((lw + 2) as u8, (lh + 2) as u8));
                row_t.push(CuData::new((lw + 2) as u8, (lh + 2) as u8));
            }
            cu_data_best.push(row_b);
            cu_data_temp.push(row_t);
        }

        VvceCore {
            cu_data_best,
            cu_data_temp,
            s_curr_best: vec![vec![SbacState::default(); NUM_CU_LOG2]; NUM_CU_LOG2],
            s_next_best: vec![vec![SbacState::default(); NUM_CU_LOG2]; NUM_CU_LOG2],
            s_temp_run: SbacState::default(),
            s_temp_best: SbacState::default(),
            s_ctu: SbacState::default(),
            x: 0,
            y: 0,
            log2_cuw: 0,
            log2_cuh: 0,
            avail_cu: 0,
            qp: 0,
            qp_prev_eco: 0,
            dqp_curr_best: vec![vec![0; NUM_CU_LOG2]; NUM_CU_LOG2],
            dqp_next_best: vec![vec![0; NUM_CU_LOG2]; NUM_CU_LOG2],
            cost_best: MAX_COST,
            history: Vec::new(),
            plt_pred: Vec::new(),
            ibc_cache: HashMap::new(),
            mode_cache: HashMap::new(),
            bcw_idx_hint: None,
            inter_cost_hint: None,
        }
    }

    /* push one block of motion into the bounded history, newest first,
     * dropping an identical older entry */
    pub(crate) fn history_push(&mut self, mi: MotionInfo) {
        if let Some(pos) = self.history.iter().position(|h| h.same_motion(&mi)) {
            self.history.remove(pos);
        }
        if self.history.len() == MAX_NUM_HMVP_CANDS {
            self.history.remove(0);
        }
        self.history.push(mi);
    }

    /* fold a winning palette into the predictor: new entries first, then
     * the surviving previous ones, capped at the signalling limit */
    pub(crate) fn plt_pred_update(&mut self, entries: &[pel]) {
        let mut next: Vec<pel> = entries.to_vec();
        next.truncate(PLT_PRED_SIZE);
        for &e in &self.plt_pred {
            if next.len() == PLT_PRED_SIZE {
                break;
            }
            if !next.contains(&e) {
                next.push(e);
            }
        }
        self.plt_pred = next;
    }
}

/*****************************************************************************
 * encoder-side mode decision context
 *****************************************************************************/
pub struct VvceCtx {
    pub(crate) sps: VvcSps,
    pub(crate) pps: VvcPps,
    pub(crate) sh: VvcSh,

    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) w_scu: usize,
    pub(crate) h_scu: usize,
    pub(crate) poc: i32,
    pub(crate) lambda: f64,

    pub(crate) map_scu: Vec<MCU>,
    pub(crate) map_mv: Vec<[[i16; MV_D]; REFP_NUM]>,
    pub(crate) map_refi: Vec<[i8; REFP_NUM]>,
    pub(crate) map_bcw: Vec<u8>,
    pub(crate) map_affine: Vec<u8>,
    pub(crate) map_cu_geo: Vec<u32>,
    pub(crate) map_affine_mv: Vec<[[[i16; MV_D]; VER_NUM]; REFP_NUM]>,
    pub(crate) map_ipm: Vec<u8>,

    pub(crate) refp: [Vec<VvcRefP>; REFP_NUM],

    pub(crate) core: VvceCore,
}

impl VvceCtx {
    pub fn new(sps: VvcSps, pps: VvcPps, sh: VvcSh, width: u16, height: u16, poc: i32) -> Result<Self, VvcError> {
        vvc_assert_rv(width > 0 && height > 0, VvcError::InvalidArgument)?;
        vvc_assert_rv(
            sh.max_num_merge_cand > 0 && sh.max_num_merge_cand <= MRG_MAX_NUM_CANDS,
            VvcError::InvalidArgument,
        )?;

        let w_scu = ((width as usize) + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        let h_scu = ((height as usize) + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        let f_scu = w_scu * h_scu;
        let lambda = lambda_from_qp(sh.qp);

        Ok(VvceCtx {
            sps,
            pps,
            sh,
            w: width,
            h: height,
            w_scu,
            h_scu,
            poc,
            lambda,
            map_scu: vec![MCU::default(); f_scu],
            map_mv: vec![[[0; MV_D]; REFP_NUM]; f_scu],
            map_refi: vec![[REFI_INVALID; REFP_NUM]; f_scu],
            map_bcw: vec![BCW_DEFAULT; f_scu],
            map_affine: vec![0; f_scu],
            map_cu_geo: vec![0; f_scu],
            map_affine_mv: vec![[[[0; MV_D]; VER_NUM]; REFP_NUM]; f_scu],
            map_ipm: vec![0; f_scu],
            refp: [Vec::new(), Vec::new()],
            core: VvceCore::new(),
        })
    }

    pub fn set_refp(&mut self, refp: [Vec<VvcRefP>; REFP_NUM]) {
        self.refp = refp;
    }

    pub(crate) fn rd_cost(&self, dist: u64, bits: u32) -> f64 {
        dist as f64 + self.lambda * bits as f64
    }

    pub(crate) fn mvp_ctx(&self, x: u16, y: u16, log2w: u8, log2h: u8) -> MvpCtx<'_> {
        MvpCtx {
            slice_type: self.sh.slice_type,
            poc: self.poc,
            x: x as i32,
            y: y as i32,
            cuw: 1i32 << log2w,
            cuh: 1i32 << log2h,
            pic_w: self.w as i32,
            pic_h: self.h as i32,
            w_scu: self.w_scu,
            log2_ctu_size: self.sps.log2_ctu_size,
            max_num_merge_cand: self.sh.max_num_merge_cand,
            log2_parallel_merge_level: self.sps.log2_parallel_merge_level,
            num_ref_idx: self.sh.num_ref_idx,
            col_from_l0: self.sh.col_from_l0,
            col_ref_idx: self.sh.col_ref_idx,
            check_ldc: self.sh.check_ldc,
            tool_tmvp: self.sps.tool_tmvp,
            tool_sbtmvp: self.sps.tool_sbtmvp,
            map_scu: &self.map_scu,
            map_mv: &self.map_mv,
            map_refi: &self.map_refi,
            map_bcw: &self.map_bcw,
            map_affine: &self.map_affine,
            map_cu_geo: &self.map_cu_geo,
            map_affine_mv: &self.map_affine_mv,
            refp: &self.refp,
        }
    }
}

/* winner bookkeeping: strictly-lower cost replaces the running best, which
 * also swaps the accepted entropy state forward */
pub(crate) fn check_best_mode(
    core: &mut VvceCore,
    cost: f64,
) -> bool {
    if cost < core.cost_best {
        core.cost_best = cost;
        core.s_temp_best = core.s_temp_run;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cu_data_fold() {
        let mut parent = CuData::new(4, 4);
        let mut child = CuData::new(3, 3);
        for i in 0..child.qp.len() {
            child.qp[i] = 7;
            child.refi[i] = [1, REFI_INVALID];
        }
        parent.copy_from(&child, 2, 2);

        /* top-left quadrant untouched, bottom-right quadrant filled */
        assert_eq!(parent.qp[0], 0);
        assert_eq!(parent.qp[2 * 4 + 2], 7);
        assert_eq!(parent.refi[3 * 4 + 3], [1, REFI_INVALID]);
    }

    #[test]
    fn test_history_bounded_and_deduped() {
        let mut core = VvceCore::new();
        for i in 0..8 {
            let mut mi = MotionInfo::default();
            mi.mv[REFP_0] = [i as i16, 0];
            mi.refi[REFP_0] = 0;
            mi.inter_dir = PRED_L0;
            core.history_push(mi);
        }
        assert_eq!(core.history.len(), MAX_NUM_HMVP_CANDS);
        /* re-pushing an existing entry moves it to the newest slot without
         * growing the list */
        let dup = core.history[0];
        core.history_push(dup);
        assert_eq!(core.history.len(), MAX_NUM_HMVP_CANDS);
        assert!(core.history[MAX_NUM_HMVP_CANDS - 1].same_motion(&dup));
    }

    #[test]
    fn test_raster_ctrl_respects_tools() {
        let mut sps = VvcSps::default();
        sps.tool_geo = false;
        sps.tool_affine = false;
        let mut mc = RasterModeCtrl::default();
        mc.init_cu_level(0, 0, 4, 4, &sps, false);

        let mut seen = Vec::new();
        while let Some(m) = mc.next_test_mode() {
            seen.push(m);
        }
        /* cached replay always goes first, it is free on a miss */
        assert_eq!(seen[0], EncTestModeType::ReuseCached);
        assert!(seen.contains(&EncTestModeType::Skip));
        assert!(seen.contains(&EncTestModeType::Intra));
        assert!(!seen.contains(&EncTestModeType::Geo));
        assert!(!seen.contains(&EncTestModeType::AffineInter));
    }

    #[test]
    fn test_raster_ctrl_clean_skip_prunes_intra() {
        let sps = VvcSps::default();
        let mut mc = RasterModeCtrl::default();
        mc.init_cu_level(0, 0, 4, 4, &sps, false);

        assert_eq!(mc.next_test_mode(), Some(EncTestModeType::ReuseCached));
        assert_eq!(mc.next_test_mode(), Some(EncTestModeType::Skip));
        assert!(mc.accept_if_better(EncTestModeType::Skip, 100.0, true, BCW_DEFAULT));
        let rest: Vec<_> = std::iter::from_fn(|| mc.next_test_mode()).collect();
        assert!(!rest.contains(&EncTestModeType::Intra));
    }

    #[test]
    fn test_raster_ctrl_remembers_same_size_winner() {
        let sps = VvcSps::default();
        let mut mc = RasterModeCtrl::default();
        mc.init_cu_level(0, 0, 4, 4, &sps, false);
        assert!(mc.accept_if_better(EncTestModeType::Inter, 80.0, false, 3));
        mc.finish_cu_level();

        let area = 1u32 << 8;
        assert_eq!(mc.bcw_hint(area), Some(3));
        assert_eq!(mc.inter_cost_hint(area), Some(80.0));
        assert_eq!(mc.bcw_hint(1 << 10), None);

        /* a new CTU forgets everything */
        mc.reset_ctu();
        assert_eq!(mc.bcw_hint(area), None);
        assert_eq!(mc.inter_cost_hint(area), None);
    }

    #[test]
    fn test_raster_ctrl_skip_streak_drops_satellites() {
        let sps = VvcSps::default();
        let mut mc = RasterModeCtrl::default();
        for _ in 0..4 {
            mc.init_cu_level(0, 0, 4, 4, &sps, false);
            assert!(mc.accept_if_better(EncTestModeType::Skip, 10.0, true, BCW_DEFAULT));
            mc.finish_cu_level();
        }

        mc.init_cu_level(0, 0, 4, 4, &sps, false);
        let seen: Vec<_> = std::iter::from_fn(|| mc.next_test_mode()).collect();
        assert!(seen.contains(&EncTestModeType::Skip));
        assert!(seen.contains(&EncTestModeType::Inter));
        assert!(!seen.contains(&EncTestModeType::Geo));
        assert!(!seen.contains(&EncTestModeType::Mmvd));
        assert!(!seen.contains(&EncTestModeType::AffineInter));
    }

    #[test]
    fn test_split_fudge_grows_with_qp_and_size() {
        assert_eq!(split_cost_fudge(20, 3, 3), SPLIT_COST_FUDGE);
        assert!(split_cost_fudge(35, 3, 3) > split_cost_fudge(20, 3, 3));
        assert!(split_cost_fudge(35, 6, 6) > split_cost_fudge(35, 3, 3));
    }

    #[test]
    fn test_plt_pred_update_dedups_and_caps() {
        let mut core = VvceCore::new();
        core.plt_pred = vec![5, 6, 7];
        core.plt_pred_update(&[6, 9]);
        assert_eq!(core.plt_pred, vec![6, 9, 5, 7]);

        let wide: Vec<pel> = (0..40).collect();
        core.plt_pred_update(&wide);
        assert_eq!(core.plt_pred.len(), PLT_PRED_SIZE);
        assert_eq!(core.plt_pred[0], 0);
    }

    #[test]
    fn test_check_best_mode_strict() {
        let mut core = VvceCore::new();
        core.cost_best = 10.0;
        assert!(!check_best_mode(&mut core, 10.0));
        assert!(check_best_mode(&mut core, 9.9));
        assert_eq!(core.cost_best, 9.9);
    }

    #[test]
    fn test_ctx_new_validates() {
        let sps = VvcSps::default();
        let pps = VvcPps::default();
        let mut sh = VvcSh::default();
        sh.max_num_merge_cand = 0;
        assert_eq!(
            VvceCtx::new(sps, pps, sh, 64, 64, 0).err(),
            Some(VvcError::InvalidArgument)
        );
    }
}
