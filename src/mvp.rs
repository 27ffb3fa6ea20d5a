use super::api::*;
use super::def::*;
use super::picman::*;
use super::tbl::*;

/*****************************************************************************
 * motion candidate derivation
 *
 * Everything here is normative: the search may reorder or skip trials, but
 * the lists built below are position-exact so that the decoder derives the
 * same candidates from the same maps.
 *****************************************************************************/

/* motion compression granularity of the collocated motion field */
const COL_MV_MASK: i32 = !15;
/* sub-block size of the sub-block temporal candidate */
const SUBPU_LOG2: usize = 3;
/* corner extrapolation precision of the affine model */
const AFFINE_SHIFT: u8 = 7;

/*****************************************************************************
 * merge candidate list
 *****************************************************************************/
#[derive(Clone)]
pub(crate) struct MergeCtx {
    pub(crate) mv_field: [[MvField; REFP_NUM]; MRG_MAX_NUM_CANDS],
    pub(crate) inter_dir: [u8; MRG_MAX_NUM_CANDS],
    pub(crate) mrg_type: [MergeType; MRG_MAX_NUM_CANDS],
    pub(crate) bcw_idx: [u8; MRG_MAX_NUM_CANDS],
    pub(crate) num_valid: usize,
    pub(crate) max_num: usize,
    /* per-8x8 motion of the sub-block temporal candidate, raster order */
    pub(crate) subpu_mv: Vec<[MvField; REFP_NUM]>,
    /* position of the sub-block temporal candidate in the list */
    pub(crate) subpu_pos: Option<usize>,
}

impl Default for MergeCtx {
    fn default() -> Self {
        MergeCtx {
            mv_field: [[MvField::invalid(); REFP_NUM]; MRG_MAX_NUM_CANDS],
            inter_dir: [0; MRG_MAX_NUM_CANDS],
            mrg_type: [MergeType::MRG_TYPE_DEFAULT; MRG_MAX_NUM_CANDS],
            bcw_idx: [BCW_DEFAULT; MRG_MAX_NUM_CANDS],
            num_valid: 0,
            max_num: MRG_MAX_NUM_CANDS,
            subpu_mv: Vec::new(),
            subpu_pos: None,
        }
    }
}

impl MergeCtx {
    /* candidate as one MotionInfo, for redundancy checks and history */
    pub(crate) fn motion_info(&self, idx: usize) -> MotionInfo {
        MotionInfo {
            mv: [self.mv_field[idx][REFP_0].mv, self.mv_field[idx][REFP_1].mv],
            refi: [self.mv_field[idx][REFP_0].refi, self.mv_field[idx][REFP_1].refi],
            inter_dir: self.inter_dir[idx],
            bcw_idx: self.bcw_idx[idx],
        }
    }
}

/*****************************************************************************
 * AMVP candidate list
 *****************************************************************************/
#[derive(Default, Clone, Copy)]
pub(crate) struct AmvpInfo {
    pub(crate) mv_cand: [[i16; MV_D]; AMVP_MAX_NUM_CANDS],
    pub(crate) num_cand: usize,
}

impl AmvpInfo {
    fn push_unique(&mut self, mv: [i16; MV_D], affine: bool) -> bool {
        if affine {
            for i in 0..self.num_cand {
                if self.mv_cand[i] == mv {
                    return false;
                }
            }
        }
        self.mv_cand[self.num_cand] = mv;
        self.num_cand += 1;
        true
    }
}

#[derive(Default, Clone, Copy)]
pub(crate) struct AffineAmvpInfo {
    pub(crate) mv_cand_lt: [[i16; MV_D]; AMVP_MAX_NUM_CANDS],
    pub(crate) mv_cand_rt: [[i16; MV_D]; AMVP_MAX_NUM_CANDS],
    pub(crate) mv_cand_lb: [[i16; MV_D]; AMVP_MAX_NUM_CANDS],
    pub(crate) num_cand: usize,
}

/* single inherited affine merge candidate */
#[derive(Default, Clone, Copy)]
pub(crate) struct AffineMergeCand {
    pub(crate) mv_field: [[MvField; VER_NUM]; REFP_NUM],
    pub(crate) inter_dir: u8,
    pub(crate) bcw_idx: u8,
    pub(crate) affine_type: AffineModel,
}

/*****************************************************************************
 * POC distance scaling
 *****************************************************************************/
pub(crate) fn vvc_get_dist_scale_factor(
    cur_poc: i32,
    cur_ref_poc: i32,
    col_poc: i32,
    col_ref_poc: i32,
) -> i32 {
    let diff_poc_d = col_poc - col_ref_poc;
    let diff_poc_b = cur_poc - cur_ref_poc;

    if diff_poc_d == diff_poc_b {
        POC_SCALE_NONE
    } else {
        let tdb = VVC_CLIP3(-128, 127, diff_poc_b);
        let tdd = VVC_CLIP3(-128, 127, diff_poc_d);
        let x = (0x4000 + VVC_ABS(tdd / 2)) / tdd;
        VVC_CLIP3(-4096, 4095, (tdb * x + 32) >> 6)
    }
}

pub(crate) fn vvc_scale_mv(mv: [i16; MV_D], scale: i32) -> [i16; MV_D] {
    let mut out = [0i16; MV_D];
    for d in 0..MV_D {
        let v = scale * mv[d] as i32;
        out[d] = VVC_CLIP3(-32768, 32767, (v + 127 + if v < 0 { 1 } else { 0 }) >> 8) as i16;
    }
    out
}

/* rounding of the corner extrapolation back to storage precision */
#[inline]
pub(crate) fn vvc_round_affine_mv(hor: i32, ver: i32, shift: u8) -> (i32, i32) {
    let offset = 1i32 << (shift - 1);
    let h = (hor + offset - if hor >= 0 { 1 } else { 0 }) >> shift;
    let v = (ver + offset - if ver >= 0 { 1 } else { 0 }) >> shift;
    (h, v)
}

/* round one mv to the precision signalled by imv */
pub(crate) fn vvc_round_mv_prec(mv: &mut [i16; MV_D], imv: u8) {
    let shift = vvc_tbl_imv_shift[imv as usize];
    if shift == 0 {
        return;
    }
    let offset = 1i32 << (shift - 1);
    for d in 0..MV_D {
        let v = mv[d] as i32;
        let a = ((VVC_ABS(v) + offset) >> shift) << shift;
        mv[d] = if v < 0 { -a } else { a } as i16;
    }
}

/* true when the two positions fall into different merge estimation regions */
#[inline]
pub(crate) fn vvc_is_diff_mer(plevel: u8, xn: i32, yn: i32, xp: i32, yp: i32) -> bool {
    if (xn >> plevel) != (xp >> plevel) {
        return true;
    }
    if (yn >> plevel) != (yp >> plevel) {
        return true;
    }
    false
}

/*****************************************************************************
 * neighbor CU geometry map word, written at span time
 *
 * - [ 0:11] : x in SCU units of the CU origin
 * - [12:23] : y in SCU units of the CU origin
 * - [24:27] : log2 cuw
 * - [28:31] : log2 cuh
 *****************************************************************************/
#[inline]
pub(crate) fn cu_geo_pack(x_scu: usize, y_scu: usize, log2w: u8, log2h: u8) -> u32 {
    (x_scu as u32) | ((y_scu as u32) << 12) | ((log2w as u32) << 24) | ((log2h as u32) << 28)
}

#[inline]
pub(crate) fn cu_geo_unpack(v: u32) -> (usize, usize, u8, u8) {
    (
        (v & 0xFFF) as usize,
        ((v >> 12) & 0xFFF) as usize,
        ((v >> 24) & 0xF) as u8,
        ((v >> 28) & 0xF) as u8,
    )
}

/*****************************************************************************
 * borrow view over the per-picture maps the derivation reads
 *****************************************************************************/
pub(crate) struct MvpCtx<'a> {
    pub(crate) slice_type: SliceType,
    pub(crate) poc: i32,

    /* current block, luma pel units */
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) cuw: i32,
    pub(crate) cuh: i32,

    pub(crate) pic_w: i32,
    pub(crate) pic_h: i32,
    pub(crate) w_scu: usize,
    pub(crate) log2_ctu_size: u8,

    pub(crate) max_num_merge_cand: usize,
    pub(crate) log2_parallel_merge_level: u8,
    pub(crate) num_ref_idx: [usize; REFP_NUM],
    pub(crate) col_from_l0: bool,
    pub(crate) col_ref_idx: u8,
    pub(crate) check_ldc: bool,

    pub(crate) tool_tmvp: bool,
    pub(crate) tool_sbtmvp: bool,

    pub(crate) map_scu: &'a [MCU],
    pub(crate) map_mv: &'a [[[i16; MV_D]; REFP_NUM]],
    pub(crate) map_refi: &'a [[i8; REFP_NUM]],
    pub(crate) map_bcw: &'a [u8],
    pub(crate) map_affine: &'a [u8],
    pub(crate) map_cu_geo: &'a [u32],
    pub(crate) map_affine_mv: &'a [[[[i16; MV_D]; VER_NUM]; REFP_NUM]],

    pub(crate) refp: &'a [Vec<VvcRefP>; REFP_NUM],
}

impl<'a> MvpCtx<'a> {
    #[inline]
    fn scup_of(&self, x: i32, y: i32) -> usize {
        PEL2SCU(y as usize) * self.w_scu + PEL2SCU(x as usize)
    }

    fn motion_at(&self, scup: usize) -> MotionInfo {
        let refi = self.map_refi[scup];
        let inter_dir = (REFI_IS_VALID(refi[REFP_0]) as u8) | ((REFI_IS_VALID(refi[REFP_1]) as u8) << 1);
        MotionInfo {
            mv: self.map_mv[scup],
            refi,
            inter_dir,
            bcw_idx: if inter_dir == PRED_BI {
                self.map_bcw[scup]
            } else {
                BCW_DEFAULT
            },
        }
    }

    /* coded inter neighbor at the given pel position, honoring the merge
     * estimation region when asked for */
    fn nbr_inter(&self, x: i32, y: i32, check_mer: bool) -> Option<(usize, MotionInfo)> {
        if x < 0 || y < 0 || x >= self.pic_w || y >= self.pic_h {
            return None;
        }
        if check_mer && !vvc_is_diff_mer(self.log2_parallel_merge_level, x, y, self.x, self.y) {
            return None;
        }
        let scup = self.scup_of(x, y);
        if !self.map_scu[scup].IS_COD_NIF() || self.map_scu[scup].GET_IBCF() != 0 {
            return None;
        }
        Some((scup, self.motion_at(scup)))
    }

    /* coded IBC neighbor at the given pel position */
    fn nbr_ibc(&self, x: i32, y: i32) -> Option<[i16; MV_D]> {
        if x < 0 || y < 0 || x >= self.pic_w || y >= self.pic_h {
            return None;
        }
        let scup = self.scup_of(x, y);
        if self.map_scu[scup].GET_COD() != 0 && self.map_scu[scup].GET_IBCF() != 0 {
            return Some(self.map_mv[scup][REFP_0]);
        }
        None
    }

    fn ref_poc(&self, lidx: usize, refi: i8) -> i32 {
        self.refp[lidx][refi as usize].poc
    }

    fn col_pic(&self) -> Option<&VvcPic> {
        let lidx = if self.slice_type.is_inter_b() && !self.col_from_l0 {
            REFP_1
        } else {
            REFP_0
        };
        let idx = self.col_ref_idx as usize;
        if idx >= self.refp[lidx].len() {
            return None;
        }
        self.refp[lidx][idx].pic.as_deref()
    }

    /*************************************************************************
     * regular merge list
     *************************************************************************/
    pub(crate) fn get_merge_cands(&self) -> MergeCtx {
        let mut mrg = MergeCtx::default();
        mrg.max_num = self.max_num_merge_cand;
        let max_num = self.max_num_merge_cand;
        let is_b = self.slice_type.is_inter_b();

        let (x, y, cuw, cuh) = (self.x, self.y, self.cuw, self.cuh);
        let mut cnt = 0;

        /* A1, left */
        let mi_a1 = self.nbr_inter(x - 1, y + cuh - 1, true).map(|(_, mi)| mi);
        if let Some(mi) = mi_a1 {
            self.set_merge_cand(&mut mrg, cnt, &mi, is_b);
            cnt += 1;
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* B1, above */
        let mi_b1 = self.nbr_inter(x + cuw - 1, y - 1, true).map(|(_, mi)| mi);
        if let Some(mi) = mi_b1 {
            if mi_a1.map_or(true, |a1| !a1.same_motion(&mi)) {
                self.set_merge_cand(&mut mrg, cnt, &mi, is_b);
                cnt += 1;
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* B0, above right */
        let mi_b0 = self.nbr_inter(x + cuw, y - 1, true).map(|(_, mi)| mi);
        if let Some(mi) = mi_b0 {
            if mi_b1.map_or(true, |b1| !b1.same_motion(&mi)) {
                self.set_merge_cand(&mut mrg, cnt, &mi, is_b);
                cnt += 1;
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* A0, below left */
        let mi_a0 = self.nbr_inter(x - 1, y + cuh, true).map(|(_, mi)| mi);
        if let Some(mi) = mi_a0 {
            if mi_a1.map_or(true, |a1| !a1.same_motion(&mi)) {
                self.set_merge_cand(&mut mrg, cnt, &mi, is_b);
                cnt += 1;
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* sub-block temporal */
        let mut subpu_avail = false;
        if self.tool_sbtmvp && self.tool_tmvp {
            subpu_avail = self.get_subpu_mvp_cand(&mut mrg, cnt);
            if subpu_avail {
                mrg.mrg_type[cnt] = MergeType::MRG_TYPE_SUBPU_ATMVP;
                mrg.subpu_pos = Some(cnt);
                cnt += 1;
                if cnt == max_num {
                    mrg.num_valid = cnt;
                    return mrg;
                }
            }
        }

        /* B2, above left */
        if cnt < if self.tool_sbtmvp { 6 } else { 4 } {
            let mi_b2 = self.nbr_inter(x - 1, y - 1, true).map(|(_, mi)| mi);
            if let Some(mi) = mi_b2 {
                if mi_a1.map_or(true, |a1| !a1.same_motion(&mi))
                    && mi_b1.map_or(true, |b1| !b1.same_motion(&mi))
                {
                    self.set_merge_cand(&mut mrg, cnt, &mi, is_b);
                    cnt += 1;
                }
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* temporal, bottom right then center */
        if self.tool_tmvp {
            if let Some((dir, fields)) = self.get_tmvp_cand() {
                /* a sub-block temporal candidate with identical motion
                 * makes the whole-block one redundant */
                let mut add_tmvp = true;
                if subpu_avail {
                    let sp = mrg.subpu_pos.unwrap_or(0);
                    if dir == mrg.inter_dir[sp] {
                        add_tmvp = false;
                        for lidx in 0..REFP_NUM {
                            if (dir & (1 << lidx)) != 0 && fields[lidx] != mrg.mv_field[sp][lidx] {
                                add_tmvp = true;
                                break;
                            }
                        }
                    }
                }
                if add_tmvp {
                    mrg.mv_field[cnt] = fields;
                    mrg.inter_dir[cnt] = dir;
                    mrg.bcw_idx[cnt] = BCW_DEFAULT;
                    cnt += 1;
                }
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* pairwise-average candidates */
        {
            let cutoff = cnt.min(4);
            let end = cutoff * (cutoff.max(1) - 1) / 2;
            let mut idx = 0;
            while idx < end && cnt != max_num {
                let i = vvc_tbl_priority_list0[idx];
                let j = vvc_tbl_priority_list1[idx];
                idx += 1;

                let mut fields = [MvField::invalid(); REFP_NUM];
                let mut inter_dir = 0u8;
                for lidx in 0..if is_b { 2 } else { 1 } {
                    let fi = self.mv_field_of(&mrg, i, lidx);
                    let fj = self.mv_field_of(&mrg, j, lidx);
                    if !REFI_IS_VALID(fi.refi) && !REFI_IS_VALID(fj.refi) {
                        continue;
                    }
                    inter_dir += 1 << lidx;
                    if REFI_IS_VALID(fi.refi) && REFI_IS_VALID(fj.refi) {
                        /* round-toward-zero halving, matching integer division */
                        let avg = [
                            ((fi.mv[MV_X] as i32 + fj.mv[MV_X] as i32) / 2) as i16,
                            ((fi.mv[MV_Y] as i32 + fj.mv[MV_Y] as i32) / 2) as i16,
                        ];
                        fields[lidx].set_mv_field(avg, fi.refi);
                    } else if REFI_IS_VALID(fi.refi) {
                        fields[lidx] = fi;
                    } else {
                        fields[lidx] = fj;
                    }
                }
                if inter_dir > 0 {
                    mrg.mv_field[cnt] = fields;
                    mrg.inter_dir[cnt] = inter_dir;
                    mrg.bcw_idx[cnt] = BCW_DEFAULT;
                    cnt += 1;
                }
            }
        }
        if cnt == max_num {
            mrg.num_valid = cnt;
            return mrg;
        }

        /* zero motion fill, cycling the reference index */
        let num_ref_idx = if is_b {
            self.num_ref_idx[REFP_0].min(self.num_ref_idx[REFP_1])
        } else {
            self.num_ref_idx[REFP_0]
        };
        let mut r: i8 = 0;
        let mut refcnt = 0;
        while cnt < max_num {
            mrg.inter_dir[cnt] = PRED_L0;
            mrg.bcw_idx[cnt] = BCW_DEFAULT;
            mrg.mv_field[cnt][REFP_0].set_mv_field([0, 0], r);
            if is_b {
                mrg.inter_dir[cnt] = PRED_BI;
                mrg.mv_field[cnt][REFP_1].set_mv_field([0, 0], r);
            }
            cnt += 1;
            if refcnt == num_ref_idx as i32 - 1 {
                r = 0;
            } else {
                r += 1;
                refcnt += 1;
            }
        }

        mrg.num_valid = cnt;
        mrg
    }

    fn mv_field_of(&self, mrg: &MergeCtx, idx: usize, lidx: usize) -> MvField {
        mrg.mv_field[idx][lidx]
    }

    fn set_merge_cand(&self, mrg: &mut MergeCtx, cnt: usize, mi: &MotionInfo, is_b: bool) {
        mrg.inter_dir[cnt] = mi.inter_dir;
        mrg.bcw_idx[cnt] = if mi.inter_dir == PRED_BI {
            mi.bcw_idx
        } else {
            BCW_DEFAULT
        };
        mrg.mv_field[cnt][REFP_0].set_mv_field(mi.mv[REFP_0], mi.refi[REFP_0]);
        if is_b {
            mrg.mv_field[cnt][REFP_1].set_mv_field(mi.mv[REFP_1], mi.refi[REFP_1]);
        } else {
            mrg.mv_field[cnt][REFP_1] = MvField::invalid();
        }
    }

    /*************************************************************************
     * whole-block temporal candidate
     *************************************************************************/
    fn get_tmvp_cand(&self) -> Option<(u8, [MvField; REFP_NUM])> {
        let (pos_c0, c0_avail) = self.tmvp_pos_c0();
        let pos_c1 = (self.x + (self.cuw >> 1), self.y + (self.cuh >> 1));

        let mut fields = [MvField::invalid(); REFP_NUM];
        let mut dir = 0u8;

        let mv_l0 = if c0_avail {
            self.get_colocated_mvp(REFP_0, pos_c0, 0)
        } else {
            None
        }
        .or_else(|| self.get_colocated_mvp(REFP_0, pos_c1, 0));
        if let Some(mv) = mv_l0 {
            dir |= 1;
            fields[REFP_0].set_mv_field(mv, 0);
        }

        if self.slice_type.is_inter_b() {
            let mv_l1 = if c0_avail {
                self.get_colocated_mvp(REFP_1, pos_c0, 0)
            } else {
                None
            }
            .or_else(|| self.get_colocated_mvp(REFP_1, pos_c1, 0));
            if let Some(mv) = mv_l1 {
                dir |= 2;
                fields[REFP_1].set_mv_field(mv, 0);
            }
        }

        if dir != 0 {
            Some((dir, fields))
        } else {
            None
        }
    }

    /* bottom-right temporal position with the CTU row/column gating */
    fn tmvp_pos_c0(&self) -> ((i32, i32), bool) {
        let rb_x = self.x + self.cuw - 1 - 3;
        let rb_y = self.y + self.cuh - 1 - 3;
        let pos_c0 = (rb_x + 4, rb_y + 4);

        if rb_x + (MIN_CU_SIZE as i32) >= self.pic_w || rb_y + (MIN_CU_SIZE as i32) >= self.pic_h {
            return (pos_c0, false);
        }

        let ctu_mask = (1i32 << self.log2_ctu_size) - 1;
        let in_ctu_x = rb_x & ctu_mask;
        let in_ctu_y = rb_y & ctu_mask;
        let ctu_size = 1i32 << self.log2_ctu_size;

        /* available unless it crosses into the next CTU row, or sits in the
         * last column while not in the last row */
        let avail = if in_ctu_x + 4 < ctu_size && in_ctu_y + 4 < ctu_size {
            true
        } else if in_ctu_x + 4 < ctu_size {
            /* last row of the CTU */
            false
        } else if in_ctu_y + 4 < ctu_size {
            /* last column, still this CTU row */
            true
        } else {
            false
        };

        (pos_c0, avail)
    }

    pub(crate) fn get_colocated_mvp(
        &self,
        lidx: usize,
        pos: (i32, i32),
        refi: i8,
    ) -> Option<[i16; MV_D]> {
        let col_pic = self.col_pic()?;

        let px = VVC_CLIP3(0, self.pic_w - 1, pos.0) & COL_MV_MASK;
        let py = VVC_CLIP3(0, self.pic_h - 1, pos.1) & COL_MV_MASK;
        let col_scup = PEL2SCU(py as usize) * col_pic.w_scu + PEL2SCU(px as usize);

        let col_refi = col_pic.map_refi.borrow()[col_scup];
        let col_mv = col_pic.map_mv.borrow()[col_scup];

        if !REFI_IS_VALID(col_refi[REFP_0]) && !REFI_IS_VALID(col_refi[REFP_1]) {
            return None;
        }

        let mut col_lidx = if self.check_ldc {
            lidx
        } else if self.col_from_l0 {
            REFP_1
        } else {
            REFP_0
        };
        if !REFI_IS_VALID(col_refi[col_lidx]) {
            col_lidx = 1 - col_lidx;
            if !REFI_IS_VALID(col_refi[col_lidx]) {
                return None;
            }
        }
        let col_refidx = col_refi[col_lidx] as usize;

        let cur_ref_longterm = self.refp[lidx][refi as usize].is_longterm;
        let col_ref_longterm = col_pic.list_longterm[col_lidx][col_refidx];
        if cur_ref_longterm != col_ref_longterm {
            return None;
        }

        let cmv = col_mv[col_lidx];
        if cur_ref_longterm {
            return Some(cmv);
        }

        let scale = vvc_get_dist_scale_factor(
            self.poc,
            self.ref_poc(lidx, refi),
            col_pic.poc,
            col_pic.list_poc[col_lidx][col_refidx],
        );
        if scale == POC_SCALE_NONE {
            Some(cmv)
        } else {
            Some(vvc_scale_mv(cmv, scale))
        }
    }

    /*************************************************************************
     * sub-block temporal candidate
     *************************************************************************/
    fn get_subpu_mvp_cand(&self, mrg: &mut MergeCtx, cnt: usize) -> bool {
        let col_pic = match self.col_pic() {
            Some(p) => p,
            None => return false,
        };
        let col_poc = col_pic.poc;
        let is_b = self.slice_type.is_inter_b();

        /* initial temporal vector: first candidate so far whose reference
         * is the collocated picture */
        let mut tmv = [0i16; MV_D];
        let mut fetch_lidx = if is_b && !self.col_from_l0 {
            REFP_1
        } else {
            REFP_0
        };
        'outer: for cur_list in 0..if is_b { 2 } else { 1 } {
            for n in 0..cnt {
                let lidx = if self.check_ldc {
                    if self.col_from_l0 {
                        cur_list
                    } else {
                        1 - cur_list
                    }
                } else {
                    cur_list
                };
                if (mrg.inter_dir[n] & (1 << lidx)) != 0 {
                    let refi = mrg.mv_field[n][lidx].refi;
                    if REFI_IS_VALID(refi) && self.ref_poc(lidx, refi) == col_poc {
                        tmv = mrg.mv_field[n][lidx].mv;
                        fetch_lidx = lidx;
                        break 'outer;
                    }
                }
            }
        }

        /* full-pel temporal displacement, clipped to the CTU window */
        let mut tx = (tmv[MV_X] as i32 + 2) >> 2;
        let mut ty = (tmv[MV_Y] as i32 + 2) >> 2;
        self.clip_col_blk_mv(&mut tx, &mut ty);

        let sub = 1i32 << SUBPU_LOG2;
        let pu_w = if self.cuw > sub { sub } else { self.cuw };
        let pu_h = if self.cuh > sub { sub } else { self.cuh };

        /* center motion */
        let center_x = VVC_CLIP3(
            0,
            self.pic_w - 1,
            self.x + ((self.cuw / pu_w) >> 1) * pu_w + (pu_w >> 1) + tx,
        );
        let center_y = VVC_CLIP3(
            0,
            self.pic_h - 1,
            self.y + ((self.cuh / pu_h) >> 1) * pu_h + (pu_h >> 1) + ty,
        );
        let center = (center_x & COL_MV_MASK, center_y & COL_MV_MASK);

        let mut found = false;
        let mut center_fields = [MvField::invalid(); REFP_NUM];
        let mut dir = 0u8;
        for lidx in 0..if is_b { 2 } else { 1 } {
            if let Some(mv) = self.derive_scaled_motion_temporal(lidx, center, fetch_lidx) {
                center_fields[lidx].set_mv_field(mv, 0);
                dir |= 1 << lidx;
                found = true;
            }
        }
        if !found {
            return false;
        }

        mrg.mv_field[cnt] = center_fields;
        mrg.inter_dir[cnt] = dir;
        mrg.bcw_idx[cnt] = BCW_DEFAULT;

        /* per-sub-block sampling of the collocated field */
        let parts_x = ((self.cuw + pu_w - 1) / pu_w) as usize;
        let parts_y = ((self.cuh + pu_h - 1) / pu_h) as usize;
        mrg.subpu_mv.clear();
        mrg.subpu_mv.reserve(parts_x * parts_y);

        for by in 0..parts_y as i32 {
            for bx in 0..parts_x as i32 {
                let col_x = VVC_CLIP3(
                    0,
                    self.pic_w - 1,
                    self.x + bx * pu_w + (pu_w >> 1) + tx,
                ) & COL_MV_MASK;
                let col_y = VVC_CLIP3(
                    0,
                    self.pic_h - 1,
                    self.y + by * pu_h + (pu_h >> 1) + ty,
                ) & COL_MV_MASK;

                let mut fields = [MvField::invalid(); REFP_NUM];
                let mut any = false;
                for lidx in 0..if is_b { 2 } else { 1 } {
                    if let Some(mv) =
                        self.derive_scaled_motion_temporal(lidx, (col_x, col_y), fetch_lidx)
                    {
                        fields[lidx].set_mv_field(mv, 0);
                        any = true;
                    }
                }
                if !any {
                    /* intra collocated block falls back to the center motion */
                    fields = center_fields;
                }
                mrg.subpu_mv.push(fields);
            }
        }

        true
    }

    fn clip_col_blk_mv(&self, mvx: &mut i32, mvy: &mut i32) {
        let ctu_size = 1i32 << self.log2_ctu_size;
        let ctu_x = (self.x / ctu_size) * ctu_size;
        let ctu_y = (self.y / ctu_size) * ctu_size;

        let hor_max = (self.pic_w).min(ctu_x + ctu_size + 4) - self.cuw - self.x;
        let hor_min = 0.max(ctu_x) - self.x;
        let ver_max = (self.pic_h).min(ctu_y + ctu_size) - self.cuh - self.y;
        let ver_min = 0.max(ctu_y) - self.y;

        *mvx = (*mvx).max(hor_min).min(hor_max);
        *mvy = (*mvy).max(ver_min).min(ver_max);
    }

    fn derive_scaled_motion_temporal(
        &self,
        lidx: usize,
        col_pos: (i32, i32),
        fetch_lidx: usize,
    ) -> Option<[i16; MV_D]> {
        let col_pic = self.col_pic()?;
        let col_scup =
            PEL2SCU(col_pos.1 as usize) * col_pic.w_scu + PEL2SCU(col_pos.0 as usize);
        let col_refi = col_pic.map_refi.borrow()[col_scup];
        let col_mv = col_pic.map_mv.borrow()[col_scup];

        if !REFI_IS_VALID(col_refi[REFP_0]) && !REFI_IS_VALID(col_refi[REFP_1]) {
            return None;
        }

        let mut col_lidx = if self.check_ldc {
            lidx
        } else {
            1 - fetch_lidx
        };
        if !REFI_IS_VALID(col_refi[col_lidx]) {
            col_lidx = 1 - col_lidx;
            if !REFI_IS_VALID(col_refi[col_lidx]) {
                return None;
            }
        }
        let col_refidx = col_refi[col_lidx] as usize;

        if self.num_ref_idx[lidx] == 0 {
            return None;
        }

        /* target reference index is always 0, short-term assumed */
        let scale = vvc_get_dist_scale_factor(
            self.poc,
            self.ref_poc(lidx, 0),
            col_pic.poc,
            col_pic.list_poc[col_lidx][col_refidx],
        );
        let cmv = col_mv[col_lidx];
        if scale == POC_SCALE_NONE {
            Some(cmv)
        } else {
            Some(vvc_scale_mv(cmv, scale))
        }
    }

    /*************************************************************************
     * AMVP list
     *************************************************************************/
    pub(crate) fn get_mvp_cands(&self, lidx: usize, refi: i8, imv: u8) -> AmvpInfo {
        let mut info = AmvpInfo::default();
        if !REFI_IS_VALID(refi) {
            return info;
        }

        let (x, y, cuw, cuh) = (self.x, self.y, self.cuw, self.cuh);
        let pos_lt = (x, y);
        let pos_rt = (x + cuw - 1, y);
        let pos_lb = (x, y + cuh - 1);

        /* true when a left-side inter neighbor exists; scaled left-side
         * fallbacks are tried only then, scaled top fallbacks only otherwise */
        let is_scaled_flag = self
            .nbr_inter(pos_lb.0 - 1, pos_lb.1 + 1, false)
            .or_else(|| self.nbr_inter(pos_lb.0 - 1, pos_lb.1, false))
            .is_some();

        if is_scaled_flag {
            let _ = self.add_mvp_cand_unscaled(lidx, refi, (pos_lb.0 - 1, pos_lb.1 + 1), &mut info, false)
                || self.add_mvp_cand_unscaled(lidx, refi, (pos_lb.0 - 1, pos_lb.1), &mut info, false)
                || self.add_mvp_cand_scaled(lidx, refi, (pos_lb.0 - 1, pos_lb.1 + 1), &mut info, false)
                || self.add_mvp_cand_scaled(lidx, refi, (pos_lb.0 - 1, pos_lb.1), &mut info, false);
        }

        let _ = self.add_mvp_cand_unscaled(lidx, refi, (pos_rt.0 + 1, pos_rt.1 - 1), &mut info, false)
            || self.add_mvp_cand_unscaled(lidx, refi, (pos_rt.0, pos_rt.1 - 1), &mut info, false)
            || self.add_mvp_cand_unscaled(lidx, refi, (pos_lt.0 - 1, pos_lt.1 - 1), &mut info, false);

        if !is_scaled_flag {
            let _ = self.add_mvp_cand_scaled(lidx, refi, (pos_rt.0 + 1, pos_rt.1 - 1), &mut info, false)
                || self.add_mvp_cand_scaled(lidx, refi, (pos_rt.0, pos_rt.1 - 1), &mut info, false)
                || self.add_mvp_cand_scaled(lidx, refi, (pos_lt.0 - 1, pos_lt.1 - 1), &mut info, false);
        }

        if imv != IMV_OFF {
            for i in 0..info.num_cand {
                vvc_round_mv_prec(&mut info.mv_cand[i], imv);
            }
        }

        if info.num_cand == 2 && info.mv_cand[0] == info.mv_cand[1] {
            info.num_cand = 1;
        }

        if self.tool_tmvp && info.num_cand < AMVP_MAX_NUM_CANDS {
            let (pos_c0, c0_avail) = self.tmvp_pos_c0();
            let pos_c1 = (x + (cuw >> 1), y + (cuh >> 1));
            let tmvp = if c0_avail {
                self.get_colocated_mvp(lidx, pos_c0, refi)
            } else {
                None
            }
            .or_else(|| self.get_colocated_mvp(lidx, pos_c1, refi));
            if let Some(mv) = tmvp {
                info.mv_cand[info.num_cand] = mv;
                info.num_cand += 1;
            }
        }

        while info.num_cand < AMVP_MAX_NUM_CANDS {
            info.mv_cand[info.num_cand] = [0, 0];
            info.num_cand += 1;
        }

        if imv != IMV_OFF {
            for i in 0..info.num_cand {
                vvc_round_mv_prec(&mut info.mv_cand[i], imv);
            }
        }

        info
    }

    fn add_mvp_cand_unscaled(
        &self,
        lidx: usize,
        refi: i8,
        pos: (i32, i32),
        info: &mut AmvpInfo,
        affine: bool,
    ) -> bool {
        let (_, mi) = match self.nbr_inter(pos.0, pos.1, false) {
            Some(v) => v,
            None => return false,
        };
        let cur_ref_poc = self.ref_poc(lidx, refi);

        for source in 0..2 {
            let l = if source == 0 { lidx } else { 1 - lidx };
            let nbr_refi = mi.refi[l];
            if REFI_IS_VALID(nbr_refi) && cur_ref_poc == self.ref_poc(l, nbr_refi) {
                if info.push_unique(mi.mv[l], affine) {
                    return true;
                }
            }
        }
        false
    }

    fn add_mvp_cand_scaled(
        &self,
        lidx: usize,
        refi: i8,
        pos: (i32, i32),
        info: &mut AmvpInfo,
        affine: bool,
    ) -> bool {
        let (_, mi) = match self.nbr_inter(pos.0, pos.1, false) {
            Some(v) => v,
            None => return false,
        };
        let cur_ref_poc = self.ref_poc(lidx, refi);
        let cur_ref_longterm = self.refp[lidx][refi as usize].is_longterm;

        for source in 0..2 {
            let l = if source == 0 { lidx } else { 1 - lidx };
            let nbr_refi = mi.refi[l];
            if !REFI_IS_VALID(nbr_refi) {
                continue;
            }
            let nbr_ref_longterm = self.refp[l][nbr_refi as usize].is_longterm;
            if cur_ref_longterm != nbr_ref_longterm {
                continue;
            }
            let mut mv = mi.mv[l];
            if !cur_ref_longterm {
                let scale = vvc_get_dist_scale_factor(
                    self.poc,
                    cur_ref_poc,
                    self.poc,
                    self.ref_poc(l, nbr_refi),
                );
                if scale != POC_SCALE_NONE {
                    mv = vvc_scale_mv(mv, scale);
                }
            }
            if info.push_unique(mv, affine) {
                return true;
            }
        }
        false
    }

    /*************************************************************************
     * affine candidates
     *************************************************************************/
    fn affine_nbr(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.pic_w || y >= self.pic_h {
            return None;
        }
        let scup = self.scup_of(x, y);
        if self.map_scu[scup].IS_COD_NIF() && self.map_affine[scup] != 0 {
            Some(scup)
        } else {
            None
        }
    }

    /* A1, B1, B0, A0, B2 order */
    fn available_affine_nbrs(&self) -> Vec<usize> {
        let (x, y, cuw, cuh) = (self.x, self.y, self.cuw, self.cuh);
        let mut out = Vec::with_capacity(5);
        for &(px, py) in &[
            (x - 1, y + cuh - 1),
            (x + cuw - 1, y - 1),
            (x + cuw, y - 1),
            (x - 1, y + cuh),
            (x - 1, y - 1),
        ] {
            if let Some(scup) = self.affine_nbr(px, py) {
                out.push(scup);
            }
        }
        out
    }

    /* corner extrapolation of a neighbor affine CU onto the current block */
    pub(crate) fn inherited_affine_mv(
        &self,
        nbr_scup: usize,
        lidx: usize,
        cur_affine_type: AffineModel,
    ) -> [[i16; MV_D]; VER_NUM] {
        let (nb_xs, nb_ys, nb_lw, nb_lh) = cu_geo_unpack(self.map_cu_geo[nbr_scup]);
        let pos_nei_x = (nb_xs << MIN_CU_LOG2) as i32;
        let pos_nei_y = (nb_ys << MIN_CU_LOG2) as i32;
        let nbr_6param = self.map_affine[nbr_scup] == 2;

        let cp = &self.map_affine_mv[nbr_scup][lidx];
        let mv_lt = [cp[0][MV_X] as i32, cp[0][MV_Y] as i32];
        let mv_rt = [cp[1][MV_X] as i32, cp[1][MV_Y] as i32];
        let mv_lb = [cp[2][MV_X] as i32, cp[2][MV_Y] as i32];

        let shift = AFFINE_SHIFT;
        let d_hor_x = (mv_rt[MV_X] - mv_lt[MV_X]) << (shift - nb_lw);
        let d_hor_y = (mv_rt[MV_Y] - mv_lt[MV_Y]) << (shift - nb_lw);
        let (d_ver_x, d_ver_y) = if nbr_6param {
            (
                (mv_lb[MV_X] - mv_lt[MV_X]) << (shift - nb_lh),
                (mv_lb[MV_Y] - mv_lt[MV_Y]) << (shift - nb_lh),
            )
        } else {
            (-d_hor_y, d_hor_x)
        };
        let scale_hor = mv_lt[MV_X] << shift;
        let scale_ver = mv_lt[MV_Y] << shift;

        let mut out = [[0i16; MV_D]; VER_NUM];
        let corners: [(i32, i32); VER_NUM] = [
            (self.x, self.y),
            (self.x + self.cuw, self.y),
            (self.x, self.y + self.cuh),
        ];
        let n_corners = if cur_affine_type == AffineModel::AFF_6_PARAM {
            3
        } else {
            2
        };
        for c in 0..n_corners {
            let (cx, cy) = corners[c];
            let hor = scale_hor + d_hor_x * (cx - pos_nei_x) + d_ver_x * (cy - pos_nei_y);
            let ver = scale_ver + d_hor_y * (cx - pos_nei_x) + d_ver_y * (cy - pos_nei_y);
            let (h, v) = vvc_round_affine_mv(hor, ver, shift);
            out[c] = [
                VVC_CLIP3(-32768, 32767, h) as i16,
                VVC_CLIP3(-32768, 32767, v) as i16,
            ];
        }
        out
    }

    /* inherited affine merge candidate from the first affine neighbor */
    pub(crate) fn get_affine_merge_cand(&self) -> Option<AffineMergeCand> {
        let nbrs = self.available_affine_nbrs();
        let first = *nbrs.first()?;

        let mi = self.motion_at(first);
        let mut cand = AffineMergeCand::default();
        cand.inter_dir = mi.inter_dir;
        cand.bcw_idx = if mi.inter_dir == PRED_BI {
            self.map_bcw[first]
        } else {
            BCW_DEFAULT
        };
        cand.affine_type = if self.map_affine[first] == 2 {
            AffineModel::AFF_6_PARAM
        } else {
            AffineModel::AFF_4_PARAM
        };
        for lidx in 0..REFP_NUM {
            for v in 0..VER_NUM {
                cand.mv_field[lidx][v] = MvField::invalid();
            }
        }

        if mi.inter_dir != PRED_L1 {
            let mv = self.inherited_affine_mv(first, REFP_0, cand.affine_type);
            for v in 0..VER_NUM {
                cand.mv_field[REFP_0][v].set_mv_field(mv[v], mi.refi[REFP_0]);
            }
        }
        if self.slice_type.is_inter_b() && mi.inter_dir != PRED_L0 {
            let mv = self.inherited_affine_mv(first, REFP_1, cand.affine_type);
            for v in 0..VER_NUM {
                cand.mv_field[REFP_1][v].set_mv_field(mv[v], mi.refi[REFP_1]);
            }
        }

        Some(cand)
    }

    /* affine AMVP: inherited, then constructed, then translational fallback */
    pub(crate) fn get_affine_mvp_cands(
        &self,
        lidx: usize,
        refi: i8,
        affine_type: AffineModel,
    ) -> AffineAmvpInfo {
        let mut info = AffineAmvpInfo::default();
        if !REFI_IS_VALID(refi) {
            return info;
        }

        let target_ref_poc = self.ref_poc(lidx, refi);
        let nbrs = self.available_affine_nbrs();

        /* inherited candidates: the asked list first, then the other */
        for pass in 0..2 {
            if info.num_cand >= AMVP_MAX_NUM_CANDS {
                break;
            }
            let test_lidx = if pass == 0 { lidx } else { 1 - lidx };
            for &nbr in nbrs.iter() {
                if info.num_cand >= AMVP_MAX_NUM_CANDS {
                    break;
                }
                let mi = self.motion_at(nbr);
                if (mi.inter_dir & (1 << test_lidx)) == 0 {
                    continue;
                }
                if self.ref_poc(test_lidx, mi.refi[test_lidx]) != target_ref_poc {
                    continue;
                }

                let mv = self.inherited_affine_mv(nbr, test_lidx, affine_type);

                let dup = info.num_cand > 0
                    && mv[0] == info.mv_cand_lt[0]
                    && mv[1] == info.mv_cand_rt[0]
                    && (affine_type == AffineModel::AFF_4_PARAM || mv[2] == info.mv_cand_lb[0]);
                if !dup {
                    info.mv_cand_lt[info.num_cand] = mv[0];
                    info.mv_cand_rt[info.num_cand] = mv[1];
                    info.mv_cand_lb[info.num_cand] = mv[2];
                    info.num_cand += 1;
                }
            }
        }

        if info.num_cand >= AMVP_MAX_NUM_CANDS {
            return info;
        }

        /* constructed candidate from per-corner scans */
        let (x, y, cuw, cuh) = (self.x, self.y, self.cuw, self.cuh);
        let log2w = super::util::CONV_LOG2(cuw as usize);
        let log2h = super::util::CONV_LOG2(cuh as usize);

        let mut corner_pattern = 0usize;

        /* LT: above-left, above, left */
        let mut amvp0 = AmvpInfo::default();
        let _ = self.add_mvp_cand_unscaled(lidx, refi, (x - 1, y - 1), &mut amvp0, true)
            || self.add_mvp_cand_unscaled(lidx, refi, (x, y - 1), &mut amvp0, true)
            || self.add_mvp_cand_unscaled(lidx, refi, (x - 1, y), &mut amvp0, true);
        corner_pattern |= amvp0.num_cand;

        /* RT: above, above-right */
        let mut amvp1 = AmvpInfo::default();
        let _ = self.add_mvp_cand_unscaled(lidx, refi, (x + cuw - 1, y - 1), &mut amvp1, true)
            || self.add_mvp_cand_unscaled(lidx, refi, (x + cuw, y - 1), &mut amvp1, true);
        corner_pattern |= amvp1.num_cand << 1;

        /* LB: left, below-left */
        let mut amvp2 = AmvpInfo::default();
        let _ = self.add_mvp_cand_unscaled(lidx, refi, (x - 1, y + cuh - 1), &mut amvp2, true)
            || self.add_mvp_cand_unscaled(lidx, refi, (x - 1, y + cuh), &mut amvp2, true);
        corner_pattern |= amvp2.num_cand << 2;

        if corner_pattern == 7 || corner_pattern == 3 || corner_pattern == 5 {
            let mut out = [amvp0.mv_cand[0], amvp1.mv_cand[0], amvp2.mv_cand[0]];
            let shift = AFFINE_SHIFT;

            if corner_pattern == 3 && affine_type == AffineModel::AFF_6_PARAM {
                /* LT and RT present, derive LB for the 6-parameter model */
                let vx2 = ((out[0][MV_X] as i32) << shift)
                    - (((out[1][MV_Y] as i32 - out[0][MV_Y] as i32)
                        << (shift + log2h - log2w)) as i32);
                let vy2 = ((out[0][MV_Y] as i32) << shift)
                    + (((out[1][MV_X] as i32 - out[0][MV_X] as i32)
                        << (shift + log2h - log2w)) as i32);
                let (h, v) = vvc_round_affine_mv(vx2, vy2, shift);
                out[2] = [h as i16, v as i16];
            }
            if corner_pattern == 5 {
                /* LT and LB present, derive RT */
                let vx1 = ((out[0][MV_X] as i32) << shift)
                    + (((out[2][MV_Y] as i32 - out[0][MV_Y] as i32)
                        << (shift + log2w - log2h)) as i32);
                let vy1 = ((out[0][MV_Y] as i32) << shift)
                    - (((out[2][MV_X] as i32 - out[0][MV_X] as i32)
                        << (shift + log2w - log2h)) as i32);
                let (h, v) = vvc_round_affine_mv(vx1, vy1, shift);
                out[1] = [h as i16, v as i16];
            }

            let dup = info.num_cand > 0
                && out[0] == info.mv_cand_lt[0]
                && out[1] == info.mv_cand_rt[0]
                && (affine_type == AffineModel::AFF_4_PARAM || out[2] == info.mv_cand_lb[0]);
            if !dup {
                info.mv_cand_lt[info.num_cand] = out[0];
                info.mv_cand_rt[info.num_cand] = out[1];
                info.mv_cand_lb[info.num_cand] = out[2];
                info.num_cand += 1;
            }
        }

        /* translational AMVP fallback replicated to every corner */
        if info.num_cand < AMVP_MAX_NUM_CANDS {
            let amvp = self.get_mvp_cands(lidx, refi, IMV_OFF);
            for i in 0..amvp.num_cand {
                if info.num_cand >= AMVP_MAX_NUM_CANDS {
                    break;
                }
                info.mv_cand_lt[info.num_cand] = amvp.mv_cand[i];
                info.mv_cand_rt[info.num_cand] = amvp.mv_cand[i];
                info.mv_cand_lb[info.num_cand] = amvp.mv_cand[i];
                info.num_cand += 1;
            }
        }

        info
    }

    /*************************************************************************
     * IBC merge list: block vectors of the two closest IBC neighbors
     *************************************************************************/
    pub(crate) fn get_ibc_merge_cands(&self) -> MergeCtx {
        let mut mrg = MergeCtx::default();
        mrg.max_num = self.max_num_merge_cand;
        let (x, y, cuw, cuh) = (self.x, self.y, self.cuw, self.cuh);
        let mut cnt = 0;

        let bv_a1 = self.nbr_ibc(x - 1, y + cuh - 1);
        if let Some(bv) = bv_a1 {
            mrg.mv_field[cnt][REFP_0].set_mv_field(bv, 0);
            mrg.inter_dir[cnt] = PRED_L0;
            mrg.mrg_type[cnt] = MergeType::MRG_TYPE_IBC;
            cnt += 1;
        }
        if let Some(bv) = self.nbr_ibc(x + cuw - 1, y - 1) {
            if bv_a1.map_or(true, |a1| a1 != bv) {
                mrg.mv_field[cnt][REFP_0].set_mv_field(bv, 0);
                mrg.inter_dir[cnt] = PRED_L0;
                mrg.mrg_type[cnt] = MergeType::MRG_TYPE_IBC;
                cnt += 1;
            }
        }

        mrg.num_valid = cnt;
        mrg
    }
}

/*****************************************************************************
 * MMVD expansion
 *
 * Pure in (base list, index): base = idx / 32, step = (idx % 32) / 4,
 * direction = idx % 4.
 *****************************************************************************/
pub(crate) fn vvc_get_mmvd_cand(
    mrg: &MergeCtx,
    mmvd_idx: usize,
    refp: &[Vec<VvcRefP>; REFP_NUM],
    poc: i32,
) -> Option<(u8, [MvField; REFP_NUM])> {
    debug_assert!(mmvd_idx < MMVD_CAND_NUM);

    /* bases are the first two whole-block candidates */
    let mut bases = [usize::max_value(); MMVD_BASE_MV_NUM];
    let mut nb = 0;
    for i in 0..mrg.num_valid {
        if mrg.mrg_type[i] == MergeType::MRG_TYPE_DEFAULT {
            bases[nb] = i;
            nb += 1;
            if nb == MMVD_BASE_MV_NUM {
                break;
            }
        }
    }

    let base_idx = mmvd_idx / MMVD_MAX_REFINE_NUM;
    if base_idx >= nb {
        return None;
    }
    let base = bases[base_idx];

    let refine = mmvd_idx % MMVD_MAX_REFINE_NUM;
    let step = vvc_tbl_mmvd_step[refine / MMVD_REFINE_DIR_NUM];
    let dir = vvc_tbl_mmvd_dir[refine % MMVD_REFINE_DIR_NUM];
    let offset = [dir[MV_X] * step, dir[MV_Y] * step];

    let dir_bits = mrg.inter_dir[base];
    let mut fields = mrg.mv_field[base];

    if dir_bits == PRED_BI {
        let poc0 = refp[REFP_0][fields[REFP_0].refi as usize].poc;
        let poc1 = refp[REFP_1][fields[REFP_1].refi as usize].poc;
        /* references on the same side of the current picture move together,
         * opposite sides mirror the offset */
        let same_side = (poc0 - poc) * (poc1 - poc) > 0;
        for d in 0..MV_D {
            fields[REFP_0].mv[d] = fields[REFP_0].mv[d].wrapping_add(offset[d]);
            let o1 = if same_side { offset[d] } else { -offset[d] };
            fields[REFP_1].mv[d] = fields[REFP_1].mv[d].wrapping_add(o1);
        }
    } else {
        let lidx = if dir_bits == PRED_L0 { REFP_0 } else { REFP_1 };
        for d in 0..MV_D {
            fields[lidx].mv[d] = fields[lidx].mv[d].wrapping_add(offset[d]);
        }
    }

    Some((dir_bits, fields))
}

/*****************************************************************************
 * motion span: propagate the winning motion into the per-4x4 maps
 *
 * Motion becomes authoritative for later neighbor lookups only here.
 *****************************************************************************/
pub(crate) struct SpanCu<'a> {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) log2_cuw: u8,
    pub(crate) log2_cuh: u8,
    pub(crate) w_scu: usize,

    pub(crate) refi: [i8; REFP_NUM],
    pub(crate) mv: [[i16; MV_D]; REFP_NUM],
    pub(crate) bcw_idx: u8,
    pub(crate) merge_type: MergeType,
    pub(crate) subpu_mv: &'a [[MvField; REFP_NUM]],

    pub(crate) affine: bool,
    pub(crate) affine_type: AffineModel,
    pub(crate) affine_mv: [[[i16; MV_D]; VER_NUM]; REFP_NUM],
}

pub(crate) fn vvc_span_motion(
    cu: &SpanCu,
    map_mv: &mut [[[i16; MV_D]; REFP_NUM]],
    map_refi: &mut [[i8; REFP_NUM]],
    map_bcw: &mut [u8],
    map_affine: &mut [u8],
    map_cu_geo: &mut [u32],
    map_affine_mv: &mut [[[[i16; MV_D]; VER_NUM]; REFP_NUM]],
) {
    let x_scu = PEL2SCU(cu.x);
    let y_scu = PEL2SCU(cu.y);
    let scuw = 1usize << (cu.log2_cuw as usize - MIN_CU_LOG2);
    let scuh = 1usize << (cu.log2_cuh as usize - MIN_CU_LOG2);
    let geo = cu_geo_pack(x_scu, y_scu, cu.log2_cuw, cu.log2_cuh);

    let aff_flag = if !cu.affine {
        0
    } else if cu.affine_type == AffineModel::AFF_6_PARAM {
        2
    } else {
        1
    };

    for sy in 0..scuh {
        for sx in 0..scuw {
            let scup = (y_scu + sy) * cu.w_scu + (x_scu + sx);
            map_cu_geo[scup] = geo;
            map_affine[scup] = aff_flag;
            map_bcw[scup] = cu.bcw_idx;

            if cu.merge_type == MergeType::MRG_TYPE_SUBPU_ATMVP && !cu.subpu_mv.is_empty() {
                /* 8x8 granularity, two scus per sub-block axis */
                let parts_x = (scuw + 1) >> 1;
                let part = (sy >> 1) * parts_x + (sx >> 1);
                let f = &cu.subpu_mv[part.min(cu.subpu_mv.len() - 1)];
                map_refi[scup] = [f[REFP_0].refi, f[REFP_1].refi];
                map_mv[scup] = [f[REFP_0].mv, f[REFP_1].mv];
            } else if cu.affine {
                map_refi[scup] = cu.refi;
                map_mv[scup] = affine_scu_mv(cu, sx, sy);
            } else {
                map_refi[scup] = cu.refi;
                map_mv[scup] = cu.mv;
            }

            if cu.affine {
                map_affine_mv[scup] = cu.affine_mv;
            }
        }
    }
}

/* per-4x4 motion of an affine CU, sampled at the sub-block center */
fn affine_scu_mv(cu: &SpanCu, sx: usize, sy: usize) -> [[i16; MV_D]; REFP_NUM] {
    let shift = AFFINE_SHIFT;
    let mut out = [[0i16; MV_D]; REFP_NUM];

    for lidx in 0..REFP_NUM {
        if !REFI_IS_VALID(cu.refi[lidx]) {
            continue;
        }
        let cp = &cu.affine_mv[lidx];
        let lt = [cp[0][MV_X] as i32, cp[0][MV_Y] as i32];
        let rt = [cp[1][MV_X] as i32, cp[1][MV_Y] as i32];
        let lb = [cp[2][MV_X] as i32, cp[2][MV_Y] as i32];

        let d_hor_x = (rt[MV_X] - lt[MV_X]) << (shift - cu.log2_cuw);
        let d_hor_y = (rt[MV_Y] - lt[MV_Y]) << (shift - cu.log2_cuw);
        let (d_ver_x, d_ver_y) = if cu.affine_type == AffineModel::AFF_6_PARAM {
            (
                (lb[MV_X] - lt[MV_X]) << (shift - cu.log2_cuh),
                (lb[MV_Y] - lt[MV_Y]) << (shift - cu.log2_cuh),
            )
        } else {
            (-d_hor_y, d_hor_x)
        };

        let cx = ((sx as i32) << MIN_CU_LOG2) + 2;
        let cy = ((sy as i32) << MIN_CU_LOG2) + 2;
        let hor = (lt[MV_X] << shift) + d_hor_x * cx + d_ver_x * cy;
        let ver = (lt[MV_Y] << shift) + d_hor_y * cx + d_ver_y * cy;
        let (hr, vr) = vvc_round_affine_mv(hor, ver, shift);
        out[lidx] = [
            VVC_CLIP3(-32768, 32767, hr) as i16,
            VVC_CLIP3(-32768, 32767, vr) as i16,
        ];
    }
    out
}
