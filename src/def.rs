use crate::api::*;

/*****************************************************************************
 * types
 *****************************************************************************/

#[inline]
pub(crate) fn vvc_assert_rv(x: bool, r: VvcError) -> Result<(), VvcError> {
    if !x {
        return Err(r);
    }
    Ok(())
}

/********* Conditional tools definition ********/
#[allow(non_camel_case_types)]
pub type pel = u16;

pub(crate) const REFP_0: usize = 0;
pub(crate) const REFP_1: usize = 1;
pub(crate) const REFP_NUM: usize = 2;

/*****************************************************************************
 * reference index
 *****************************************************************************/
pub(crate) const REFI_INVALID: i8 = (-1);

#[inline]
pub(crate) fn REFI_IS_VALID(refi: i8) -> bool {
    refi >= 0
}

/* X direction motion vector indicator */
pub(crate) const MV_X: usize = 0;
/* Y direction motion vector indicator */
pub(crate) const MV_Y: usize = 1;
/* Maximum count (dimension) of motion */
pub(crate) const MV_D: usize = 2;

pub(crate) const MAX_CU_LOG2: usize = 7; /* CTU 128x128 */
pub(crate) const MIN_CU_LOG2: usize = 2;
pub(crate) const MAX_CU_SIZE: usize = (1 << MAX_CU_LOG2);
pub(crate) const MIN_CU_SIZE: usize = (1 << MIN_CU_LOG2);
/* 128x128 ~ 4x4, number of per-axis size classes */
pub(crate) const NUM_CU_LOG2: usize = (MAX_CU_LOG2 - MIN_CU_LOG2 + 1);
/* pixel position to SCU position */
#[inline]
pub(crate) fn PEL2SCU(p: usize) -> usize {
    p >> MIN_CU_LOG2
}

/*****************************************************************************
 * motion candidate list capacities
 *****************************************************************************/
pub(crate) const MRG_MAX_NUM_CANDS: usize = 6;
pub(crate) const AMVP_MAX_NUM_CANDS: usize = 2;
/* control points of the affine model (LT, RT, LB) */
pub(crate) const VER_NUM: usize = 3;

/* no-scale value of the POC distance scale factor */
pub(crate) const POC_SCALE_NONE: i32 = 4096;

/* MMVD: 2 bases x 8 steps x 4 directions */
pub(crate) const MMVD_BASE_MV_NUM: usize = 2;
pub(crate) const MMVD_REFINE_STEP_NUM: usize = 8;
pub(crate) const MMVD_REFINE_DIR_NUM: usize = 4;
pub(crate) const MMVD_MAX_REFINE_NUM: usize = (MMVD_REFINE_STEP_NUM * MMVD_REFINE_DIR_NUM);
pub(crate) const MMVD_CAND_NUM: usize = (MMVD_BASE_MV_NUM * MMVD_MAX_REFINE_NUM);

/* geometric partition merge */
pub(crate) const GEO_NUM_PARTITION_MODE: usize = 64;
pub(crate) const GEO_MAX_NUM_UNI_CANDS: usize = 6;
pub(crate) const GEO_MAX_TRY_WEIGHTED_SAD: usize = 60;
pub(crate) const GEO_MAX_TRY_WEIGHTED_SATD: usize = 8;
pub(crate) const GEO_MIN_CU_LOG2: usize = 3;
pub(crate) const GEO_MAX_CU_LOG2: usize = 6;

/* IBC and palette are forbidden above 64x64 */
pub(crate) const IBC_MAX_CU_LOG2: usize = 6;
pub(crate) const PLT_MAX_CU_LOG2: usize = 6;
/* palette predictor entries carried from CU to CU */
pub(crate) const PLT_PRED_SIZE: usize = 31;

/* motion history (HMVP) table length */
pub(crate) const MAX_NUM_HMVP_CANDS: usize = 5;

/* bi-prediction weight table length and equal-weight index */
pub(crate) const BCW_NUM: usize = 5;
pub(crate) const BCW_DEFAULT: u8 = 2;

/* merge SATD pre-ranking */
pub(crate) const MRG_FAST_RATIO: f64 = 1.25;
pub(crate) const MRG_MAX_NUM_RDO: usize = 4;

/* AMVR precisions, in signalling order */
pub(crate) const IMV_OFF: u8 = 0; /* quarter pel */
pub(crate) const IMV_FPEL: u8 = 1; /* integer pel */
pub(crate) const IMV_4PEL: u8 = 2; /* four pel */
pub(crate) const IMV_HPEL: u8 = 3; /* half pel */
pub(crate) const IMV_NUM: usize = 4;

pub(crate) const MAX_QP: i8 = 63;
pub(crate) const MIN_QP: i8 = 0;

/* intra modes forwarded to full RD */
pub(crate) const IPD_RDO_CNT: usize = 3;
pub(crate) const IPD_PLANAR: u8 = 0;
pub(crate) const IPD_DC: u8 = 1;

/* transform trial groups of the intra evaluator */
pub(crate) const MTS_MAX_IDX: u8 = 4;
pub(crate) const LFNST_MAX_IDX: u8 = 2;

/* Neighboring block availability flag bits */
pub(crate) const AVAIL_BIT_UP: u16 = 0;
pub(crate) const AVAIL_BIT_LE: u16 = 1;
pub(crate) const AVAIL_BIT_LO_LE: u16 = 2;
pub(crate) const AVAIL_BIT_UP_LE: u16 = 3;
pub(crate) const AVAIL_BIT_UP_RI: u16 = 4;

/* Neighboring block availability flags */
pub(crate) const AVAIL_UP: u16 = (1 << AVAIL_BIT_UP);
pub(crate) const AVAIL_LE: u16 = (1 << AVAIL_BIT_LE);
pub(crate) const AVAIL_LO_LE: u16 = (1 << AVAIL_BIT_LO_LE);
pub(crate) const AVAIL_UP_LE: u16 = (1 << AVAIL_BIT_UP_LE);
pub(crate) const AVAIL_UP_RI: u16 = (1 << AVAIL_BIT_UP_RI);

/* availability check macro */
#[inline]
pub(crate) fn IS_AVAIL(avail: u16, pos: u16) -> bool {
    (avail & pos) == pos
}
/* availability set macro */
#[inline]
pub(crate) fn SET_AVAIL(avail: &mut u16, pos: u16) {
    *avail |= pos;
}

#[inline]
pub(crate) fn VVC_CLIP3<T: PartialOrd>(min_x: T, max_x: T, value: T) -> T {
    if value < min_x {
        min_x
    } else if value > max_x {
        max_x
    } else {
        value
    }
}

#[inline]
pub(crate) fn VVC_ABS(a: i32) -> i32 {
    if a < 0 {
        -a
    } else {
        a
    }
}

/*****************************************************************************
 * prediction mode
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum PredMode {
    MODE_INTRA = 0,
    MODE_INTER = 1,
    MODE_IBC = 2,
    MODE_PLT = 3,
}

impl Default for PredMode {
    fn default() -> Self {
        PredMode::MODE_INTRA
    }
}

/*****************************************************************************
 * prediction direction bits
 *****************************************************************************/
pub(crate) const PRED_L0: u8 = 1;
pub(crate) const PRED_L1: u8 = 2;
pub(crate) const PRED_BI: u8 = 3;

/*****************************************************************************
 * merge candidate origin
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum MergeType {
    MRG_TYPE_DEFAULT = 0,
    MRG_TYPE_SUBPU_ATMVP = 1,
    MRG_TYPE_IBC = 2,
}

impl Default for MergeType {
    fn default() -> Self {
        MergeType::MRG_TYPE_DEFAULT
    }
}

/*****************************************************************************
 * affine model
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum AffineModel {
    AFF_4_PARAM = 0,
    AFF_6_PARAM = 1,
}

impl Default for AffineModel {
    fn default() -> Self {
        AffineModel::AFF_4_PARAM
    }
}

/*****************************************************************************
 * split mode
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Debug, FromPrimitive, ToPrimitive)]
pub(crate) enum SplitMode {
    NO_SPLIT = 0,
    SPLIT_QUAD = 1,
    SPLIT_BI_HOR = 2,
    SPLIT_BI_VER = 3,
    SPLIT_TRI_HOR = 4,
    SPLIT_TRI_VER = 5,
}

pub(crate) const MAX_SPLIT_NUM: usize = 6;

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::NO_SPLIT
    }
}

impl SplitMode {
    #[inline]
    pub(crate) fn part_count(self) -> usize {
        match self {
            SplitMode::NO_SPLIT => 1,
            SplitMode::SPLIT_QUAD => 4,
            SplitMode::SPLIT_BI_HOR | SplitMode::SPLIT_BI_VER => 2,
            SplitMode::SPLIT_TRI_HOR | SplitMode::SPLIT_TRI_VER => 3,
        }
    }

    #[inline]
    pub(crate) fn is_vertical(self) -> bool {
        self == SplitMode::SPLIT_BI_VER || self == SplitMode::SPLIT_TRI_VER
    }
}

/*****************************************************************************
 * motion vector field of one reference list
 *****************************************************************************/
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct MvField {
    pub(crate) mv: [i16; MV_D],
    pub(crate) refi: i8,
}

impl MvField {
    #[inline]
    pub(crate) fn set_mv_field(&mut self, mv: [i16; MV_D], refi: i8) {
        self.mv = mv;
        self.refi = refi;
    }

    #[inline]
    pub(crate) fn invalid() -> Self {
        MvField {
            mv: [0, 0],
            refi: REFI_INVALID,
        }
    }
}

/*****************************************************************************
 * full motion of one block, as kept in the history table
 *****************************************************************************/
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub(crate) struct MotionInfo {
    pub(crate) mv: [[i16; MV_D]; REFP_NUM],
    pub(crate) refi: [i8; REFP_NUM],
    pub(crate) inter_dir: u8,
    pub(crate) bcw_idx: u8,
}

impl MotionInfo {
    #[inline]
    pub(crate) fn same_motion(&self, other: &MotionInfo) -> bool {
        self.inter_dir == other.inter_dir && self.refi == other.refi && self.mv == other.mv
    }
}

/*****************************************************************************
* macros for CU map

- [ 0:14] : reserved
- [15:15] : IF: 1 -> intra CU, 0 -> inter CU
- [16:22] : QP
- [23:23] : SF: skip mode flag
- [24:24] : CBFL: luma cbf
- [25:25] : IBCF: intra block copy flag
- [26:30] : reserved
- [31:31] : COD: 0 -> no encoded/decoded CU, 1 -> encoded/decoded CU
*****************************************************************************/
#[derive(Default, Clone, Copy)]
pub(crate) struct MCU(u32);

impl From<u32> for MCU {
    fn from(val: u32) -> Self {
        MCU(val)
    }
}

#[allow(non_snake_case)]
impl MCU {
    /* get intra CU flag from map */
    #[inline]
    pub(crate) fn GET_IF(&self) -> u32 {
        (self.0 >> 15) & 1
    }

    /* set QP to map */
    #[inline]
    pub(crate) fn SET_QP(&mut self, qp: u32) {
        self.0 = (self.0 & !(0x7F << 16)) | ((qp & 0x7F) << 16);
    }
    /* get QP from map */
    #[inline]
    pub(crate) fn GET_QP(&self) -> u32 {
        (self.0 >> 16) & 0x7F
    }

    /* set skip mode flag */
    #[inline]
    pub(crate) fn SET_SF(&mut self) {
        self.0 = self.0 | (1 << 23);
    }

    /* set luma cbf flag */
    #[inline]
    pub(crate) fn SET_CBFL(&mut self) {
        self.0 = self.0 | (1 << 24);
    }

    /* set intra block copy flag */
    #[inline]
    pub(crate) fn SET_IBCF(&mut self) {
        self.0 = self.0 | (1 << 25);
    }
    /* get intra block copy flag */
    #[inline]
    pub(crate) fn GET_IBCF(&self) -> u32 {
        (self.0 >> 25) & 1
    }

    /* get encoded/decoded CU flag from map */
    #[inline]
    pub(crate) fn GET_COD(&self) -> u32 {
        (self.0 >> 31) & 1
    }

    /* multi bit setting: intra flag, encoded/decoded flag, QP */
    #[inline]
    pub(crate) fn SET_IF_COD_QP(&mut self, i: u32, qp: u8) {
        self.0 = (self.0 & 0xFF807F80) | ((qp as u32) << 16) | ((i) << 15) | (1 << 31);
    }
    /* coded and not intra */
    #[inline]
    pub(crate) fn IS_COD_NIF(&self) -> bool {
        ((self.0 >> 15) & 0x10001) == 0x10000
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mcu_qp_overwrite() {
        let mut m = MCU::default();
        m.SET_QP(37);
        assert_eq!(m.GET_QP(), 37);
        m.SET_QP(22);
        assert_eq!(m.GET_QP(), 22);
    }

    #[test]
    fn test_mcu_cod_nif() {
        assert!(!MCU::default().IS_COD_NIF());
        let mut m = MCU::default();
        m.SET_IF_COD_QP(0, 30);
        assert!(m.IS_COD_NIF());
        m.SET_IF_COD_QP(1, 30);
        assert!(!m.IS_COD_NIF());
        assert_eq!(m.GET_IF(), 1);
    }

    #[test]
    fn test_split_part_count() {
        assert_eq!(SplitMode::NO_SPLIT.part_count(), 1);
        assert_eq!(SplitMode::SPLIT_QUAD.part_count(), 4);
        assert_eq!(SplitMode::SPLIT_BI_HOR.part_count(), 2);
        assert_eq!(SplitMode::SPLIT_TRI_VER.part_count(), 3);
    }
}
