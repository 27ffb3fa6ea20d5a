use std::fmt;

use thiserror::Error;

use crate::def::*;

pub use crate::enc::mode::mode_analyze_ctu;
pub use crate::enc::{
    DeblockCost, EncTestMode, EncTestModeType, ModeCtrl, PredCoder, RasterModeCtrl, ResiOutcome,
    VvceCtx,
};
pub use crate::picman::{VvcPic, VvcRefP};

/*****************************************************************************
 * return values and error code
 *****************************************************************************/
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum VvcError {
    /* every tested mode of a block failed, the block cannot be coded */
    #[error("no possible encoding found")]
    NoEncodingFound,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unsupported configuration")]
    Unsupported,
    /* generic error */
    #[error("unknown error")]
    Unknown,
}

impl Default for VvcError {
    fn default() -> Self {
        VvcError::Unknown
    }
}

#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, PartialOrd, Clone, Copy)]
#[repr(C)]
pub enum SliceType {
    VVC_ST_UNKNOWN = 0,
    VVC_ST_I = 1,
    VVC_ST_P = 2,
    VVC_ST_B = 3,
}

impl SliceType {
    #[inline]
    pub(crate) fn is_inter_b(self) -> bool {
        self == SliceType::VVC_ST_B
    }

    #[inline]
    pub(crate) fn is_intra(self) -> bool {
        self == SliceType::VVC_ST_I
    }
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::SliceType::*;
        match self {
            VVC_ST_UNKNOWN => write!(f, "Unknown"),
            VVC_ST_I => write!(f, "I"),
            VVC_ST_P => write!(f, "P"),
            VVC_ST_B => write!(f, "B"),
        }
    }
}

impl From<u8> for SliceType {
    fn from(val: u8) -> Self {
        use self::SliceType::*;
        match val {
            1 => VVC_ST_I,
            2 => VVC_ST_P,
            3 => VVC_ST_B,
            _ => VVC_ST_UNKNOWN,
        }
    }
}

impl Default for SliceType {
    fn default() -> Self {
        SliceType::VVC_ST_UNKNOWN
    }
}

/*****************************************************************************
 * sequence level coding tool switches and tree limits, resolved once
 *****************************************************************************/
#[derive(Debug, Clone)]
pub struct VvcSps {
    pub log2_ctu_size: u8,
    pub log2_min_cb_size: u8,
    pub log2_min_qt_size: u8,
    pub max_mtt_depth: u16,
    pub log2_max_bt_size: u8,
    pub log2_max_tt_size: u8,

    pub max_num_merge_cand: usize,
    pub log2_parallel_merge_level: u8,

    pub tool_tmvp: bool,
    pub tool_sbtmvp: bool,
    pub tool_affine: bool,
    pub tool_affine_6param: bool,
    pub tool_mmvd: bool,
    pub tool_ciip: bool,
    pub tool_geo: bool,
    pub tool_amvr: bool,
    pub tool_bcw: bool,
    pub tool_ibc: bool,
    pub tool_plt: bool,
    pub tool_mts: bool,
    pub tool_lfnst: bool,
    pub tool_isp: bool,
    pub tool_hash_me: bool,
}

impl Default for VvcSps {
    fn default() -> Self {
        VvcSps {
            log2_ctu_size: MAX_CU_LOG2 as u8,
            log2_min_cb_size: MIN_CU_LOG2 as u8,
            log2_min_qt_size: 4,
            max_mtt_depth: 3,
            log2_max_bt_size: 6,
            log2_max_tt_size: 5,
            max_num_merge_cand: MRG_MAX_NUM_CANDS,
            log2_parallel_merge_level: 2,
            tool_tmvp: true,
            tool_sbtmvp: true,
            tool_affine: true,
            tool_affine_6param: true,
            tool_mmvd: true,
            tool_ciip: true,
            tool_geo: true,
            tool_amvr: true,
            tool_bcw: true,
            tool_ibc: false,
            tool_plt: false,
            tool_mts: true,
            tool_lfnst: true,
            tool_isp: true,
            tool_hash_me: false,
        }
    }
}

/*****************************************************************************
 * picture level switches
 *****************************************************************************/
#[derive(Debug, Clone)]
pub struct VvcPps {
    pub cu_qp_delta_enabled_flag: bool,
    /* log2 size of the quantization group */
    pub cu_qp_delta_area: u8,
    pub chroma_qp_offset_list_enabled_flag: bool,
    pub chroma_qp_offset_list_len: u8,
}

impl Default for VvcPps {
    fn default() -> Self {
        VvcPps {
            cu_qp_delta_enabled_flag: false,
            cu_qp_delta_area: 5,
            chroma_qp_offset_list_enabled_flag: false,
            chroma_qp_offset_list_len: 1,
        }
    }
}

/*****************************************************************************
 * slice header fields the mode decision consumes
 *****************************************************************************/
#[derive(Debug, Clone)]
pub struct VvcSh {
    pub slice_type: SliceType,
    pub qp: i8,
    /* delta-QP search range below/above the slice QP */
    pub dqp: i8,
    pub num_ref_idx: [usize; 2],
    pub max_num_merge_cand: usize,
    pub col_from_l0: bool,
    pub col_ref_idx: u8,
    /* all active references precede the current picture */
    pub check_ldc: bool,
    /* 2-D median QP prediction instead of the above/left average */
    pub qp_pred_median: bool,
}

impl Default for VvcSh {
    fn default() -> Self {
        VvcSh {
            slice_type: SliceType::VVC_ST_B,
            qp: 32,
            dqp: 0,
            num_ref_idx: [1, 1],
            max_num_merge_cand: MRG_MAX_NUM_CANDS,
            col_from_l0: true,
            col_ref_idx: 0,
            check_ldc: false,
            qp_pred_median: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slice_type_from_u8() {
        assert_eq!(SliceType::from(2u8), SliceType::VVC_ST_P);
        assert_eq!(SliceType::from(9u8), SliceType::VVC_ST_UNKNOWN);
        assert!(SliceType::VVC_ST_B.is_inter_b());
        assert!(!SliceType::VVC_ST_P.is_inter_b());
    }

    #[test]
    fn test_error_display() {
        let e = VvcError::NoEncodingFound;
        assert_eq!(format!("{}", e), "no possible encoding found");
    }
}
