use crate::def::*;

/*****************************************************************************
 * tables
 *****************************************************************************/

#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_log2: [u8; MAX_CU_SIZE + 1] = [
    0, 0, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3, //
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, //
    5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, //
    5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, //
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, //
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, //
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, //
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, //
    7,
];

/* source candidate indices of the pairwise-average merge candidates */
#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_priority_list0: [usize; 6] = [0, 0, 1, 0, 1, 2];
#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_priority_list1: [usize; 6] = [1, 2, 2, 3, 3, 3];

/* MMVD refinement step, in quarter-pel units */
#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_mmvd_step: [i16; MMVD_REFINE_STEP_NUM] = [1, 2, 4, 8, 16, 32, 64, 128];

/* MMVD refinement direction: +x, -x, +y, -y */
#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_mmvd_dir: [[i16; MV_D]; MMVD_REFINE_DIR_NUM] =
    [[1, 0], [-1, 0], [0, 1], [0, -1]];

/* mv rounding shift per AMVR precision (quarter, integer, 4-pel, half) */
#[allow(non_upper_case_globals)]
pub(crate) static vvc_tbl_imv_shift: [u8; IMV_NUM] = [0, 2, 4, 1];

/* angles admitted for the geometric partition, out of 32 */
#[allow(non_upper_case_globals)]
static vvc_tbl_geo_angle: [u8; 16] = [
    0, 1, 2, 3, 4, 5, 8, 11, 12, 13, 14, 16, 18, 19, 20, 21,
];

lazy_static! {
    /* (angle, distance) pair per geometric split index */
    pub(crate) static ref vvc_tbl_geo_params: [[u8; 2]; GEO_NUM_PARTITION_MODE] = {
        let mut tbl = [[0u8; 2]; GEO_NUM_PARTITION_MODE];
        let mut idx = 0;
        for dist in 0..4u8 {
            for &angle in vvc_tbl_geo_angle.iter() {
                tbl[idx] = [angle, dist];
                idx += 1;
            }
        }
        debug_assert_eq!(idx, GEO_NUM_PARTITION_MODE);
        tbl
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_log2_tbl() {
        assert_eq!(vvc_tbl_log2[4], 2);
        assert_eq!(vvc_tbl_log2[64], 6);
        assert_eq!(vvc_tbl_log2[128], 7);
    }

    #[test]
    fn test_geo_params_full() {
        assert_eq!(vvc_tbl_geo_params.len(), GEO_NUM_PARTITION_MODE);
        assert_eq!(vvc_tbl_geo_params[0], [0, 0]);
        /* every mode is unique */
        for i in 0..GEO_NUM_PARTITION_MODE {
            for j in i + 1..GEO_NUM_PARTITION_MODE {
                assert_ne!(vvc_tbl_geo_params[i], vvc_tbl_geo_params[j]);
            }
        }
    }
}
