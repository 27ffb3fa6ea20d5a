use super::def::*;
use super::tbl::*;

#[inline]
pub(crate) fn CONV_LOG2(v: usize) -> u8 {
    vvc_tbl_log2[v]
}

pub(crate) const SPLIT_MAX_PART_COUNT: usize = 4;

#[derive(Default)]
pub(crate) struct VvcSplitStruct {
    pub(crate) part_count: usize,
    pub(crate) cud: [u16; SPLIT_MAX_PART_COUNT],
    pub(crate) width: [u16; SPLIT_MAX_PART_COUNT],
    pub(crate) height: [u16; SPLIT_MAX_PART_COUNT],
    pub(crate) log_cuw: [u8; SPLIT_MAX_PART_COUNT],
    pub(crate) log_cuh: [u8; SPLIT_MAX_PART_COUNT],
    pub(crate) x_pos: [u16; SPLIT_MAX_PART_COUNT],
    pub(crate) y_pos: [u16; SPLIT_MAX_PART_COUNT],
}

/* child geometry of one split of a (cuw x cuh) block at (x0, y0).
 * Ternary splits produce the 1/4 - 1/2 - 1/4 layout along the split axis. */
pub(crate) fn vvc_split_get_part_structure(
    split_mode: SplitMode,
    x0: u16,
    y0: u16,
    cuw: u16,
    cuh: u16,
    cud: u16,
) -> VvcSplitStruct {
    let mut ss = VvcSplitStruct::default();

    ss.part_count = split_mode.part_count();
    let log_cuw = CONV_LOG2(cuw as usize);
    let log_cuh = CONV_LOG2(cuh as usize);
    ss.x_pos[0] = x0;
    ss.y_pos[0] = y0;

    match split_mode {
        SplitMode::NO_SPLIT => {
            ss.width[0] = cuw;
            ss.height[0] = cuh;
            ss.log_cuw[0] = log_cuw;
            ss.log_cuh[0] = log_cuh;
            ss.cud[0] = cud;
        }
        SplitMode::SPLIT_QUAD => {
            for i in 0..4 {
                ss.width[i] = cuw >> 1;
                ss.height[i] = cuh >> 1;
                ss.log_cuw[i] = log_cuw - 1;
                ss.log_cuh[i] = log_cuh - 1;
                ss.cud[i] = cud + 2;
            }
            ss.x_pos[1] = x0 + (cuw >> 1);
            ss.y_pos[1] = y0;
            ss.x_pos[2] = x0;
            ss.y_pos[2] = y0 + (cuh >> 1);
            ss.x_pos[3] = ss.x_pos[1];
            ss.y_pos[3] = ss.y_pos[2];
        }
        SplitMode::SPLIT_BI_HOR | SplitMode::SPLIT_BI_VER => {
            for i in 0..2 {
                ss.cud[i] = cud + 1;
            }
            if split_mode == SplitMode::SPLIT_BI_HOR {
                for i in 0..2 {
                    ss.width[i] = cuw;
                    ss.height[i] = cuh >> 1;
                    ss.log_cuw[i] = log_cuw;
                    ss.log_cuh[i] = log_cuh - 1;
                }
                ss.x_pos[1] = x0;
                ss.y_pos[1] = y0 + (cuh >> 1);
            } else {
                for i in 0..2 {
                    ss.width[i] = cuw >> 1;
                    ss.height[i] = cuh;
                    ss.log_cuw[i] = log_cuw - 1;
                    ss.log_cuh[i] = log_cuh;
                }
                ss.x_pos[1] = x0 + (cuw >> 1);
                ss.y_pos[1] = y0;
            }
        }
        SplitMode::SPLIT_TRI_HOR => {
            ss.width = [cuw, cuw, cuw, 0];
            ss.height = [cuh >> 2, cuh >> 1, cuh >> 2, 0];
            ss.log_cuw = [log_cuw, log_cuw, log_cuw, 0];
            ss.log_cuh = [log_cuh - 2, log_cuh - 1, log_cuh - 2, 0];
            ss.x_pos[1] = x0;
            ss.y_pos[1] = y0 + (cuh >> 2);
            ss.x_pos[2] = x0;
            ss.y_pos[2] = y0 + (cuh >> 2) + (cuh >> 1);
            for i in 0..3 {
                ss.cud[i] = cud + 2;
            }
        }
        SplitMode::SPLIT_TRI_VER => {
            ss.width = [cuw >> 2, cuw >> 1, cuw >> 2, 0];
            ss.height = [cuh, cuh, cuh, 0];
            ss.log_cuw = [log_cuw - 2, log_cuw - 1, log_cuw - 2, 0];
            ss.log_cuh = [log_cuh, log_cuh, log_cuh, 0];
            ss.x_pos[1] = x0 + (cuw >> 2);
            ss.y_pos[1] = y0;
            ss.x_pos[2] = x0 + (cuw >> 2) + (cuw >> 1);
            ss.y_pos[2] = y0;
            for i in 0..3 {
                ss.cud[i] = cud + 2;
            }
        }
    }

    ss
}

/* splits testable for a (cuw x cuh) block. Boundary blocks must keep at
 * least one split that covers the picture; inner blocks obey the size
 * floors and the multi-type-tree depth cap. */
pub(crate) fn vvc_split_allowed(
    x0: u16,
    y0: u16,
    cuw: u16,
    cuh: u16,
    pic_w: u16,
    pic_h: u16,
    mtt_depth: u16,
    max_mtt_depth: u16,
    min_qt_log2: u8,
    max_bt_log2: u8,
    max_tt_log2: u8,
) -> [bool; MAX_SPLIT_NUM] {
    let mut allow = [false; MAX_SPLIT_NUM];
    let boundary = x0 + cuw > pic_w || y0 + cuh > pic_h;

    allow[SplitMode::NO_SPLIT as usize] = !boundary;

    /* the quad split is barred once a binary/ternary split occurred */
    if cuw == cuh && cuw > (1 << min_qt_log2) && mtt_depth == 0 {
        allow[SplitMode::SPLIT_QUAD as usize] = true;
    }

    if boundary {
        /* implicit split: quad when available, else the binary split
         * along the crossing edge */
        if !allow[SplitMode::SPLIT_QUAD as usize] {
            if y0 + cuh > pic_h && cuh > MIN_CU_SIZE as u16 {
                allow[SplitMode::SPLIT_BI_HOR as usize] = true;
            } else if x0 + cuw > pic_w && cuw > MIN_CU_SIZE as u16 {
                allow[SplitMode::SPLIT_BI_VER as usize] = true;
            }
        }
        return allow;
    }

    if mtt_depth < max_mtt_depth {
        let max_bt = (1u16) << max_bt_log2;
        let max_tt = (1u16) << max_tt_log2;
        if cuh > MIN_CU_SIZE as u16 && cuw <= max_bt && cuh <= max_bt {
            allow[SplitMode::SPLIT_BI_HOR as usize] = true;
        }
        if cuw > MIN_CU_SIZE as u16 && cuw <= max_bt && cuh <= max_bt {
            allow[SplitMode::SPLIT_BI_VER as usize] = true;
        }
        if cuh >= (MIN_CU_SIZE as u16) << 2 && cuw <= max_tt && cuh <= max_tt {
            allow[SplitMode::SPLIT_TRI_HOR as usize] = true;
        }
        if cuw >= (MIN_CU_SIZE as u16) << 2 && cuw <= max_tt && cuh <= max_tt {
            allow[SplitMode::SPLIT_TRI_VER as usize] = true;
        }
    }

    allow
}

/* availability of already-coded neighbors regardless of their mode */
pub(crate) fn vvc_get_avail_block(
    x_scu: usize,
    y_scu: usize,
    w_scu: usize,
    h_scu: usize,
    scup: usize,
    cuw: usize,
    cuh: usize,
    map_scu: &[MCU],
) -> u16 {
    let mut avail = 0;
    let scuw = cuw >> MIN_CU_LOG2;
    let scuh = cuh >> MIN_CU_LOG2;

    if x_scu > 0 && map_scu[scup - 1].GET_COD() != 0 {
        SET_AVAIL(&mut avail, AVAIL_LE);
        if y_scu + scuh < h_scu && map_scu[scup + (scuh * w_scu) - 1].GET_COD() != 0 {
            SET_AVAIL(&mut avail, AVAIL_LO_LE);
        }
    }

    if y_scu > 0 {
        if map_scu[scup - w_scu].GET_COD() != 0 {
            SET_AVAIL(&mut avail, AVAIL_UP);
        }
        if x_scu > 0 && map_scu[scup - w_scu - 1].GET_COD() != 0 {
            SET_AVAIL(&mut avail, AVAIL_UP_LE);
        }
        if x_scu + scuw < w_scu && map_scu[scup - w_scu + scuw].GET_COD() != 0 {
            SET_AVAIL(&mut avail, AVAIL_UP_RI);
        }
    }

    avail
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_part_structure_quad() {
        let ss = vvc_split_get_part_structure(SplitMode::SPLIT_QUAD, 64, 0, 64, 64, 0);
        assert_eq!(ss.part_count, 4);
        assert_eq!(
            (ss.x_pos[3], ss.y_pos[3], ss.width[3], ss.height[3]),
            (128, 32, 32, 32)
        );
    }

    #[test]
    fn test_part_structure_tri() {
        let ss = vvc_split_get_part_structure(SplitMode::SPLIT_TRI_HOR, 0, 0, 32, 64, 2);
        assert_eq!(ss.part_count, 3);
        assert_eq!(ss.height[0], 16);
        assert_eq!(ss.height[1], 32);
        assert_eq!(ss.height[2], 16);
        assert_eq!(ss.y_pos[2], 48);
        assert_eq!(ss.cud[1], 4);
    }

    #[test]
    fn test_split_allowed_boundary() {
        /* block hanging over the right edge keeps only covering splits */
        let allow = vvc_split_allowed(96, 0, 64, 64, 112, 112, 0, 3, 4, 6, 5);
        assert!(!allow[SplitMode::NO_SPLIT as usize]);
        assert!(allow[SplitMode::SPLIT_QUAD as usize]);
    }

    #[test]
    fn test_split_allowed_inner_4x4() {
        let allow = vvc_split_allowed(0, 0, 4, 4, 64, 64, 1, 3, 4, 6, 5);
        assert!(allow[SplitMode::NO_SPLIT as usize]);
        for s in 1..MAX_SPLIT_NUM {
            assert!(!allow[s]);
        }
    }
}
