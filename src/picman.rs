use super::def::*;

use std::cell::RefCell;
use std::rc::Rc;

pub const MAX_NUM_REF_PICS: usize = 16;

/*****************************************************************************
 * picture motion store
 *
 * Only the pieces the mode decision reads back from a reference picture:
 * its POC, the POCs and long-term flags of its own reference lists, and
 * the per-4x4 motion field left behind when it was coded.
 *****************************************************************************/
pub struct VvcPic {
    pub poc: i32,
    pub is_longterm: bool,
    pub(crate) w_scu: usize,
    pub(crate) h_scu: usize,

    pub(crate) map_mv: Rc<RefCell<Vec<[[i16; MV_D]; REFP_NUM]>>>,
    pub(crate) map_refi: Rc<RefCell<Vec<[i8; REFP_NUM]>>>,
    pub list_poc: [[i32; MAX_NUM_REF_PICS]; REFP_NUM],
    pub list_longterm: [[bool; MAX_NUM_REF_PICS]; REFP_NUM],
}

impl VvcPic {
    pub fn new(width: usize, height: usize, poc: i32) -> Self {
        let w_scu = (width + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        let h_scu = (height + MIN_CU_SIZE - 1) >> MIN_CU_LOG2;
        let f_scu = w_scu * h_scu;
        VvcPic {
            poc,
            is_longterm: false,
            w_scu,
            h_scu,
            map_mv: Rc::new(RefCell::new(vec![[[0; MV_D]; REFP_NUM]; f_scu])),
            map_refi: Rc::new(RefCell::new(vec![[REFI_INVALID; REFP_NUM]; f_scu])),
            list_poc: [[0; MAX_NUM_REF_PICS]; REFP_NUM],
            list_longterm: [[false; MAX_NUM_REF_PICS]; REFP_NUM],
        }
    }
}

/*****************************************************************************
 * reference picture entry of the active lists
 *****************************************************************************/
#[derive(Default)]
pub struct VvcRefP {
    pub poc: i32,
    pub is_longterm: bool,
    pub(crate) pic: Option<Rc<VvcPic>>,
}

impl VvcRefP {
    pub fn new() -> Self {
        VvcRefP {
            poc: 0,
            is_longterm: false,
            pic: None,
        }
    }

    pub fn set_refp(&mut self, pic: Rc<VvcPic>) {
        self.poc = pic.poc;
        self.is_longterm = pic.is_longterm;
        self.pic = Some(pic);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pic_scu_dims() {
        let pic = VvcPic::new(65, 64, 8);
        assert_eq!(pic.w_scu, 17);
        assert_eq!(pic.h_scu, 16);
        assert_eq!(pic.map_refi.borrow().len(), 17 * 16);
        assert_eq!(pic.map_refi.borrow()[0][REFP_0], REFI_INVALID);
    }
}
