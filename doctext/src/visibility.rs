//! Decides which characters of the document text are shown to the user
use crate::sprm::{find_prl, Prl};

/// Control characters which are never displayed
const INVISIBLE: [u16; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x07, 0x08, 0x15];
const FIELD_BEGIN: u16 = 0x13;
const FIELD_SEPARATOR: u16 = 0x14;
const FIELD_END: u16 = 0x15;
const CELL_MARK: u16 = 0x07;
const PARAGRAPH_MARK: u16 = 0x0D;
const SPECIAL_OPEN: u16 = 0x3C;
const SPECIAL_CLOSE: u16 = 0x3E;

/// Properties which hide the text they apply to, whatever their operand:
/// sprmCFFldVanish, sprmCFData, sprmCFOle2, sprmCFSpecVanish, sprmCFVanish,
/// sprmCFObj and sprmCFSdtVanish
const HIDING_SPRMS: [u16; 7] = [0x0802, 0x0806, 0x080A, 0x0818, 0x083C, 0x0856, 0x2A90];
const SPRM_C_F_SPEC: u16 = 0x0855;
const SPRM_C_PIC_LOCATION: u16 = 0x6A03;
const SPRM_P_F_TTP: u16 = 0x2417;
const SPRM_P_F_INNER_TABLE_CELL: u16 = 0x244B;

/// The visibility state of a text scan
///
/// Field codes (between a field begin and its separator) and special character
/// regions are hidden as a whole; everything else is decided per character
#[derive(Debug, Default, Clone)]
pub struct VisibilityState {
    visible: bool,
    in_hidden_region: bool,
}

impl VisibilityState {
    /// Creates the state for a new scan
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scan is inside a hidden region
    pub fn in_hidden_region(&self) -> bool {
        self.in_hidden_region
    }

    /// Updates the state with the character `ch` and returns whether it's displayed
    ///
    /// `papx` and `chpx` are the paragraph and character properties in effect
    pub fn resolve(&mut self, ch: u16, papx: &[Prl], chpx: &[Prl]) -> bool {
        self.visible = !INVISIBLE.contains(&ch);
        match ch {
            FIELD_BEGIN => {
                self.in_hidden_region = true;
                self.visible = false;
            }
            FIELD_SEPARATOR | FIELD_END => {
                self.in_hidden_region = false;
                self.visible = false;
            }
            SPECIAL_OPEN if is_special(chpx) => {
                self.in_hidden_region = true;
                self.visible = false;
            }
            SPECIAL_CLOSE if is_special(chpx) => {
                self.in_hidden_region = false;
                self.visible = false;
            }
            CELL_MARK if has_prl(papx, SPRM_P_F_TTP) => self.visible = false,
            PARAGRAPH_MARK if has_prl(papx, SPRM_P_F_INNER_TABLE_CELL) => self.visible = false,
            _ => {}
        }
        if HIDING_SPRMS
            .iter()
            .any(|sprm| has_prl(chpx, *sprm) || has_prl(papx, *sprm))
        {
            self.visible = false;
        }
        self.visible && !self.in_hidden_region
    }
}

fn has_prl(grpprl: &[Prl], sprm: u16) -> bool {
    find_prl(grpprl, sprm).is_some()
}

fn is_special(chpx: &[Prl]) -> bool {
    has_prl(chpx, SPRM_C_F_SPEC) || has_prl(chpx, SPRM_C_PIC_LOCATION)
}
