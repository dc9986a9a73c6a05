//! Adaptive probability tables of the LZMA coder.
//!
//! Every decision the coder makes (literal or match, which rep distance,
//! length bucket, distance slot) is coded against a slot chosen by the
//! current state machine value and the low bits of the position. Literals
//! additionally use the high bits of the preceding byte.
//!
//! Tables are fixed-size arrays reset in place; only the literal table is
//! sized at runtime because it depends on `lc + lp`.

use crate::range_coder::PROB_INIT;
use oxixz_core::error::{Result, XzError};

/// `lc` used by every preset.
pub const LC_DEFAULT: u32 = 3;
/// `lp` used by every preset.
pub const LP_DEFAULT: u32 = 0;
/// `pb` used by every preset.
pub const PB_DEFAULT: u32 = 2;

/// Upper bound on `lc + lp` under LZMA2.
pub const LCLP_MAX: u32 = 4;

/// Upper bound on `pb`.
pub const PB_MAX: u32 = 4;

/// Position contexts available at `pb = 4`.
pub const POS_STATES_MAX: usize = 1 << PB_MAX;

/// Size of the literal/match/rep state machine.
pub const NUM_STATES: usize = 12;

/// Tree depth of the low length bucket.
pub const LEN_LOW_BITS: u32 = 3;
/// Tree depth of the mid length bucket.
pub const LEN_MID_BITS: u32 = 3;
/// Tree depth of the high length bucket.
pub const LEN_HIGH_BITS: u32 = 8;

/// Lengths covered by the low bucket.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Lengths covered by the mid bucket.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Lengths covered by the high bucket.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Shortest encodable match.
pub const MATCH_LEN_MIN: usize = 2;

/// Longest encodable match (273).
pub const MATCH_LEN_MAX: usize =
    MATCH_LEN_MIN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS - 1;

/// Match lengths 2, 3, 4 and 5+ select separate slot trees.
pub const DIST_STATES: usize = 4;

/// Depth of a slot tree.
pub const DIST_SLOT_BITS: u32 = 6;
/// Slots per slot tree.
pub const DIST_SLOTS: usize = 1 << DIST_SLOT_BITS;

/// Low distance bits coded through the alignment tree for large slots.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Slots in the alignment tree.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// First slot whose extra bits are coded with the special model.
pub const START_POS_MODEL_INDEX: u32 = 4;

/// First slot whose extra bits use direct bits plus alignment bits.
pub const END_POS_MODEL_INDEX: u32 = 14;

/// Number of distances covered by slots below [`END_POS_MODEL_INDEX`].
pub const FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);

/// Size of the special distance table shared by slots 4..14, including
/// the unused root entry of the first tree.
pub const DIST_SPECIAL_SIZE: usize = FULL_DISTANCES - END_POS_MODEL_INDEX as usize + 1;

/// Size of one literal coder (normal tree plus matched-literal trees).
pub const LITERAL_CODER_SIZE: usize = 0x300;

/// Distance value of the end-of-payload marker.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

fn reset_rows<const N: usize>(rows: &mut [[u16; N]]) {
    rows.iter_mut().for_each(|row| row.fill(PROB_INIT));
}

/// Position in the 12-state machine.
///
/// Values below 7 mean the last symbol was a literal; 7 and up follow a
/// match, long rep or short rep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State(u8);

impl State {
    /// State at the start of a stream or after a state reset.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Index into the per-state tables.
    #[inline]
    pub fn value(self) -> usize {
        usize::from(self.0)
    }

    /// Whether the previous symbol was a literal.
    #[inline]
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Transition after coding a literal.
    #[inline]
    pub fn update_literal(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            _ => self.0 - 6,
        };
    }

    /// Transition after a match with a new distance.
    #[inline]
    pub fn update_match(&mut self) {
        self.0 = self.after(7, 10);
    }

    /// Transition after a one-byte rep0.
    #[inline]
    pub fn update_short_rep(&mut self) {
        self.0 = self.after(9, 11);
    }

    /// Transition after a rep match of two or more bytes.
    #[inline]
    pub fn update_long_rep(&mut self) {
        self.0 = self.after(8, 11);
    }

    #[inline]
    fn after(self, from_literal: u8, from_match: u8) -> u8 {
        if self.is_literal() { from_literal } else { from_match }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// The `lc`, `lp` and `pb` parameters packed into an LZMA2 props byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// High bits of the previous byte used as literal context.
    pub lc: u32,
    /// Low position bits used as literal context.
    pub lp: u32,
    /// Low position bits used for match and length contexts.
    pub pb: u32,
}

impl LzmaProperties {
    /// Bundle the three parameters without checking them.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Parse an LZMA2 properties byte.
    ///
    /// The byte is `(pb * 5 + lp) * 9 + lc`; values above 224 and
    /// combinations with `lc + lp > 4` are rejected.
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte > (4 * 5 + 4) * 9 + 8 {
            return Err(XzError::invalid_properties(format!(
                "LZMA properties byte {byte} out of range"
            )));
        }

        let value = u32::from(byte);
        let props = Self {
            lc: value % 9,
            lp: value / 9 % 5,
            pb: value / 45,
        };
        props.validate()?;
        Ok(props)
    }

    /// Check the LZMA2 limits: `lc + lp <= 4`, `pb <= 4`.
    pub fn validate(&self) -> Result<()> {
        if self.lc + self.lp > LCLP_MAX {
            return Err(XzError::invalid_properties(format!(
                "lc + lp = {} exceeds {}",
                self.lc + self.lp,
                LCLP_MAX
            )));
        }
        if self.pb > PB_MAX {
            return Err(XzError::invalid_properties(format!(
                "pb = {} exceeds {}",
                self.pb, PB_MAX
            )));
        }
        Ok(())
    }

    /// Pack into the props byte stored in LZMA2 chunk headers.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Number of literal coders, `2^(lc + lp)`.
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Mask applied to the position for `pos_state`.
    #[inline]
    pub fn pos_mask(&self) -> u64 {
        (1u64 << self.pb) - 1
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self::new(LC_DEFAULT, LP_DEFAULT, PB_DEFAULT)
    }
}

/// Two choice bits followed by one of three bit trees.
///
/// Lengths 2..=9 use `low`, 10..=17 use `mid`, the rest share `high`.
#[derive(Debug, Clone)]
pub struct LengthModel {
    /// `low` or not.
    pub choice: u16,
    /// `mid` or `high`.
    pub choice2: u16,
    /// Per `pos_state` trees for lengths 2..=9.
    pub low: [[u16; LEN_LOW_SYMBOLS]; POS_STATES_MAX],
    /// Per `pos_state` trees for lengths 10..=17.
    pub mid: [[u16; LEN_MID_SYMBOLS]; POS_STATES_MAX],
    /// Single tree for lengths 18..=273.
    pub high: [u16; LEN_HIGH_SYMBOLS],
}

impl LengthModel {
    /// All slots at one half.
    pub fn new() -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: [[PROB_INIT; LEN_LOW_SYMBOLS]; POS_STATES_MAX],
            mid: [[PROB_INIT; LEN_MID_SYMBOLS]; POS_STATES_MAX],
            high: [PROB_INIT; LEN_HIGH_SYMBOLS],
        }
    }

    /// Put every slot back to one half.
    pub fn reset(&mut self) {
        self.choice = PROB_INIT;
        self.choice2 = PROB_INIT;
        reset_rows(&mut self.low);
        reset_rows(&mut self.mid);
        self.high.fill(PROB_INIT);
    }
}

impl Default for LengthModel {
    fn default() -> Self {
        Self::new()
    }
}

/// One 0x300-slot coder per literal context.
#[derive(Debug, Clone)]
pub struct LiteralModel {
    /// Indexed by [`LiteralModel::get_state`].
    pub probs: Vec<[u16; LITERAL_CODER_SIZE]>,
}

impl LiteralModel {
    /// `num_lit_states` fresh coders.
    pub fn new(num_lit_states: usize) -> Self {
        Self {
            probs: vec![[PROB_INIT; LITERAL_CODER_SIZE]; num_lit_states],
        }
    }

    /// Reinitialize with `num_lit_states` coders.
    pub fn reset(&mut self, num_lit_states: usize) {
        self.probs.truncate(num_lit_states);
        reset_rows(&mut self.probs);
        self.probs.resize(num_lit_states, [PROB_INIT; LITERAL_CODER_SIZE]);
    }

    /// Coder index from the low `lp` position bits and the top `lc` bits
    /// of the previous byte.
    #[inline]
    pub fn get_state(pos: u64, prev_byte: u8, lc: u32, lp: u32) -> usize {
        let pos_bits = (pos & ((1u64 << lp) - 1)) as usize;
        let byte_bits = usize::from(prev_byte) >> (8 - lc);
        (pos_bits << lc) | byte_bits
    }
}

/// Slot trees, the shared reverse trees for mid-range slots, and the
/// alignment tree.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    /// One 6-bit slot tree per [`dist_state`].
    pub slot: [[u16; DIST_SLOTS]; DIST_STATES],
    /// Reverse bit-tree probabilities shared by slots 4..14.
    pub special: [u16; DIST_SPECIAL_SIZE],
    /// Reverse tree for the four lowest distance bits.
    pub align: [u16; DIST_ALIGN_SIZE],
}

impl DistanceModel {
    /// All slots at one half.
    pub fn new() -> Self {
        Self {
            slot: [[PROB_INIT; DIST_SLOTS]; DIST_STATES],
            special: [PROB_INIT; DIST_SPECIAL_SIZE],
            align: [PROB_INIT; DIST_ALIGN_SIZE],
        }
    }

    /// Put every slot back to one half.
    pub fn reset(&mut self) {
        reset_rows(&mut self.slot);
        self.special.fill(PROB_INIT);
        self.align.fill(PROB_INIT);
    }
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Distance context for a match length.
#[inline]
pub fn dist_state(len: usize) -> usize {
    (len - MATCH_LEN_MIN).min(DIST_STATES - 1)
}

/// Distance slot of a zero-based distance: twice the bit length minus
/// two, plus the bit under the leading one.
#[inline]
pub fn dist_slot(dist: u32) -> u32 {
    if dist < START_POS_MODEL_INDEX {
        return dist;
    }
    let top = 31 - dist.leading_zeros();
    (top << 1) | ((dist >> (top - 1)) & 1)
}

/// Base distance and number of extra bits for a slot >= 4.
#[inline]
pub fn slot_base(slot: u32) -> (u32, u32) {
    let footer_bits = (slot >> 1) - 1;
    ((2 | (slot & 1)) << footer_bits, footer_bits)
}

/// Offset into [`DistanceModel::special`] of the reverse bit tree for
/// `slot`, a slot in `4..14`.
///
/// Bit trees index from node 1, so the tree occupies
/// `offset + 1 ..= offset + 2^footer_bits - 1` and the trees of
/// neighbouring slots sit back to back.
#[inline]
pub fn special_offset(slot: u32) -> usize {
    let (base, _) = slot_base(slot);
    (base - slot) as usize
}

/// Every probability table the coder needs, plus the parameters that
/// shape them.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// Parameters the literal and position contexts are derived from.
    pub props: LzmaProperties,

    /// Literal (0) or match (1), per state and `pos_state`.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// New distance (0) or repeated distance (1).
    pub is_rep: [u16; NUM_STATES],
    /// rep0 (0) or an older rep (1).
    pub is_rep0: [u16; NUM_STATES],
    /// rep1 (0) or rep2/rep3 (1).
    pub is_rep1: [u16; NUM_STATES],
    /// rep2 (0) or rep3 (1).
    pub is_rep2: [u16; NUM_STATES],
    /// Short rep of one byte (0) or a long rep0 (1).
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Lengths of new-distance matches.
    pub match_len: LengthModel,
    /// Lengths of long reps.
    pub rep_len: LengthModel,
    /// Literal coders.
    pub literal: LiteralModel,
    /// Distance coders.
    pub distance: DistanceModel,
}

impl LzmaModel {
    /// Fresh tables sized for `props`.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep0: [PROB_INIT; NUM_STATES],
            is_rep1: [PROB_INIT; NUM_STATES],
            is_rep2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            match_len: LengthModel::new(),
            rep_len: LengthModel::new(),
            literal: LiteralModel::new(props.num_lit_states()),
            distance: DistanceModel::new(),
        }
    }

    /// Put every slot back to one half.
    pub fn reset(&mut self) {
        reset_rows(&mut self.is_match);
        reset_rows(&mut self.is_rep0_long);
        for row in [
            &mut self.is_rep,
            &mut self.is_rep0,
            &mut self.is_rep1,
            &mut self.is_rep2,
        ] {
            row.fill(PROB_INIT);
        }
        self.match_len.reset();
        self.rep_len.reset();
        self.literal.reset(self.props.num_lit_states());
        self.distance.reset();
    }

    /// Switch to new properties and reset all probabilities.
    pub fn reset_with(&mut self, props: LzmaProperties) {
        self.props = props;
        self.reset();
    }

    /// Literal coder index for the byte at `pos` following `prev_byte`.
    #[inline]
    pub fn literal_state(&self, pos: u64, prev_byte: u8) -> usize {
        LiteralModel::get_state(pos, prev_byte, self.props.lc, self.props.lp)
    }

    /// `pos_state` for the byte at `pos`.
    #[inline]
    pub fn pos_state(&self, pos: u64) -> usize {
        (pos & self.props.pos_mask()) as usize
    }
}
