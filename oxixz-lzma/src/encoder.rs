//! LZMA compression.
//!
//! [`LzmaEncoder`] turns buffered input into LZMA symbols one at a time. The
//! LZMA2 layer decides where chunks begin and end and owns the range encoder
//! each chunk is written to.
//!
//! ## Parsing
//!
//! Matches are chosen greedily with one step of lazy evaluation:
//! - a repeat match wins if it is at most one byte shorter than the best
//!   hash-chain match,
//! - a new match is postponed by one literal if the next position has a
//!   strictly longer one,
//! - a single byte equal to the byte at the last distance becomes a short rep.

use crate::LzmaLevel;
use crate::match_finder::{HASH_MATCH_MIN, MatchFinder};
use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_POS_MODEL_INDEX, LEN_HIGH_BITS, LEN_LOW_BITS,
    LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LengthModel, LzmaModel, LzmaProperties,
    MATCH_LEN_MAX, MATCH_LEN_MIN, START_POS_MODEL_INDEX, State, dist_slot, dist_state, slot_base,
    special_offset,
};
use crate::range_coder::RangeEncoder;

/// Distance above which a 3-byte match costs more than three literals.
const SHORT_MATCH_MAX_DIST: usize = 4096;

/// Encode a match length.
fn encode_length(rc: &mut RangeEncoder, len_model: &mut LengthModel, len: usize, pos_state: usize) {
    let len = len - MATCH_LEN_MIN;

    if len < LEN_LOW_SYMBOLS {
        rc.encode_bit(&mut len_model.choice, 0);
        rc.encode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS, len as u32);
    } else if len < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 0);
        rc.encode_bit_tree(
            &mut len_model.mid[pos_state],
            LEN_MID_BITS,
            (len - LEN_LOW_SYMBOLS) as u32,
        );
    } else {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 1);
        rc.encode_bit_tree(
            &mut len_model.high,
            LEN_HIGH_BITS,
            (len - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32,
        );
    }
}

/// What to emit at the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Literal,
    ShortRep,
    Rep { index: usize, len: usize },
    Match { dist: usize, len: usize },
}

/// LZMA symbol encoder.
#[derive(Debug, Clone)]
pub struct LzmaEncoder {
    /// Probability model.
    model: LzmaModel,
    /// State machine.
    state: State,
    /// Zero-based rep distances.
    reps: [u32; 4],
    /// Buffered input and match finder.
    finder: MatchFinder,
    /// Absolute position of the next byte to encode.
    cursor: u64,
}

impl LzmaEncoder {
    /// Create an encoder.
    ///
    /// `level` selects the match finder effort.
    pub fn new(props: LzmaProperties, dict_size: u32, level: LzmaLevel) -> Self {
        let (depth, nice_len) = level.search_params();
        Self {
            model: LzmaModel::new(props),
            state: State::new(),
            reps: [0; 4],
            finder: MatchFinder::new(dict_size as usize, depth, nice_len),
            cursor: 0,
        }
    }

    /// Current properties.
    pub fn props(&self) -> LzmaProperties {
        self.model.props
    }

    /// Reset probabilities, the state machine and the rep distances.
    pub fn reset_state(&mut self) {
        self.model.reset();
        self.state = State::new();
        self.reps = [0; 4];
    }

    /// Discard all buffered input and start over at position 0.
    pub fn reset(&mut self) {
        self.reset_state();
        self.finder.reset();
        self.cursor = 0;
    }

    /// Buffer more input.
    pub fn feed(&mut self, data: &[u8]) {
        self.finder.append(data);
    }

    /// Absolute position of the next byte to encode.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Buffered bytes not yet encoded.
    pub fn lookahead(&self) -> usize {
        self.finder.available(self.cursor)
    }

    /// Already encoded bytes starting at `start`.
    pub fn raw(&self, start: u64, len: usize) -> &[u8] {
        self.finder.slice(start, len)
    }

    /// Let the match finder drop input before `keep_from` that lies outside
    /// the dictionary.
    pub fn release_before(&mut self, keep_from: u64) {
        let dict_start = self.cursor.saturating_sub(self.finder.dict_size() as u64);
        self.finder.trim(keep_from.min(dict_start));
    }

    /// Encode one symbol covering at most `limit` bytes.
    ///
    /// Returns the number of input bytes consumed, or 0 when nothing is
    /// buffered or `limit` is 0.
    pub fn encode_symbol(&mut self, rc: &mut RangeEncoder, limit: usize) -> usize {
        let avail = self.lookahead().min(limit).min(MATCH_LEN_MAX);
        if avail == 0 {
            return 0;
        }

        let symbol = self.choose(avail);
        let pos = self.cursor;
        let pos_state = self.model.pos_state(pos);
        let state_idx = self.state.value();

        let consumed = match symbol {
            Symbol::Literal => {
                rc.encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);
                self.encode_literal(rc, pos);
                self.state.update_literal();
                1
            }
            Symbol::ShortRep => {
                rc.encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                rc.encode_bit(&mut self.model.is_rep[state_idx], 1);
                rc.encode_bit(&mut self.model.is_rep0[state_idx], 0);
                rc.encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], 0);
                self.state.update_short_rep();
                1
            }
            Symbol::Rep { index, len } => {
                rc.encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                rc.encode_bit(&mut self.model.is_rep[state_idx], 1);
                if index == 0 {
                    rc.encode_bit(&mut self.model.is_rep0[state_idx], 0);
                    rc.encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], 1);
                } else {
                    rc.encode_bit(&mut self.model.is_rep0[state_idx], 1);
                    if index == 1 {
                        rc.encode_bit(&mut self.model.is_rep1[state_idx], 0);
                    } else {
                        rc.encode_bit(&mut self.model.is_rep1[state_idx], 1);
                        rc.encode_bit(&mut self.model.is_rep2[state_idx], (index - 2) as u32);
                    }
                    let dist = self.reps[index];
                    self.reps.copy_within(0..index, 1);
                    self.reps[0] = dist;
                }
                encode_length(rc, &mut self.model.rep_len, len, pos_state);
                self.state.update_long_rep();
                len
            }
            Symbol::Match { dist, len } => {
                rc.encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
                encode_length(rc, &mut self.model.match_len, len, pos_state);
                let dist = (dist - 1) as u32;
                self.encode_distance(rc, dist, len);
                self.reps = [dist, self.reps[0], self.reps[1], self.reps[2]];
                self.state.update_match();
                len
            }
        };

        self.cursor += consumed as u64;
        consumed
    }

    /// Bytes of history a distance may reach at `pos`.
    #[inline]
    fn history(&self, pos: u64) -> usize {
        pos.min(self.finder.dict_size() as u64) as usize
    }

    /// Pick the symbol for the current position.
    fn choose(&mut self, avail: usize) -> Symbol {
        let pos = self.cursor;
        let history = self.history(pos);

        let mut best_rep: Option<(usize, usize)> = None;
        if avail >= MATCH_LEN_MIN {
            for (index, &rep) in self.reps.iter().enumerate() {
                let dist = rep as usize + 1;
                if dist > history {
                    continue;
                }
                let len = self.finder.match_len(pos, dist, avail);
                if len >= MATCH_LEN_MIN && best_rep.is_none_or(|(_, l)| len > l) {
                    best_rep = Some((index, len));
                }
            }
        }

        let main = self
            .finder
            .find_longest(pos, avail, history)
            .filter(|&(len, dist)| len > HASH_MATCH_MIN || dist <= SHORT_MATCH_MAX_DIST);
        let main_len = main.map_or(0, |(len, _)| len);

        if let Some((index, len)) = best_rep {
            if len + 1 >= main_len {
                return Symbol::Rep { index, len };
            }
        }

        if let Some((len, dist)) = main {
            let next_len = if avail > len {
                self.finder
                    .find_longest(pos + 1, avail - 1, self.history(pos + 1))
                    .map_or(0, |(next, _)| next)
            } else {
                0
            };
            if next_len <= len {
                return Symbol::Match { dist, len };
            }
        }

        let rep0 = self.reps[0] as usize + 1;
        if rep0 <= history && self.finder.byte_at(pos) == self.finder.byte_at(pos - rep0 as u64) {
            return Symbol::ShortRep;
        }

        Symbol::Literal
    }

    /// Encode the literal at `pos`.
    fn encode_literal(&mut self, rc: &mut RangeEncoder, pos: u64) {
        let prev_byte = if pos > 0 { self.finder.byte_at(pos - 1) } else { 0 };
        let lit_state = self.model.literal_state(pos, prev_byte);
        let byte = self.finder.byte_at(pos) as usize;
        let probs = &mut self.model.literal.probs[lit_state];

        let mut context = 1usize;
        let mut i = 8;

        if !self.state.is_literal() {
            let match_byte = self.finder.byte_at(pos - self.reps[0] as u64 - 1) as usize;
            while i > 0 {
                i -= 1;
                let bit = (byte >> i) & 1;
                let match_bit = (match_byte >> i) & 1;
                rc.encode_bit(&mut probs[0x100 + (match_bit << 8) + context], bit as u32);
                context = (context << 1) | bit;
                if bit != match_bit {
                    break;
                }
            }
        }

        while i > 0 {
            i -= 1;
            let bit = (byte >> i) & 1;
            rc.encode_bit(&mut probs[context], bit as u32);
            context = (context << 1) | bit;
        }
    }

    /// Encode a zero-based distance.
    fn encode_distance(&mut self, rc: &mut RangeEncoder, dist: u32, len: usize) {
        let dist_model = &mut self.model.distance;
        let slot = dist_slot(dist);
        rc.encode_bit_tree(&mut dist_model.slot[dist_state(len)], DIST_SLOT_BITS, slot);

        if slot < START_POS_MODEL_INDEX {
            return;
        }

        let (base, footer_bits) = slot_base(slot);
        let extra = dist - base;
        if slot < END_POS_MODEL_INDEX {
            let offset = special_offset(slot);
            rc.encode_bit_tree_reverse(&mut dist_model.special[offset..], footer_bits, extra);
        } else {
            rc.encode_direct_bits(extra >> DIST_ALIGN_BITS, footer_bits - DIST_ALIGN_BITS);
            rc.encode_bit_tree_reverse(
                &mut dist_model.align,
                DIST_ALIGN_BITS,
                extra & ((1 << DIST_ALIGN_BITS) - 1),
            );
        }
    }
}
