//! LZMA decompression.
//!
//! [`LzmaDecoder`] holds the symbol-level state of an LZMA stream: the
//! probability model, the state machine, the four rep distances and any match
//! that did not fit into the caller's output. Bytes go into a shared
//! [`Window`], and compressed bits come from a [`RangeDecoder`] that the LZMA2
//! layer refills chunk by chunk, so decoding can stop at any byte boundary and
//! resume later.

use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_MARKER_DISTANCE, END_POS_MODEL_INDEX, LEN_HIGH_BITS,
    LEN_LOW_BITS, LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LengthModel, LzmaModel,
    LzmaProperties, MATCH_LEN_MIN, START_POS_MODEL_INDEX, State, dist_state, slot_base,
    special_offset,
};
use crate::range_coder::RangeDecoder;
use oxixz_core::error::{Result, XzError};
use oxixz_core::window::Window;

/// Decode a match length.
fn decode_length(
    rc: &mut RangeDecoder,
    len_model: &mut LengthModel,
    pos_state: usize,
) -> Result<usize> {
    let len = if rc.decode_bit(&mut len_model.choice)? == 0 {
        rc.decode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS)? as usize
    } else if rc.decode_bit(&mut len_model.choice2)? == 0 {
        LEN_LOW_SYMBOLS + rc.decode_bit_tree(&mut len_model.mid[pos_state], LEN_MID_BITS)? as usize
    } else {
        LEN_LOW_SYMBOLS
            + LEN_MID_SYMBOLS
            + rc.decode_bit_tree(&mut len_model.high, LEN_HIGH_BITS)? as usize
    };
    Ok(len + MATCH_LEN_MIN)
}

/// Resumable LZMA symbol decoder.
#[derive(Debug, Clone)]
pub struct LzmaDecoder {
    /// Probability model.
    model: LzmaModel,
    /// State machine.
    state: State,
    /// Zero-based rep distances.
    reps: [u32; 4],
    /// Bytes of the last match still to be copied.
    pending_len: usize,
}

impl LzmaDecoder {
    /// Create a decoder with the given properties.
    pub fn new(props: LzmaProperties) -> Self {
        Self {
            model: LzmaModel::new(props),
            state: State::new(),
            reps: [0; 4],
            pending_len: 0,
        }
    }

    /// Current properties.
    pub fn props(&self) -> LzmaProperties {
        self.model.props
    }

    /// Install new properties. Implies a state reset.
    pub fn set_props(&mut self, props: LzmaProperties) {
        self.model.props = props;
        self.reset_state();
    }

    /// Reset probabilities, the state machine and the rep distances.
    pub fn reset_state(&mut self) {
        self.model.reset();
        self.state = State::new();
        self.reps = [0; 4];
        self.pending_len = 0;
    }

    /// Whether a match is only partially copied.
    pub fn has_pending_match(&self) -> bool {
        self.pending_len > 0
    }

    /// Decode until exactly `limit` more bytes are in `window`.
    ///
    /// `limit` must not exceed [`Window::avail`]. A match that runs past
    /// `limit` is kept and finished by the next call.
    pub fn decode(
        &mut self,
        rc: &mut RangeDecoder,
        window: &mut Window,
        limit: usize,
    ) -> Result<usize> {
        debug_assert!(limit <= window.avail());
        let mut produced = 0;

        if self.pending_len > 0 {
            let want = self.pending_len.min(limit);
            let copied = window.copy_match(self.reps[0] as usize + 1, want)?;
            self.pending_len -= copied;
            produced += copied;
        }

        while produced < limit {
            let pos = window.total();
            let pos_state = self.model.pos_state(pos);
            let state_idx = self.state.value();

            if rc.decode_bit(&mut self.model.is_match[state_idx][pos_state])? == 0 {
                let byte = self.decode_literal(rc, window, pos)?;
                window.put(byte);
                self.state.update_literal();
                produced += 1;
                continue;
            }

            let len = if rc.decode_bit(&mut self.model.is_rep[state_idx])? == 0 {
                let len = decode_length(rc, &mut self.model.match_len, pos_state)?;
                let dist = self.decode_distance(rc, len)?;
                if dist == END_MARKER_DISTANCE {
                    return Err(XzError::corrupted(
                        pos,
                        "end-of-payload marker inside an LZMA2 chunk",
                    ));
                }
                self.reps = [dist, self.reps[0], self.reps[1], self.reps[2]];
                self.state.update_match();
                len
            } else if rc.decode_bit(&mut self.model.is_rep0[state_idx])? == 0 {
                if rc.decode_bit(&mut self.model.is_rep0_long[state_idx][pos_state])? == 0 {
                    let distance = self.reps[0] as usize + 1;
                    if distance > window.history() {
                        return Err(XzError::distance_too_far(distance, window.history()));
                    }
                    let byte = window.byte_at(distance);
                    window.put(byte);
                    self.state.update_short_rep();
                    produced += 1;
                    continue;
                }
                self.state.update_long_rep();
                decode_length(rc, &mut self.model.rep_len, pos_state)?
            } else {
                let dist = if rc.decode_bit(&mut self.model.is_rep1[state_idx])? == 0 {
                    self.reps[1]
                } else if rc.decode_bit(&mut self.model.is_rep2[state_idx])? == 0 {
                    let d = self.reps[2];
                    self.reps[2] = self.reps[1];
                    d
                } else {
                    let d = self.reps[3];
                    self.reps[3] = self.reps[2];
                    self.reps[2] = self.reps[1];
                    d
                };
                self.reps[1] = self.reps[0];
                self.reps[0] = dist;
                self.state.update_long_rep();
                decode_length(rc, &mut self.model.rep_len, pos_state)?
            };

            let want = len.min(limit - produced);
            let copied = window.copy_match(self.reps[0] as usize + 1, want)?;
            self.pending_len = len - copied;
            produced += copied;
        }

        Ok(produced)
    }

    /// Decode one literal at `pos`.
    fn decode_literal(&mut self, rc: &mut RangeDecoder, window: &Window, pos: u64) -> Result<u8> {
        let lit_state = self.model.literal_state(pos, window.byte_at(1));
        let probs = &mut self.model.literal.probs[lit_state];
        let mut symbol = 1usize;

        if !self.state.is_literal() {
            let mut match_byte = window.byte_at(self.reps[0] as usize + 1) as usize;
            while symbol < 0x100 {
                let match_bit = (match_byte >> 7) & 1;
                match_byte <<= 1;
                let bit = rc.decode_bit(&mut probs[0x100 + (match_bit << 8) + symbol])? as usize;
                symbol = (symbol << 1) | bit;
                if bit != match_bit {
                    break;
                }
            }
        }

        while symbol < 0x100 {
            let bit = rc.decode_bit(&mut probs[symbol])?;
            symbol = (symbol << 1) | bit as usize;
        }

        Ok((symbol - 0x100) as u8)
    }

    /// Decode a zero-based match distance.
    fn decode_distance(&mut self, rc: &mut RangeDecoder, len: usize) -> Result<u32> {
        let dist_model = &mut self.model.distance;
        let slot = rc.decode_bit_tree(&mut dist_model.slot[dist_state(len)], DIST_SLOT_BITS)?;

        if slot < START_POS_MODEL_INDEX {
            return Ok(slot);
        }

        let (base, footer_bits) = slot_base(slot);
        if slot < END_POS_MODEL_INDEX {
            let offset = special_offset(slot);
            let extra = rc.decode_bit_tree_reverse(&mut dist_model.special[offset..], footer_bits)?;
            Ok(base + extra)
        } else {
            let direct = rc.decode_direct_bits(footer_bits - DIST_ALIGN_BITS)?;
            let align = rc.decode_bit_tree_reverse(&mut dist_model.align, DIST_ALIGN_BITS)?;
            Ok(base + (direct << DIST_ALIGN_BITS) + align)
        }
    }
}
