//! This module contains the modulation matrix: eight routes, each combining
//! two [ModSrc] slots with a [ModOp] and adding the scaled result into up to
//! two generic [ModDst] accumulators plus two hard wired groups of direct
//! destinations.
//!
//! Sources are signed 16 bit values refreshed by the generators before the
//! matrix runs.  Destinations are signed 32 bit accumulators, zeroed at the
//! start of every evaluation.

use core::ops::Index;

mod types;
pub use types::*;

/// The number of routes in a modulation matrix
pub const NUM_ROUTES: usize = 8;

/// Scale `value` by a centered depth byte: 128 contributes nothing, 0 and
/// 255 roughly double the value with opposite signs
pub const fn depth_scale(value: i32, depth: u8) -> i32 {
    (depth as i32 - 128) * value / 64
}

/// The current value of every modulation source
#[derive(Clone, Debug, PartialEq)]
pub struct ModSources {
    values: [i16; ModSrc::numel()],
}

impl Default for ModSources {
    fn default() -> Self {
        Self {
            values: [0; ModSrc::numel()],
        }
    }
}

impl ModSources {
    /// Set the value of a source
    pub fn set(&mut self, src: ModSrc, value: i16) {
        self.values[src as usize] = value;
    }
    /// Get the value of a source
    pub fn get(&self, src: ModSrc) -> i16 {
        self.values[src as usize]
    }
    /// All values, indexed by slot
    pub fn values(&self) -> &[i16] {
        &self.values
    }
}

impl Index<ModSrc> for ModSources {
    type Output = i16;
    fn index(&self, src: ModSrc) -> &i16 {
        &self.values[src as usize]
    }
}

/// The accumulated value of every modulation destination
#[derive(Clone, Debug, PartialEq)]
pub struct ModDestinations {
    values: [i32; ModDst::numel()],
}

impl Default for ModDestinations {
    fn default() -> Self {
        Self {
            values: [0; ModDst::numel()],
        }
    }
}

impl ModDestinations {
    /// Zero every accumulator
    pub fn clear(&mut self) {
        self.values = [0; ModDst::numel()];
    }
    /// Get the accumulated value of a destination
    pub fn get(&self, dst: ModDst) -> i32 {
        self.values[dst as usize]
    }
    /// Saturating add into a destination
    pub fn add(&mut self, dst: ModDst, value: i32) {
        let slot = &mut self.values[dst as usize];
        *slot = slot.saturating_add(value);
    }
}

impl Index<ModDst> for ModDestinations {
    type Output = i32;
    fn index(&self, dst: ModDst) -> &i32 {
        &self.values[dst as usize]
    }
}

/// One input of a route
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteSource {
    /// Always 0
    #[default]
    Off,
    /// Half the value of a source slot
    Slot(ModSrc),
    /// A constant 0..=0x7F, scaled to 0..=0x38F0
    Literal(u8),
}

impl RouteSource {
    /// Decode a patch source byte
    pub fn from_byte(byte: u8) -> Self {
        if byte & 0x80 != 0 {
            Self::Literal(byte & 0x7F)
        } else if byte == 0 {
            Self::Off
        } else {
            match ModSrc::new_from_u8(byte - 1) {
                Some(src) => Self::Slot(src),
                None => {
                    log::debug!("ignoring modulation source {}", byte);
                    Self::Off
                }
            }
        }
    }
    /// Encode as a patch source byte
    pub const fn to_byte(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Slot(src) => *src as u8 + 1,
            Self::Literal(val) => 0x80 | (*val & 0x7F),
        }
    }
    /// The value of this input given the current sources
    pub fn resolve(&self, sources: &ModSources) -> i32 {
        match self {
            Self::Off => 0,
            Self::Slot(src) => sources[*src] as i32 / 2,
            Self::Literal(val) => (*val as i32 & 0x7F) * 0x38F0 / 0x7F,
        }
    }
}

/// One route of the modulation matrix, see the patch layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModRoute {
    /// First input
    pub src1: RouteSource,
    /// Second input
    pub src2: RouteSource,
    /// Operator combining the inputs
    pub op: ModOp,
    /// Negate the contribution to `dst1` and the left direct group
    pub invert1: bool,
    /// Negate the contribution to `dst2` and the right direct group
    pub invert2: bool,
    /// Scaling, 128 disables the route
    pub depth: u8,
    /// Bitmask over [ModDst::DIRECT_L]
    pub direct_l: u8,
    /// Bitmask over [ModDst::DIRECT_R]
    pub direct_r: u8,
    /// First generic destination
    pub dst1: Option<ModDst>,
    /// Second generic destination
    pub dst2: Option<ModDst>,
}

impl Default for ModRoute {
    fn default() -> Self {
        Self {
            src1: RouteSource::Off,
            src2: RouteSource::Off,
            op: ModOp::Off,
            invert1: false,
            invert2: false,
            depth: 128,
            direct_l: 0,
            direct_r: 0,
            dst1: None,
            dst2: None,
        }
    }
}

fn decode_dst(byte: u8) -> Option<ModDst> {
    match byte {
        0 => None,
        b => {
            let dst = ModDst::new_from_u8(b - 1);
            if dst.is_none() {
                log::debug!("ignoring modulation destination {}", b);
            }
            dst
        }
    }
}

fn encode_dst(dst: Option<ModDst>) -> u8 {
    dst.map_or(0, |d| d as u8 + 1)
}

impl ModRoute {
    /// The size of an encoded route
    pub const SIZE: usize = 8;
    /// A route from `src` to `dst` with source 1 passed through
    pub fn simple(src: ModSrc, dst: ModDst, depth: u8) -> Self {
        Self {
            src1: RouteSource::Slot(src),
            op: ModOp::Src1,
            depth,
            dst1: Some(dst),
            ..Default::default()
        }
    }
    /// Decode `[src1, src2, op, depth, direct L, direct R, dst1, dst2]`
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            src1: RouteSource::from_byte(bytes[0]),
            src2: RouteSource::from_byte(bytes[1]),
            op: ModOp::from_nibble(bytes[2]),
            invert1: bytes[2] & 0x40 != 0,
            invert2: bytes[2] & 0x80 != 0,
            depth: bytes[3],
            direct_l: bytes[4],
            direct_r: bytes[5],
            dst1: decode_dst(bytes[6]),
            dst2: decode_dst(bytes[7]),
        }
    }
    /// Encode to the patch layout
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.src1.to_byte(),
            self.src2.to_byte(),
            self.op as u8 | (self.invert1 as u8) << 6 | (self.invert2 as u8) << 7,
            self.depth,
            self.direct_l,
            self.direct_r,
            encode_dst(self.dst1),
            encode_dst(self.dst2),
        ]
    }
    /// True if this route cannot contribute anything
    pub const fn is_neutral(&self) -> bool {
        self.depth == 128
    }
}

/// The evaluation state of the modulation matrix
#[derive(Clone, Debug, Default)]
pub struct ModMatrix {
    sh_negative: u8,
    sh_value: [i32; NUM_ROUTES],
}

impl ModMatrix {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }
    /// Forget the sample and hold state (on patch load)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn apply(&mut self, route_idx: usize, op: ModOp, s1: i32, s2: i32) -> i32 {
        match op {
            ModOp::Off | ModOp::Nop => 0,
            ModOp::Src1 => s1,
            ModOp::Src2 => s2,
            ModOp::Add => s1 + s2,
            ModOp::Sub => s1 - s2,
            ModOp::Mul => s1 * s2 / 8192,
            ModOp::Xor => s1 ^ s2,
            ModOp::Or => s1 | s2,
            ModOp::And => s1 & s2,
            ModOp::Min => s1.min(s2),
            ModOp::Max => s1.max(s2),
            ModOp::Lt => {
                if s1 < s2 {
                    0x7FFF
                } else {
                    0
                }
            }
            ModOp::Gt => {
                if s1 > s2 {
                    0x7FFF
                } else {
                    0
                }
            }
            ModOp::Eq => {
                if (s1 - s2).abs() <= 64 {
                    0x7FFF
                } else {
                    0
                }
            }
            ModOp::SampleHold => {
                let bit = 1u8 << route_idx;
                let was_negative = self.sh_negative & bit != 0;
                if was_negative && s2 >= 0 {
                    self.sh_value[route_idx] = s1;
                }
                if s2 < 0 {
                    self.sh_negative |= bit;
                } else {
                    self.sh_negative &= !bit;
                }
                self.sh_value[route_idx]
            }
        }
    }

    /// Evaluate all routes: zero `dst`, then accumulate each route's
    /// contribution.  The unscaled result of route `i` is written back into
    /// the `Mod(i)` source slot.
    pub fn evaluate(
        &mut self,
        routes: &[ModRoute; NUM_ROUTES],
        src: &mut ModSources,
        dst: &mut ModDestinations,
    ) {
        dst.clear();
        for (i, route) in routes.iter().enumerate() {
            if route.is_neutral() {
                continue;
            }
            let s1 = route.src1.resolve(src);
            let s2 = route.src2.resolve(src);
            let result = crate::clamp_i16(self.apply(i, route.op, s1, s2));
            src.set(ModSrc::route(i), result);
            if result == 0 {
                continue;
            }
            let scaled = depth_scale(result as i32, route.depth);
            let (group1, group2) = (
                if route.invert1 { -scaled } else { scaled },
                if route.invert2 { -scaled } else { scaled },
            );
            if let Some(d) = route.dst1 {
                dst.add(d, group1);
            }
            if let Some(d) = route.dst2 {
                dst.add(d, group2);
            }
            for bit in 0..8 {
                if route.direct_l & (1 << bit) != 0 {
                    dst.add(ModDst::DIRECT_L[bit], group1);
                }
                if route.direct_r & (1 << bit) != 0 {
                    dst.add(ModDst::DIRECT_R[bit], group2);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> ModSources {
        let mut src = ModSources::default();
        src.set(ModSrc::Lfo1, 10000);
        src.set(ModSrc::Lfo2, -6000);
        src.set(ModSrc::Env1, 32000);
        src
    }

    fn eval(routes: &[ModRoute; NUM_ROUTES]) -> ModDestinations {
        let mut matrix = ModMatrix::new();
        let mut src = sources();
        let mut dst = ModDestinations::default();
        matrix.evaluate(routes, &mut src, &mut dst);
        dst
    }

    #[test]
    fn neutral_depth_contributes_nothing() {
        let mut routes = [ModRoute::default(); NUM_ROUTES];
        for (i, op) in ModOp::ELEM.iter().enumerate() {
            let r = &mut routes[i % NUM_ROUTES];
            r.src1 = RouteSource::Slot(ModSrc::Env1);
            r.src2 = RouteSource::Literal(0x7F);
            r.op = *op;
            r.depth = 128;
            r.dst1 = Some(ModDst::Pitch1);
            r.dst2 = Some(ModDst::Filter1);
            r.direct_l = 0xFF;
            r.direct_r = 0xFF;
        }
        let dst = eval(&routes);
        assert_eq!(dst, ModDestinations::default());
    }

    #[test]
    fn routes_are_additive() {
        let a = ModRoute::simple(ModSrc::Lfo1, ModDst::Pitch1, 160);
        let b = ModRoute::simple(ModSrc::Lfo2, ModDst::Pitch1, 96);
        let mut only_a = [ModRoute::default(); NUM_ROUTES];
        only_a[0] = a;
        let mut only_b = [ModRoute::default(); NUM_ROUTES];
        only_b[1] = b;
        let mut both = [ModRoute::default(); NUM_ROUTES];
        both[0] = a;
        both[1] = b;
        let sum = eval(&only_a)[ModDst::Pitch1] + eval(&only_b)[ModDst::Pitch1];
        assert_eq!(eval(&both)[ModDst::Pitch1], sum);
        assert_eq!(eval(&only_a)[ModDst::Pitch1], 32 * 5000 / 64);
        assert_eq!(eval(&only_b)[ModDst::Pitch1], -32 * -3000 / 64);
    }

    #[test]
    fn literal_scaling() {
        let src = ModSources::default();
        assert_eq!(RouteSource::Literal(0x7F).resolve(&src), 0x38F0);
        assert_eq!(RouteSource::Literal(0).resolve(&src), 0);
        assert_eq!(RouteSource::from_byte(0xFF), RouteSource::Literal(0x7F));
        assert_eq!(RouteSource::from_byte(1), RouteSource::Slot(ModSrc::Env1));
        assert_eq!(RouteSource::from_byte(31), RouteSource::Off);
    }

    #[test]
    fn feedback_slot_holds_unscaled_result() {
        let mut routes = [ModRoute::default(); NUM_ROUTES];
        routes[2] = ModRoute {
            src1: RouteSource::Slot(ModSrc::Lfo1),
            src2: RouteSource::Slot(ModSrc::Lfo2),
            op: ModOp::Add,
            depth: 255,
            ..Default::default()
        };
        let mut matrix = ModMatrix::new();
        let mut src = sources();
        let mut dst = ModDestinations::default();
        matrix.evaluate(&routes, &mut src, &mut dst);
        assert_eq!(src[ModSrc::Mod3], 2000);
    }

    #[test]
    fn inversion_and_direct_groups() {
        let mut routes = [ModRoute::default(); NUM_ROUTES];
        routes[0] = ModRoute {
            src1: RouteSource::Slot(ModSrc::Lfo1),
            op: ModOp::Src1,
            invert1: true,
            depth: 192,
            direct_l: 0b0000_0001,
            direct_r: 0b1000_0000,
            ..Default::default()
        };
        let dst = eval(&routes);
        assert_eq!(dst[ModDst::Pitch1], -5000);
        assert_eq!(dst[ModDst::Volume2], 5000);
        assert_eq!(dst[ModDst::Pitch4], 0);
    }

    #[test]
    fn operators() {
        let mut matrix = ModMatrix::new();
        assert_eq!(matrix.apply(0, ModOp::Mul, 8192, 100), 100);
        assert_eq!(matrix.apply(0, ModOp::Lt, 1, 2), 0x7FFF);
        assert_eq!(matrix.apply(0, ModOp::Gt, 1, 2), 0);
        assert_eq!(matrix.apply(0, ModOp::Eq, 100, 164), 0x7FFF);
        assert_eq!(matrix.apply(0, ModOp::Eq, 100, 165), 0);
        assert_eq!(matrix.apply(0, ModOp::Min, -5, 3), -5);
        assert_eq!(matrix.apply(0, ModOp::Nop, 5, 3), 0);
    }

    #[test]
    fn sample_and_hold_latches_on_transition() {
        let mut matrix = ModMatrix::new();
        assert_eq!(matrix.apply(1, ModOp::SampleHold, 100, 5), 0);
        assert_eq!(matrix.apply(1, ModOp::SampleHold, 200, -5), 0);
        assert_eq!(matrix.apply(1, ModOp::SampleHold, 300, 0), 300);
        assert_eq!(matrix.apply(1, ModOp::SampleHold, 400, 10), 300);
        // other routes have their own transition memory
        assert_eq!(matrix.apply(2, ModOp::SampleHold, 500, 10), 0);
        matrix.reset();
        assert_eq!(matrix.apply(1, ModOp::SampleHold, 400, 10), 0);
    }

    #[test]
    fn route_bytes() {
        let bytes = [0x03, 0x85, 0x43, 0x90, 0x01, 0x02, 0x01, 0x29];
        let route = ModRoute::from_bytes(&bytes);
        assert_eq!(route.src1, RouteSource::Slot(ModSrc::Lfo1));
        assert_eq!(route.src2, RouteSource::Literal(5));
        assert_eq!(route.op, ModOp::Add);
        assert!(route.invert1);
        assert!(!route.invert2);
        assert_eq!(route.dst1, Some(ModDst::Pitch1));
        assert_eq!(route.dst2, None);
        let mut expected = bytes;
        expected[7] = 0;
        assert_eq!(route.to_bytes(), expected);
    }
}
