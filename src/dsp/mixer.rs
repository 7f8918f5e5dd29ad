//! Master bus — sums the dry signal with the effect returns.

/// Final mix stage: `dry * dry_level + (echo + reverb) * wet_level`.
///
/// The sum is linear up to full scale. Beyond it the output is either hard
/// limited to ±1, like a device output, or tanh-saturated when
/// `soft_clip` is set.
#[derive(Debug, Clone)]
pub struct MasterBus {
    pub dry_level: f32,
    pub wet_level: f32,
    pub soft_clip: bool,
}

impl MasterBus {
    pub fn new(dry_level: f64, wet_level: f64, soft_clip: bool) -> Self {
        MasterBus {
            dry_level: dry_level as f32,
            wet_level: wet_level as f32,
            soft_clip,
        }
    }

    /// Mix one stereo frame.
    #[inline]
    pub fn mix(&self, dry: (f32, f32), echo: (f32, f32), reverb: (f32, f32)) -> (f32, f32) {
        let l = dry.0 * self.dry_level + (echo.0 + reverb.0) * self.wet_level;
        let r = dry.1 * self.dry_level + (echo.1 + reverb.1) * self.wet_level;
        (self.limit(l), self.limit(r))
    }

    #[inline]
    fn limit(&self, x: f32) -> f32 {
        if self.soft_clip {
            soft_clip(x)
        } else {
            x.clamp(-1.0, 1.0)
        }
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}
