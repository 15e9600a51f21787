//! Two-terminal complex impedance arithmetic.
//!
//! `Impedance` wraps a `Complex64` and has no `Div` operator. Every quotient
//! goes through [`Impedance::div`] or [`Impedance::over`], which return zero
//! instead of NaN or infinity when the denominator vanishes.

use num_complex::Complex64;
use rfm::consts::VSWR_SENTINEL;
use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

/// Squared-magnitude threshold below which a denominator counts as zero.
pub const DIV_EPSILON: f64 = 1e-20;

/// Complex impedance `R + jX` in ohms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Impedance(Complex64);

impl Impedance {
    /// Zero impedance (short).
    pub const ZERO: Impedance = Impedance(Complex64::new(0.0, 0.0));

    /// Create from resistance and reactance.
    #[inline]
    pub const fn new(r: f64, x: f64) -> Self {
        Self(Complex64::new(r, x))
    }

    /// Purely resistive element.
    #[inline]
    pub const fn resistor(r: f64) -> Self {
        Self::new(r, 0.0)
    }

    /// Ideal inductor `jωL`.
    #[inline]
    pub fn inductor(henry: f64, omega: f64) -> Self {
        Self::new(0.0, omega * henry)
    }

    /// Ideal capacitor `1/(jωC)`. A zero capacitance saturates to zero.
    #[inline]
    pub fn capacitor(farad: f64, omega: f64) -> Self {
        Self::resistor(1.0).div(Self::new(0.0, omega * farad))
    }

    /// Resistance (Ω).
    #[inline]
    pub fn r(self) -> f64 {
        self.0.re
    }

    /// Reactance (Ω).
    #[inline]
    pub fn x(self) -> f64 {
        self.0.im
    }

    /// |Z| in ohms.
    #[inline]
    pub fn magnitude(self) -> f64 {
        self.0.norm()
    }

    /// Phase angle in degrees.
    #[inline]
    pub fn phase_deg(self) -> f64 {
        self.0.arg() * 180.0 / PI
    }

    /// True when both parts are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.re.is_finite() && self.0.im.is_finite()
    }

    /// Guarded complex division. Returns zero when `|den|² < DIV_EPSILON`.
    #[inline]
    pub fn div(self, den: Impedance) -> Impedance {
        let d = den.0.norm_sqr();
        if d < DIV_EPSILON {
            return Impedance::ZERO;
        }
        Impedance(self.0 * den.0.conj() / d)
    }

    /// Guarded division by a real scalar. Returns zero when `den² < DIV_EPSILON`.
    #[inline]
    pub fn over(self, den: f64) -> Impedance {
        if den * den < DIV_EPSILON {
            return Impedance::ZERO;
        }
        Impedance(self.0 / den)
    }

    /// Parallel combination `(a·b)/(a+b)`.
    #[inline]
    pub fn parallel(self, other: Impedance) -> Impedance {
        (self * other).div(self + other)
    }

    /// Inverse of [`parallel`](Self::parallel): the impedance that, placed in
    /// parallel with `known`, yields `self`. Computed as `self·known/(known − self)`.
    #[inline]
    pub fn unparallel(self, known: Impedance) -> Impedance {
        (self * known).div(known - self)
    }
}

impl From<Complex64> for Impedance {
    fn from(z: Complex64) -> Self {
        Self(z)
    }
}

impl Add for Impedance {
    type Output = Impedance;

    fn add(self, rhs: Impedance) -> Impedance {
        Impedance(self.0 + rhs.0)
    }
}

impl Sub for Impedance {
    type Output = Impedance;

    fn sub(self, rhs: Impedance) -> Impedance {
        Impedance(self.0 - rhs.0)
    }
}

impl Mul for Impedance {
    type Output = Impedance;

    fn mul(self, rhs: Impedance) -> Impedance {
        Impedance(self.0 * rhs.0)
    }
}

impl Neg for Impedance {
    type Output = Impedance;

    fn neg(self) -> Impedance {
        Impedance(-self.0)
    }
}

/// Guarded real quotient. Returns zero when `den² < DIV_EPSILON`.
#[inline]
pub fn guarded_ratio(num: f64, den: f64) -> f64 {
    if den * den < DIV_EPSILON {
        return 0.0;
    }
    num / den
}

/// Voltage standing wave ratio of `z` against reference `z0` (real, ohms).
///
/// Returns [`VSWR_SENTINEL`] when `|Γ| ≥ 1`, when `z + z0` vanishes, or when
/// the input is not finite.
pub fn vswr(z: Impedance, z0: f64) -> f64 {
    let reference = Impedance::resistor(z0);
    let sum = z + reference;
    if !z.is_finite() || sum.0.norm_sqr() < DIV_EPSILON {
        return VSWR_SENTINEL;
    }
    let gamma = (z - reference).div(sum).magnitude();
    if !gamma.is_finite() || gamma >= 1.0 {
        return VSWR_SENTINEL;
    }
    (1.0 + gamma) / (1.0 - gamma)
}

/// `vswr` for separate resistance and reactance.
#[inline]
pub fn calculate_vswr(r: f64, x: f64, z0: f64) -> f64 {
    vswr(Impedance::new(r, x), z0)
}
