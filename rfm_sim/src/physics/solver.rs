//! Forward network solver (source → load).
//!
//! Inverts the reverse chain one stage at a time. The rational functions of
//! each stage were expanded by hand into polynomials in the node resistance
//! and reactance; [`PrecomputedCoefficients`] holds their numeric
//! coefficients, which depend only on the circuit constants and ω. Each
//! stage evaluation is then a short dot product followed by one guarded
//! division.

use rfm::matcher::types::ImpedanceNodes;

use super::constants::{CircuitConstants, pf};
use super::impedance::{Impedance, guarded_ratio, vswr};

/// Polynomial coefficients derived once from the circuit constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecomputedCoefficients {
    // ZA from (Rm, Xm): removes the series Lp and un-parallels Cp.
    pub denom_a_const: f64,
    pub denom_a_rm2: f64,
    pub denom_a_xm: f64,
    pub denom_a_xm2: f64,
    pub xa_const: f64,
    pub xa_rm2: f64,
    pub xa_xm: f64,
    pub xa_xm2: f64,

    // ZB from VVC0: resistance is constant.
    pub denom_b: f64,
    pub rb_const: f64,
    pub xb_numer_const: f64,
    pub xb_numer_vvc0: f64,

    // ZD from (RC, XC): removes the stage-C tank and un-parallels CC1.
    pub d_const: f64,
    pub d_rc2: f64,
    pub d_rc: f64,
    pub d_xc: f64,
    pub d_xc2: f64,
    pub rd_const: f64,
    pub rd_rc: f64,
    pub xd_const: f64,
    pub xd_rc2: f64,
    pub xd_rc: f64,
    pub xd_xc: f64,
    pub xd_xc2: f64,

    // ZE from (RD, XD, VVC1): removes VVC1 and un-parallels CD0.
    pub e_cd0_sq: f64,
    pub e_2cd0: f64,
    pub e_cd0_sq_w2: f64,
    pub e_2cd0_sq_w: f64,
    pub e_2cd0_w: f64,
    pub e_cd0_w2: f64,

    // Matching target at node A and the discriminant polynomial in RC.
    pub ra_goal: f64,
    pub xa_goal: f64,
    pub disc_const: f64,
    pub disc_rc: f64,
    pub disc_rc2: f64,
}

impl PrecomputedCoefficients {
    /// Expand every stage for the given constants.
    pub fn new(k: &CircuitConstants) -> Self {
        let w = k.omega;
        let w2 = w * w;
        let w3 = w2 * w;
        let w4 = w2 * w2;
        let w5 = w4 * w;
        let w6 = w3 * w3;

        let (lp, cp) = (k.lp, k.cp);
        let (lb0, rb0, cb0) = (k.lb0, k.rb0, k.cb0);
        let (rc0, lc0, cc0, cc1) = (k.rc0, k.lc0, k.cc0, k.cc1);
        let cd0 = k.cd0;

        let cp2 = cp * cp;
        let lp2 = lp * lp;

        let denom_a_const = 1.0 - 2.0 * cp * lp * w2 + cp2 * lp2 * w4;
        let denom_a_rm2 = cp2 * w2;
        let denom_a_xm = 2.0 * cp * w - 2.0 * cp2 * lp * w3;
        let denom_a_xm2 = cp2 * w2;
        let xa_const = -lp * w + cp * lp2 * w3;
        let xa_rm2 = cp * w;
        let xa_xm = 1.0 - 2.0 * cp * lp * w2;
        let xa_xm2 = cp * w;

        let rb02 = rb0 * rb0;
        let lb02 = lb0 * lb0;
        let cb02 = cb0 * cb0;
        let denom_b = 1.0 - 2.0 * cb0 * lb0 * w2 + cb02 * w2 * (rb02 + lb02 * w2);
        let rb_const = rb0 / denom_b;
        let xb_numer_const = 1.0 + cb02 * w2 * (rb02 + lb02 * w2) - 2.0 * cb0 * lb0 * w2;
        let xb_numer_vvc0 = -lb0 * w2 + cb0 * rb02 * w2 + cb0 * lb02 * w4;

        let lc02 = lc0 * lc0;
        let cc02 = cc0 * cc0;
        let cc12 = cc1 * cc1;
        let rc02 = rc0 * rc0;
        let d_const = 1.0 - 2.0 * cc0 * lc0 * w2 - 2.0 * cc1 * lc0 * w2
            + cc02 * rc02 * w2
            + 2.0 * cc0 * cc1 * rc02 * w2
            + cc12 * rc02 * w2
            + cc02 * lc02 * w4
            + 2.0 * cc0 * cc1 * lc02 * w4
            + cc12 * lc02 * w4;
        let d_rc2 = cc12 * w2 - 2.0 * cc0 * cc12 * lc0 * w4
            + cc02 * cc12 * rc02 * w4
            + cc02 * cc12 * lc02 * w6;
        let d_rc = -2.0 * cc12 * rc0 * w2;
        let d_xc = 2.0 * cc1 * w - 4.0 * cc0 * cc1 * lc0 * w3 - 2.0 * cc12 * lc0 * w3
            + 2.0 * cc02 * cc1 * rc02 * w3
            + 2.0 * cc0 * cc12 * rc02 * w3
            + 2.0 * cc02 * cc1 * lc02 * w5
            + 2.0 * cc0 * cc12 * lc02 * w5;
        let d_xc2 = d_rc2;
        let rd_const = -rc0;
        let rd_rc = 1.0 - 2.0 * cc0 * lc0 * w2 + cc02 * rc02 * w2 + cc02 * lc02 * w4;
        let xd_const = -lc0 * w + cc0 * rc02 * w + cc1 * rc02 * w + cc0 * lc02 * w3 + cc1 * lc02 * w3;
        let xd_rc2 = cc1 * w - 2.0 * cc0 * cc1 * lc0 * w3
            + cc02 * cc1 * rc02 * w3
            + cc02 * cc1 * lc02 * w5;
        let xd_rc = -2.0 * cc1 * rc0 * w;
        let xd_xc = 1.0 - 2.0 * cc0 * lc0 * w2 - 2.0 * cc1 * lc0 * w2
            + cc02 * rc02 * w2
            + 2.0 * cc0 * cc1 * rc02 * w2
            + cc02 * lc02 * w4
            + 2.0 * cc0 * cc1 * lc02 * w4;
        let xd_xc2 = xd_rc2;

        let cd02 = cd0 * cd0;

        let z = k.z0;
        let denom_goal = 1.0 + z * z * cp2 * w2 - 2.0 * cp * lp * w2 + cp2 * lp2 * w4;
        let ra_goal = z / denom_goal;
        let xa_goal = w * (z * z * cp - lp + cp * lp2 * w2) / denom_goal;

        let rb = rb_const;
        let rb2 = rb * rb;
        let ra2 = ra_goal * ra_goal;
        let ra3 = ra2 * ra_goal;
        let xa2 = xa_goal * xa_goal;
        let disc_const = ra3 * rb - ra2 * rb2 + ra_goal * rb * xa2;
        let disc_rc = ra3 - 3.0 * ra2 * rb + 2.0 * ra_goal * rb2 + ra_goal * xa2 - rb * xa2;
        let disc_rc2 = -ra2 + 2.0 * ra_goal * rb - rb2;

        Self {
            denom_a_const,
            denom_a_rm2,
            denom_a_xm,
            denom_a_xm2,
            xa_const,
            xa_rm2,
            xa_xm,
            xa_xm2,
            denom_b,
            rb_const,
            xb_numer_const,
            xb_numer_vvc0,
            d_const,
            d_rc2,
            d_rc,
            d_xc,
            d_xc2,
            rd_const,
            rd_rc,
            xd_const,
            xd_rc2,
            xd_rc,
            xd_xc,
            xd_xc2,
            e_cd0_sq: cd02,
            e_2cd0: 2.0 * cd0,
            e_cd0_sq_w2: cd02 * w2,
            e_2cd0_sq_w: 2.0 * cd02 * w,
            e_2cd0_w: 2.0 * cd0 * w,
            e_cd0_w2: cd0 * w2,
            ra_goal,
            xa_goal,
            disc_const,
            disc_rc,
            disc_rc2,
        }
    }
}

/// Source → load solver over precomputed coefficients.
#[derive(Debug, Clone)]
pub struct ForwardSolver {
    constants: CircuitConstants,
    coeffs: PrecomputedCoefficients,
}

impl ForwardSolver {
    /// Precompute coefficients for the given constants.
    pub fn new(constants: CircuitConstants) -> Self {
        Self {
            coeffs: PrecomputedCoefficients::new(&constants),
            constants,
        }
    }

    pub fn constants(&self) -> &CircuitConstants {
        &self.constants
    }

    pub fn coefficients(&self) -> &PrecomputedCoefficients {
        &self.coeffs
    }

    /// Node A from the measured input impedance.
    pub fn calculate_za(&self, rm: f64, xm: f64) -> Impedance {
        let c = &self.coeffs;
        let rm2 = rm * rm;
        let xm2 = xm * xm;
        let denom = c.denom_a_const + c.denom_a_rm2 * rm2 + c.denom_a_xm * xm + c.denom_a_xm2 * xm2;
        let xa = c.xa_const + c.xa_rm2 * rm2 + c.xa_xm * xm + c.xa_xm2 * xm2;
        Impedance::new(rm, xa).over(denom)
    }

    /// Branch B for the given VVC0 value (pF).
    pub fn calculate_zb(&self, vvc0_pf: f64) -> Impedance {
        let c = &self.coeffs;
        let v = pf(vvc0_pf);
        let xb = guarded_ratio(
            -(c.xb_numer_const + c.xb_numer_vvc0 * v),
            v * self.constants.omega * c.denom_b,
        );
        Impedance::new(c.rb_const, xb)
    }

    /// Node C: the impedance that, in parallel with `zb`, yields `za`.
    pub fn calculate_zc(&self, za: Impedance, zb: Impedance) -> Impedance {
        za.unparallel(zb)
    }

    /// Node D from node C.
    pub fn calculate_zd(&self, zc: Impedance) -> Impedance {
        let c = &self.coeffs;
        let (rc, xc) = (zc.r(), zc.x());
        let rc2 = rc * rc;
        let xc2 = xc * xc;
        let denom = c.d_const + c.d_rc2 * rc2 + c.d_rc * rc + c.d_xc * xc + c.d_xc2 * xc2;
        let rd = c.rd_const + c.rd_rc * rc;
        let xd = c.xd_const + c.xd_rc2 * rc2 + c.xd_rc * rc + c.xd_xc * xc + c.xd_xc2 * xc2;
        Impedance::new(rd, xd).over(denom)
    }

    /// Node E from node D and the VVC1 value (pF).
    ///
    /// Numerator and denominator are both quadratic in capacitance, so they
    /// are divided by `CD0²` before the guarded quotient.
    pub fn calculate_ze(&self, zd: Impedance, vvc1_pf: f64) -> Impedance {
        let c = &self.coeffs;
        let w = self.constants.omega;
        let cd0 = self.constants.cd0;
        let scale = c.e_cd0_sq;
        let v = pf(vvc1_pf);
        let v2 = v * v;
        let (rd, xd) = (zd.r(), zd.x());
        let rd2 = rd * rd;
        let xd2 = xd * xd;
        let denom = (c.e_cd0_sq
            + c.e_2cd0 * v
            + v2
            + c.e_cd0_sq_w2 * rd2 * v2
            + c.e_2cd0_sq_w * v * xd
            + c.e_2cd0_w * v2 * xd
            + c.e_cd0_sq_w2 * v2 * xd2)
            / scale;
        let re = guarded_ratio(rd * v2 / scale, denom);
        let xe_numer = cd0 + v + c.e_cd0_w2 * rd2 * v2 + c.e_2cd0_w * v * xd + v2 * w * xd
            + c.e_cd0_w2 * v2 * xd2;
        let xe = guarded_ratio(xe_numer / scale, w * denom);
        Impedance::new(re, xe)
    }

    /// Implied load from node E.
    pub fn calculate_zp(&self, ze: Impedance) -> Impedance {
        let k = &self.constants;
        ze - Impedance::new(k.re0, k.omega * k.le0)
    }

    /// Walk every stage and report all node impedances.
    pub fn all_impedances(&self, rm: f64, xm: f64, vvc0_pf: f64, vvc1_pf: f64) -> ImpedanceNodes {
        let za = self.calculate_za(rm, xm);
        let zb = self.calculate_zb(vvc0_pf);
        let zc = self.calculate_zc(za, zb);
        let zd = self.calculate_zd(zc);
        let ze = self.calculate_ze(zd, vvc1_pf);
        let zp = self.calculate_zp(ze);
        ImpedanceNodes {
            ra: za.r(),
            xa: za.x(),
            rb: zb.r(),
            xb: zb.x(),
            rc: zc.r(),
            xc: zc.x(),
            rd: zd.r(),
            xd: zd.x(),
            re: ze.r(),
            xe: ze.x(),
            rp: zp.r(),
            xp: zp.x(),
            vswr: vswr(Impedance::new(rm, xm), self.constants.z0),
        }
    }
}
