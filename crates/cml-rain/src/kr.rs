//! k-R power-law inversion, §4.4 and the glossary entry: `A_specific = k ·
//! R^α`, inverted to `R` given total path attenuation and link length.
//!
//! `k` and `α` come from the ITU-R P.838 rain-specific-attenuation
//! regression model rather than a small hand-picked table, so the
//! coefficients are valid continuously across the link's actual frequency
//! instead of snapping to the nearest tabulated band.

use cml_common::Polarization;

struct GaussianTerm {
    a: f64,
    b: f64,
    c: f64,
}

const K_H_TERMS: [GaussianTerm; 4] = [
    GaussianTerm { a: -5.33980, b: -0.10008, c: 1.13098 },
    GaussianTerm { a: -0.35351, b: 1.26970, c: 0.45400 },
    GaussianTerm { a: -0.23789, b: 0.86036, c: 0.15354 },
    GaussianTerm { a: -0.94158, b: 0.64552, c: 0.16817 },
];
const K_H_M: f64 = -0.18961;
const K_H_C: f64 = 0.71147;

const K_V_TERMS: [GaussianTerm; 4] = [
    GaussianTerm { a: -3.80595, b: 0.56934, c: 0.81061 },
    GaussianTerm { a: -3.44965, b: -0.22911, c: 0.51059 },
    GaussianTerm { a: -0.39902, b: 0.73042, c: 0.11899 },
    GaussianTerm { a: 0.50167, b: 1.07319, c: 0.27195 },
];
const K_V_M: f64 = -0.16398;
const K_V_C: f64 = 0.63297;

const ALPHA_H_TERMS: [GaussianTerm; 5] = [
    GaussianTerm { a: -0.14318, b: 1.82442, c: -0.55187 },
    GaussianTerm { a: 0.29591, b: 0.77564, c: 0.19822 },
    GaussianTerm { a: 0.32177, b: 0.63773, c: 0.13164 },
    GaussianTerm { a: -5.37610, b: -0.96230, c: 1.47828 },
    GaussianTerm { a: 16.1721, b: -3.29980, c: 3.43990 },
];
const ALPHA_H_M: f64 = 0.67849;
const ALPHA_H_C: f64 = -1.95537;

const ALPHA_V_TERMS: [GaussianTerm; 5] = [
    GaussianTerm { a: -0.07771, b: 2.33840, c: -0.76284 },
    GaussianTerm { a: 0.56727, b: 0.95545, c: 0.54039 },
    GaussianTerm { a: -0.20238, b: 1.14520, c: 0.26809 },
    GaussianTerm { a: -48.2991, b: 0.791669, c: 0.116226 },
    GaussianTerm { a: 48.5833, b: 0.791459, c: 0.116479 },
];
const ALPHA_V_M: f64 = -0.053739;
const ALPHA_V_C: f64 = 0.83433;

fn regression_sum(terms: &[GaussianTerm], log_f: f64) -> f64 {
    terms
        .iter()
        .map(|t| t.a * (-((log_f - t.b) / t.c).powi(2)).exp())
        .sum()
}

/// `(k, alpha)` for a given frequency (GHz) and polarization, per ITU-R
/// P.838. Valid for `1 <= freq_ghz <= 100`.
pub fn k_r_coefficients(freq_ghz: f64, polarization: Polarization) -> (f64, f64) {
    let log_f = freq_ghz.max(1.0).log10();
    let (k_terms, k_m, k_c, a_terms, a_m, a_c) = match polarization {
        Polarization::Horizontal => (&K_H_TERMS[..], K_H_M, K_H_C, &ALPHA_H_TERMS[..], ALPHA_H_M, ALPHA_H_C),
        Polarization::Vertical => (&K_V_TERMS[..], K_V_M, K_V_C, &ALPHA_V_TERMS[..], ALPHA_V_M, ALPHA_V_C),
    };
    let log_k = regression_sum(k_terms, log_f) + k_m * log_f + k_c;
    let k = 10f64.powf(log_k);
    let alpha = regression_sum(a_terms, log_f) + a_m * log_f + a_c;
    (k, alpha)
}

/// Invert total path attenuation `a_db` (over `length_km`) to a
/// path-averaged rain rate in mm/h. Negative attenuation clips to a rain
/// rate of exactly `0.0`, per the testable-property `R >= 0`.
pub fn attenuation_to_rain_rate(a_db: f64, length_km: f64, freq_ghz: f64, polarization: Polarization) -> f64 {
    if a_db <= 0.0 || length_km <= 0.0 {
        return 0.0;
    }
    let (k, alpha) = k_r_coefficients(freq_ghz, polarization);
    let specific_attenuation = a_db / length_km;
    (specific_attenuation / k).powf(1.0 / alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_attenuation_yields_zero_rain() {
        assert_eq!(attenuation_to_rain_rate(-1.0, 5.0, 23.0, Polarization::Vertical), 0.0);
    }

    #[test]
    fn vertical_polarization_yields_more_rain_than_horizontal() {
        let r_v = attenuation_to_rain_rate(10.0, 5.0, 23.0, Polarization::Vertical);
        let r_h = attenuation_to_rain_rate(10.0, 5.0, 23.0, Polarization::Horizontal);
        assert!(r_v > 0.0);
        assert!(r_v > r_h);
    }
}
