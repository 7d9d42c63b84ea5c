//! Refractive index models and the `n, k` ↔ permittivity conversion.

use serde::{Deserialize, Serialize};

use crate::error::{PeakError, Result};

/// Cauchy coefficients for a wavelength in micrometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CauchyCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl CauchyCoefficients {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// `A + B/λ² + C/λ⁴` with `λ` in µm.
    pub fn refractive_index(&self, wavelength_um: f64) -> f64 {
        let l2 = wavelength_um * wavelength_um;
        self.a + self.b / l2 + self.c / (l2 * l2)
    }
}

/// Complex relative permittivity `ε = ε_r + iε_i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Permittivity {
    pub real: f64,
    pub imaginary: f64,
}

impl Permittivity {
    /// `ε_r = n² − k²`, `ε_i = 2nk`.
    pub fn from_index(n: f64, k: f64) -> Self {
        Self {
            real: n * n - k * k,
            imaginary: 2.0 * n * k,
        }
    }

    /// The `(n, k)` pair with `n ≥ 0` and `k ≥ 0` whose square is `ε`
    /// (requires `ε_i ≥ 0`, the absorbing branch).
    pub fn to_index(&self) -> (f64, f64) {
        let modulus = self.real.hypot(self.imaginary);
        let n = ((modulus + self.real) / 2.0).max(0.0).sqrt();
        let k = ((modulus - self.real) / 2.0).max(0.0).sqrt();
        (n, k)
    }
}

/// Refractive index `n` and extinction coefficient `k` on a wavelength grid (nm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalConstants {
    wavelength: Vec<f64>,
    n: Vec<f64>,
    k: Vec<f64>,
}

impl OpticalConstants {
    pub fn new(wavelength: Vec<f64>, n: Vec<f64>, k: Vec<f64>) -> Result<Self> {
        if n.len() != wavelength.len() || k.len() != wavelength.len() {
            return Err(PeakError::invalid(format!(
                "optical constants need equal lengths (wavelength {}, n {}, k {})",
                wavelength.len(),
                n.len(),
                k.len()
            )));
        }
        if wavelength.is_empty() {
            return Err(PeakError::invalid("optical constants need at least one sample"));
        }
        Ok(Self { wavelength, n, k })
    }

    /// Transparent film (`k = 0`) following a Cauchy model.
    pub fn from_cauchy(wavelength_nm: &[f64], coefficients: &CauchyCoefficients) -> Result<Self> {
        if let Some(bad) = wavelength_nm.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(PeakError::invalid(format!(
                "Cauchy model needs positive wavelengths (got {bad})"
            )));
        }
        let n = wavelength_nm
            .iter()
            .map(|w| coefficients.refractive_index(w / 1000.0))
            .collect();
        Self::new(wavelength_nm.to_vec(), n, vec![0.0; wavelength_nm.len()])
    }

    /// Build from permittivity samples.
    pub fn from_permittivity(wavelength: Vec<f64>, eps: &[Permittivity]) -> Result<Self> {
        let (n, k) = eps.iter().map(Permittivity::to_index).unzip();
        Self::new(wavelength, n, k)
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn n(&self) -> &[f64] {
        &self.n
    }

    pub fn k(&self) -> &[f64] {
        &self.k
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    pub fn permittivity(&self) -> Vec<Permittivity> {
        self.n
            .iter()
            .zip(&self.k)
            .map(|(&n, &k)| Permittivity::from_index(n, k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn cauchy_index_of_fused_silica() {
        // Malitson-style Cauchy fit for SiO2.
        let silica = CauchyCoefficients::new(1.4580, 0.00354, 0.0);
        assert_relative_eq!(silica.refractive_index(0.5876), 1.46825, epsilon = 1e-4);
        assert_relative_eq!(silica.refractive_index(1.0), 1.46154, epsilon = 1e-10);

        let c_only = CauchyCoefficients::new(1.0, 0.0, 0.5);
        assert_relative_eq!(c_only.refractive_index(0.5), 1.0 + 0.5 * 16.0);
    }

    #[test]
    fn cauchy_constants_convert_nanometres() {
        let coeffs = CauchyCoefficients::new(1.5, 0.01, 0.001);
        let nk = OpticalConstants::from_cauchy(&[500.0, 1000.0], &coeffs).unwrap();
        assert_relative_eq!(nk.n()[0], coeffs.refractive_index(0.5));
        assert_relative_eq!(nk.n()[1], 1.511, epsilon = 1e-12);
        assert_eq!(nk.k(), &[0.0, 0.0]);

        assert!(OpticalConstants::from_cauchy(&[0.0, 500.0], &coeffs).is_err());
    }

    #[test]
    fn permittivity_from_n_and_k() {
        let eps = Permittivity::from_index(2.0, 0.5);
        assert_relative_eq!(eps.real, 3.75);
        assert_relative_eq!(eps.imaginary, 2.0);

        let lossless = Permittivity::from_index(1.5, 0.0);
        assert_relative_eq!(lossless.real, 2.25);
        assert_eq!(lossless.imaginary, 0.0);
    }

    #[test]
    fn metal_like_permittivity_gives_large_k() {
        // ε_r < 0 (below the plasma frequency): k dominates n.
        let (n, k) = Permittivity { real: -16.0, imaginary: 0.0 }.to_index();
        assert_relative_eq!(n, 0.0);
        assert_relative_eq!(k, 4.0);
    }

    #[test]
    fn mismatched_lengths_are_invalid() {
        let err = OpticalConstants::new(vec![500.0, 600.0], vec![1.5], vec![0.0, 0.0]).unwrap_err();
        assert!(matches!(err, PeakError::InvalidParameter(_)));
        assert!(OpticalConstants::new(vec![], vec![], vec![]).is_err());
    }

    proptest! {
        #[test]
        fn index_survives_permittivity_conversion(n in 0.01f64..5.0, k in 0.0f64..5.0) {
            let (n2, k2) = Permittivity::from_index(n, k).to_index();
            prop_assert!((n2 - n).abs() <= 1e-9 * n.max(1.0));
            prop_assert!((k2 - k).abs() <= 1e-9 * n.max(k).max(1.0));
        }
    }
}
