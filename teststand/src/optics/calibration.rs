//! Photocathode detection-efficiency calibration.
//!
//! The sensitive surface of the photomultiplier converts an arriving photon
//! with a probability that depends on its energy. That probability comes from
//! a measured quantum efficiency table of `(wavelength_nm, efficiency_percent)`
//! rows. Rows are converted to photon energy with E = hc/λ, normalized to
//! [0, 1], sorted ascending by energy and frozen into a [`CalibrationCurve`].
//!
//! # Interpolation
//!
//! Between two bracketing samples (Eᵢ, QEᵢ) and (Eᵢ₊₁, QEᵢ₊₁):
//! QE(E) = QEᵢ·(1 − t) + QEᵢ₊₁·t with t = (E − Eᵢ) / (Eᵢ₊₁ − Eᵢ)
//!
//! Outside the sampled range the boundary sample is returned unchanged. The
//! curve never extrapolates.
//!
//! # Input format
//!
//! ```text
//! # wavelength_nm  efficiency_percent
//! 400.0 25.0
//! 300.0 12.0
//! ```
//!
//! Blank lines and `#` comments are ignored. Every other line must hold
//! exactly two finite numbers; anything else is a fatal configuration error
//! naming the resource and line, because this curve decides every downstream
//! hit acceptance and must never fall back to a default.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use uom::si::energy::joule;

use crate::error::ConfigurationError;
use crate::units::{photon_energy, Energy, EnergyExt, Length, LengthExt};

/// Piecewise linear property curve indexed by photon energy.
///
/// Energies are strictly ascending and held in the SI base unit so a query
/// built from the same typed energy lands exactly on its sample. Evaluation
/// clamps to the boundary values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyCurve {
    /// Photon energies in joules, strictly ascending
    energies_j: Vec<f64>,

    /// Property value at each energy
    values: Vec<f64>,
}

impl EnergyCurve {
    /// Create a curve from energy and value tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPropertyCurve`] if the tables differ
    /// in length, are empty, hold non-finite values, or energies are not
    /// strictly ascending.
    pub fn new(
        name: &str,
        energies: Vec<Energy>,
        values: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidPropertyCurve {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let energies_j: Vec<f64> = energies.iter().map(|e| e.get::<joule>()).collect();

        if energies_j.len() != values.len() {
            return Err(invalid("energy and value tables differ in length"));
        }
        if energies_j.is_empty() {
            return Err(invalid("curve has no samples"));
        }
        if energies_j.iter().chain(values.iter()).any(|v| !v.is_finite()) {
            return Err(invalid("curve holds non-finite values"));
        }
        if energies_j.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(invalid("energies must be strictly ascending"));
        }

        Ok(Self { energies_j, values })
    }

    /// Create a curve from `(wavelength_nm, value)` pairs in any order.
    pub fn from_wavelengths(
        name: &str,
        samples: &[(f64, f64)],
    ) -> Result<Self, ConfigurationError> {
        if samples.iter().any(|&(nm, _)| !(nm > 0.0)) {
            return Err(ConfigurationError::InvalidPropertyCurve {
                name: name.to_string(),
                reason: "wavelengths must be positive".to_string(),
            });
        }

        let mut pairs: Vec<(Energy, f64)> = samples
            .iter()
            .map(|&(nm, value)| (photon_energy(Length::from_nanometers(nm)), value))
            .collect();
        pairs.sort_by(|a, b| a.0.get::<joule>().total_cmp(&b.0.get::<joule>()));

        let (energies, values) = pairs.into_iter().unzip();
        Self::new(name, energies, values)
    }

    /// Constant value over an energy interval.
    pub fn flat(
        name: &str,
        lower: Energy,
        upper: Energy,
        value: f64,
    ) -> Result<Self, ConfigurationError> {
        Self::new(name, vec![lower, upper], vec![value, value])
    }

    /// Evaluate at a photon energy, clamping outside the samples.
    pub fn value_at(&self, energy: Energy) -> f64 {
        let energy_j = energy.get::<joule>();
        let last = self.energies_j.len() - 1;

        if !(energy_j > self.energies_j[0]) {
            return self.values[0];
        }
        if energy_j >= self.energies_j[last] {
            return self.values[last];
        }

        // First sample strictly above the query; the bracket is [upper - 1, upper]
        let upper = self.energies_j.partition_point(|&e| e <= energy_j);
        let lower = upper - 1;

        let t = (energy_j - self.energies_j[lower])
            / (self.energies_j[upper] - self.energies_j[lower]);

        self.values[lower] * (1.0 - t) + self.values[upper] * t
    }

    /// Lowest and highest sampled energy.
    pub fn energy_range(&self) -> (Energy, Energy) {
        (
            Energy::new::<joule>(self.energies_j[0]),
            Energy::new::<joule>(self.energies_j[self.energies_j.len() - 1]),
        )
    }

    /// Iterate samples as `(energy, value)` in ascending energy.
    pub fn samples(&self) -> impl Iterator<Item = (Energy, f64)> + '_ {
        self.energies_j
            .iter()
            .map(|&e| Energy::new::<joule>(e))
            .zip(self.values.iter().copied())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.energies_j.len()
    }

    /// Always false; a curve holds at least one sample.
    pub fn is_empty(&self) -> bool {
        self.energies_j.is_empty()
    }
}

/// Energy-indexed detection efficiency of the sensitive surface.
///
/// Immutable once built. Shared read-only by every run worker.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    /// Name of the resource the samples came from
    source_name: String,

    /// Efficiency in [0, 1] over photon energy
    curve: EnergyCurve,
}

impl CalibrationCurve {
    /// Build a calibration curve from `(wavelength_nm, efficiency_percent)` samples.
    ///
    /// Sample order does not matter.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::NonPositiveWavelength`] for λ ≤ 0 or non-finite λ
    /// - [`ConfigurationError::EfficiencyOutOfRange`] for percent outside [0, 100]
    /// - [`ConfigurationError::DuplicateCalibrationSample`] for repeated wavelengths
    /// - [`ConfigurationError::TooFewCalibrationSamples`] for fewer than 2 samples
    pub fn from_samples<I>(source_name: &str, samples: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pairs = Vec::new();

        for (wavelength_nm, percent) in samples {
            if !(wavelength_nm > 0.0) || !wavelength_nm.is_finite() {
                return Err(ConfigurationError::NonPositiveWavelength {
                    source_name: source_name.to_string(),
                    wavelength_nm,
                });
            }
            if !(0.0..=100.0).contains(&percent) {
                return Err(ConfigurationError::EfficiencyOutOfRange {
                    source_name: source_name.to_string(),
                    wavelength_nm,
                    percent,
                });
            }

            let energy = photon_energy(Length::from_nanometers(wavelength_nm));
            pairs.push((energy, percent / 100.0, wavelength_nm));
        }

        if pairs.len() < 2 {
            return Err(ConfigurationError::TooFewCalibrationSamples {
                source_name: source_name.to_string(),
                count: pairs.len(),
            });
        }

        pairs.sort_by(|a, b| a.0.get::<joule>().total_cmp(&b.0.get::<joule>()));

        if let Some(pair) = pairs.windows(2).find(|pair| pair[1].0 <= pair[0].0) {
            return Err(ConfigurationError::DuplicateCalibrationSample {
                source_name: source_name.to_string(),
                wavelength_nm: pair[1].2,
            });
        }

        let energies = pairs.iter().map(|p| p.0).collect();
        let efficiencies = pairs.iter().map(|p| p.1).collect();
        let curve = EnergyCurve::new(source_name, energies, efficiencies)?;

        Ok(Self {
            source_name: source_name.to_string(),
            curve,
        })
    }

    /// Detection efficiency at a photon energy.
    ///
    /// Linearly interpolated between the bracketing samples, clamped to the
    /// boundary sample outside the calibrated range.
    pub fn efficiency_at(&self, energy: Energy) -> f64 {
        self.curve.value_at(energy)
    }

    /// Detection efficiency at a photon wavelength.
    pub fn efficiency_at_wavelength(&self, wavelength: Length) -> f64 {
        self.efficiency_at(photon_energy(wavelength))
    }

    /// Name of the resource this curve was loaded from.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Calibrated energy range.
    pub fn energy_range(&self) -> (Energy, Energy) {
        self.curve.energy_range()
    }

    /// Sample with the highest efficiency as `(energy, efficiency)`.
    pub fn peak(&self) -> (Energy, f64) {
        let mut samples = self.curve.samples();
        let first = samples.next().unwrap_or((Energy::new::<joule>(0.0), 0.0));
        samples.fold(first, |best, sample| if sample.1 > best.1 { sample } else { best })
    }

    /// Underlying energy curve.
    pub fn curve(&self) -> &EnergyCurve {
        &self.curve
    }
}

/// Parse a whitespace separated calibration table.
///
/// `source_name` is used in diagnostics only.
pub fn parse_calibration<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<CalibrationCurve, ConfigurationError> {
    let malformed = |line: usize, reason: String| ConfigurationError::MalformedCalibrationRow {
        source_name: source_name.to_string(),
        line,
        reason,
    };

    let mut samples = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| malformed(line_number, e.to_string()))?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(malformed(
                line_number,
                format!("expected 2 fields, found {}", fields.len()),
            ));
        }

        let mut parsed = [0.0f64; 2];
        for (slot, field) in parsed.iter_mut().zip(&fields) {
            *slot = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    malformed(line_number, format!("'{field}' is not a finite number"))
                })?;
        }

        samples.push((parsed[0], parsed[1]));
    }

    debug!("Parsed {} calibration rows from {}", samples.len(), source_name);
    CalibrationCurve::from_samples(source_name, samples)
}

/// Load a calibration table from disk.
///
/// # Errors
///
/// A missing or unreadable file is [`ConfigurationError::CalibrationUnreadable`];
/// content problems are reported as by [`parse_calibration`].
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<CalibrationCurve, ConfigurationError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigurationError::CalibrationUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let curve = parse_calibration(BufReader::new(file), &path.display().to_string())?;

    let (low, high) = curve.energy_range();
    let (peak_energy, peak) = curve.peak();
    info!(
        "Loaded calibration {} with {} samples over {:.3}-{:.3} eV (peak {:.1}% at {:.3} eV)",
        path.display(),
        curve.curve().len(),
        low.as_electronvolts(),
        high.as_electronvolts(),
        peak * 100.0,
        peak_energy.as_electronvolts()
    );

    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn energy_nm(nm: f64) -> Energy {
        photon_energy(Length::from_nanometers(nm))
    }

    fn sample_curve() -> CalibrationCurve {
        // Deliberately unsorted
        CalibrationCurve::from_samples(
            "sample",
            vec![(400.0, 25.0), (300.0, 10.0), (500.0, 15.0), (600.0, 2.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_samples_sorted_ascending_by_energy() {
        let curve = sample_curve();
        let energies: Vec<f64> = curve
            .curve()
            .samples()
            .map(|(e, _)| e.as_electronvolts())
            .collect();
        assert_eq!(energies.len(), 4);
        assert!(energies.windows(2).all(|w| w[0] < w[1]));

        // Highest energy corresponds to the shortest wavelength
        assert_relative_eq!(energies[3], 1239.841939 / 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_efficiency_normalized_from_percent() {
        let curve = sample_curve();
        assert_eq!(curve.efficiency_at(energy_nm(400.0)), 0.25);
        assert_relative_eq!(
            curve.efficiency_at_wavelength(Length::from_nanometers(500.0)),
            0.15,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_interpolates_linearly_in_energy() {
        let curve = sample_curve();
        let lo = energy_nm(500.0).as_electronvolts();
        let hi = energy_nm(400.0).as_electronvolts();
        let mid = Energy::from_electronvolts((lo + hi) / 2.0);
        assert_relative_eq!(curve.efficiency_at(mid), 0.20, epsilon = 1e-9);
    }

    #[test]
    fn test_clamps_at_and_beyond_bounds() {
        let curve = sample_curve();
        let (low, high) = curve.energy_range();

        // Exactly at the boundary samples
        assert_eq!(curve.efficiency_at(low), 0.02);
        assert_eq!(curve.efficiency_at(high), 0.10);
        assert_eq!(curve.efficiency_at(energy_nm(600.0)), 0.02);
        assert_eq!(curve.efficiency_at(energy_nm(300.0)), 0.10);

        // Outside the calibrated range: boundary value, no extrapolation
        assert_eq!(curve.efficiency_at(Energy::from_electronvolts(0.5)), 0.02);
        assert_eq!(curve.efficiency_at(Energy::from_electronvolts(50.0)), 0.10);
        assert_eq!(
            curve.efficiency_at_wavelength(Length::from_nanometers(200.0)),
            0.10
        );
    }

    #[test]
    fn test_peak() {
        let (energy, efficiency) = sample_curve().peak();
        assert_eq!(efficiency, 0.25);
        assert_relative_eq!(
            energy.as_electronvolts(),
            energy_nm(400.0).as_electronvolts(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_too_few_samples() {
        let result = CalibrationCurve::from_samples("one", vec![(400.0, 25.0)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::TooFewCalibrationSamples { count: 1, .. })
        ));

        let result = CalibrationCurve::from_samples("none", Vec::new());
        assert!(matches!(
            result,
            Err(ConfigurationError::TooFewCalibrationSamples { count: 0, .. })
        ));
    }

    #[test]
    fn test_efficiency_out_of_range() {
        let result = CalibrationCurve::from_samples("bad", vec![(400.0, 120.0), (500.0, 1.0)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::EfficiencyOutOfRange { .. })
        ));

        let result = CalibrationCurve::from_samples("bad", vec![(400.0, -0.5), (500.0, 1.0)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::EfficiencyOutOfRange { .. })
        ));
    }

    #[test]
    fn test_duplicate_wavelength() {
        let result =
            CalibrationCurve::from_samples("dup", vec![(400.0, 20.0), (500.0, 1.0), (400.0, 21.0)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateCalibrationSample { wavelength_nm, .. })
                if wavelength_nm == 400.0
        ));
    }

    #[test]
    fn test_non_positive_wavelength() {
        let result = CalibrationCurve::from_samples("neg", vec![(0.0, 20.0), (500.0, 1.0)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::NonPositiveWavelength { .. })
        ));
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "# wavelength efficiency\n\n420.0   22.5\n\t380.0 25.0\n";
        let curve = parse_calibration(Cursor::new(text), "inline").unwrap();
        assert_eq!(curve.curve().len(), 2);
        assert_eq!(curve.source_name(), "inline");
    }

    #[test]
    fn test_parse_rejects_malformed_row_with_line_number() {
        let text = "420.0 22.5\n380.0 abc\n";
        let result = parse_calibration(Cursor::new(text), "inline");
        assert!(matches!(
            result,
            Err(ConfigurationError::MalformedCalibrationRow { line: 2, .. })
        ));

        let text = "420.0 22.5 7\n";
        let result = parse_calibration(Cursor::new(text), "inline");
        assert!(matches!(
            result,
            Err(ConfigurationError::MalformedCalibrationRow { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_empty_input() {
        let result = parse_calibration(Cursor::new(""), "empty");
        assert!(matches!(
            result,
            Err(ConfigurationError::TooFewCalibrationSamples { count: 0, .. })
        ));
    }

    #[test]
    fn test_load_missing_resource() {
        let result = load_calibration("/definitely/not/here/qe.csv");
        assert!(matches!(
            result,
            Err(ConfigurationError::CalibrationUnreadable { .. })
        ));
    }

    #[test]
    fn test_energy_curve_validation() {
        let one = Energy::from_electronvolts(1.0);
        let two = Energy::from_electronvolts(2.0);
        assert!(EnergyCurve::new("x", vec![one, two], vec![0.5]).is_err());
        assert!(EnergyCurve::new("x", vec![], vec![]).is_err());
        assert!(EnergyCurve::new("x", vec![two, one], vec![0.5, 0.5]).is_err());
        assert!(EnergyCurve::new("x", vec![one, two], vec![0.5, f64::NAN]).is_err());
    }

    #[test]
    fn test_single_sample_energy_curve_is_constant() {
        let curve =
            EnergyCurve::new("x", vec![Energy::from_electronvolts(2.0)], vec![0.7]).unwrap();
        assert_eq!(curve.value_at(Energy::from_electronvolts(1.0)), 0.7);
        assert_eq!(curve.value_at(Energy::from_electronvolts(2.0)), 0.7);
        assert_eq!(curve.value_at(Energy::from_electronvolts(3.0)), 0.7);
    }
}
