use serde::Serialize;

/// Health classification derived from a BMI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BmiReport {
    pub bmi: f64,
    pub verdict: Verdict,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BmiError {
    #[error("height and weight must be positive, finite numbers")]
    InvalidInput,
}

/// Computes BMI (weight in kilograms over height in meters squared) rounded
/// to two decimals, and classifies the rounded value.
pub fn assess(height_m: f64, weight_kg: f64) -> Result<BmiReport, BmiError> {
    if !height_m.is_finite() || !weight_kg.is_finite() || height_m <= 0.0 || weight_kg <= 0.0 {
        return Err(BmiError::InvalidInput);
    }

    let bmi = round2(weight_kg / (height_m * height_m));
    let verdict = if bmi < 18.5 {
        Verdict::Underweight
    } else if bmi < 25.0 {
        Verdict::Normal
    } else if bmi < 30.0 {
        Verdict::Overweight
    } else {
        Verdict::Obese
    };

    Ok(BmiReport { bmi, verdict })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reference_patients() {
        let report = assess(1.75, 70.0).unwrap();
        assert!((report.bmi - 22.86).abs() < 1e-9);
        assert_eq!(report.verdict, Verdict::Normal);

        let report = assess(1.60, 45.0).unwrap();
        assert!((report.bmi - 17.58).abs() < 1e-9);
        assert_eq!(report.verdict, Verdict::Underweight);

        let report = assess(1.80, 100.0).unwrap();
        assert!((report.bmi - 30.86).abs() < 1e-9);
        assert_eq!(report.verdict, Verdict::Obese);
    }

    #[test]
    fn boundary_values_fall_into_the_upper_class() {
        // A one-meter patient makes the BMI equal the weight.
        assert_eq!(assess(1.0, 18.5).unwrap().verdict, Verdict::Normal);
        assert_eq!(assess(1.0, 24.99).unwrap().verdict, Verdict::Normal);
        assert_eq!(assess(1.0, 25.0).unwrap().verdict, Verdict::Overweight);
        assert_eq!(assess(1.0, 30.0).unwrap().verdict, Verdict::Obese);
        assert_eq!(assess(1.0, 18.49).unwrap().verdict, Verdict::Underweight);
    }

    #[test]
    fn rejects_nonpositive_and_nonfinite_inputs() {
        assert_eq!(assess(0.0, 70.0), Err(BmiError::InvalidInput));
        assert_eq!(assess(1.75, 0.0), Err(BmiError::InvalidInput));
        assert_eq!(assess(-1.75, 70.0), Err(BmiError::InvalidInput));
        assert_eq!(assess(1.75, -70.0), Err(BmiError::InvalidInput));
        assert_eq!(assess(f64::NAN, 70.0), Err(BmiError::InvalidInput));
        assert_eq!(assess(1.75, f64::INFINITY), Err(BmiError::InvalidInput));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let first = assess(1.68, 62.4).unwrap();
        let second = assess(1.68, 62.4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn verdict_serializes_capitalized() {
        assert_eq!(serde_json::to_value(Verdict::Underweight).unwrap(), "Underweight");
        assert_eq!(serde_json::to_value(Verdict::Obese).unwrap(), "Obese");
    }
}
