//! Code for working with model years, vintages and activity years.

/// All valid (vintage, activity year) pairs for a technology with the given lifetime.
///
/// Every model year is a potential vintage. For each vintage, the activity years are exactly the
/// model years `a` with `vintage <= a <= vintage + lifetime`.
///
/// # Arguments
///
/// * `years` - Model years (sorted and unique)
/// * `lifetime` - Technical lifetime in years
pub fn vintage_activity_years(years: &[u32], lifetime: u32) -> Vec<(u32, u32)> {
    years
        .iter()
        .flat_map(|&vintage| {
            years
                .iter()
                .filter(move |&&year| year >= vintage && year <= vintage.saturating_add(lifetime))
                .map(move |&year| (vintage, year))
        })
        .collect()
}

/// The model years lying strictly between the historical cutoff and the first model year.
///
/// Values for these years can be neither derived from history nor optimised, so they are taken
/// from a locked-in table instead.
pub fn locked_in_gap_years(
    years: &[u32],
    historical_cutoff: u32,
    first_model_year: u32,
) -> Vec<u32> {
    years
        .iter()
        .copied()
        .filter(|&year| year > historical_cutoff && year < first_model_year)
        .collect()
}

/// The model years up to and including the historical cutoff
pub fn historical_years(years: &[u32], historical_cutoff: u32) -> Vec<u32> {
    years
        .iter()
        .copied()
        .filter(|&year| year <= historical_cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn vintage_activity_years_lifetime_window() {
        let years = [2010, 2020, 2030, 2040];
        assert_eq!(
            vintage_activity_years(&years, 20),
            vec![
                (2010, 2010),
                (2010, 2020),
                (2010, 2030),
                (2020, 2020),
                (2020, 2030),
                (2020, 2040),
                (2030, 2030),
                (2030, 2040),
                (2040, 2040),
            ]
        );
    }

    #[rstest]
    #[case(0, 4)]
    #[case(5, 4)]
    #[case(10, 7)]
    #[case(100, 10)]
    fn vintage_activity_years_count(#[case] lifetime: u32, #[case] expected: usize) {
        let years = [2010, 2020, 2030, 2040];
        let pairs = vintage_activity_years(&years, lifetime);
        assert_eq!(pairs.len(), expected);
        assert!(
            pairs
                .iter()
                .all(|&(vintage, year)| year >= vintage && year <= vintage + lifetime)
        );
    }

    #[test]
    fn locked_in_gap_years_works() {
        let years = [2010, 2015, 2020, 2025, 2030];
        assert_eq!(locked_in_gap_years(&years, 2015, 2030), vec![2020, 2025]);
        assert!(locked_in_gap_years(&years, 2020, 2025).is_empty());
    }

    #[test]
    fn historical_years_works() {
        assert_eq!(historical_years(&[2010, 2015, 2020], 2015), vec![2010, 2015]);
    }
}
