//! Consistency checks on the assembled parameter set.
use super::Assembly;
use crate::error::PipelineError;
use crate::parameter::{ParameterKey, ParameterName};
use crate::region::RegionID;
use crate::technology::TechnologyID;
use indexmap::IndexMap;

/// Tolerance when comparing lower and upper bounds
const BOUND_TOLERANCE: f64 = 1e-9;

/// Which kinds of record a (region, technology) pair has
#[derive(Default)]
struct RecordKinds {
    cost_or_lifetime: bool,
    flow: bool,
}

/// Check that every technology with costs or a lifetime in a region also has inputs or outputs
/// there, and vice versa
pub fn check_flow_pairing(assembly: &mut Assembly) {
    let mut kinds: IndexMap<(RegionID, TechnologyID), RecordKinds> = IndexMap::new();
    for record in assembly.parameters.iter() {
        let Some((region, technology)) = record.key.node_technology() else {
            continue;
        };
        let entry = kinds
            .entry((region.clone(), technology.clone()))
            .or_default();
        entry.cost_or_lifetime |= record.name.is_cost_or_lifetime();
        entry.flow |= record.name.is_flow();
    }

    for ((region, technology), kinds) in kinds {
        let detail = match (kinds.cost_or_lifetime, kinds.flow) {
            (true, false) => "costs or lifetime without any input or output",
            (false, true) => "inputs or outputs without any cost or lifetime",
            _ => continue,
        };
        let err = PipelineError::invariant_violation(&technology, &region, detail);
        assembly.fatal(err.to_string());
    }
}

/// Check that no lower activity bound exceeds the corresponding upper bound
pub fn check_bound_order(assembly: &mut Assembly) {
    let violations: Vec<(ParameterKey, f64, f64)> = assembly
        .parameters
        .records(ParameterName::BoundActivityLo)
        .filter_map(|lower| {
            let upper = assembly
                .parameters
                .get(ParameterName::BoundActivityUp, &lower.key)?;
            (lower.value > upper + BOUND_TOLERANCE).then_some((lower.key, lower.value, upper))
        })
        .collect();

    for (key, lower, upper) in violations {
        let Some((region, technology)) = key.node_technology() else {
            continue;
        };
        let err = PipelineError::invariant_violation(
            technology,
            region,
            format!(
                "lower activity bound ({lower}) exceeds upper bound ({upper}) in {} ({})",
                key.year_act.unwrap_or_default(),
                key.time.as_ref().map_or("", |time| time.as_str())
            ),
        );
        assembly.fatal(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(technology: &str) -> ParameterKey {
        ParameterKey::technology(&"R11_AFR".into(), &technology.into())
    }

    fn bound_key() -> ParameterKey {
        key("desal_membrane")
            .with_activity_year(2030)
            .with_mode_time(&"M1".into(), &"year".into())
    }

    #[test]
    fn paired_records_pass() {
        let mut assembly = Assembly::new(6);
        let parameters = &mut assembly.parameters;
        parameters
            .add_value(
                ParameterName::InvCost,
                key("extract_surfacewater").with_vintage(2030),
                1.0,
                "MUSD/km3/yr",
            )
            .unwrap();
        parameters
            .add_value(
                ParameterName::Output,
                key("extract_surfacewater")
                    .with_years(2030, 2030)
                    .with_commodity(&"freshwater_supply".into(), &"water_supply".into()),
                1.0,
                "-",
            )
            .unwrap();

        check_flow_pairing(&mut assembly);
        assert!(assembly.errors.is_empty());
    }

    #[test]
    fn cost_without_flow_is_fatal() {
        let mut assembly = Assembly::new(6);
        assembly
            .parameters
            .add_value(
                ParameterName::TechnicalLifetime,
                key("urban_recycle").with_vintage(2030),
                20.0,
                "y",
            )
            .unwrap();

        check_flow_pairing(&mut assembly);
        assert_eq!(
            assembly.errors,
            vec![
                "Invariant violated for urban_recycle in R11_AFR: costs or lifetime without any \
                 input or output"
                    .to_string()
            ]
        );
    }

    #[test]
    fn records_without_technology_are_ignored() {
        let mut assembly = Assembly::new(6);
        assembly
            .parameters
            .add_value(
                ParameterName::Demand,
                ParameterKey::demand(
                    &"R11_AFR".into(),
                    &"urban_mw".into(),
                    &"final".into(),
                    2030,
                    &"year".into(),
                ),
                1.0,
                "km3/yr",
            )
            .unwrap();

        check_flow_pairing(&mut assembly);
        assert!(assembly.errors.is_empty());
    }

    #[test]
    fn bound_order_violation_is_fatal() {
        let mut assembly = Assembly::new(6);
        assembly
            .parameters
            .add_value(ParameterName::BoundActivityLo, bound_key(), 2.0, "km3/yr")
            .unwrap();
        assembly
            .parameters
            .add_value(ParameterName::BoundActivityUp, bound_key(), 1.5, "km3/yr")
            .unwrap();

        check_bound_order(&mut assembly);
        assert_eq!(assembly.errors.len(), 1);
        assert!(assembly.errors[0].contains("lower activity bound (2) exceeds upper bound (1.5)"));
    }

    #[test]
    fn ordered_bounds_pass() {
        let mut assembly = Assembly::new(6);
        assembly
            .parameters
            .add_value(ParameterName::BoundActivityLo, bound_key(), 1.0, "km3/yr")
            .unwrap();
        assembly
            .parameters
            .add_value(ParameterName::BoundActivityUp, bound_key(), 1.0, "km3/yr")
            .unwrap();

        check_bound_order(&mut assembly);
        assert!(assembly.errors.is_empty());
    }
}
