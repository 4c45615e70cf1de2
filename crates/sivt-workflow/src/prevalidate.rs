//! Pre-validation of a version transition against the support matrix.
//!
//! The rules are evaluated in a fixed order. An unsupported current version
//! is rejected before any downgrade or upgrade-path check, since those
//! checks use the current version as a matrix key.

use sivt_common::{version, EntityStatus, Error, Result, SupportMatrix};

/// What the caller should do about an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Already at the desired version
    Skip,
    /// Fresh deploy or legal upgrade
    Proceed,
    /// Unsupported version, downgrade or missing upgrade path
    Fail(String),
}

impl Decision {
    /// `Ok(true)` to proceed, `Ok(false)` to skip, configuration error on fail
    pub fn into_result(self) -> Result<bool> {
        match self {
            Decision::Skip => Ok(false),
            Decision::Proceed => Ok(true),
            Decision::Fail(reason) => Err(Error::configuration(reason)),
        }
    }
}

/// Decide whether `entity` may be moved to `desired`.
pub fn validate(entity: &EntityStatus, desired: &str, matrix: &SupportMatrix) -> Decision {
    if !entity.deployed {
        return if matrix.is_supported(desired) {
            Decision::Proceed
        } else {
            Decision::Fail(format!(
                "Tanzu version({desired}) specified in desired state is unsupported"
            ))
        };
    }

    let current = entity.version.as_str();
    if current == desired {
        return Decision::Skip;
    }
    if !matrix.is_supported(current) {
        return Decision::Fail(format!("Current Tanzu version({current}) is unsupported"));
    }
    if version::is_downgrade(current, desired) {
        return Decision::Fail(format!(
            "Downgrading version is not possible[from: {current}, to: {desired}]"
        ));
    }
    if !matrix.is_supported(desired) {
        return Decision::Fail(format!("Desired Tanzu version({desired}) is unsupported"));
    }
    if !matrix.can_upgrade(current, desired) {
        return Decision::Fail(format!(
            "There are no upgrade path available for tkg: {current}"
        ));
    }
    Decision::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn matrix() -> SupportMatrix {
        SupportMatrix::from_yaml(
            r#"
matrix:
  1.3.1: {}
  1.4.0: {}
  1.4.1: {}
  1.5.1: {}
upgrade_path:
  1.3.1: [1.4.0]
  1.4.0: [1.4.1, 1.5.1]
"#,
        )
        .unwrap()
    }

    fn deployed(version: &str) -> EntityStatus {
        EntityStatus {
            deployed: true,
            version: version.to_string(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::fresh_supported(EntityStatus::default(), "1.4.0", Decision::Proceed)]
    #[case::fresh_unsupported(
        EntityStatus::default(),
        "1.2.0",
        Decision::Fail("Tanzu version(1.2.0) specified in desired state is unsupported".into())
    )]
    #[case::converged(deployed("1.3.1"), "1.3.1", Decision::Skip)]
    #[case::unknown_baseline(
        deployed("1.3.0"),
        "1.4.0",
        Decision::Fail("Current Tanzu version(1.3.0) is unsupported".into())
    )]
    #[case::downgrade(
        deployed("1.4.0"),
        "1.3.1",
        Decision::Fail("Downgrading version is not possible[from: 1.4.0, to: 1.3.1]".into())
    )]
    #[case::desired_unknown(
        deployed("1.4.0"),
        "1.6.0",
        Decision::Fail("Desired Tanzu version(1.6.0) is unsupported".into())
    )]
    #[case::skipping_a_release(
        deployed("1.3.1"),
        "1.5.1",
        Decision::Fail("There are no upgrade path available for tkg: 1.3.1".into())
    )]
    #[case::legal_upgrade(deployed("1.3.1"), "1.4.0", Decision::Proceed)]
    #[case::legal_minor_jump(deployed("1.4.0"), "1.5.1", Decision::Proceed)]
    fn decision_table(
        #[case] entity: EntityStatus,
        #[case] desired: &str,
        #[case] expected: Decision,
    ) {
        assert_eq!(validate(&entity, desired, &matrix()), expected);
    }

    #[test]
    fn downgrade_rejected_regardless_of_matrix() {
        let mut permissive = matrix();
        permissive
            .upgrade_path
            .insert("1.4.0".into(), vec!["1.3.1".into()]);
        for m in [matrix(), permissive] {
            assert!(matches!(
                validate(&deployed("1.4.0"), "1.3.1", &m),
                Decision::Fail(_)
            ));
        }
    }

    #[test]
    fn semantic_compare_catches_wide_versions() {
        let m = SupportMatrix::from_yaml("matrix:\n  1.9.0: {}\n  1.10.0: {}\n").unwrap();
        let d = validate(&deployed("1.10.0"), "1.9.0", &m);
        assert!(matches!(d, Decision::Fail(reason) if reason.starts_with("Downgrading")));
    }

    #[test]
    fn every_input_yields_exactly_one_decision() {
        let versions = ["", "1.3.0", "1.3.1", "1.4.0", "1.4.1", "1.5.1", "1.10.0", "garbage"];
        let m = matrix();
        for deployed_flag in [false, true] {
            for current in versions {
                for desired in versions {
                    let entity = EntityStatus {
                        deployed: deployed_flag,
                        version: current.to_string(),
                        ..Default::default()
                    };
                    // exhaustive match: a new variant would fail to compile here
                    match validate(&entity, desired, &m) {
                        Decision::Skip => assert!(deployed_flag && current == desired),
                        Decision::Proceed => assert!(m.is_supported(desired)),
                        Decision::Fail(reason) => assert!(!reason.is_empty()),
                    }
                }
            }
        }
    }

    #[test]
    fn fail_maps_to_configuration_error() {
        let err = Decision::Fail("nope".into()).into_result().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(Decision::Proceed.into_result().unwrap());
        assert!(!Decision::Skip.into_result().unwrap());
    }
}
