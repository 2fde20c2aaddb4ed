use composite_jk::config::{Config, JkParams, KAlgorithm};
use composite_jk::{JkError, ScreeningType};

const CONFIG: &str = r#"
geometry:
  - element: H
    coords: [0.0, 0.0, 0.0]
  - element: H
    coords: [0.0, 0.0, 1.4]
basis_sets:
  H: sto-3g
jk_params:
  scf_type: dfdirj+cosx
  screening: density
  cosx_radial_points_final: 40
  incfock: true
"#;

#[test]
fn test_yaml_config_validates() {
    let config = serde_yml::from_str::<Config>(CONFIG).unwrap().with_defaults();
    let options = config.jk_params.validate().unwrap();
    assert_eq!(options.algorithm.k, Some(KAlgorithm::Cosx));
    assert_eq!(options.screening, ScreeningType::Density);
    assert_eq!(options.cosx.final_grid.radial_points, 40);
    assert_eq!(options.cosx.final_grid.spherical_points, 110);
    assert!(options.incfock.enabled);
    assert_eq!(config.scf_params.max_cycle, Some(50));
}

#[test]
fn test_unknown_algorithms_are_reported() {
    let mut params = JkParams::default();
    params.scf_type = Some("DFDIRJ+SEMINUM".to_string());
    assert!(matches!(params.validate(), Err(JkError::InvalidKAlgorithm(name)) if name == "SEMINUM"));

    params.scf_type = Some("PK+LINK".to_string());
    assert!(matches!(params.validate(), Err(JkError::InvalidJAlgorithm(name)) if name == "PK"));
}
