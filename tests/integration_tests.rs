//! End-to-end checks through the facade: a program with mutual references,
//! an import alias and a method body that relies on flow narrowing.

use quill::{DriverOptions, Model, Pass, compile};

const PROGRAM: &str = r#"{
  "modules": [
    {
      "name": "geo",
      "imports": [{ "name": "util.Coord", "alias": "C" }],
      "items": [
        { "kind": "class", "name": "Shape", "items": [
          { "kind": "class", "name": "Anchor" },
          { "kind": "property", "name": "origin", "type": "Circle.Anchor?" }
        ] },
        { "kind": "class", "name": "Circle", "extends": ["Shape"], "items": [
          { "kind": "property", "name": "radius", "type": "C" },
          { "kind": "method", "name": "grow",
            "params": [{ "name": "other", "type": "Circle?" }],
            "body": [
              { "op": "var", "name": "r", "type": "C" },
              { "op": "if",
                "cond": { "op": "isNull", "name": "other" },
                "then": [{ "op": "return" }] },
              { "op": "eval", "expr": { "op": "member", "name": "other" } },
              { "op": "assign", "name": "r", "value": { "op": "lit" } },
              { "op": "return", "value": { "op": "read", "name": "r" } }
            ] }
        ] }
      ]
    },
    {
      "name": "util",
      "items": [
        { "kind": "typedef", "name": "Coord", "target": "Int" }
      ]
    }
  ]
}"#;

#[test]
fn test_program_compiles_through_every_pass() {
    let mut model = Model::from_json(PROGRAM).unwrap();
    let (report, errs) = compile(&mut model, &DriverOptions::default());

    assert!(
        errs.is_empty(),
        "Expected no diagnostics, got: {:?}",
        errs.diagnostics()
    );
    assert!(report.check().is_ok());
    assert_eq!(report.completed, Some(Pass::GenerateCode));
    assert!(report.sweeps(Pass::ResolveNames).is_some_and(|n| n >= 2));

    let listing = model.listing();
    assert!(listing.contains(&"class geo.Circle extends geo.Shape".to_string()));
    assert!(listing.contains(&"property geo.Shape.origin: geo.Shape.Anchor?".to_string()));
    assert!(listing.contains(&"property geo.Circle.radius: util.Coord".to_string()));
    assert!(listing.contains(&"typedef util.Coord = core.Int".to_string()));
}

#[test]
fn test_member_access_without_check_is_reported() {
    let program = PROGRAM.replace(r#""op": "isNull", "name": "other""#, r#""op": "lit""#);
    let mut model = Model::from_json(&program).unwrap();
    let (report, errs) = compile(&mut model, &DriverOptions::default());

    assert_eq!(
        errs.count_code(quill::common::diagnostic_codes::NULLABLE_ACCESS),
        1,
        "Expected one NULLABLE_ACCESS, got: {:?}",
        errs.diagnostics()
    );
    assert!(!report.success);
}
