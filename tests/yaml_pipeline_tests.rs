//! Graph files end to end: YAML → validation → execution with CSV files.

use std::fs;

use hopflow::planner::{explain, parse_yaml_graph, validate_graph, PlanError};
use hopflow::{run_yaml, EngineConfig, RunStatus};

fn write_people(path: &std::path::Path, rows: usize) {
    let mut text = String::from("id,name,age\n");
    for i in 0..rows {
        let age = if i % 25 == 24 {
            "unknown".to_string()
        } else {
            (18 + i % 50).to_string()
        };
        text.push_str(&format!("{i},person{i},{age}\n"));
    }
    fs::write(path, text).unwrap();
}

const GRAPH: &str = r#"
name: adults
config:
  queue_capacity: 32
steps:
  - name: people
    type: csv_input
    config:
      path: "${DIR}/people.csv"
      fields:
        - { name: id, type: integer }
        - { name: name }
        - { name: age, type: integer }
    error_handling: { code_field: null }
  - name: adults
    type: filter
    config: { condition: "age >= 21" }
  - name: out
    type: csv_output
    config: { path: "${DIR}/adults.csv" }
  - name: bad_input
    type: csv_output
    config: { path: "${DIR}/rejected.csv" }
hops:
  - { from: people, to: adults }
  - { from: adults, to: out }
  - { from: people, to: bad_input, error: true }
"#;

#[test]
fn csv_filter_csv_with_rejected_lines() {
    let dir = tempfile::tempdir().unwrap();
    write_people(&dir.path().join("people.csv"), 100);

    let config = EngineConfig::default().with_variable("DIR", dir.path().to_str().unwrap());
    let res = run_yaml(GRAPH, config).unwrap();
    assert_eq!(res.status(), RunStatus::Completed);

    // 4 of 100 ages do not parse
    assert_eq!(res.rows_input("people"), 100);
    assert_eq!(res.rows_rejected("people"), 4);
    assert_eq!(res.rows_written("people"), 96);
    assert_eq!(res.rows_output("bad_input"), 4);

    let adults = fs::read_to_string(dir.path().join("adults.csv")).unwrap();
    let mut lines = adults.lines();
    assert_eq!(lines.next(), Some("id,name,age"));
    let ages: Vec<i64> = lines
        .map(|l| l.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(ages.len() as u64, res.rows_output("out"));
    assert!(ages.iter().all(|&a| a >= 21));

    let rejected = fs::read_to_string(dir.path().join("rejected.csv")).unwrap();
    let mut lines = rejected.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,age,error_count,error_description,error_field")
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("24,person24,,1,"));
    assert!(first.ends_with(",age"));
}

#[test]
fn file_config_and_variables_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
config:
  variables: {{ OUT: "{}" }}
steps:
  - name: gen
    type: generate
    config:
      rows: 3
      fields: [{{ name: greeting, value: "hi ${{WHO}}" }}]
  - name: out
    type: csv_output
    config: {{ path: "${{OUT}}/hello.csv", header: false }}
hops:
  - {{ from: gen, to: out }}
"#,
        dir.path().display()
    );
    let res = run_yaml(&yaml, EngineConfig::default().with_variable("WHO", "there")).unwrap();
    assert!(res.is_success());
    let text = fs::read_to_string(dir.path().join("hello.csv")).unwrap();
    assert_eq!(text, "hi there\nhi there\nhi there\n");
}

#[test]
fn invalid_graphs_are_rejected_before_running() {
    let cyclic = r#"
steps:
  - { name: a, type: dummy }
  - { name: b, type: dummy }
hops:
  - { from: a, to: b }
  - { from: b, to: a }
"#;
    let parsed = parse_yaml_graph(cyclic).unwrap();
    assert!(matches!(validate_graph(&parsed.graph), Err(PlanError::Cycle(_))));
    assert!(run_yaml(cyclic, EngineConfig::default()).is_err());

    let unknown_type = "steps: [{ name: a, type: teleport }]";
    let err = run_yaml(unknown_type, EngineConfig::default()).unwrap_err();
    assert!(err.to_string().contains("teleport"));
}

#[test]
fn explain_matches_the_built_run() {
    let yaml = r#"
name: fan
steps:
  - { name: gen, type: generate, config: { rows: 10 } }
  - { name: work, type: dummy, copies: 2 }
hops:
  - { from: gen, to: work }
"#;
    let parsed = parse_yaml_graph(yaml).unwrap();
    let text = explain(&parsed.graph).unwrap();
    assert!(text.starts_with("graph 'fan': 2 steps, 3 units, 2 queues"));

    let prepared = hopflow::Executor::prepare(
        &parsed.graph,
        &EngineConfig::default(),
        &hopflow::StepRegistry::new(),
    )
    .unwrap();
    assert_eq!(prepared.unit_count(), 3);
    let mut names = prepared.queue_names();
    names.sort();
    assert_eq!(names, ["gen.0 - work.0", "gen.0 - work.1"]);
}
