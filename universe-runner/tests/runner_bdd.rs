//! BDD tests for the universe runner.
//!
//! These tests verify a full run from a TOML file on disk:
//! - Stage and final universes are written as Parquet
//! - The manifest records every stage
//! - Failures name the offending stage and leave no final output

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use universe_core::{UniverseFrame, Value};
use universe_runner::{
    parse_parameters, read_manifest, read_universe, UniverseConfig, UniverseRunner,
};

const CONFIG: &str = r#"
output_filename = "{out}/universe.parquet"
intermediate_directory = "{out}/stages"
start_datetime = "2022-11-01"
last_datetime = "2022-11-04"
frequency = "B"

[[pipeline]]
name = "listed"
function = "range_validity"
parameters = { values = { data = "symbols" } }

[[pipeline]]
name = "top_half"
function = "ranking"
parameters = { values = { data = "close" }, threshold_pct = 0.5, tolerance_timeframes = 1 }

[[pipeline]]
name = "observed"
function = "rolling_validity"
parameters = { values = { data = "close" }, threshold_pct = 1.0, rolling_window = 2 }

[data.prices]
function = "load_all_data"
parameters = { directory = "{root}/prices", from_format = "csv", to_format = "dataframe" }

[data.close]
function = "concat"
parameters = { data = { data = "prices" }, column = "close" }

[data.symbols]
function = "filter_records"
parameters = { records = { data = "all_symbols" }, includes = { exchange = ["NYSE", "NASDAQ"] } }

[data.all_symbols]
function = "flatten"
parameters = { values = [{ data = "nyse" }, { data = "nasdaq" }] }

[data.nyse]
function = "constant"

[data.nyse.parameters]
value = [
    { symbol = "A", exchange = "NYSE", valid_start_datetime = "2000-01-01" },
    { symbol = "OTC", exchange = "OTC", valid_start_datetime = "2000-01-01" },
]

[data.nasdaq]
function = "constant"

[data.nasdaq.parameters]
value = [
    { symbol = "B", exchange = "NASDAQ", valid_start_datetime = "2000-01-01", valid_last_datetime = "2022-11-03" },
    { symbol = "C", exchange = "NASDAQ", valid_start_datetime = "2000-01-01" },
]
"#;

fn write_prices(root: &Path) {
    let dir = root.join("prices");
    fs::create_dir_all(&dir).unwrap();
    let days = ["2022-11-01", "2022-11-02", "2022-11-03", "2022-11-04"];
    let series = [
        ("A", [1.0, 6.0, 7.0, 1.0]),
        ("B", [2.0, 5.0, 9.0, 3.0]),
        ("C", [3.0, 4.0, 8.0, 2.0]),
    ];
    for (symbol, closes) in series {
        let mut text = String::from("date,close\n");
        for (day, close) in days.iter().zip(closes) {
            text.push_str(&format!("{day},{close}\n"));
        }
        fs::write(dir.join(format!("{symbol}.csv")), text).unwrap();
    }
}

fn load_config(root: &Path, out: &Path) -> UniverseConfig {
    let parameters = parse_parameters(&[
        format!("root={}", root.display()),
        format!("out={}", out.display()),
    ])
    .unwrap();
    UniverseConfig::parse(CONFIG, &parameters).unwrap()
}

#[test]
fn bdd_scenario_full_run_writes_stage_and_final_universes() {
    // GIVEN a price directory and a configuration with three stages
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_prices(root.path());
    let config = load_config(root.path(), out.path());

    // WHEN the runner executes
    let mut runner = UniverseRunner::new(config.clone()).unwrap();
    let summary = runner.run().expect("run should succeed");

    // THEN every stage is persisted in declaration order
    let stage_dir = out.path().join("stages");
    let names: Vec<&str> = summary.manifest.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["listed", "top_half", "observed"]);
    for name in &names {
        assert!(stage_dir.join(format!("{name}.parquet")).exists());
    }

    // AND the final universe is the AND of the stages
    let t = Some(true);
    let f = Some(false);
    let universe = read_universe(&out.path().join("universe.parquet")).unwrap();
    assert_eq!(universe, summary.universe);
    assert_eq!(universe.columns(), &["A".to_string(), "B".into(), "C".into()]);
    // Day one fails the two-row window; B is delisted after the 3rd and
    // A's one-step hold on the top half has lapsed by the 4th.
    assert_eq!(universe.row(0), vec![f, f, f]);
    assert_eq!(universe.row(1), vec![t, f, t]);
    assert_eq!(universe.row(2), vec![t, t, f]);
    assert_eq!(universe.row(3), vec![f, f, f]);

    // AND the manifest carries the run id and counts
    let manifest = read_manifest(&stage_dir.join("manifest.json")).unwrap();
    assert_eq!(manifest.run_id, config.run_id().unwrap());
    assert_eq!(manifest.universe.included, 4);
    assert_eq!(manifest.stages.len(), 3);
    assert_eq!(manifest.calendar, config.calendar().unwrap());
}

#[test]
fn bdd_scenario_failing_stage_aborts_the_run() {
    // GIVEN a configuration whose second stage references a missing entry
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_prices(root.path());
    let text = CONFIG.replace(
        "values = { data = \"close\" }, threshold_pct = 0.5",
        "values = { data = \"volume\" }, threshold_pct = 0.5",
    );
    let parameters = parse_parameters(&[
        format!("root={}", root.path().display()),
        format!("out={}", out.path().display()),
    ])
    .unwrap();
    let config = UniverseConfig::parse(&text, &parameters).unwrap();

    // WHEN the runner executes
    let err = UniverseRunner::new(config).unwrap().run().unwrap_err();

    // THEN the error names the stage and the missing entry
    let message = format!("{err:#}");
    assert!(message.contains("top_half"), "{message}");
    assert!(message.contains("volume"), "{message}");

    // AND no final universe is written
    assert!(!out.path().join("universe.parquet").exists());
    assert!(out.path().join("stages/listed.parquet").exists());
}

#[test]
fn bdd_scenario_custom_stage_function() {
    // GIVEN a single custom stage that keeps every instrument in the data
    let out = tempfile::tempdir().unwrap();
    let text = format!(
        r#"
output_filename = "{out}/u.parquet"
intermediate_directory = "{out}/stages"
start_datetime = "2022-11-01"
last_datetime = "2022-11-03"
frequency = "B"

[data.names]
function = "constant"
parameters = {{ value = ["X", "Y"] }}

[[pipeline]]
name = "everything"
function = "keep_all"
parameters = {{ symbols = {{ data = "names" }} }}
"#,
        out = out.path().display()
    );
    let config = UniverseConfig::parse(&text, &BTreeMap::new()).unwrap();

    // WHEN the function is registered and the runner executes
    let mut runner = UniverseRunner::new(config).unwrap();
    runner.register_stage_function("keep_all", |p, calendar| {
        let symbols = p
            .list("symbols")?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Ok(Value::from(UniverseFrame::filled(
            calendar.timestamps(),
            symbols,
            Some(true),
        )))
    });
    let summary = runner.run().unwrap();

    // THEN the final universe is the stage output
    assert_eq!(summary.universe.shape(), (3, 2));
    assert_eq!(summary.manifest.universe.included, 6);
}

#[test]
fn bdd_scenario_seeded_data_replaces_configured_entry() {
    // GIVEN the standard configuration
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_prices(root.path());
    let config = load_config(root.path(), out.path());

    // WHEN the NASDAQ listing is seeded with C alone before the run
    let record: BTreeMap<String, Value> = [
        ("symbol", "C"),
        ("exchange", "NASDAQ"),
        ("valid_start_datetime", "2000-01-01"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), Value::from(*v)))
    .collect();
    let mut runner = UniverseRunner::new(config).unwrap();
    runner.update_values("nasdaq", Value::List(vec![Value::Map(record)]));
    let summary = runner.run().unwrap();

    // THEN B is no longer listed and never enters the universe
    assert_eq!(summary.manifest.stages[0].columns, 2);
    assert_eq!(
        summary.universe.columns(),
        &["A".to_string(), "B".into(), "C".into()]
    );
    assert_eq!(summary.universe.column("B").unwrap(), &[Some(false); 4]);
}

#[test]
fn bdd_scenario_no_stages_is_an_error() {
    let out = tempfile::tempdir().unwrap();
    let text = format!(
        "output_filename = \"{0}/u.parquet\"\nintermediate_directory = \"{0}\"\n\
         start_datetime = \"2022-11-01\"\nlast_datetime = \"2022-11-03\"\nfrequency = \"B\"\n\
         pipeline = []\n[data]\n",
        out.path().display()
    );
    let config = UniverseConfig::parse(&text, &BTreeMap::new()).unwrap();
    let err = UniverseRunner::new(config).unwrap().run().unwrap_err();
    assert!(err.to_string().contains("no pipeline stages"));
}
