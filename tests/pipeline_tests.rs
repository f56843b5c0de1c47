//! End-to-end pipelines over CSV files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowstep::io::CsvProvider;
use rowstep::prelude::*;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rowstep-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn setup(name: &str) -> PathBuf {
    let dir = temp_dir(name);
    fs::write(
        dir.join("users.csv"),
        "id,name,country,dob\n\
         1,Ana,SI,1990-03-01T00:00:00Z\n\
         2,John,US,1985-07-12T00:00:00Z\n\
         3,Jane,SI,1990-11-30T00:00:00Z\n\
         4,Joe,,1979-01-01T00:00:00Z\n",
    )
    .expect("write users");
    fs::write(
        dir.join("orders.csv"),
        "id,user,amount\n1,1,10\n2,1,5.5\n3,2,7\n4,3,1\n5,3,2\n6,3,3\n",
    )
    .expect("write orders");
    dir
}

const PIPELINE: &str = r#"
steps:
  - load: { name: users, source: csv, definition: { path: users.csv } }
  - load: { name: orders, source: csv, definition: { path: orders.csv } }
  - join:
      name: user_orders
      localSource: users
      localColumn: id
      foreignSource: orders
      foreignColumn: user
  - group:
      name: spend
      source: user_orders
      keys: [{ ident: name }]
      columns:
        - { ident: total, expr: "sum(orders.amount)" }
        - { ident: orders, expr: "count(orders.id)" }
      filter:
        orderBy: [{ column: total, descending: true }]
  - group:
      name: cohorts
      source: users
      keys: [{ ident: decade, expr: "year(dob) / 10" }, { ident: country }]
      columns: [{ ident: people, expr: "count()" }]
"#;

fn model(dir: &Path) -> Model {
    let ctx = Context::background();
    let parsed = parse_yaml_pipeline(PIPELINE).expect("parse");
    let mut providers = Providers::new();
    providers.insert("csv".into(), Arc::new(CsvProvider::new().with_root(dir)));

    let mut m = Model::new(&ctx, &providers, &parsed.steps)
        .expect("model")
        .with_config(parsed.config.apply(EngineConfig::default()));
    m.run(&ctx).expect("run");
    m
}

#[test]
fn join_and_group_over_csv() {
    let dir = setup("join");
    let m = model(&dir);
    let ctx = Context::background();

    let mut names = m.datasource_names();
    names.sort();
    assert_eq!(names, vec!["cohorts", "spend"]);

    let frame = m.load(&ctx, &[FrameDefinition::new("spend")]).unwrap().remove(0);
    let got: Vec<(Scalar, Scalar, Scalar)> = frame
        .rows
        .iter()
        .map(|r| (r.value("name"), r.value("total"), r.value("orders")))
        .collect();
    assert_eq!(
        got,
        vec![
            ("Ana".into(), 15.5.into(), 2.0.into()),
            ("John".into(), 7.0.into(), 1.0.into()),
            ("Jane".into(), 6.0.into(), 3.0.into()),
            ("Joe".into(), 0.0.into(), 0.0.into()),
        ]
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn expression_keys_and_missing_cells() {
    let dir = setup("cohorts");
    let m = model(&dir);
    let ctx = Context::background();

    let frame = m.load(&ctx, &[FrameDefinition::new("cohorts")]).unwrap().remove(0);
    // ordered by the group keys; the empty country cell groups as null
    let got: Vec<(Scalar, Scalar, Scalar)> = frame
        .rows
        .iter()
        .map(|r| (r.value("decade"), r.value("country"), r.value("people")))
        .collect();
    assert_eq!(
        got,
        vec![
            (197.9.into(), Scalar::Null, 1.0.into()),
            (198.5.into(), "US".into(), 1.0.into()),
            (199.0.into(), "SI".into(), 2.0.into()),
        ]
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn paging_forward_and_back() {
    let dir = setup("paging");
    let m = model(&dir);
    let ctx = Context::background();

    let page = |paging: Paging| {
        m.load(&ctx, &[FrameDefinition::new("spend").with_paging(paging)])
            .unwrap()
            .remove(0)
    };
    let names = |f: &Frame| f.column_values("name");

    let first = page(Paging::with_limit(2));
    assert_eq!(names(&first), vec![Scalar::from("Ana"), "John".into()]);
    assert!(first.paging.prev_page.is_none());

    // tokens survive an encode/decode trip, as they would through a client
    let token = first.paging.next_page.clone().unwrap().0.encode().unwrap();
    let second = page(Paging::with_limit(2).with_cursor(PagingCursor::decode(&token).unwrap()));
    assert_eq!(names(&second), vec![Scalar::from("Jane"), "Joe".into()]);
    assert!(second.paging.next_page.is_none());

    let back = page(Paging::with_limit(2).with_cursor(second.paging.prev_page.clone().unwrap().0));
    assert_eq!(names(&back), names(&first));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn describe_and_projection() {
    let dir = setup("describe");
    let m = model(&dir);
    let ctx = Context::background();

    let d = m.describe("spend").unwrap();
    let cols: Vec<_> = d[0].columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(cols, vec!["name", "total", "orders"]);

    let def = FrameDefinition::new("spend")
        .with_columns(vec![FrameColumn::new("name", DataType::Utf8)])
        .with_filter(RowFilter {
            expression: Some("total < 10".into()),
            ..Default::default()
        });
    let frame = m.load(&ctx, &[def]).unwrap().remove(0);
    assert_eq!(
        frame.rows,
        vec![row! { "name" => "John" }, row! { "name" => "Jane" }, row! { "name" => "Joe" }]
    );

    assert!(matches!(m.describe("users"), Err(Error::Resource(_))));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_csv_is_a_resource_error() {
    let dir = temp_dir("missing");
    let ctx = Context::background();
    let parsed = parse_yaml_pipeline(PIPELINE).unwrap();
    let mut providers = Providers::new();
    providers.insert("csv".into(), Arc::new(CsvProvider::new().with_root(dir.clone())));

    let err = Model::new(&ctx, &providers, &parsed.steps).err().unwrap();
    assert!(matches!(err, Error::Resource(_)), "{err}");
    let _ = fs::remove_dir_all(dir);
}
