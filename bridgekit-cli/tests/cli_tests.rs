use bridgekit_cli::{run, Args, Command};
use bridgekit_storage::StoreLocation;
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn exec(db: &str, argv: &[&str]) -> Value {
    let mut full = vec!["bridgekit", "--db", db];
    full.extend_from_slice(argv);
    let args = Args::try_parse_from(full).unwrap();
    serde_json::from_str(&run(&args).unwrap()).unwrap()
}

// ── Argument parsing ─────────────────────────────────────────────

#[test]
fn default_db_path() {
    let args = Args::try_parse_from(["bridgekit", "count"]).unwrap();
    assert_eq!(args.db, StoreLocation::File("bridgekit.db".into()));
    assert!(!args.verbose);
}

#[test]
fn memory_db_flag() {
    let args = Args::try_parse_from(["bridgekit", "--db", ":memory:", "-v", "count"]).unwrap();
    assert!(args.db.is_in_memory());
    assert!(args.verbose);
}

#[test]
fn link_parses_props_as_json_or_string() {
    let args = Args::try_parse_from([
        "bridgekit",
        "link",
        "--local",
        "!room:example.org",
        "--remote",
        "#room",
        "--local-prop",
        "members=12",
        "--local-prop",
        "name=Lobby",
        "--remote-prop",
        r#"meta={"server":"irc.example.org"}"#,
    ])
    .unwrap();

    match args.command {
        Command::Link {
            local_props,
            remote_props,
            data,
            id,
            ..
        } => {
            assert_eq!(
                local_props,
                vec![
                    ("members".to_string(), json!(12)),
                    ("name".to_string(), json!("Lobby"))
                ]
            );
            assert_eq!(remote_props[0].1, json!({"server": "irc.example.org"}));
            assert_eq!(data, Value::Null);
            assert_eq!(id, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn link_rejects_malformed_props_and_data() {
    let base = ["bridgekit", "link", "--local", "l", "--remote", "r"];
    for extra in [["--local-prop", "novalue"], ["--local-prop", "=x"], ["--data", "{oops"]] {
        let argv: Vec<&str> = base.iter().chain(extra.iter()).copied().collect();
        assert!(Args::try_parse_from(argv).is_err(), "{extra:?}");
    }
}

#[test]
fn by_local_requires_ids() {
    assert!(Args::try_parse_from(["bridgekit", "by-local"]).is_err());
}

// ── Execution ────────────────────────────────────────────────────

#[test]
fn link_then_get_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bridge.db");
    let db = db.to_str().unwrap();

    let linked = exec(
        db,
        &[
            "link",
            "--local",
            "!foo:bar",
            "--remote",
            "#flibble",
            "--id",
            "flibble",
            "--data",
            r#"{"extra":"data"}"#,
            "--local-prop",
            "name=Flibble",
        ],
    );
    assert_eq!(linked["id"], "flibble");

    let got = exec(db, &["get", "flibble"]);
    assert_eq!(got["local"]["id"], "!foo:bar");
    assert_eq!(got["local"]["properties"]["name"], "Flibble");
    assert_eq!(got["remote"]["id"], "#flibble");
    assert_eq!(got["data"], json!({"extra": "data"}));

    assert_eq!(exec(db, &["get", "!foo:bar"]), Value::Null);
    assert_eq!(exec(db, &["count"]), json!({"count": 1}));
}

#[test]
fn grouped_lookups_are_sorted() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bridge.db");
    let db = db.to_str().unwrap();

    for (id, local, remote) in [("b", "L1", "R1"), ("a", "L1", "R2"), ("c", "L2", "R1")] {
        exec(db, &["link", "--local", local, "--remote", remote, "--id", id]);
    }

    let by_local = exec(db, &["by-local", "L1", "L2", "L9"]);
    let l1: Vec<&str> = by_local["L1"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(l1, vec!["a", "b"]);
    assert_eq!(by_local["L9"], json!([]));

    let by_remote = exec(db, &["by-remote", "R1"]);
    assert_eq!(by_remote["R1"].as_array().unwrap().len(), 2);
}

#[test]
fn memory_store_starts_empty() {
    assert_eq!(exec(":memory:", &["count"]), json!({"count": 0}));
}

#[test]
fn unopenable_store_reports_context() {
    let dir = TempDir::new().unwrap();
    let args = Args::try_parse_from([
        "bridgekit",
        "--db",
        dir.path().to_str().unwrap(),
        "count",
    ])
    .unwrap();
    let err = run(&args).unwrap_err();
    assert!(format!("{err}").contains("failed to open entry store"));
}
