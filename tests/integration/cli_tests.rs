use clap::Parser;
use dupekeep::actions::DeleteMethod;
use dupekeep::cli::{Cli, OutputFormat};
use dupekeep::config::Config;
use dupekeep::duplicates::{KeepRule, Mode};
use dupekeep::finder_config;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["dupekeep"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_flags_become_finder_config() {
    let cli = parse(&[
        "-d",
        "index.json",
        "-j",
        "3",
        "--keep-oldest",
        "--keep-match",
        "/important/",
        "--trash",
        "-n",
        "/data",
    ]);
    let config = finder_config(&cli, &Config::default()).unwrap();

    assert_eq!(config.roots, vec![PathBuf::from("/data")]);
    assert_eq!(config.store, Some(PathBuf::from("index.json")));
    assert_eq!(config.workers, 3);
    assert_eq!(config.mode, Mode::Enforce);
    assert_eq!(config.policy.keep, Some(KeepRule::Oldest));
    assert!(config.policy.keep_pattern.is_some());
    assert!(config.policy.delete_pattern.is_none());
    assert_eq!(config.delete_method, DeleteMethod::Trash);
    assert!(config.dry_run);
}

#[test]
fn test_config_file_fills_in_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "workers = 5\ndatabase = \"/var/lib/dk.json\"\ndry_run = true\nmmap = true\nqueue_depth = 8\n",
    )
    .unwrap();
    let file_config = Config::load_from_path(&path).unwrap();

    let cli = parse(&["/data"]);
    let config = finder_config(&cli, &file_config).unwrap();

    assert_eq!(config.workers, 5);
    assert_eq!(config.store, Some(PathBuf::from("/var/lib/dk.json")));
    assert!(config.dry_run);
    assert!(config.use_mmap);
    assert_eq!(config.queue_depth, 8);
    assert_eq!(config.delete_method, DeleteMethod::Permanent);
}

#[test]
fn test_hashing_streams_unless_mmap_configured() {
    let config = finder_config(&parse(&["/data"]), &Config::default()).unwrap();
    assert!(!config.use_mmap);
}

#[test]
fn test_flags_override_config_file() {
    let file_config = Config {
        workers: Some(5),
        database: Some(PathBuf::from("/from/config.json")),
        ..Config::default()
    };

    let cli = parse(&["-j", "2", "-d", "/from/cli.json", "/data"]);
    let config = finder_config(&cli, &file_config).unwrap();

    assert_eq!(config.workers, 2);
    assert_eq!(config.store, Some(PathBuf::from("/from/cli.json")));
}

#[test]
fn test_database_alone_is_enough() {
    let cli = parse(&["-d", "index.json", "--keep-first"]);
    let config = finder_config(&cli, &Config::default()).unwrap();
    assert!(config.roots.is_empty());
    assert!(config.store.is_some());
}

#[test]
fn test_nothing_to_do_is_an_error() {
    let cli = parse(&["--keep-first"]);
    let err = finder_config(&cli, &Config::default()).unwrap_err();
    assert!(err.to_string().contains("Nothing to do"));
}

#[test]
fn test_index_only_needs_database_and_paths() {
    let cli = parse(&["--index-only", "/data"]);
    assert!(finder_config(&cli, &Config::default()).is_err());

    let cli = parse(&["--index-only", "-d", "index.json"]);
    assert!(finder_config(&cli, &Config::default()).is_err());

    let cli = parse(&["--index-only", "-d", "index.json", "/data"]);
    let config = finder_config(&cli, &Config::default()).unwrap();
    assert_eq!(config.mode, Mode::IndexOnly);
}

#[test]
fn test_invalid_pattern_is_reported() {
    let cli = parse(&["--delete-match", "(unclosed", "/data"]);
    let err = finder_config(&cli, &Config::default()).unwrap_err();
    assert!(format!("{err:#}").contains("(unclosed"));
}

#[test]
fn test_output_format_default_and_json() {
    assert_eq!(parse(&["/data"]).output, OutputFormat::Text);
    assert_eq!(parse(&["-o", "json", "/data"]).output, OutputFormat::Json);
}
