// tests/cli_run.rs

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use workchain::cli::CliArgs;
use workchain::cli::LogLevel;
use workchain::config::load_and_validate;
use workchain::logging::log_directive;
use workchain::run;
use workchain_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn demo(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
        .display()
        .to_string()
}

#[test]
fn demo_configs_validate() -> TestResult {
    for name in ["image_pipeline.toml", "unplugged.toml"] {
        let cfg = load_and_validate(demo(name))?;
        let chain = cfg.chain.ok_or("demo config without chain")?;
        assert_eq!(chain.name, "image_manipulation_work");
        assert!(!chain.to_stages()?.is_empty());
    }
    Ok(())
}

#[test]
fn log_flag_wins_over_environment_directive() {
    assert_eq!(
        log_directive(Some(LogLevel::Warn), Some("workchain=trace")),
        "warn"
    );
    assert_eq!(
        log_directive(None, Some(" info,workchain::engine=debug ")),
        "info,workchain::engine=debug"
    );
    assert_eq!(log_directive(None, Some("  ")), "info");
    assert_eq!(log_directive(None, None), "info");
}

#[test]
fn cli_defaults() -> TestResult {
    let args = CliArgs::try_parse_from(["workchain"])?;
    assert_eq!(args.blur_level, 1);
    assert!(args.hold.is_empty());
    assert!(args.config.is_none());
    assert!(!args.dry_run);

    assert!(CliArgs::try_parse_from(["workchain", "--blur-level", "0"]).is_err());
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    init_tracing();

    let config = demo("image_pipeline.toml");
    let args = CliArgs::try_parse_from([
        "workchain",
        "--config",
        config.as_str(),
        "--dry-run",
    ])?;
    with_timeout(run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn built_in_pipeline_runs_to_completion() -> TestResult {
    init_tracing();

    let args = CliArgs::try_parse_from([
        "workchain",
        "--blur-level",
        "3",
        "--work-delay-ms",
        "1",
    ])?;
    with_timeout(run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn held_constraint_is_released_after_delay() -> TestResult {
    init_tracing();

    let config = demo("unplugged.toml");
    let args = CliArgs::try_parse_from([
        "workchain",
        "--config",
        config.as_str(),
        "--work-delay-ms",
        "1",
        "--hold",
        "charging",
        "--release-after-ms",
        "30",
    ])?;
    with_timeout(run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn unknown_config_path_is_an_error() -> TestResult {
    let args = CliArgs::try_parse_from(["workchain", "--config", "/no/such/Workchain.toml"])?;
    assert!(run(args).await.is_err());
    Ok(())
}
