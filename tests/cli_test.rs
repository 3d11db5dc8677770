//! Command-line surface and configuration loading.
//!
//! Tests cover:
//! - INI profiles on disk and environment overrides layered over them
//! - Rejection of bad config values and the exit code they map to
//! - Date and indicator parameter arguments
//! - Argument parsing for global flags and nested subcommands

#![cfg(feature = "http")]

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use stratify::adapters::file_config_adapter::{EnvConfigAdapter, FileConfigAdapter, LayeredConfig};
use stratify::cli::{self, Cli, Command, ExecutionAction, StrategyAction};
use stratify::domain::error::StratifyError;
use stratify::domain::indicator::IndicatorParam;
use stratify::domain::user::Theme;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const PROFILE: &str = r#"
[api]
base_url = https://trade.example.com/api/v1
request_timeout_secs = 12

[display]
timezone = Europe/Madrid
theme = dark

[polling]
interval_secs = 3
"#;

mod config_loading {
    use super::*;

    #[test]
    fn profile_on_disk_is_read() {
        let file = write_temp_ini(PROFILE);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        let config = cli::client_config(&adapter).unwrap();

        assert_eq!(config.base_url.as_str(), "https://trade.example.com/api/v1/");
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.timezone, chrono_tz::Europe::Madrid);
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn environment_wins_over_the_profile() {
        let file = FileConfigAdapter::from_string(PROFILE).unwrap();
        let env = EnvConfigAdapter::from_vars([
            ("STRATIFY_API_BASE_URL", "http://localhost:9000/api/"),
            ("STRATIFY_POLLING_INTERVAL_SECS", "1"),
            ("UNRELATED", "ignored"),
        ]);
        let layered = LayeredConfig::new().with_layer(env).with_layer(file);
        let config = cli::client_config(&layered).unwrap();

        assert_eq!(config.base_url.as_str(), "http://localhost:9000/api/");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.theme, Theme::Dark);
    }

    #[test]
    fn env_variable_names_are_upper_snake_case() {
        assert_eq!(EnvConfigAdapter::var_name("display", "timezone"), "STRATIFY_DISPLAY_TIMEZONE");
    }

    #[test]
    fn bad_values_are_config_errors() {
        for ini in [
            "[display]\ntimezone = Mars/Olympus\n",
            "[display]\ntheme = sepia\n",
            "[polling]\ninterval_secs = 0\n",
            "[api]\nrequest_timeout_secs = soon\n",
            "[api]\nbase_url = ftp://example.com\n",
        ] {
            let adapter = FileConfigAdapter::from_string(ini).unwrap();
            let err = cli::client_config(&adapter).unwrap_err();
            assert!(matches!(err, StratifyError::ConfigInvalid { .. }), "{ini}: {err:?}");
            assert_eq!(ExitCode::from(&err), ExitCode::from(2));
        }
    }

    #[test]
    fn missing_profile_fails_with_config_exit_code() {
        let path = PathBuf::from("/nonexistent/stratify/profile.ini");
        assert_eq!(cli::load_config(Some(&path)), Err(ExitCode::from(2)));
    }
}

mod arguments {
    use super::*;

    #[test]
    fn dates_accept_several_shapes() {
        let plain = cli::parse_date_arg("start", "2024-03-01").unwrap();
        let minutes = cli::parse_date_arg("start", "2024-03-01T00:00").unwrap();
        let rfc = cli::parse_date_arg("start", "2024-03-01T01:00:00+01:00").unwrap();
        assert_eq!(plain, minutes);
        assert_eq!(plain, rfc);
    }

    #[test]
    fn bad_date_names_the_field() {
        match cli::parse_date_arg("end", "next tuesday") {
            Err(StratifyError::Validation { field, reason }) => {
                assert_eq!(field, "end");
                assert!(reason.contains("next tuesday"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn params_keep_their_order() {
        let current = vec![
            IndicatorParam::new("timeperiod", 20.0),
            IndicatorParam::new("nbdevup", 2.0),
            IndicatorParam::new("nbdevdn", 2.0),
        ];
        let params = cli::parse_params(&current, &["nbdevdn=1.5".into(), " timeperiod = 50".into()]).unwrap();
        let keys: Vec<_> = params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["timeperiod", "nbdevup", "nbdevdn"]);
        assert_eq!(params[0].value, 50.0);
        assert_eq!(params[2].value, 1.5);
    }

    #[test]
    fn non_numeric_param_is_rejected() {
        let current = vec![IndicatorParam::new("timeperiod", 20.0)];
        assert!(cli::parse_params(&current, &["timeperiod=abc".into()]).is_err());
    }
}

mod parsing {
    use super::*;

    #[test]
    fn global_flags_go_after_the_subcommand() {
        let cli = Cli::try_parse_from(["stratify", "whoami", "--config", "profile.ini", "-v"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("profile.ini")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Whoami));
    }

    #[test]
    fn strategy_listing_defaults_to_the_first_page() {
        let cli = Cli::try_parse_from(["stratify", "strategies", "list", "--mine", "--name", "cross"]).unwrap();
        match cli.command {
            Command::Strategies {
                action: StrategyAction::List { name, mine, page, .. },
            } => {
                assert_eq!(name.as_deref(), Some("cross"));
                assert!(mine);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn real_run_flags_are_separate() {
        let cli = Cli::try_parse_from([
            "stratify",
            "executions",
            "start",
            "4",
            "--conditions",
            "rules.json",
            "--initial-value",
            "250",
            "--real",
        ])
        .unwrap();
        match cli.command {
            Command::Executions {
                action:
                    ExecutionAction::Start {
                        strategy,
                        initial_value,
                        real,
                        confirm_real,
                        leverage,
                        ..
                    },
            } => {
                assert_eq!(strategy, 4);
                assert_eq!(initial_value, 250.0);
                assert!(real);
                assert!(!confirm_real);
                assert_eq!(leverage, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn format_accepts_negative_numbers() {
        let cli = Cli::try_parse_from(["stratify", "format", "-0.5", "1234567"]).unwrap();
        match cli.command {
            Command::Format { values } => assert_eq!(values, vec![-0.5, 1_234_567.0]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
