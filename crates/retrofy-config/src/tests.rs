mod macros {
    macro_rules! assert_parses {
        ($config:expr) => {{
            $crate::tests::macros::assert_parses!($config, _)
        }};
        ($config:expr, $want:pat_param) => {{
            let result = toml::from_str::<$crate::Config>($config);
            assert!(matches!(result, Ok($want)), "{:#?}", result);
            result.unwrap()
        }};
    }
    pub(super) use assert_parses;

    macro_rules! assert_error {
        ($config:expr) => {{
            let result = toml::from_str::<$crate::Config>($config);
            assert!(matches!(result, Err(_)), "{:#?}", result);
            result.unwrap_err()
        }};
    }
    pub(super) use assert_error;
}

mod successes {
    use super::macros::assert_parses;
    use crate::{Config, Pass, PythonVersion};

    #[test]
    fn it_parses_an_empty_config() {
        let config = assert_parses!("");
        assert_eq!(config, Config::default());
        assert!(!config.runs(Pass::Final));
        assert!(config.runs(Pass::Match));
    }

    #[test]
    fn it_parses_version_requirements() {
        assert_parses!(
            r#"retrofy-version = "0.1""#,
            Config {
                required_retrofy_version: Some(_),
                ..
            }
        );
        let config = assert_parses!(r#"retrofy-version = ">=9""#);
        assert!(config
            .check_version(&semver::Version::new(0, 1, 0))
            .is_err());
        assert!(config.check_version(&semver::Version::new(9, 0, 0)).is_ok());
    }

    #[test]
    fn it_parses_passes() {
        let config = assert_parses!(r#"passes = ["match", "walrus", "final"]"#);
        assert_eq!(config.passes, vec![Pass::Match, Pass::Walrus, Pass::Final]);
    }

    #[test]
    fn it_parses_typing_extensions() {
        let config = assert_parses!(
            r#"
            [typing-extensions]
            Literal = "3.8"
            Self = "3.11"
        "#
        );
        assert_eq!(config.typing_extensions.len(), 2);
        assert_eq!(
            config.typing_extensions.get("Self"),
            Some(&PythonVersion::new(3, 11))
        );
        assert_eq!(
            config.typing_extensions.keys().collect::<Vec<_>>(),
            vec!["Literal", "Self"]
        );
    }

    #[test]
    fn it_round_trips_passes_through_strings() {
        for pass in Pass::ALL {
            assert_eq!(pass.name().parse::<Pass>(), Ok(pass));
        }
        assert!("nope".parse::<Pass>().is_err());
    }
}

mod errors {
    use super::macros::assert_error;
    use crate::Config;

    #[test]
    fn it_rejects_unknown_fields() {
        assert_error!("unknown = 1");
        assert_error!(
            r#"
            [typing_extensions]
            Literal = "3.8"
        "#
        );
    }

    #[test]
    fn it_rejects_bad_values() {
        assert_error!(r#"passes = ["matches"]"#);
        assert_error!(r#"retrofy-version = "not a version""#);
        assert_error!(
            r#"
            [typing-extensions]
            Literal = "three"
        "#
        );
        assert_error!(
            r#"
            [typing-extensions]
            Literal = 3.8
        "#
        );
    }

    #[test]
    fn it_reports_locations() {
        let error = Config::parse("retrofy.toml", "passes = [\n").unwrap_err();
        assert!(matches!(error, crate::ParseError::Located { .. }));
    }
}
