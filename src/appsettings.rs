use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSettings {
    #[serde(default)]
    pub drop_seconds: bool,
    #[serde(default = "only_alarm_default")]
    pub only_alarm: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            drop_seconds: false,
            only_alarm: only_alarm_default(),
        }
    }
}

fn only_alarm_default() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    #[serde(default)]
    pub alarm: AlarmSettings,
    /// IANA zone used to print end instants, e.g. `Europe/Berlin`.
    pub timezone: Option<String>,
    /// Countdown length when none is given on the command line.
    #[serde(default = "minutes_default")]
    pub minutes: i64,
}

fn minutes_default() -> i64 {
    1
}

impl AppSettings {
    /// Layers `appsettings.*`, `appsettings.local.*` and `APP_*` environment
    /// variables, later sources winning.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("appsettings").required(false))
                .add_source(File::with_name("appsettings.local").required(false))
                .add_source(Environment::with_prefix("APP").separator("__")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(toml: &str) -> Result<AppSettings, ConfigError> {
        AppSettings::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn empty_config_uses_defaults() {
        let settings = from_toml("").unwrap();

        assert_eq!(settings.alarm, AlarmSettings::default());
        assert!(settings.alarm.only_alarm);
        assert_eq!(settings.minutes, 1);
        assert!(settings.timezone.is_none());
    }

    #[test]
    fn alarm_section_overrides_flags() {
        let settings = from_toml(
            r#"
            minutes = 25
            timezone = "Europe/Berlin"

            [alarm]
            drop_seconds = true
            only_alarm = false
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.alarm,
            AlarmSettings {
                drop_seconds: true,
                only_alarm: false
            }
        );
        assert_eq!(settings.minutes, 25);
        assert_eq!(settings.timezone.as_deref(), Some("Europe/Berlin"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(from_toml("minutes = \"soon\"").is_err());
    }
}
