
    use super::*;
    use botflow_core::scheduler::TriggerSpecKind;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.max_concurrent, 10);
        assert_eq!(config.scheduler.drain_timeout_secs, 30);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let file = write_config(
            r#"
[scheduler]
max_concurrent = 2

[[jobs]]
name = "heartbeat"
handler = "log"
params = { message = "still alive" }
trigger = { type = "interval", seconds = 300 }

[[jobs]]
name = "weekly_report"
handler = "shell"
params = { command = "true" }
trigger = { type = "weekly", weekday = "Mon", at = "09:00:00", end = "2030-01-01T00:00:00Z" }

[[jobs]]
name = "startup"
handler = "log"
enabled = false
params = { message = "booted" }
"#,
        );

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 2);
        // untouched keys keep their defaults
        assert_eq!(config.scheduler.drain_timeout_secs, 30);
        assert_eq!(config.jobs.len(), 3);

        let heartbeat = &config.jobs[0];
        assert_eq!(heartbeat.params.get("message").map(String::as_str), Some("still alive"));
        assert!(heartbeat.enabled);
        let trigger = heartbeat.trigger.as_ref().unwrap();
        assert!(matches!(trigger.kind, TriggerSpecKind::Interval { seconds } if seconds == 300.0));

        let weekly = config.jobs[1].trigger.as_ref().unwrap();
        assert!(matches!(weekly.kind, TriggerSpecKind::Weekly { .. }));
        assert!(weekly.end.is_some());

        assert!(!config.jobs[2].enabled);
        assert!(config.jobs[2].trigger.is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(missing.as_path())).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_render_round_trips() {
        let file = write_config(
            r#"
[[jobs]]
name = "digest"
handler = "log"
params = { message = "morning digest" }
trigger = { type = "cron", expression = "0 0 8 * * 0-4", skip_overdue = true }
"#,
        );
        let config = load_config(Some(file.path())).unwrap();

        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("0 0 8 * * 0-4"));

        let reparsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.jobs.len(), 1);
        let trigger = reparsed.jobs[0].trigger.as_ref().unwrap();
        assert!(trigger.skip_overdue);
    }

    #[test]
    fn test_engine_config_mapping() {
        let config = super::super::config::SchedulerAppConfig {
            max_concurrent: 3,
            max_sleep_ms: 250,
            ..Default::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.max_concurrent, 3);
        assert_eq!(engine.max_sleep_ms, 250);
        assert!(engine.logging_enabled);
    }
