
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let fire = at(12, 0, 0);
        let mut trigger = Trigger::once(fire);
        assert_eq!(trigger.state(), TriggerState::Ready);

        assert_eq!(trigger.first_fire_time(at(0, 0, 0)), Some(fire));
        assert_eq!(trigger.state(), TriggerState::Running);
        assert_eq!(trigger.current_fire_time(), fire);

        assert_eq!(trigger.next_fire_time(at(12, 0, 0)), None);
        assert_eq!(trigger.state(), TriggerState::Completed);
        assert_eq!(trigger.current_fire_time(), DateTime::<Utc>::MAX_UTC);

        for _ in 0..3 {
            assert_eq!(trigger.next_fire_time(at(13, 0, 0)), None);
            assert_eq!(trigger.first_fire_time(at(13, 0, 0)), None);
            assert!(trigger.is_completed());
        }
    }

    #[test]
    fn test_once_in_past_still_fires_by_default() {
        let mut trigger = Trigger::once(at(8, 0, 0));
        assert_eq!(trigger.first_fire_time(at(9, 0, 0)), Some(at(8, 0, 0)));
    }

    #[test]
    fn test_once_overdue_skipped() {
        let mut trigger = Trigger::once(at(8, 0, 0)).skip_overdue(true);
        assert_eq!(trigger.first_fire_time(at(9, 0, 0)), None);
        assert_eq!(trigger.state(), TriggerState::Completed);
    }

    #[test]
    fn test_first_fire_time_is_stable_while_running() {
        let mut trigger = Trigger::once(at(8, 0, 0));
        trigger.first_fire_time(at(0, 0, 0));
        assert_eq!(trigger.first_fire_time(at(1, 0, 0)), Some(at(8, 0, 0)));
        assert_eq!(trigger.state(), TriggerState::Running);
    }

    #[test]
    fn test_interval_arithmetic_progression() {
        let start = at(12, 0, 0);
        let end = at(12, 4, 30);
        let mut trigger = Trigger::interval(std::time::Duration::from_secs(60), start)
            .unwrap()
            .until(end)
            .unwrap();

        let mut fires = vec![trigger.first_fire_time(start).unwrap()];
        while let Some(next) = trigger.next_fire_time(start) {
            fires.push(next);
        }

        assert_eq!(
            fires,
            vec![
                at(12, 0, 0),
                at(12, 1, 0),
                at(12, 2, 0),
                at(12, 3, 0),
                at(12, 4, 0)
            ]
        );
        // the entry after the last one would land past the window end
        assert!(*fires.last().unwrap() + Duration::seconds(60) > end);
        assert_eq!(trigger.state(), TriggerState::Completed);
    }

    #[test]
    fn test_interval_window_end_is_inclusive() {
        let mut trigger = Trigger::interval_secs(30.0, at(0, 0, 0))
            .unwrap()
            .until(at(0, 1, 0))
            .unwrap();
        trigger.first_fire_time(at(0, 0, 0));
        assert_eq!(trigger.next_fire_time(at(0, 0, 0)), Some(at(0, 0, 30)));
        assert_eq!(trigger.next_fire_time(at(0, 0, 0)), Some(at(0, 1, 0)));
        assert_eq!(trigger.next_fire_time(at(0, 0, 0)), None);
    }

    #[test]
    fn test_interval_fractional_seconds() {
        let start = at(0, 0, 0);
        let mut trigger = Trigger::interval_secs(1.5, start).unwrap();
        trigger.first_fire_time(start);
        assert_eq!(
            trigger.next_fire_time(start),
            Some(start + Duration::milliseconds(1500))
        );
    }

    #[test]
    fn test_interval_skip_overdue_aligns_to_grid() {
        let start = at(12, 0, 0);
        let now = at(12, 2, 10);
        let mut trigger = Trigger::interval_secs(60.0, start)
            .unwrap()
            .skip_overdue(true);

        // smallest start + k*60s that is >= now
        assert_eq!(trigger.first_fire_time(now), Some(at(12, 3, 0)));

        // a long stall skips the missed ticks instead of bursting through them
        assert_eq!(trigger.next_fire_time(at(12, 10, 30)), Some(at(12, 11, 0)));
    }

    #[test]
    fn test_interval_without_skip_catches_up() {
        let mut trigger = Trigger::interval_secs(60.0, at(12, 0, 0)).unwrap();
        assert_eq!(trigger.first_fire_time(at(12, 2, 10)), Some(at(12, 0, 0)));
        assert_eq!(trigger.next_fire_time(at(12, 2, 10)), Some(at(12, 1, 0)));
    }

    #[test]
    fn test_interval_rejects_bad_periods() {
        assert!(matches!(
            Trigger::interval_secs(0.0, at(0, 0, 0)),
            Err(SchedulerError::InvalidInterval(_))
        ));
        assert!(Trigger::interval_secs(-5.0, at(0, 0, 0)).is_err());
        assert!(Trigger::interval_secs(f64::NAN, at(0, 0, 0)).is_err());
        assert!(Trigger::interval_secs(f64::INFINITY, at(0, 0, 0)).is_err());
        assert!(Trigger::interval(std::time::Duration::from_micros(10), at(0, 0, 0)).is_err());
    }

    #[test]
    fn test_until_rejects_end_before_start() {
        let err = Trigger::interval_secs(10.0, at(12, 0, 0))
            .unwrap()
            .until(at(11, 0, 0))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidWindow { .. }));
    }

    #[test]
    fn test_cron_every_minute_inclusive_bounds() {
        let start = at(0, 0, 0);
        let mut trigger = Trigger::cron("0 * * * * *", start)
            .unwrap()
            .until(at(0, 3, 0))
            .unwrap();

        let mut fires = vec![trigger.first_fire_time(start).unwrap()];
        while let Some(next) = trigger.next_fire_time(start) {
            fires.push(next);
        }
        assert_eq!(
            fires,
            vec![at(0, 0, 0), at(0, 1, 0), at(0, 2, 0), at(0, 3, 0)]
        );
        assert_eq!(trigger.state(), TriggerState::Completed);
    }

    #[test]
    fn test_cron_syntax_error_is_immediate() {
        let err = Trigger::cron("0 0 25 * * *", at(0, 0, 0)).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidCronSyntax { field: "hour", .. }
        ));
    }

    #[test]
    fn test_cron_skip_overdue_starts_from_now() {
        let mut trigger = Trigger::cron("0 0 * * * *", at(0, 0, 0))
            .unwrap()
            .skip_overdue(true);
        assert_eq!(trigger.first_fire_time(at(5, 30, 0)), Some(at(6, 0, 0)));
        assert_eq!(trigger.next_fire_time(at(9, 15, 0)), Some(at(10, 0, 0)));
    }

    #[test]
    fn test_cron_impossible_expression_completes() {
        let mut trigger = Trigger::cron("0 0 0 31 2 *", at(0, 0, 0)).unwrap();
        assert_eq!(trigger.first_fire_time(at(0, 0, 0)), None);
        assert_eq!(trigger.state(), TriggerState::Completed);
    }

    #[test]
    fn test_unbounded_schedule_starts_at_given_time() {
        let schedule: CronSchedule = "0 0 9 * * *".parse().unwrap();
        assert_eq!(schedule.valid_from(), DateTime::<Utc>::MIN_UTC);

        let mut trigger = Trigger::from_schedule(schedule, at(12, 0, 0));
        assert_eq!(trigger.window_start(), at(12, 0, 0));

        let first = trigger.first_fire_time(at(12, 0, 0)).unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap());
        assert_eq!(
            trigger.next_fire_time(at(12, 0, 0)),
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_schedule_window_later_than_start_is_kept() {
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let schedule =
            CronSchedule::parse("0 0 9 * * *", from, DateTime::<Utc>::MAX_UTC).unwrap();

        let mut trigger = Trigger::from_schedule(schedule, at(0, 0, 0));
        assert_eq!(trigger.window_start(), from);
        assert_eq!(
            trigger.first_fire_time(at(0, 0, 0)),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_daily_trigger() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let mut trigger = Trigger::daily(nine, at(10, 0, 0)).unwrap();
        let first = trigger.first_fire_time(at(10, 0, 0)).unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap());
        assert_eq!(
            trigger.next_fire_time(first),
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_weekly_trigger() {
        // 2024-01-01 is a Monday
        let noon = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        let mut trigger = Trigger::weekly(Weekday::Wed, noon, at(0, 0, 0)).unwrap();
        let first = trigger.first_fire_time(at(0, 0, 0)).unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 3, 12, 30, 0).unwrap());
        assert_eq!(
            trigger.next_fire_time(first),
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_fire_order() {
        let mut early = Trigger::once(at(12, 0, 0));
        let mut late = Trigger::once(at(12, 0, 1));
        early.first_fire_time(at(0, 0, 0));
        late.first_fire_time(at(0, 0, 0));
        assert_eq!(early.fire_order(&late), Ordering::Less);

        // exhausted triggers sort last
        early.next_fire_time(at(0, 0, 0));
        assert_eq!(early.fire_order(&late), Ordering::Greater);
    }

    #[test]
    fn test_window_invariant_while_running() {
        let start = at(1, 0, 0);
        let end = at(3, 0, 0);
        let mut trigger = Trigger::cron("0 */17 * * * *", start)
            .unwrap()
            .until(end)
            .unwrap();
        let mut fire = trigger.first_fire_time(start);
        while let Some(t) = fire {
            assert!(trigger.window_start() <= t && t <= trigger.window_end());
            assert_eq!(trigger.state(), TriggerState::Running);
            fire = trigger.next_fire_time(start);
        }
        assert!(trigger.is_completed());
    }

    #[test]
    fn test_trigger_spec_builds_cron_trigger() {
        let spec = TriggerSpec::cron("0 0 9 * * 0-4");
        let mut trigger = spec.build(at(0, 0, 0)).unwrap();
        assert!(trigger.is_recurring());
        assert_eq!(trigger.first_fire_time(at(0, 0, 0)), Some(at(9, 0, 0)));
    }

    #[test]
    fn test_trigger_spec_once_uses_its_own_time() {
        let mut spec = TriggerSpec::once(at(15, 0, 0));
        spec.start = Some(at(18, 0, 0));
        let mut trigger = spec.build(at(0, 0, 0)).unwrap();
        assert_eq!(trigger.window_start(), at(15, 0, 0));
        assert_eq!(trigger.first_fire_time(at(0, 0, 0)), Some(at(15, 0, 0)));
    }

    #[test]
    fn test_trigger_spec_reports_syntax_error() {
        let spec = TriggerSpec::cron("0 9 * * *");
        assert!(matches!(
            spec.build(at(0, 0, 0)),
            Err(SchedulerError::InvalidCronSyntax { .. })
        ));
    }

    #[test]
    fn test_trigger_spec_deserialization() {
        let json = r#"{
            "type": "interval",
            "seconds": 30,
            "end": "2024-01-01T00:01:00Z",
            "skip_overdue": true
        }"#;
        let spec: TriggerSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec.kind, TriggerSpecKind::Interval { seconds } if seconds == 30.0));
        assert!(spec.skip_overdue);
        assert!(spec.start.is_none());

        let trigger = spec.build(at(0, 0, 0)).unwrap();
        assert_eq!(trigger.window_end(), at(0, 1, 0));
        assert!(trigger.skips_overdue());
    }

    #[test]
    fn test_trigger_spec_weekly_deserialization() {
        let json = r#"{"type": "weekly", "weekday": "Fri", "at": "17:45:00"}"#;
        let spec: TriggerSpec = serde_json::from_str(json).unwrap();
        match spec.kind {
            TriggerSpecKind::Weekly { weekday, at } => {
                assert_eq!(weekday, Weekday::Fri);
                assert_eq!(at, NaiveTime::from_hms_opt(17, 45, 0).unwrap());
            }
            other => panic!("Expected weekly trigger, got {:?}", other),
        }
    }

    #[test]
    fn test_trigger_spec_serialization() {
        let spec = TriggerSpec::cron("0 0 9 * * *");
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"type\":\"cron\""));
        assert!(json.contains("0 0 9 * * *"));

        let deserialized: TriggerSpec = serde_json::from_str(&json).unwrap();
        if let TriggerSpecKind::Cron { expression } = deserialized.kind {
            assert_eq!(expression, "0 0 9 * * *");
        } else {
            panic!("Deserialization failed");
        }
    }

    #[test]
    fn test_trigger_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TriggerState::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(TriggerState::Running.to_string(), "Running");
    }
