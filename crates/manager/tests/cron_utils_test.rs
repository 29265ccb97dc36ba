#[cfg(test)]
mod cron_utils_tests {
    use schedule_manager::cron_utils::*;

    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    #[test]
    fn test_cron_scheduler_creation() {
        let scheduler = CronScheduler::new("0 0 0 * * *");
        assert!(scheduler.is_ok());
        let scheduler = CronScheduler::new("invalid");
        assert!(scheduler.is_err());
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 */5 * * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 0 9-17 * * Mon-Fri").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("0 60 * * * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_next_time_is_strictly_after() {
        let scheduler = CronScheduler::new("0 * * * * *").unwrap();

        // 恰好落在触发点上时，返回的必须是下一个触发点
        let on_the_minute = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_time_after(on_the_minute).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap());
    }

    #[test]
    fn test_next_time_daily_midnight() {
        let scheduler = CronScheduler::new("0 0 0 * * *").unwrap();

        let noon = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_time_after(noon).unwrap();
        assert_eq!(next.day(), 2);
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 0);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn test_next_time_day_of_month() {
        let scheduler = CronScheduler::new("0 0 0 1 * *").unwrap();

        let mid_january = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let next = scheduler.next_time_after(mid_january).unwrap();
        assert_eq!(next.month(), 2);
        assert_eq!(next.day(), 1);
    }

    #[test]
    fn test_next_time_day_of_week() {
        let scheduler = CronScheduler::new("0 0 0 * * Wed").unwrap();

        // 2024-01-01 是周一，下一个周三是 2024-01-03
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = scheduler.next_time_after(monday).unwrap();
        assert_eq!(next.weekday(), Weekday::Wed);
        assert_eq!(next.day(), 3);
    }

    #[test]
    fn test_next_time_month_rollover() {
        let scheduler = CronScheduler::new("0 30 9 * * *").unwrap();

        let end_of_month = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
        let next = scheduler.next_time_after(end_of_month).unwrap();
        assert_eq!(next.month(), 2);
        assert_eq!(next.day(), 1);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn test_next_time_leap_day() {
        let scheduler = CronScheduler::new("0 0 0 29 2 *").unwrap();

        let early_2024 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = scheduler.next_time_after(early_2024).unwrap();
        assert_eq!(next.year(), 2024);
        assert_eq!(next.month(), 2);
        assert_eq!(next.day(), 29);

        // 2024年2月29日之后，下一个闰日在2028年
        let after = scheduler.next_time_after(next).unwrap();
        assert_eq!(after.year(), 2028);
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_year_field() {
        let scheduler = CronScheduler::new("0 0 0 1 1 * 2099").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = scheduler.next_time_after(now).unwrap();
        assert_eq!(next.year(), 2099);
    }
}
