use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use fastgets_core::{FastgetsError, FastgetsResult};

/// CRON表达式解析和触发时间计算
///
/// 接受标准的5字段表达式（分 时 日 月 周），以及带秒的6字段、带年份的7字段表达式。
/// 5字段表达式在解析前补齐秒字段为0，周字段按标准cron解释（0和7为周日，1为周一），
/// 6/7字段表达式沿用 `cron` crate 的写法（1为周日）。原始表达式保持不变。
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expr: String,
    schedule: Schedule,
}

impl CronTrigger {
    pub fn parse(expr: &str) -> FastgetsResult<Self> {
        let invalid = |message: String| FastgetsError::InvalidTrigger {
            expr: expr.to_string(),
            message,
        };

        let fields = expr.split_whitespace().count();
        let normalized = match fields {
            0 => return Err(invalid("触发表达式不能为空".to_string())),
            5 => {
                let mut parts: Vec<&str> = expr.split_whitespace().collect();
                let day_of_week = standard_day_of_week(parts[4]).map_err(invalid)?;
                parts[4] = &day_of_week;
                format!("0 {}", parts.join(" "))
            }
            6 | 7 => expr.trim().to_string(),
            n => return Err(invalid(format!("字段数量必须为5、6或7，实际为{n}"))),
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// 区间 `(from, until]` 内最晚的触发时间
    pub fn latest_fire_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if from >= until {
            return None;
        }
        self.schedule
            .after(&from)
            .take_while(|fire_at| *fire_at <= until)
            .last()
    }

    /// 严格晚于 `after` 的下一次触发时间
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

}

/// 把标准cron的周字段（0-7，0和7为周日）改写为 `cron` crate 的1-7（1为周日）
///
/// 数字项展开为逗号列表，`*`、`?` 和英文缩写原样保留。
fn standard_day_of_week(field: &str) -> Result<String, String> {
    let mut rewritten = Vec::new();
    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) || item == "*" || item == "?" {
            rewritten.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("周字段步长无效: {item}"))?;
                if step == 0 {
                    return Err(format!("周字段步长不能为0: {item}"));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (day_number(start)?, day_number(end)?),
                None if step > 1 => (day_number(range)?, 6),
                None => {
                    let day = day_number(range)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("周字段范围无效: {item}"));
        }

        let mut days: Vec<u32> = (start..=end)
            .step_by(step as usize)
            .map(|day| day % 7 + 1)
            .collect();
        days.sort_unstable();
        days.dedup();
        rewritten.extend(days.into_iter().map(|day| day.to_string()));
    }
    Ok(rewritten.join(","))
}

fn day_number(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("周字段取值必须在0-7之间: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn five_field_expressions_fire_on_the_minute() {
        let trigger = CronTrigger::parse("*/15 * * * *").unwrap();
        assert_eq!(trigger.expr(), "*/15 * * * *");
        assert_eq!(trigger.next_after(at(10, 1, 0)), Some(at(10, 15, 0)));
    }

    #[test]
    fn seconds_field_is_supported() {
        let trigger = CronTrigger::parse("30 * * * * *").unwrap();
        assert_eq!(trigger.next_after(at(10, 0, 0)), Some(at(10, 0, 30)));
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        for expr in ["", "   ", "not a cron", "* * *", "99 * * * *"] {
            assert!(
                matches!(
                    CronTrigger::parse(expr),
                    Err(FastgetsError::InvalidTrigger { .. })
                ),
                "{expr:?} should be invalid"
            );
        }
    }

    #[test]
    fn latest_fire_uses_half_open_window() {
        let trigger = CronTrigger::parse("* * * * *").unwrap();
        // 窗口 (10:00:00, 10:03:00] 内最晚的是 10:03:00
        assert_eq!(
            trigger.latest_fire_between(at(10, 0, 0), at(10, 3, 0)),
            Some(at(10, 3, 0))
        );
        // 下界不包含
        assert_eq!(trigger.latest_fire_between(at(10, 0, 0), at(10, 0, 30)), None);
        assert_eq!(trigger.latest_fire_between(at(10, 5, 0), at(10, 5, 0)), None);
    }

    fn midnight(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    // 2024-03-01 是周五
    #[test]
    fn five_field_day_of_week_follows_standard_cron() {
        let friday = CronTrigger::parse("0 0 * * 5").unwrap();
        assert_eq!(friday.next_after(at(12, 0, 0)), Some(midnight(8)));

        for sunday in ["0 0 * * 0", "0 0 * * 7"] {
            let trigger = CronTrigger::parse(sunday).unwrap();
            assert_eq!(trigger.next_after(at(12, 0, 0)), Some(midnight(3)), "{sunday}");
        }

        let weekdays = CronTrigger::parse("0 0 * * 1-5").unwrap();
        assert_eq!(weekdays.next_after(at(12, 0, 0)), Some(midnight(4)));

        let weekend = CronTrigger::parse("0 0 * * 6,0").unwrap();
        assert_eq!(weekend.next_after(at(12, 0, 0)), Some(midnight(2)));
    }

    #[test]
    fn day_of_week_rewrite() {
        assert_eq!(standard_day_of_week("*").unwrap(), "*");
        assert_eq!(standard_day_of_week("0").unwrap(), "1");
        assert_eq!(standard_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(standard_day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(standard_day_of_week("MON-FRI").unwrap(), "MON-FRI");
        assert!(standard_day_of_week("8").is_err());
        assert!(standard_day_of_week("5-1").is_err());
        assert!(standard_day_of_week("*/0").is_err());
    }

    #[test]
    fn six_field_day_of_week_is_passed_through() {
        // 带秒的表达式沿用 cron crate 的周编号，6 为周五
        let trigger = CronTrigger::parse("0 0 0 * * 6").unwrap();
        assert_eq!(trigger.next_after(at(12, 0, 0)), Some(midnight(8)));
    }
}
