//! Turns the provider's flat 3-hour sample stream into daily cards and
//! chart points.
//!
//! Everything here is pure: the same payload always yields the same output,
//! and nothing is mutated after it is built.

use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;

use crate::model::{ChartPoint, DailySummary, RawSample, WeatherReport, WeatherView};

/// Number of daily cards shown for a 5-day forecast.
pub const MAX_DAILY_SUMMARIES: usize = 5;

/// Groups samples by calendar date and summarizes each date.
///
/// Dates keep the order in which they are first seen and only the first
/// [`MAX_DAILY_SUMMARIES`] are returned. Empty input yields an empty result.
pub fn group_into_daily_summaries<F>(samples: &[RawSample], calendar_date_of: F) -> Vec<DailySummary>
where
    F: Fn(&RawSample) -> String,
{
    let mut order: Vec<(String, Vec<&RawSample>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for sample in samples {
        let date = calendar_date_of(sample);
        match index.get(&date) {
            Some(&slot) => order[slot].1.push(sample),
            None => {
                index.insert(date.clone(), order.len());
                order.push((date, vec![sample]));
            }
        }
    }

    order
        .into_iter()
        .take(MAX_DAILY_SUMMARIES)
        .map(|(date, day)| summarize_day(date, &day))
        .collect()
}

fn summarize_day(calendar_date: String, day: &[&RawSample]) -> DailySummary {
    let total: f64 = day.iter().map(|s| s.temp_c).sum();
    let avg = total / day.len() as f64;

    // Never empty: a date only exists once a sample has been filed under it.
    let representative = day[day.len() / 2];
    let (day_label, date_label) = day_labels(&calendar_date);

    DailySummary {
        calendar_date,
        day_label,
        date_label,
        avg_temp_c: round_half_up(avg),
        representative_condition: representative.condition_main.clone(),
        representative_icon: representative.condition_icon.clone(),
    }
}

/// Calendar date taken from the provider's own timestamp text
/// (`"2024-08-28 12:00:00"` → `"2024-08-28"`).
///
/// Samples without that text fall back to the UTC date of `timestamp_utc`.
pub fn provider_calendar_date(sample: &RawSample) -> String {
    match sample.local_time_text.as_deref() {
        Some(text) if !text.trim().is_empty() => {
            text.split_whitespace().next().unwrap_or(text).to_string()
        }
        _ => DateTime::from_timestamp(sample.timestamp_utc, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }
}

/// `("Wed", "Aug 28")` for `"2024-08-28"`. A key that is not a date is used
/// verbatim for both labels.
pub fn day_labels(calendar_date: &str) -> (String, String) {
    match NaiveDate::parse_from_str(calendar_date, "%Y-%m-%d") {
        Ok(date) => (date.format("%a").to_string(), date.format("%b %-d").to_string()),
        Err(_) => (calendar_date.to_string(), calendar_date.to_string()),
    }
}

/// One chart point per sample, in input order.
///
/// Labels are `"Wed 14:00"` in the location's own time: the offset is added
/// to the UTC timestamp and the result is formatted as UTC, so the host's
/// timezone never leaks in.
pub fn build_chart_series(samples: &[RawSample], utc_offset_seconds: i64) -> Vec<ChartPoint> {
    samples
        .iter()
        .map(|sample| ChartPoint {
            local_time_label: local_time_label(sample.timestamp_utc, utc_offset_seconds),
            temp_c: sample.temp_c,
            feels_like_c: sample.feels_like_c,
            humidity_pct: sample.humidity_pct,
            wind_speed_mps: sample.wind_speed_mps,
            precip_pct: precip_pct(sample.precip_probability),
        })
        .collect()
}

pub fn local_time_label(timestamp_utc: i64, utc_offset_seconds: i64) -> String {
    timestamp_utc
        .checked_add(utc_offset_seconds)
        .and_then(|local| DateTime::from_timestamp(local, 0))
        .map(|dt| dt.format("%a %H:%M").to_string())
        .unwrap_or_default()
}

fn precip_pct(probability: Option<f64>) -> u8 {
    round_half_up(probability.unwrap_or(0.0) * 100.0).clamp(0, 100) as u8
}

/// Rounds .5 towards positive infinity, so `10.5 → 11` and `-2.5 → -2`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Builds the display snapshot for a committed report.
pub fn summarize(report: WeatherReport) -> WeatherView {
    let WeatherReport { current, forecast } = report;
    let daily = group_into_daily_summaries(&forecast.samples, provider_calendar_date);
    let chart = build_chart_series(&forecast.samples, forecast.context.utc_offset_seconds);

    WeatherView { current, context: forecast.context, daily, chart }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentConditions, Forecast, LocationContext};

    fn sample(ts: i64, text: &str, temp: f64, icon: &str) -> RawSample {
        RawSample {
            timestamp_utc: ts,
            local_time_text: Some(text.to_string()),
            temp_c: temp,
            feels_like_c: temp - 1.0,
            humidity_pct: 50,
            wind_speed_mps: 3.5,
            precip_probability: Some(0.2),
            condition_main: format!("cond-{icon}"),
            condition_icon: icon.to_string(),
        }
    }

    /// Eight samples per day starting 2024-08-28 00:00 UTC.
    fn days(count: usize) -> Vec<RawSample> {
        let start = 1_724_803_200;
        (0..count * 8)
            .map(|i| {
                let ts = start + i as i64 * 3 * 3600;
                let text = DateTime::from_timestamp(ts, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                sample(ts, &text, 20.0, "01d")
            })
            .collect()
    }

    #[test]
    fn empty_samples_yield_empty_results() {
        assert!(group_into_daily_summaries(&[], provider_calendar_date).is_empty());
        assert!(build_chart_series(&[], 18_000).is_empty());
    }

    #[test]
    fn summary_count_is_capped_at_five_in_first_seen_order() {
        for d in 1..=7 {
            let summaries = group_into_daily_summaries(&days(d), provider_calendar_date);
            assert_eq!(summaries.len(), d.min(MAX_DAILY_SUMMARIES));
        }

        let summaries = group_into_daily_summaries(&days(6), provider_calendar_date);
        let dates: Vec<&str> = summaries.iter().map(|s| s.calendar_date.as_str()).collect();
        assert_eq!(
            dates,
            ["2024-08-28", "2024-08-29", "2024-08-30", "2024-08-31", "2024-09-01"]
        );
    }

    #[test]
    fn dates_keep_first_seen_order_not_sorted_order() {
        let samples = vec![
            sample(3, "2024-08-30 00:00:00", 10.0, "a"),
            sample(1, "2024-08-28 00:00:00", 10.0, "b"),
            sample(4, "2024-08-30 03:00:00", 10.0, "c"),
        ];

        let summaries = group_into_daily_summaries(&samples, provider_calendar_date);
        let dates: Vec<&str> = summaries.iter().map(|s| s.calendar_date.as_str()).collect();
        assert_eq!(dates, ["2024-08-30", "2024-08-28"]);
    }

    #[test]
    fn average_is_rounded_half_up() {
        let samples = vec![
            sample(1, "2024-08-28 00:00:00", 10.2, "a"),
            sample(2, "2024-08-28 03:00:00", 11.8, "b"),
            sample(3, "2024-08-29 00:00:00", 10.4, "c"),
            sample(4, "2024-08-29 03:00:00", 10.6, "d"),
            sample(5, "2024-08-30 00:00:00", -2.4, "e"),
            sample(6, "2024-08-30 03:00:00", -2.6, "f"),
        ];

        let summaries = group_into_daily_summaries(&samples, provider_calendar_date);
        let avgs: Vec<i64> = summaries.iter().map(|s| s.avg_temp_c).collect();
        assert_eq!(avgs, [11, 11, -2]);
    }

    #[test]
    fn representative_is_the_middle_sample() {
        let samples = vec![
            sample(1, "2024-08-28 00:00:00", 10.0, "A"),
            sample(2, "2024-08-28 03:00:00", 10.0, "B"),
            sample(3, "2024-08-28 06:00:00", 10.0, "C"),
            sample(4, "2024-08-29 00:00:00", 10.0, "A"),
            sample(5, "2024-08-29 03:00:00", 10.0, "B"),
        ];

        let summaries = group_into_daily_summaries(&samples, provider_calendar_date);
        assert_eq!(summaries[0].representative_icon, "B");
        assert_eq!(summaries[0].representative_condition, "cond-B");
        assert_eq!(summaries[1].representative_icon, "A");
    }

    #[test]
    fn labels_are_weekday_and_short_date() {
        let summaries =
            group_into_daily_summaries(&[sample(1, "2024-08-28 09:00:00", 1.0, "a")], provider_calendar_date);
        assert_eq!(summaries[0].day_label, "Wed");
        assert_eq!(summaries[0].date_label, "Aug 28");

        assert_eq!(day_labels("2024-09-01"), ("Sun".to_string(), "Sep 1".to_string()));
        assert_eq!(day_labels("someday"), ("someday".to_string(), "someday".to_string()));
    }

    #[test]
    fn custom_date_key_is_respected() {
        let samples = days(2);
        let summaries = group_into_daily_summaries(&samples, |_| "all".to_string());
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].calendar_date, "all");
    }

    #[test]
    fn calendar_date_falls_back_to_utc_timestamp() {
        let mut s = sample(1_724_846_400, "", 1.0, "a");
        assert_eq!(provider_calendar_date(&s), "2024-08-28");

        s.local_time_text = None;
        assert_eq!(provider_calendar_date(&s), "2024-08-28");
    }

    #[test]
    fn chart_preserves_order_and_count() {
        let samples = vec![
            sample(30, "2024-08-28 00:00:00", 3.0, "a"),
            sample(10, "2024-08-28 00:00:00", 1.0, "b"),
            sample(10, "2024-08-28 00:00:00", 2.0, "c"),
        ];

        let chart = build_chart_series(&samples, 0);
        let temps: Vec<f64> = chart.iter().map(|p| p.temp_c).collect();
        assert_eq!(temps, [3.0, 1.0, 2.0]);
    }

    #[test]
    fn chart_precip_is_rounded_percentage() {
        let mut samples = vec![sample(0, "", 1.0, "a"), sample(0, "", 1.0, "b"), sample(0, "", 1.0, "c")];
        samples[0].precip_probability = Some(0.37);
        samples[1].precip_probability = None;
        samples[2].precip_probability = Some(1.0);

        let pcts: Vec<u8> = build_chart_series(&samples, 0).iter().map(|p| p.precip_pct).collect();
        assert_eq!(pcts, [37, 0, 100]);
    }

    #[test]
    fn chart_labels_use_location_offset() {
        // 2024-08-28 21:00 UTC
        let samples = vec![sample(1_724_878_800, "", 1.0, "a")];

        assert_eq!(build_chart_series(&samples, 0)[0].local_time_label, "Wed 21:00");
        // Karachi, UTC+5
        assert_eq!(build_chart_series(&samples, 18_000)[0].local_time_label, "Thu 02:00");
        // UTC-3
        assert_eq!(build_chart_series(&samples, -10_800)[0].local_time_label, "Wed 18:00");
    }

    #[test]
    fn summarize_builds_daily_and_chart_from_one_report() {
        let report = WeatherReport {
            current: CurrentConditions {
                city_name: "Multan".into(),
                country: Some("PK".into()),
                temp_c: 35.0,
                feels_like_c: 38.0,
                humidity_pct: 30,
                wind_speed_mps: 4.1,
                condition_main: "Clear".into(),
                condition_description: "clear sky".into(),
                condition_icon: "01d".into(),
            },
            forecast: Forecast {
                context: LocationContext { utc_offset_seconds: 18_000 },
                samples: days(2),
            },
        };

        let view = summarize(report);
        assert_eq!(view.daily.len(), 2);
        assert_eq!(view.chart.len(), 16);
        assert_eq!(view.chart[0].local_time_label, "Wed 05:00");
        assert_eq!(view.context.utc_offset_seconds, 18_000);
    }
}
