//! Plain-text rendering of the dashboard.

use std::io::{self, Write};

use weather_dashboard_core::{
    ChartMetric, ChartPoint, DailySummary, WeatherView, aggregate::round_half_up, model::icon_url,
};

const BAR_WIDTH: f64 = 30.0;

pub fn weather_card(out: &mut impl Write, view: &WeatherView, saved: bool) -> io::Result<()> {
    let current = &view.current;
    let badge = if saved { "★ Saved" } else { "☆ Save" };

    writeln!(out, "{}  [{badge}]", current.display_name())?;
    writeln!(
        out,
        "{}°C  {} — {}",
        round_half_up(current.temp_c),
        current.condition_main,
        current.condition_description
    )?;
    writeln!(out, "Feels like {}°C", round_half_up(current.feels_like_c))?;
    writeln!(
        out,
        "Humidity: {}% • Wind: {} m/s",
        current.humidity_pct, current.wind_speed_mps
    )?;
    if !current.condition_icon.is_empty() {
        writeln!(out, "Icon: {}", icon_url(&current.condition_icon))?;
    }
    writeln!(out)
}

pub fn daily_cards(out: &mut impl Write, daily: &[DailySummary]) -> io::Result<()> {
    if daily.is_empty() {
        return Ok(());
    }

    writeln!(out, "{}-Day Forecast", daily.len())?;
    for day in daily {
        writeln!(
            out,
            "  {:<4}{:<8}{:>4}°C  {}",
            day.day_label, day.date_label, day.avg_temp_c, day.representative_condition
        )?;
    }
    writeln!(out)
}

pub fn trend(out: &mut impl Write, chart: &[ChartPoint], metric: ChartMetric) -> io::Result<()> {
    if chart.is_empty() {
        return Ok(());
    }

    writeln!(out, "Trend (3h intervals): {} [{}]", metric.label(), metric.axis_label())?;

    let values: Vec<f64> = chart.iter().map(|p| metric.value(p)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    for (point, value) in chart.iter().zip(&values) {
        let bar = "█".repeat(bar_len(*value, min, max));
        writeln!(out, "  {:<10}{:>9}  {bar}", point.local_time_label, metric.format_value(point))?;
    }
    Ok(())
}

fn bar_len(value: f64, min: f64, max: f64) -> usize {
    let range = max - min;
    if range <= f64::EPSILON {
        return BAR_WIDTH as usize;
    }
    1 + ((value - min) / range * (BAR_WIDTH - 1.0)).round() as usize
}

pub fn saved_list(out: &mut impl Write, cities: &[String]) -> io::Result<()> {
    if cities.is_empty() {
        return writeln!(out, "No saved locations yet.");
    }

    writeln!(out, "Saved Locations")?;
    for city in cities {
        writeln!(out, "  {city}")?;
    }
    Ok(())
}
