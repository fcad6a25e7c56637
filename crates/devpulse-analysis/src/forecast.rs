//! Next-week churn forecast via ordinary least squares.
//!
//! This is a naive deterministic point forecast: a straight line through the
//! weekly totals, extended one period. No seasonality, no confidence
//! interval, no outlier handling.

use chrono::Duration;
use devpulse_core::{ChurnPoint, DevpulseError, Forecast, ForecastMethod, ForecastOutcome};

/// Length of one forecast period in days.
pub const PERIOD_DAYS: i64 = 7;

/// Forecast churn for the period after the last point in `history`.
///
/// The regression uses elapsed days since the first point as the x-axis, so
/// irregular spacing is tolerated. The fitted line is evaluated one period
/// (7 days) past the last point and rounded to two decimals. When every point
/// shares the same date the fit is singular and a flat forecast (mean churn,
/// zero slope) is returned instead.
///
/// # Errors
///
/// Returns [`DevpulseError::Validation`] if `history` is not ordered by
/// ascending `period_start`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use devpulse_core::{ChurnPoint, ForecastOutcome};
/// use devpulse_analysis::forecast::forecast;
///
/// let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
/// let history = vec![
///     ChurnPoint { period_start: day(1), total_churn: 100 },
///     ChurnPoint { period_start: day(8), total_churn: 200 },
///     ChurnPoint { period_start: day(15), total_churn: 300 },
/// ];
/// let ForecastOutcome::Forecast(f) = forecast(&history).unwrap() else { panic!() };
/// assert_eq!(f.forecast_churn, 400.0);
/// assert_eq!(f.forecast_period_start, day(22));
///
/// assert_eq!(forecast(&history[..1]).unwrap(), ForecastOutcome::InsufficientData);
/// ```
pub fn forecast(history: &[ChurnPoint]) -> Result<ForecastOutcome, DevpulseError> {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return Ok(ForecastOutcome::InsufficientData);
    };
    if history.len() < 2 {
        return Ok(ForecastOutcome::InsufficientData);
    }

    if let Some(pair) = history
        .windows(2)
        .find(|w| w[1].period_start < w[0].period_start)
    {
        return Err(DevpulseError::Validation(format!(
            "churn history must be in ascending order, but {} follows {}",
            pair[1].period_start, pair[0].period_start
        )));
    }

    let xs: Vec<f64> = history
        .iter()
        .map(|p| (p.period_start - first.period_start).num_days() as f64)
        .collect();
    let ys: Vec<f64> = history.iter().map(|p| p.total_churn as f64).collect();

    let n = history.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let x_diff = x - x_mean;
        numerator += x_diff * (y - y_mean);
        denominator += x_diff * x_diff;
    }

    let target_x = (last.period_start - first.period_start).num_days() as f64 + PERIOD_DAYS as f64;
    let forecast_period_start = last
        .period_start
        .checked_add_signed(Duration::days(PERIOD_DAYS))
        .ok_or_else(|| {
            DevpulseError::Validation(format!(
                "no period follows {}; the date is out of range",
                last.period_start
            ))
        })?;

    let (slope, intercept, method) = if denominator.abs() < f64::EPSILON {
        tracing::warn!(
            points = history.len(),
            "all history points share one date; using flat forecast"
        );
        (0.0, y_mean, ForecastMethod::Flat)
    } else {
        let slope = numerator / denominator;
        (slope, y_mean - slope * x_mean, ForecastMethod::Trend)
    };

    let value = slope * target_x + intercept;

    Ok(ForecastOutcome::Forecast(Forecast {
        forecast_period_start,
        forecast_churn: round2(value),
        slope,
        intercept,
        method,
    }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
