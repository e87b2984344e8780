use std::time::Duration;

/// One rounded component in us, ms or s. Keeps progress lines short.
pub(crate) fn format_duration_single(d: Duration) -> String {
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    // Ties round up.
    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    format!("{}us", round_div(total_ns, NS_PER_US))
}

/// Latency in milliseconds as stored by the histogram summaries.
pub(crate) fn format_ms_opt(ms: Option<f64>) -> String {
    match ms {
        Some(v) if v.is_finite() && v >= 1000.0 => format!("{:.2}s", v / 1000.0),
        Some(v) if v.is_finite() => format!("{v:.2}ms"),
        _ => "-".to_string(),
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}
