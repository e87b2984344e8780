use stampede_metrics::{MetricKind, Registry};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("empty threshold")]
    Empty,

    #[error("invalid threshold (missing operator): {0}")]
    MissingOperator(String),

    #[error("invalid threshold: {0}")]
    Malformed(String),

    #[error("unknown aggregation `{agg}` in threshold: {raw}")]
    UnknownAggregation { agg: String, raw: String },

    #[error("invalid percentile in threshold: {0}")]
    InvalidPercentile(String),

    #[error("percentile out of range in threshold: {0}")]
    PercentileOutOfRange(String),

    #[error("invalid numeric value in threshold: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
}

impl ThresholdOp {
    /// Splits `lhs<op>rhs` at the first comparison operator.
    fn split(s: &str) -> Option<(&str, Self, &str)> {
        let pos = s.find(['<', '>', '='])?;
        let (lhs, rest) = s.split_at(pos);
        let (op, len) = match rest.as_bytes() {
            [b'<', b'=', ..] => (Self::Lte, 2),
            [b'>', b'=', ..] => (Self::Gte, 2),
            [b'=', b'=', ..] => (Self::Eq, 2),
            [b'<', ..] => (Self::Lt, 1),
            [b'>', ..] => (Self::Gt, 1),
            _ => return None,
        };
        Some((lhs, op, &rest[len..]))
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => left == right,
        }
    }
}

impl ThresholdAgg {
    fn parse(name: &str, raw: &str) -> Result<Self> {
        let agg = match name.to_ascii_lowercase().as_str() {
            "avg" => Self::Avg,
            "min" => Self::Min,
            "max" => Self::Max,
            "count" => Self::Count,
            "rate" => Self::Rate,
            _ => {
                let Some(inner) = name.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) else {
                    return Err(Error::UnknownAggregation {
                        agg: name.to_string(),
                        raw: raw.to_string(),
                    });
                };
                let p: u32 = inner
                    .parse()
                    .map_err(|_| Error::InvalidPercentile(raw.to_string()))?;
                if p == 0 || p > 100 {
                    return Err(Error::PercentileOutOfRange(raw.to_string()));
                }
                Self::P(p)
            }
        };
        Ok(agg)
    }
}

/// Parses `agg op value`, e.g. `p(95)<2000` or `rate >= 0.99`. Whitespace is ignored.
pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr> {
    let compact: String = raw.split_whitespace().collect();
    if compact.is_empty() {
        return Err(Error::Empty);
    }

    let (lhs, op, rhs) =
        ThresholdOp::split(&compact).ok_or_else(|| Error::MissingOperator(raw.to_string()))?;
    if lhs.is_empty() || rhs.is_empty() {
        return Err(Error::Malformed(raw.to_string()));
    }

    Ok(ThresholdExpr {
        agg: ThresholdAgg::parse(lhs, raw)?,
        op,
        value: rhs
            .parse()
            .map_err(|_| Error::InvalidValue(raw.to_string()))?,
    })
}

/// Parses every expression without evaluating anything.
pub fn validate_thresholds(thresholds: &[ThresholdSet]) -> Result<()> {
    thresholds
        .iter()
        .flat_map(|set| set.expressions.iter())
        .try_for_each(|expr| parse_threshold_expr(expr).map(|_| ()))
}

/// Checks each expression against the metric aggregated over all of its series.
///
/// A metric that was never recorded violates every expression attached to it.
pub fn evaluate_thresholds(
    thresholds: &[ThresholdSet],
    registry: &Registry,
) -> Result<Vec<ThresholdViolation>> {
    let mut out = Vec::new();

    for set in thresholds {
        for expr_raw in &set.expressions {
            let expr = parse_threshold_expr(expr_raw)?;
            let observed = observed_value(registry, &set.metric, expr.agg);
            if !observed.is_some_and(|v| expr.op.holds(v, expr.value)) {
                out.push(ThresholdViolation {
                    metric: set.metric.clone(),
                    expression: expr_raw.clone(),
                    observed,
                });
            }
        }
    }

    Ok(out)
}

fn observed_value(registry: &Registry, metric: &str, agg: ThresholdAgg) -> Option<f64> {
    let (id, kind) = registry.lookup_metric(metric)?;
    if registry.series(id).is_empty() {
        return None;
    }

    match (kind, agg) {
        (MetricKind::Counter, ThresholdAgg::Count | ThresholdAgg::Avg) => {
            Some(registry.fold_counter_sum(id, |_| true) as f64)
        }

        (MetricKind::Rate, ThresholdAgg::Rate) => registry.fold_rate_sum(id, |_| true).2,
        (MetricKind::Rate, ThresholdAgg::Count) => {
            Some(registry.fold_rate_sum(id, |_| true).0 as f64)
        }

        (MetricKind::Histogram, ThresholdAgg::P(p)) => {
            registry.fold_histogram_percentile(id, |_| true, f64::from(p))
        }
        (MetricKind::Histogram, agg) => {
            let summary = registry.fold_histogram_summary(id, |_| true)?;
            match agg {
                ThresholdAgg::Avg => summary.mean,
                ThresholdAgg::Min => summary.min,
                ThresholdAgg::Max => summary.max,
                ThresholdAgg::Count => Some(summary.count as f64),
                ThresholdAgg::P(_) | ThresholdAgg::Rate => None,
            }
        }

        // Non-sensical combinations.
        (_, _) => None,
    }
}
