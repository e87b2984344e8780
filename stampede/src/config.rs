//! YAML run configuration and its merge with CLI flags.
//!
//! Precedence: CLI flag, then environment variable (clap reads `STAMPEDE_*` into the same
//! flag), then the YAML file, then the scenario default.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use stampede_core::ScenarioConfig;
use stampede_core::thresholds::{ThresholdSet, validate_thresholds};

use crate::cli::{RunArgs, parse_duration};
use crate::scenarios::{
    DEFAULT_BASE_URL, DEFAULT_PROPERTY_IDS, ScenarioKind, SearchQuery, Settings,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub vus: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,
    pub iterations: Option<u64>,
    #[serde(default)]
    pub pause: Option<YamlDuration>,
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    #[serde(default)]
    pub property_ids: Vec<String>,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,
    pub search: Option<SearchQuery>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration cannot be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                parse_duration(v).map(YamlDuration).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprYaml {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(expr) => vec![expr],
            Self::Many(exprs) => exprs,
        }
    }
}

pub(crate) fn parse_config(text: &str) -> anyhow::Result<ConfigFile> {
    // An empty document deserializes as unit, not as an empty map.
    if text.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(text).context("invalid YAML config")
}

pub(crate) fn load_config(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("in {}", path.display()))
}

/// Everything a run needs once flags, env, file and defaults are merged.
#[derive(Debug, Clone)]
pub(crate) struct RunPlan {
    pub scenario: ScenarioConfig,
    pub settings: Settings,
    pub thresholds: Vec<ThresholdSet>,
}

pub(crate) fn resolve(args: &RunArgs, file: ConfigFile) -> anyhow::Result<RunPlan> {
    let defaults = args.scenario.defaults();

    let scenario = ScenarioConfig {
        vus: args.vus.or(file.vus).unwrap_or(defaults.vus),
        duration: args
            .duration
            .or(file.duration.map(YamlDuration::into_inner))
            .unwrap_or(defaults.duration),
        pause: Some(
            args.pause
                .or(file.pause.map(YamlDuration::into_inner))
                .unwrap_or(defaults.pause),
        ),
        iterations: args.iterations.or(file.iterations),
        seed: args.seed.or(file.seed),
        request_timeout: args.timeout.or(file.timeout.map(YamlDuration::into_inner)),
    };

    let base_url = args
        .base_url
        .clone()
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        anyhow::bail!("base url must start with http:// or https:// (got `{base_url}`)");
    }

    let property_ids = if !args.property_ids.is_empty() {
        args.property_ids.clone()
    } else if !file.property_ids.is_empty() {
        file.property_ids
    } else {
        DEFAULT_PROPERTY_IDS.iter().map(|s| s.to_string()).collect()
    };
    if property_ids.iter().any(|id| id.trim().is_empty()) {
        anyhow::bail!("property ids cannot be empty");
    }

    let auth_token = args
        .auth_token
        .clone()
        .or(file.auth_token)
        .filter(|t| !t.trim().is_empty());
    if args.scenario.requires_auth() && auth_token.is_none() {
        anyhow::bail!(
            "scenario `{}` needs an auth token (--auth-token, STAMPEDE_AUTH_TOKEN or `authToken` in the config)",
            args.scenario
        );
    }

    let thresholds = merge_thresholds(args.scenario, file.thresholds, &args.thresholds);
    validate_thresholds(&thresholds).context("invalid threshold")?;

    Ok(RunPlan {
        scenario,
        settings: Settings {
            base_url,
            auth_token,
            property_ids,
            search: file.search.unwrap_or_default(),
        },
        thresholds,
    })
}

/// Later sources replace all expressions of a metric set by earlier ones.
fn merge_thresholds(
    kind: ScenarioKind,
    file: BTreeMap<String, ThresholdExprYaml>,
    cli: &[(String, String)],
) -> Vec<ThresholdSet> {
    let mut merged: BTreeMap<String, Vec<String>> = kind
        .defaults()
        .thresholds
        .iter()
        .map(|(metric, expr)| (metric.to_string(), vec![expr.to_string()]))
        .collect();

    for (metric, exprs) in file {
        merged.insert(metric, exprs.into_vec());
    }

    let mut from_cli: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (metric, expr) in cli {
        from_cli
            .entry(metric.clone())
            .or_default()
            .push(expr.clone());
    }
    merged.extend(from_cli);

    merged
        .into_iter()
        .map(|(metric, expressions)| ThresholdSet {
            metric,
            expressions,
        })
        .collect()
}
