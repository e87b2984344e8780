use std::fmt::Write as _;

use clap::ValueEnum as _;

use crate::scenarios::ScenarioKind;

pub fn list() {
    print!("{}", render());
}

fn render() -> String {
    let kinds = ScenarioKind::value_variants();
    let width = kinds
        .iter()
        .map(|k| k.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for kind in kinds {
        let d = kind.defaults();
        let auth = if kind.requires_auth() { " [auth]" } else { "" };
        writeln!(&mut out, "{:<width$}  {}{auth}", kind.to_string(), kind.description()).ok();
        writeln!(
            &mut out,
            "{:<width$}  defaults: vus={} duration={} pause={}",
            "",
            d.vus,
            humantime::format_duration(d.duration),
            humantime::format_duration(d.pause),
        )
        .ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_is_listed_with_defaults() {
        let out = render();
        for name in ["app-reports", "sensor-reports", "property-search", "reservations"] {
            assert!(out.contains(name), "{name} missing from:\n{out}");
        }
        assert!(out.contains("defaults: vus=100 duration=1m pause=1s"));
        assert!(out.contains("defaults: vus=100 duration=1s pause=10ms"));
    }
}
