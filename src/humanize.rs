//! Compact renderings for CLI output.

const SUFFIXES: [(i64, &str); 5] = [
    (1_000_000_000_000_000, "q"),
    (1_000_000_000_000, "t"),
    (1_000_000_000, "b"),
    (1_000_000, "m"),
    (1_000, "k"),
];

/// Render `value` with a magnitude suffix and at most one truncated decimal:
/// `950`, `1.5k`, `12m`, `-3.2b`.
pub fn humanize(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    for (mag, suffix) in SUFFIXES {
        let mag = mag as u64;
        if abs >= mag {
            let whole = abs / mag;
            let tenth = (abs % mag) * 10 / mag;
            return if tenth == 0 {
                format!("{sign}{whole}{suffix}")
            } else {
                format!("{sign}{whole}.{tenth}{suffix}")
            };
        }
    }
    format!("{sign}{abs}")
}

/// Render a probability as `1 in N`, humanized. Zero renders as `never`.
pub fn one_in(probability: f64) -> String {
    if probability.is_nan() || probability <= 0.0 {
        return "never".into();
    }
    let n = (1.0 / probability).round();
    if n >= i64::MAX as f64 {
        return "never".into();
    }
    format!("1 in {}", humanize(n as i64))
}

/// Render a probability as a percentage with enough precision to be nonzero.
pub fn percent(probability: f64) -> String {
    let pct = probability * 100.0;
    if pct == 0.0 || pct >= 1.0 {
        format!("{pct:.2}%")
    } else {
        let digits = (-pct.log10()).ceil() as usize + 2;
        format!("{pct:.digits$}%")
    }
}
