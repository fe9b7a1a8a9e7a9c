use std::collections::{BTreeMap, HashMap};

use url::Url;

use crate::types::{Label, SourceCount};

/// Percentage of "Fake" labels, rounded to one decimal. Zero when empty.
pub fn fake_share(label_counts: &BTreeMap<String, u64>) -> f64 {
    let total: u64 = label_counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let fake = label_counts.get(Label::Fake.as_str()).copied().unwrap_or(0);
    let share = fake as f64 / total as f64 * 100.0;
    (share * 10.0).round() / 10.0
}

/// Host of a URL, with the port when one is given explicitly.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Counts domains across `urls` and returns the `limit` most frequent.
pub fn top_sources<I, S>(urls: I, limit: usize) -> Vec<SourceCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for url in urls {
        if let Some(domain) = domain_of(url.as_ref()) {
            *counts.entry(domain).or_insert(0) += 1;
        }
    }

    let mut sources: Vec<SourceCount> = counts
        .into_iter()
        .map(|(domain, count)| SourceCount { domain, count })
        .collect();
    sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    sources.truncate(limit);
    sources
}
