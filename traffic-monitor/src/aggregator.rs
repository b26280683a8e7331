// traffic-monitor/src/aggregator.rs
use chrono::{DateTime, Utc};
use common::LogEntry;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Per-source-IP summary derived from the log set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpAggregate {
    pub ip: String,
    pub total_requests: usize,
    /// Percentage of requests answered with a status in [200, 400)
    pub success_rate: f64,
    pub most_used_url: String,
    pub last_access: DateTime<Utc>,
}

impl IpAggregate {
    /// Success rate rounded to one decimal, as displayed
    pub fn success_rate_display(&self) -> String {
        format!("{:.1}", self.success_rate)
    }
}

#[derive(Default)]
struct Group<'a> {
    total: usize,
    successes: usize,
    last_access: DateTime<Utc>,
    // URL counts in first-seen order; `url_index` points into it
    urls: Vec<(&'a str, usize)>,
    url_index: HashMap<&'a str, usize>,
}

impl<'a> Group<'a> {
    fn add(&mut self, entry: &'a LogEntry) {
        self.total += 1;
        if entry.is_success() {
            self.successes += 1;
        }

        let ts = entry.parsed_timestamp();
        if self.total == 1 || ts > self.last_access {
            self.last_access = ts;
        }

        match self.url_index.get(entry.url.as_str()) {
            Some(&i) => self.urls[i].1 += 1,
            None => {
                self.url_index.insert(entry.url.as_str(), self.urls.len());
                self.urls.push((entry.url.as_str(), 1));
            }
        }
    }

    fn finish(self, ip: &str) -> IpAggregate {
        // Strictly greater keeps the first-seen URL on ties
        let mut most_used = ("", 0);
        for &(url, count) in &self.urls {
            if count > most_used.1 {
                most_used = (url, count);
            }
        }

        IpAggregate {
            ip: ip.to_string(),
            total_requests: self.total,
            success_rate: self.successes as f64 * 100.0 / self.total as f64,
            most_used_url: most_used.0.to_string(),
            last_access: self.last_access,
        }
    }
}

/// Group entries by source IP and summarize each group.
///
/// Entries without a source IP are skipped. Single pass over the entries.
pub fn aggregate_by_ip<'a, I>(entries: I) -> BTreeMap<String, IpAggregate>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut groups: HashMap<&'a str, Group<'a>> = HashMap::new();

    for entry in entries {
        if let Some(ip) = entry.source_ip.as_deref() {
            groups.entry(ip).or_default().add(entry);
        }
    }

    groups
        .into_iter()
        .map(|(ip, group)| (ip.to_string(), group.finish(ip)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ip: Option<&str>, url: &str, status: u16, ts: &str) -> LogEntry {
        LogEntry {
            source_ip: ip.map(str::to_string),
            url: url.to_string(),
            method: "GET".to_string(),
            status_code: status,
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_success_rate_half() {
        let logs = vec![
            entry(Some("1.2.3.4"), "/a", 200, "2024-01-01T00:00:04Z"),
            entry(Some("1.2.3.4"), "/a", 404, "2024-01-01T00:00:03Z"),
            entry(Some("1.2.3.4"), "/a", 200, "2024-01-01T00:00:02Z"),
            entry(Some("1.2.3.4"), "/a", 500, "2024-01-01T00:00:01Z"),
        ];

        let stats = aggregate_by_ip(&logs);
        let agg = &stats["1.2.3.4"];
        assert_eq!(agg.total_requests, 4);
        assert_eq!(agg.success_rate, 50.0);
        assert_eq!(agg.success_rate_display(), "50.0");
    }

    #[test]
    fn test_most_used_url_and_ties() {
        let logs = vec![
            entry(Some("1.1.1.1"), "/once", 200, "t"),
            entry(Some("1.1.1.1"), "/twice", 200, "t"),
            entry(Some("1.1.1.1"), "/other", 200, "t"),
            entry(Some("1.1.1.1"), "/twice", 200, "t"),
            entry(Some("2.2.2.2"), "/first", 200, "t"),
            entry(Some("2.2.2.2"), "/second", 200, "t"),
        ];

        let stats = aggregate_by_ip(&logs);
        assert_eq!(stats["1.1.1.1"].most_used_url, "/twice");
        assert_eq!(stats["2.2.2.2"].most_used_url, "/first");
    }

    #[test]
    fn test_single_entry_group() {
        let logs = vec![entry(Some("5.5.5.5"), "/only", 302, "2024-03-01T10:00:00Z")];

        let agg = &aggregate_by_ip(&logs)["5.5.5.5"];
        assert_eq!(agg.total_requests, 1);
        assert_eq!(agg.success_rate, 100.0);
        assert_eq!(agg.most_used_url, "/only");
        assert_eq!(agg.last_access.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_last_access_is_max_and_tolerates_garbage() {
        let logs = vec![
            entry(Some("1.1.1.1"), "/a", 200, "2024-01-01T00:00:00Z"),
            entry(Some("1.1.1.1"), "/a", 200, "garbage"),
            entry(Some("1.1.1.1"), "/a", 200, "2024-06-01T00:00:00Z"),
            entry(Some("9.9.9.9"), "/b", 200, "???"),
        ];

        let stats = aggregate_by_ip(&logs);
        assert_eq!(stats["1.1.1.1"].last_access.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert_eq!(stats["9.9.9.9"].last_access.timestamp(), 0);
    }

    #[test]
    fn test_entries_without_ip_are_skipped() {
        let logs = vec![
            entry(None, "/anon", 200, "t"),
            entry(Some("1.1.1.1"), "/a", 200, "t"),
        ];

        let stats = aggregate_by_ip(&logs);
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("1.1.1.1"));
    }

    #[test]
    fn test_aggregation_is_pure() {
        let logs = vec![
            entry(Some("1.1.1.1"), "/a", 200, "2024-01-01T00:00:00Z"),
            entry(Some("2.2.2.2"), "/b", 500, "2024-01-02T00:00:00Z"),
        ];

        assert_eq!(aggregate_by_ip(&logs), aggregate_by_ip(&logs));
    }
}
