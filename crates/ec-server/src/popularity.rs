//! Most common study configurations across all users.

use std::collections::BTreeMap;

use ec_core::Method;
use serde::Serialize;

use crate::store::StudyRecord;

/// Grouping key plus count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularStudy {
    pub method: Method,
    pub dependent_metric: String,
    pub base_metric: Option<String>,
    pub control_metrics: Vec<String>,
    pub count: usize,
}

/// Group by (method, dependent, base, sorted controls) and return the `top_n`
/// largest groups. Equal counts are ordered by key.
pub fn popular_studies(records: &[StudyRecord], top_n: usize) -> Vec<PopularStudy> {
    let mut counts: BTreeMap<(&str, &str, Option<&str>, Vec<&str>), (Method, usize)> = BTreeMap::new();
    for r in records {
        let mut controls: Vec<&str> = r.control_metrics.iter().map(String::as_str).collect();
        controls.sort_unstable();
        let key = (r.method.as_str(), r.dependent_metric.as_str(), r.base_metric.as_deref(), controls);
        counts.entry(key).or_insert((r.method, 0)).1 += 1;
    }

    let mut groups: Vec<_> = counts.into_iter().collect();
    // stable: BTreeMap order breaks ties
    groups.sort_by(|a, b| b.1.1.cmp(&a.1.1));
    groups
        .into_iter()
        .take(top_n)
        .map(|((_, dep, base, controls), (method, count))| PopularStudy {
            method,
            dependent_metric: dep.to_string(),
            base_metric: base.map(str::to_string),
            control_metrics: controls.into_iter().map(str::to_string).collect(),
            count,
        })
        .collect()
}
