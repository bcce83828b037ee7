use std::cmp::Ordering;
use chrono::{DateTime, Utc};
use crate::core::types::PropertySet;
use crate::query::sort::NativeSort;

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    results: Vec<PropertySet>,
    total_hits: u64,
    recency: Option<DateTime<Utc>>,
}

impl ResultSet {
    pub fn new(results: Vec<PropertySet>, total_hits: u64) -> Self {
        ResultSet {
            results,
            total_hits,
            recency: None,
        }
    }

    pub fn empty(total_hits: u64) -> Self {
        ResultSet::new(Vec::new(), total_hits)
    }

    pub fn results(&self) -> &[PropertySet] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Matches in the searched generation; may exceed `len()`.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Point in time up to which the results are known to reflect all
    /// logged changes. Only set for searches that asked to wait.
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.recency
    }

    pub fn set_recency(&mut self, recency: DateTime<Utc>) {
        self.recency = Some(recency);
    }

    pub fn uris(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.uri.as_str()).collect()
    }

    pub fn into_results(self) -> Vec<PropertySet> {
        self.results
    }
}

/// A ranked document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub segment_ord: usize,
    pub doc: u32,
    pub score: f32,
    pub sort_values: Vec<Option<Vec<u8>>>, // One encoded doc value per sort field
}

/// Top of the ranking for one generation, before windowing and mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopDocs {
    pub hits: Vec<Hit>,
    pub total_hits: u64,
}

impl TopDocs {
    pub fn empty() -> Self {
        TopDocs::default()
    }
}

/// Ranking order: sort fields in turn when sorting, otherwise score
/// descending; ties fall back to index order.
pub fn compare_hits(sort: Option<&NativeSort>, a: &Hit, b: &Hit) -> Ordering {
    let ordering = match sort {
        Some(sort) => {
            let mut ordering = Ordering::Equal;
            for (i, field) in sort.fields.iter().enumerate() {
                let lhs = a.sort_values.get(i).and_then(Option::as_ref);
                let rhs = b.sort_values.get(i).and_then(Option::as_ref);
                // Missing values go last when ascending
                let cmp = match (lhs, rhs) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                ordering = if field.descending { cmp.reverse() } else { cmp };
                if ordering != Ordering::Equal {
                    break;
                }
            }
            ordering
        }
        None => b.score.total_cmp(&a.score),
    };
    ordering.then_with(|| (a.segment_ord, a.doc).cmp(&(b.segment_ord, b.doc)))
}

/// Keeps the best `k` hits without sorting everything: the buffer grows to
/// twice `k` and is then cut back with a partial selection.
pub struct TopDocsCollector<'a> {
    k: usize,
    sort: Option<&'a NativeSort>,
    buffer: Vec<Hit>,
    total_collected: u64,
}

impl<'a> TopDocsCollector<'a> {
    pub fn new(k: usize, sort: Option<&'a NativeSort>) -> Self {
        TopDocsCollector {
            k,
            sort,
            buffer: Vec::with_capacity(k.min(1024) * 2),
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, hit: Hit) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }
        self.buffer.push(hit);
        if self.buffer.len() >= self.k * 2 {
            self.compact();
        }
    }

    pub fn total_collected(&self) -> u64 {
        self.total_collected
    }

    pub fn finish(mut self) -> TopDocs {
        let sort = self.sort;
        self.buffer.sort_by(|a, b| compare_hits(sort, a, b));
        self.buffer.truncate(self.k);
        TopDocs {
            hits: self.buffer,
            total_hits: self.total_collected,
        }
    }

    fn compact(&mut self) {
        let sort = self.sort;
        self.buffer.select_nth_unstable_by(self.k - 1, |a, b| compare_hits(sort, a, b));
        self.buffer.truncate(self.k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::sort::NativeSortField;

    fn hit(doc: u32, score: f32, value: Option<&str>) -> Hit {
        Hit {
            segment_ord: 0,
            doc,
            score,
            sort_values: vec![value.map(|v| v.as_bytes().to_vec())],
        }
    }

    #[test]
    fn keeps_best_scores() {
        let mut collector = TopDocsCollector::new(3, None);
        for doc in 0..20 {
            collector.collect(hit(doc, (doc % 7) as f32, None));
        }
        let top = collector.finish();
        assert_eq!(top.total_hits, 20);
        let docs: Vec<u32> = top.hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![6, 13, 5]);
    }

    #[test]
    fn missing_values_sort_last_ascending_first_descending() {
        let mut sort = NativeSort {
            fields: vec![NativeSortField {
                field: "f".to_string(),
                descending: false,
                case_insensitive: false,
            }],
        };
        let hits = vec![hit(0, 0.0, None), hit(1, 0.0, Some("b")), hit(2, 0.0, Some("a"))];

        let mut collector = TopDocsCollector::new(10, Some(&sort));
        hits.iter().cloned().for_each(|h| collector.collect(h));
        let docs: Vec<u32> = collector.finish().hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![2, 1, 0]);

        sort.fields[0].descending = true;
        let mut collector = TopDocsCollector::new(10, Some(&sort));
        hits.into_iter().for_each(|h| collector.collect(h));
        let docs: Vec<u32> = collector.finish().hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![0, 1, 2]);
    }

    #[test]
    fn zero_k_only_counts() {
        let mut collector = TopDocsCollector::new(0, None);
        collector.collect(hit(0, 1.0, None));
        let top = collector.finish();
        assert!(top.hits.is_empty());
        assert_eq!(top.total_hits, 1);
    }
}
