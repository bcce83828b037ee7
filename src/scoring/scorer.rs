/// Collection statistics for one term
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub doc_freq: u64,    // Documents containing the term
    pub total_docs: u64,  // Documents in the generation
}

/// Weight contributed by a matching term clause.
pub trait Scorer: Send + Sync {
    fn term_weight(&self, stats: TermStats) -> f32;

    fn name(&self) -> &str;
}

/// BM25 inverse document frequency. Postings carry no term frequencies,
/// so the idf component is the whole score of a term clause.
#[derive(Debug, Clone, Default)]
pub struct Bm25Scorer;

impl Scorer for Bm25Scorer {
    fn term_weight(&self, stats: TermStats) -> f32 {
        let n = stats.total_docs as f32;
        let df = stats.doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

/// Every matching clause weighs the same.
#[derive(Debug, Clone, Default)]
pub struct ConstantScorer;

impl Scorer for ConstantScorer {
    fn term_weight(&self, _stats: TermStats) -> f32 {
        1.0
    }

    fn name(&self) -> &str {
        "constant"
    }
}
