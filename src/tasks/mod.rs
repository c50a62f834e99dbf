mod batch_scorer;

pub use batch_scorer::BatchScorer;
