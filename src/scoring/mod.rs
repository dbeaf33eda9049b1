pub mod distance;
pub mod histogram;
pub mod matcher;
pub mod topk;
pub mod vectorize;

pub use distance::{
    set_distance,
    DistanceInputs,
};
pub use histogram::{
    HistogramRow,
    PrecursorDiffHistogram,
    SimilarityHistogram,
};
pub use matcher::{
    match_datasets,
    match_direction,
    match_direction_unpruned,
    DirectionMatches,
    MatchParams,
    MatchSummary,
};
pub use topk::top_n_cutoff;
pub use vectorize::Vectorizer;
