pub mod aggregate;
pub mod error;
pub mod labels;
pub mod lexicon;
pub mod matching;
pub mod pacer;
pub mod schema;
pub mod search;
pub mod synonyms;
pub mod table;
pub mod term;
pub mod verdict;

pub use aggregate::{BatchOverview, SeedSummary, SummaryOptions};
pub use error::{Cancelled, LexiconError, SearchError};
pub use labels::{LabelSet, ManualLabel};
pub use lexicon::{Lexicon, LexiconEntry, VariantGroup, VariantKind};
pub use pacer::Pacer;
pub use schema::results;
pub use search::{SearchPage, SearchProvider};
pub use synonyms::{GeneratedSynonyms, LabelledSynonyms};
pub use term::{normalize_query, normalize_term};
pub use verdict::{Bucket, LexicalMatch, ResultRow, SearchOutcome, SearchTier, Verdict};
