/// Arrow schema definitions for stored validation results.
pub mod results {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const RUN_ID: &str = "run_id";
    pub const PROMPT_INDEX: &str = "prompt_index";
    pub const QUERY_INDEX: &str = "query_index";
    pub const SEED: &str = "seed";
    pub const CANDIDATE: &str = "candidate";
    pub const EXACT_SEED_MATCH: &str = "exact_seed_match";
    pub const OWNING_SEED: &str = "owning_seed";
    pub const SUBSTRING_MATCH: &str = "substring_match";
    pub const SEARCH_OUTCOME: &str = "search_outcome";
    pub const ADDED_TOKEN: &str = "added_token";
    pub const RANK: &str = "rank";
    pub const BUCKET: &str = "bucket";

    /// Schema for the batch result table: one row per (candidate, seed, run).
    ///
    /// `owning_seed` is the seed that lists the candidate (the prompting seed
    /// for same-seed rows). `added_token` and `rank` are set only for
    /// corroborated rows. `bucket` is derived from the other columns and is
    /// stored for convenience; readers recompute it.
    pub fn result_table_schema() -> Schema {
        Schema::new(vec![
            Field::new(RUN_ID, DataType::Utf8, false),
            Field::new(PROMPT_INDEX, DataType::UInt32, false),
            Field::new(QUERY_INDEX, DataType::UInt32, false),
            Field::new(SEED, DataType::Utf8, false),
            Field::new(CANDIDATE, DataType::Utf8, false),
            Field::new(EXACT_SEED_MATCH, DataType::Boolean, false),
            Field::new(OWNING_SEED, DataType::Utf8, true),
            Field::new(SUBSTRING_MATCH, DataType::Boolean, false),
            Field::new(SEARCH_OUTCOME, DataType::Utf8, false),
            Field::new(ADDED_TOKEN, DataType::Utf8, true),
            Field::new(RANK, DataType::UInt32, true),
            Field::new(BUCKET, DataType::Utf8, false),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::results;

    #[test]
    fn result_table_schema_has_expected_fields() {
        let schema = results::result_table_schema();
        assert_eq!(schema.fields().len(), 12);
        assert!(schema.field_with_name(results::CANDIDATE).is_ok());
        assert!(!schema.field_with_name(results::SEED).unwrap().is_nullable());
        assert!(schema.field_with_name(results::RANK).unwrap().is_nullable());
        assert!(schema.field_with_name(results::OWNING_SEED).unwrap().is_nullable());
    }
}
