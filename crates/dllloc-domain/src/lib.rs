use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractFileStat {
    pub path: String,
    pub spans: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractSummary {
    pub schema_version: u32,
    /// Units parsed and analysed.
    pub files: usize,
    /// Units that could not be read or parsed.
    pub failed: usize,
    pub spans: usize,
    pub per_file: Vec<ExtractFileStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MigrateFileStat {
    pub path: String,
    /// Records reused through an identity-hash match.
    pub migrated: usize,
    /// Records reused through a weak-hash match.
    pub fuzzy: usize,
    pub new: usize,
    pub obsolete: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MigrateSummary {
    pub schema_version: u32,
    pub files: usize,
    pub migrated: usize,
    pub fuzzy: usize,
    pub new: usize,
    pub obsolete: usize,
    /// Old record files skipped because they could not be deserialized.
    pub unreadable: usize,
    pub per_file: Vec<MigrateFileStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplyFault {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApplySummary {
    pub schema_version: u32,
    pub files_copied: usize,
    pub files_rewritten: usize,
    pub substitutions: usize,
    /// Records dropped before substitution (bad context, missing file, filtered stage).
    pub skipped_records: usize,
    pub faults: Vec<ApplyFault>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidationMsg {
    pub schema_version: u32,
    pub kind: String,
    pub key: String,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CharsetReport {
    pub schema_version: u32,
    pub chars: String,
    pub count: usize,
}
