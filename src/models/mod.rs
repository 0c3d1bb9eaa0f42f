pub mod backfill_tracking;
pub mod cv_profile;
pub mod job;
pub mod job_embedding;
pub mod source_adapter_state;
pub mod source_fetch_run;
pub mod user_job_match;
pub mod user_search_query;

pub use backfill_tracking::{BackfillTracking, Combination};
pub use cv_profile::CvProfile;
pub use job::{AiMetadata, Job, JobCursor, JobFilters, NewJob};
pub use source_adapter_state::SourceAdapterState;
pub use source_fetch_run::SourceFetchRun;
pub use user_job_match::{MatchUpdate, Priority, UserJobMatch};
pub use user_search_query::{RegisterQueriesInput, UserSearchQuery};
