//! Domain types shared by the drivers, the extraction pipeline and the scheduler.

mod attempt;
mod challenge;
mod product;
mod task;

pub use attempt::{FailureKind, FetchAttempt, FetchOutcome};
pub use challenge::{ChallengeRecord, ChallengeType, SolveOutcome};
pub use product::{CandidateRecord, Denomination, ExtractedProduct, Price, RIALS_PER_TOMAN};
pub use task::{ScrapeTask, TaskBatch};
