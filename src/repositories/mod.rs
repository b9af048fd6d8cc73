pub(crate) mod answers;
pub(crate) mod attempt_events;
pub(crate) mod attempt_questions;
pub(crate) mod attempts;
pub(crate) mod audit;
pub(crate) mod exams;
pub(crate) mod grading;
pub(crate) mod health;
pub(crate) mod overrides;
pub(crate) mod proctoring;
pub(crate) mod results;
pub(crate) mod scores;
pub(crate) mod section_timers;
