mod candidate;
pub(crate) mod errors;
pub(crate) mod guards;
mod grading;
pub(crate) mod handlers;
pub(crate) mod helpers;
mod operations;
mod proctoring;
pub(crate) mod router;
