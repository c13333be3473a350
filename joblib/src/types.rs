pub type JobId = u64;
pub type JobName = String;
pub type Line = String;
