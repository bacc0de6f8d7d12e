pub mod job_record;
pub mod pool;
