pub mod assessments;
pub mod classrooms;
pub mod health;
pub mod versions;
