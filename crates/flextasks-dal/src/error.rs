pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid rating payload: {0}")]
    Validation(#[from] garde::Report),

    #[error("Task {task_id} was already rated by user {rated_by_id}")]
    DuplicateRating { task_id: i64, rated_by_id: i64 },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Cannot order by field: {0}")]
    InvalidOrderByField(String),
}
