use crate::error::Result;
use crate::model::*;
use uuid::Uuid;

/// Abstract document store for habits. A habit is saved and loaded whole,
/// completion history included.
pub trait StorageBackend: Send + Sync {
    /// Insert or replace a habit and its completion history.
    fn save_habit(&self, habit: &Habit) -> impl std::future::Future<Output = Result<()>> + Send;

    fn get_habit(&self, id: Uuid) -> impl std::future::Future<Output = Result<Habit>> + Send;

    fn list_habits(
        &self,
        query: &HabitQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Habit>>> + Send;

    /// The owner's in-progress habit, if any.
    fn find_in_progress(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Habit>>> + Send;

    fn delete_habit(&self, id: Uuid) -> impl std::future::Future<Output = Result<()>> + Send;
}
