use ohno::AppError;

/// Observer for the per-technology steps of a collection run.
pub trait Progress: Send + Sync {
    /// A run over `total` technologies is starting.
    fn started(&self, total: usize);

    fn collecting(&self, name: &str);

    fn collected(&self, name: &str);

    /// Collection of `name` failed and the technology will be left out of the snapshot.
    fn failed(&self, name: &str, error: &AppError);

    /// Finish and clear any progress indicator.
    fn done(&self);
}
