//! Navigation boundary.

/// Router of the embedding UI.
pub trait Navigator: Send + Sync {
    /// Navigate to an application path.
    ///
    /// With `replace` the current history entry is replaced instead of a new
    /// one being pushed.
    fn navigate(&self, path: &str, replace: bool);
}
