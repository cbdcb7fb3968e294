//! Current-user resolution.

use std::sync::Arc;

type UsernameFactory = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Supplies the user name stamped on audit logs.
///
/// A constant and a factory may both be configured. The factory wins
/// whenever it yields a name, regardless of which was configured last; the
/// constant is the fallback.
#[derive(Clone, Default)]
pub struct UsernameProvider {
    constant: Option<String>,
    factory: Option<UsernameFactory>,
}

impl UsernameProvider {
    /// Provider that yields no user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the constant user name.
    pub fn set_constant(&mut self, username: impl Into<String>) {
        self.constant = Some(username.into());
    }

    /// Set the user name factory.
    pub fn set_factory<F>(&mut self, factory: F)
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
    }

    /// Resolve the current user name.
    pub fn resolve(&self) -> Option<String> {
        self.factory
            .as_ref()
            .and_then(|factory| factory())
            .or_else(|| self.constant.clone())
    }
}

impl std::fmt::Debug for UsernameProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernameProvider")
            .field("constant", &self.constant)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
