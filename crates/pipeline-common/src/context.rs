//! Shared run context.

use crate::cancellation::CancellationToken;

/// Shared context for one processing run
///
/// Carries the name used in log lines and the cancellation token every
/// stage observes.
#[derive(Debug, Clone)]
pub struct StreamerContext {
    /// Name of the input being processed
    pub name: String,
    /// The cancellation token
    pub token: CancellationToken,
}

impl Default for StreamerContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl StreamerContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            name: "DefaultStreamer".to_string(),
            token,
        }
    }

    pub fn with_name(name: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            name: name.into(),
            ..Self::new(token)
        }
    }

    /// Context whose token is cancelled together with this one but can also
    /// be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            name: self.name.clone(),
            token: self.token.child_token(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_follows_parent() {
        let parent = StreamerContext::with_name("input.mp4", CancellationToken::new());
        let child = parent.child();
        assert_eq!(child.name, "input.mp4");

        child.token.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_default_context_is_live() {
        let context = StreamerContext::default();
        assert_eq!(context.name, "DefaultStreamer");
        assert!(!context.is_cancelled());
    }
}
