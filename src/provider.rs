//! Service providers: reusable registration bundles
//!
//! A provider is any object with a single operation that mutates the
//! container. Libraries expose one provider per feature area; the
//! application imports them in order.

use crate::container::Container;
use crate::error::Result;

/// A bundle of registrations applied through [`Container::import`].
///
/// # Examples
///
/// ```rust
/// use syringa::{Container, Definition, Provider, Result};
///
/// struct MailProvider;
///
/// impl Provider for MailProvider {
///     fn register(&self, container: &Container) -> Result<()> {
///         container.bind("mail.host", Definition::literal("localhost".to_string()))?;
///         container.bind("mail.port", Definition::literal(25_i64))?;
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container.import(&MailProvider).unwrap();
/// assert!(container.has("mail.port"));
/// ```
pub trait Provider {
    /// Apply this provider's registrations
    fn register(&self, container: &Container) -> Result<()>;
}

impl<F> Provider for F
where
    F: Fn(&Container) -> Result<()>,
{
    fn register(&self, container: &Container) -> Result<()> {
        self(container)
    }
}

/// Bind several definitions in one expression.
///
/// Expands to a closure provider suitable for [`Container::import`].
///
/// # Examples
///
/// ```rust
/// use syringa::{definitions, Container, Definition};
///
/// let container = Container::new();
/// container
///     .import(&definitions! {
///         "cfg.host" => Definition::literal("localhost".to_string()),
///         "cfg.port" => Definition::literal(8080_i64),
///     })
///     .unwrap();
///
/// assert!(container.has("cfg.host"));
/// assert!(container.has("cfg.port"));
/// ```
#[macro_export]
macro_rules! definitions {
    ($($id:expr => $definition:expr),* $(,)?) => {
        |container: &$crate::Container| -> $crate::Result<()> {
            $(container.bind($id, $definition)?;)*
            Ok(())
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;

    struct ClockProvider;

    impl Provider for ClockProvider {
        fn register(&self, container: &Container) -> Result<()> {
            container.bind("clock.skew", Definition::literal(0_i64))
        }
    }

    #[test]
    fn test_import_struct_provider() {
        let container = Container::new();
        container.import(&ClockProvider).unwrap();
        assert!(container.has("clock.skew"));
    }

    #[test]
    fn test_import_closure_provider() {
        let container = Container::new();
        let provider =
            |c: &Container| -> Result<()> { c.bind("x", Definition::literal(1_i64)) };
        container.import(&provider).unwrap();
        assert!(container.has("x"));
    }

    #[test]
    fn test_import_respects_lock() {
        let container = Container::new();
        container.lock().unwrap();
        assert!(container.import(&ClockProvider).is_err());
    }

    #[test]
    fn test_definitions_macro() {
        let container = Container::new();
        container
            .import(&crate::definitions! {
                "a" => Definition::literal(1_i64),
                "b" => Definition::literal(2_i64),
            })
            .unwrap();
        assert!(container.has("a"));
        assert!(container.has("b"));
    }
}
