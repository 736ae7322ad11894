//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use sessionflow_core::async_effect;
///
/// let navigator = env.navigator.clone();
/// async_effect! {
///     navigator.navigate("/home", true);
///     None
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::effect::Effect;

    #[derive(Clone, Debug, PartialEq)]
    enum SignalAction {
        Resolved { value: i32 },
    }

    #[test]
    fn async_effect_builds_future() {
        let effect = async_effect! {
            Some(SignalAction::Resolved { value: 7 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn async_effect_future_yields_action() {
        let effect = async_effect! {
            Some(SignalAction::Resolved { value: 7 })
        };

        let Effect::Future(fut) = effect else {
            panic!("expected Effect::Future");
        };
        assert_eq!(
            tokio_test::block_on(fut),
            Some(SignalAction::Resolved { value: 7 })
        );
    }
}
