//! # Request Validation Invoker
//!
//! The single boundary between request handling and validator code. Runs
//! the route's precompiled validator and guarantees a well-formed outcome:
//! a panicking validator becomes a rejection carrying the panic message, and
//! a route that somehow missed finalize is rejected rather than let through.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::compiler::{panic_message, CompiledValidator};
use crate::outcome::{ValidationErrorDetail, ValidationOutcome};
use crate::registry::RouteEntry;

/// Validate a request body for `route`.
///
/// An absent body is validated as `null`.
pub fn validate_request(route: &RouteEntry, body: Option<Value>) -> ValidationOutcome {
    let Some(validator) = route.validator() else {
        tracing::error!(
            method = %route.method(),
            path = %route.path(),
            "request dispatched to a route that was never finalized"
        );
        return ValidationOutcome::rejected(format!(
            "route {} {} has no compiled validator",
            route.method(),
            route.path()
        ));
    };

    let body = body.unwrap_or(Value::Null);
    let outcome = invoke(validator, &body);
    if let ValidationOutcome::Rejected(detail) = &outcome {
        tracing::debug!(
            method = %route.method(),
            path = %route.path(),
            rejection = %detail,
            "request body rejected"
        );
    }
    outcome
}

/// Run `validator`, converting a panic into a rejection.
pub fn invoke(validator: &CompiledValidator, body: &Value) -> ValidationOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| validator.validate(body))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(panic = %message, "validator panicked; rejecting request");
            ValidationOutcome::Rejected(ValidationErrorDetail::Message(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compiler_fn;
    use crate::method::Method;
    use crate::registry::{RouteOptions, RouteRegistry};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn registry_with(validator: CompiledValidator) -> RouteRegistry {
        let mut registry = RouteRegistry::new(compiler_fn(move |_schema| Ok(validator.clone())));
        let root = Arc::clone(registry.root());
        registry
            .register_route(
                &root,
                Method::Post,
                "/",
                RouteOptions::new().with_schema(json!({"type": "object"})),
            )
            .unwrap();
        registry
            .register_route(&root, Method::Post, "/raw", RouteOptions::new())
            .unwrap();
        registry
    }

    #[test]
    fn panicking_validator_becomes_rejection() {
        let mut registry = registry_with(CompiledValidator::from_fn(|_| {
            panic!("Always fail!")
        }));
        registry.finalize().unwrap();
        let route = registry.lookup(Method::Post, "/").unwrap();

        let outcome = validate_request(route, Some(json!({})));
        assert_eq!(outcome, ValidationOutcome::rejected("Always fail!"));
        // The route keeps working after a panic.
        assert_eq!(
            validate_request(route, Some(json!({}))),
            ValidationOutcome::rejected("Always fail!")
        );
    }

    #[test]
    fn accepted_body_is_replaced() {
        let mut registry = registry_with(CompiledValidator::from_fn(|_| {
            ValidationOutcome::Accepted(json!({"hello": 42}))
        }));
        registry.finalize().unwrap();
        let route = registry.lookup(Method::Post, "/").unwrap();
        assert_eq!(
            validate_request(route, Some(json!({"hello": "42", "world": 55}))),
            ValidationOutcome::Accepted(json!({"hello": 42}))
        );
    }

    #[test]
    fn absent_body_is_null() {
        let mut registry = registry_with(CompiledValidator::from_fn(|body| {
            ValidationOutcome::Accepted(json!({ "seen": body }))
        }));
        registry.finalize().unwrap();
        let route = registry.lookup(Method::Post, "/").unwrap();
        assert_eq!(
            validate_request(route, None),
            ValidationOutcome::Accepted(json!({"seen": null}))
        );
    }

    #[test]
    fn unfinalized_route_is_rejected() {
        let registry = registry_with(CompiledValidator::accept_all());
        let route = registry.lookup(Method::Post, "/").unwrap();
        let outcome = validate_request(route, Some(json!({})));
        assert!(!outcome.is_accepted());
    }

    proptest! {
        #[test]
        fn schemaless_route_passes_any_body_unchanged(key in "[a-z]{1,8}", n in any::<i64>(), s in ".*") {
            let mut registry = registry_with(CompiledValidator::accept_all());
            registry.finalize().unwrap();
            let route = registry.lookup(Method::Post, "/raw").unwrap();
            let body = json!({ key: [n, s] });
            prop_assert_eq!(
                validate_request(route, Some(body.clone())),
                ValidationOutcome::Accepted(body)
            );
        }

        #[test]
        fn validation_is_idempotent(n in any::<i64>()) {
            let validator = CompiledValidator::from_fn(|body| match body.get("n").and_then(Value::as_i64) {
                Some(n) if n % 2 == 0 => ValidationOutcome::Accepted(body.clone()),
                _ => ValidationOutcome::rejected("n must be even"),
            });
            let body = json!({ "n": n });
            prop_assert_eq!(invoke(&validator, &body), invoke(&validator, &body));
        }
    }
}
