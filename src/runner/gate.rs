use super::context::SessionState;
use super::dispatcher::QueryParams;
use super::resolver::{has_placeholder, resolve, ResolvedPath};
use crate::parser::types::EndpointDescriptor;

/// Result of checking an endpoint's prerequisites
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// All required fields are present; request can be made
    Dispatch {
        path: ResolvedPath,
        params: QueryParams,
    },
    /// At least one required field is missing, in declaration order
    Skip { missing: Vec<String> },
}

/// Check every required field of `descriptor` against the session.
///
/// Present fields either fill a `:field` placeholder or become the query
/// parameter named by their alias. All missing fields are collected before
/// deciding, so the skip reason lists each one.
pub fn evaluate(descriptor: &EndpointDescriptor, state: &SessionState) -> GateDecision {
    let mut missing = Vec::new();
    let mut substitutions: Vec<&str> = Vec::new();
    let mut required_params = QueryParams::new();

    for req in &descriptor.required_fields {
        match state.get(&req.field) {
            None => missing.push(req.field.clone()),
            Some(_) if has_placeholder(&descriptor.path_pattern, &req.field) => {
                substitutions.push(&req.field);
            }
            Some(value) => required_params.set(&req.alias, &value.to_string()),
        }
    }

    if !missing.is_empty() {
        return GateDecision::Skip { missing };
    }

    // Static parameters first so required-field values win on equal names
    let mut params = QueryParams::new();
    for (key, value) in &descriptor.static_parameters {
        params.set(key, value);
    }
    params.merge(required_params);

    GateDecision::Dispatch {
        path: resolve(&descriptor.path_pattern, state, &substitutions),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with_two_requirements() -> EndpointDescriptor {
        EndpointDescriptor::builder("user/address")
            .require_as("UserId", "userID")
            .require_as("AddressTypeId", "type")
            .build()
            .unwrap()
    }

    #[test]
    fn test_skip_lists_every_missing_field() {
        let state = SessionState::new();
        let decision = evaluate(&descriptor_with_two_requirements(), &state);
        assert_eq!(
            decision,
            GateDecision::Skip {
                missing: vec!["UserId".to_string(), "AddressTypeId".to_string()]
            }
        );
    }

    #[test]
    fn test_skip_when_only_some_fields_missing() {
        let mut state = SessionState::new();
        state.set("UserId", 42_i64);
        let decision = evaluate(&descriptor_with_two_requirements(), &state);
        assert_eq!(
            decision,
            GateDecision::Skip {
                missing: vec!["AddressTypeId".to_string()]
            }
        );
    }

    #[test]
    fn test_present_fields_become_aliased_params() {
        let mut state = SessionState::new();
        state.set("UserId", 42_i64);
        state.set("AddressTypeId", 3_i64);

        match evaluate(&descriptor_with_two_requirements(), &state) {
            GateDecision::Dispatch { path, params } => {
                assert_eq!(path.path, "user/address");
                assert_eq!(params.get("userID"), Some("42"));
                assert_eq!(params.get("type"), Some("3"));
                assert_eq!(params.get("UserId"), None);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_placeholder_fields_are_substituted_not_sent() {
        let mut state = SessionState::new();
        state.set("UserId", "42");
        let d = EndpointDescriptor::builder("user/:UserId")
            .require("UserId")
            .build()
            .unwrap();

        match evaluate(&d, &state) {
            GateDecision::Dispatch { path, params } => {
                assert_eq!(path.path, "user/42");
                assert_eq!(path.pattern, "user/:UserId");
                assert!(params.is_empty());
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_required_params_override_static_params() {
        let mut state = SessionState::new();
        state.set("SchoolYearId", "2018");
        let d = EndpointDescriptor::builder("schoolinfo/term")
            .require_as("SchoolYearId", "schoolYear")
            .param("schoolYear", "1999")
            .param("format", "json")
            .build()
            .unwrap();

        match evaluate(&d, &state) {
            GateDecision::Dispatch { params, .. } => {
                assert_eq!(params.get("schoolYear"), Some("2018"));
                assert_eq!(params.get("format"), Some("json"));
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_no_requirements_always_dispatches() {
        let d = EndpointDescriptor::builder("academics/course").build().unwrap();
        assert!(matches!(
            evaluate(&d, &SessionState::new()),
            GateDecision::Dispatch { .. }
        ));
    }
}
