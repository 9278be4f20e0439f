//! Method-call attribution policy
//!
//! Decides how a call site maps onto definitions, per language. The table
//! is deliberately asymmetric: Go receiver methods cannot be shadowed by
//! free functions, so Go method calls always attribute by name; everywhere
//! else an untracked receiver type makes `obj.method()` a false-positive
//! hazard and such calls are excluded unless configured in.
//!
//! @module calls/policy

use crate::adapters::CallRecord;

/// How a call site should be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Plain name-level resolution: local binding, then symbol table
    ByName,
    /// A method of the enclosing function's own class
    EnclosingClass,
    /// A method of the named type, from the instance-attribute map
    AttributeType(String),
    /// Left out of the call graph; counted, never silently dropped
    Excluded,
}

/// Receiver names meaning "the enclosing instance"
pub fn implicit_receivers(language: &str) -> &'static [&'static str] {
    match language {
        "python" => &["self", "cls"],
        "typescript" | "javascript" => &["this"],
        "rust" => &["self"],
        "java" => &["this"],
        _ => &[],
    }
}

/// Classify one call site.
///
/// `enclosing_class` is the class of the function containing the call;
/// `attribute_types` is that class's instance-attribute -> type map.
pub fn classify_call(
    language: &str,
    call: &CallRecord,
    enclosing_class: Option<&str>,
    attribute_types: &[(String, String)],
    include_receiver_calls: bool,
) -> CallTarget {
    if !call.is_method {
        // Java has no free functions: a bare call inside a method is an
        // implicit this-call.
        if language == "java" && enclosing_class.is_some() {
            return CallTarget::EnclosingClass;
        }
        return CallTarget::ByName;
    }

    if language == "go" {
        return CallTarget::ByName;
    }

    let head = call
        .receiver
        .as_deref()
        .map(|r| r.split('.').next().unwrap_or(r));
    let implicit = head
        .map(|h| implicit_receivers(language).contains(&h))
        .unwrap_or(false);

    if implicit {
        if let Some(attr) = &call.self_attribute {
            if let Some((_, ty)) = attribute_types.iter().find(|(a, _)| a == attr) {
                return CallTarget::AttributeType(ty.clone());
            }
            return if include_receiver_calls {
                CallTarget::ByName
            } else {
                CallTarget::Excluded
            };
        }
        return if enclosing_class.is_some() {
            CallTarget::EnclosingClass
        } else {
            CallTarget::Excluded
        };
    }

    if include_receiver_calls {
        CallTarget::ByName
    } else {
        CallTarget::Excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, receiver: Option<&str>, attr: Option<&str>, is_method: bool) -> CallRecord {
        CallRecord {
            name: name.to_string(),
            line: 1,
            is_method,
            receiver: receiver.map(|s| s.to_string()),
            self_attribute: attr.map(|s| s.to_string()),
            enclosing: None,
            binding_id: None,
            uncertain: false,
        }
    }

    #[test]
    fn test_self_call_targets_enclosing_class() {
        let c = call("validate", Some("self"), None, true);
        assert_eq!(
            classify_call("python", &c, Some("Service"), &[], false),
            CallTarget::EnclosingClass
        );
        assert_eq!(
            classify_call("python", &c, None, &[], false),
            CallTarget::Excluded
        );
    }

    #[test]
    fn test_attribute_typed_self_call() {
        let c = call("query", Some("self.db"), Some("db"), true);
        let attrs = vec![("db".to_string(), "Database".to_string())];
        assert_eq!(
            classify_call("python", &c, Some("Service"), &attrs, false),
            CallTarget::AttributeType("Database".to_string())
        );
        assert_eq!(
            classify_call("python", &c, Some("Service"), &[], false),
            CallTarget::Excluded
        );
    }

    #[test]
    fn test_go_method_calls_always_attribute() {
        let c = call("Save", Some("svc"), None, true);
        assert_eq!(classify_call("go", &c, None, &[], false), CallTarget::ByName);
    }

    #[test]
    fn test_unknown_receiver_excluded_unless_configured() {
        let c = call("update", Some("client"), None, true);
        assert_eq!(
            classify_call("typescript", &c, Some("App"), &[], false),
            CallTarget::Excluded
        );
        assert_eq!(
            classify_call("typescript", &c, Some("App"), &[], true),
            CallTarget::ByName
        );
    }

    #[test]
    fn test_java_bare_call_is_implicit_this() {
        let c = call("validate", None, None, false);
        assert_eq!(
            classify_call("java", &c, Some("Main"), &[], false),
            CallTarget::EnclosingClass
        );
        assert_eq!(
            classify_call("python", &c, Some("Service"), &[], false),
            CallTarget::ByName
        );
    }
}
