//! Shape validation of the untrusted page configuration.
//!
//! Runs on raw JSON before any entity lookup and collects every violation
//! instead of stopping at the first one.

use crate::error::{PageStructureError, Violation};
use cms_types::UriScheme;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct PageStructureValidator;

impl PageStructureValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates the `pages` array.
    pub fn validate(&self, pages: &Value) -> Result<(), PageStructureError> {
        let mut violations = Vec::new();
        match pages.as_array() {
            Some(pages) => {
                for (i, page) in pages.iter().enumerate() {
                    validate_page(page, &format!("pages[{i}]"), &mut violations);
                }
            }
            None => violations.push(Violation::new("pages", "must be an array")),
        }
        finish(violations)
    }

    /// Validates the `rootModules` slot map.
    pub fn validate_module_map(&self, root_modules: &Value) -> Result<(), PageStructureError> {
        let mut violations = Vec::new();
        validate_slots(root_modules, "rootModules", &mut violations);
        finish(violations)
    }
}

fn finish(violations: Vec<Violation>) -> Result<(), PageStructureError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(PageStructureError::Invalid(violations))
    }
}

fn validate_page(page: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(page) = page.as_object() else {
        out.push(Violation::new(path, "is not an object"));
        return;
    };
    if !def_matches(page, &[UriScheme::Page]) {
        out.push(Violation::new(path, "must refer to a page definition"));
    }
    if page.contains_key("pageCritical") {
        out.push(Violation::new(
            path,
            "only modules and contexts may specify \"pageCritical\"",
        ));
    }
    if let Some(children) = page.get("children") {
        validate_slots(children, &format!("{path}.children"), out);
    }
}

fn validate_slots(slots: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(slots) = slots.as_object() else {
        out.push(Violation::new(path, "must be an object"));
        return;
    };
    for (slot, children) in slots {
        validate_children(children, &format!("{path}[{slot}]"), out);
    }
}

fn validate_children(children: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(children) = children.as_array() else {
        out.push(Violation::new(path, "must be an array"));
        return;
    };
    for (i, child) in children.iter().enumerate() {
        validate_child(child, &format!("{path}[{i}]"), out);
    }
}

fn validate_child(child: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(child) = child.as_object() else {
        out.push(Violation::new(path, "is not an object"));
        return;
    };
    if child.get("pageCritical").is_some_and(|v| !v.is_boolean()) {
        out.push(Violation::new(path, "\"pageCritical\" must be a boolean"));
    }
    match def_scheme(child) {
        Some(UriScheme::Module) => {
            if let Some(children) = child.get("children").filter(|c| !c.is_null()) {
                validate_slots(children, &format!("{path}.children"), out);
            }
        }
        Some(UriScheme::Context) => {
            if child.contains_key("options") {
                out.push(Violation::new(
                    path,
                    "only pages and modules may specify \"options\"",
                ));
            }
            if let Some(children) = child.get("children") {
                validate_context_children(children, &format!("{path}.children"), out);
            }
        }
        _ => out.push(Violation::new(
            path,
            "must refer to a module or context definition",
        )),
    }
}

fn validate_context_children(children: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(children) = children.as_array() else {
        out.push(Violation::new(path, "must be an array"));
        return;
    };
    for (i, child) in children.iter().enumerate() {
        let child_path = format!("{path}[{i}]");
        match child.as_object() {
            Some(obj) if def_scheme(obj) == Some(UriScheme::Context) => {
                out.push(Violation::new(child_path, "contexts may only contain modules"));
            }
            Some(_) => validate_child(child, &child_path, out),
            None => out.push(Violation::new(child_path, "is not an object")),
        }
    }
}

fn def_scheme(node: &Map<String, Value>) -> Option<UriScheme> {
    node.get("def").and_then(Value::as_str).and_then(UriScheme::of)
}

fn def_matches(node: &Map<String, Value>, schemes: &[UriScheme]) -> bool {
    def_scheme(node).is_some_and(|s| schemes.contains(&s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(result: Result<(), PageStructureError>) -> Vec<String> {
        match result {
            Ok(()) => Vec::new(),
            Err(e) => e.violations().iter().map(|v| v.path.clone()).collect(),
        }
    }

    #[test]
    fn accepts_minimal_page() {
        let pages = json!([{ "def": "page://home", "children": {} }]);
        assert!(PageStructureValidator::new().validate(&pages).is_ok());
    }

    #[test]
    fn rejects_non_array() {
        let err = PageStructureValidator::new()
            .validate(&json!({ "def": "page://home" }))
            .unwrap_err();
        assert_eq!(err.violations()[0].path, "pages");
    }

    #[test]
    fn rejects_page_critical_on_page() {
        let pages = json!([{ "def": "page://home", "pageCritical": true, "children": {} }]);
        assert_eq!(paths(PageStructureValidator::new().validate(&pages)), vec!["pages[0]"]);
    }

    #[test]
    fn reports_nested_child_path() {
        let pages = json!([
            { "def": "page://a", "children": {} },
            { "def": "page://b", "children": {} },
            { "def": "page://c", "children": { "main": [{ "def": "adapter://oops" }] } },
        ]);
        assert_eq!(
            paths(PageStructureValidator::new().validate(&pages)),
            vec!["pages[2].children[main][0]"]
        );
    }

    #[test]
    fn collects_every_violation() {
        let pages = json!([
            { "def": "module://not-a-page" },
            { "def": "page://ok", "children": { "main": "not-an-array" } },
            { "def": "page://ok", "children": { "main": [
                { "def": "context://ctx", "options": {}, "children": [
                    { "def": "context://nested" }
                ] }
            ] } },
        ]);
        assert_eq!(
            paths(PageStructureValidator::new().validate(&pages)),
            vec![
                "pages[0]",
                "pages[1].children[main]",
                "pages[2].children[main][0]",
                "pages[2].children[main][0].children[0]",
            ]
        );
    }

    #[test]
    fn module_children_are_slot_maps() {
        let pages = json!([{ "def": "page://home", "children": { "main": [
            { "def": "module://layout", "options": { "wide": true }, "children": {
                "side": [{ "def": "module://menu" }, { "def": "page://wrong" }]
            } }
        ] } }]);
        assert_eq!(
            paths(PageStructureValidator::new().validate(&pages)),
            vec!["pages[0].children[main][0].children[side][1]"]
        );
    }

    #[test]
    fn root_modules_follow_slot_rules() {
        let validator = PageStructureValidator::new();
        assert!(validator
            .validate_module_map(&json!({ "header": [{ "def": "module://nav" }] }))
            .is_ok());
        assert_eq!(
            paths(validator.validate_module_map(&json!([]))),
            vec!["rootModules"]
        );
        assert_eq!(
            paths(validator.validate_module_map(&json!({ "header": [{ "def": "nope" }] }))),
            vec!["rootModules[header][0]"]
        );
    }
}
