//! Python Source Decomposition
//!
//! Splits a Python module into three disjoint categories with tree-sitter:
//! function definitions, class definitions (methods nested under their
//! class) and top-level statements. Imports are collected separately.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{EnrichError, Result, StructuralCategory};

/// One decomposed Python file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceUnit {
    pub imports: Vec<String>,
    pub functions: BTreeMap<String, FunctionInfo>,
    pub classes: BTreeMap<String, ClassInfo>,
    /// Statements outside any function or class, in source order
    pub top_level: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionInfo {
    pub parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    pub is_async: bool,
    /// Full source text of the definition
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassInfo {
    pub bases: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Class-level assignment targets
    pub attributes: Vec<String>,
    pub methods: BTreeMap<String, FunctionInfo>,
    pub code: String,
}

impl SourceUnit {
    pub fn is_empty(&self, category: StructuralCategory) -> bool {
        match category {
            StructuralCategory::Functions => self.functions.is_empty(),
            StructuralCategory::Classes => self.classes.is_empty(),
            StructuralCategory::TopLevel => self.top_level.is_empty(),
        }
    }

    /// Categories that hold at least one declaration
    pub fn non_empty_categories(&self) -> Vec<StructuralCategory> {
        StructuralCategory::ALL
            .into_iter()
            .filter(|c| !self.is_empty(*c))
            .collect()
    }
}

pub fn create_ts_parser() -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| EnrichError::Parse {
            message: format!("Failed to set Python language: {}", e),
            path: String::new(),
        })?;
    Ok(parser)
}

/// Decompose `content`; `path` is only used in error messages
pub fn decompose(path: &str, content: &str) -> Result<SourceUnit> {
    let mut parser = create_ts_parser().map_err(|e| match e {
        EnrichError::Parse { message, .. } => EnrichError::Parse {
            message,
            path: path.to_string(),
        },
        other => other,
    })?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| EnrichError::Parse {
            message: "Failed to parse Python file".to_string(),
            path: path.to_string(),
        })?;

    let src = content.as_bytes();
    let root = tree.root_node();
    let mut unit = SourceUnit::default();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                unit.imports.push(node_text(child, src).to_string());
            }
            "function_definition" => {
                if let Some((name, info)) = parse_function(child, child, src) {
                    insert_unique(&mut unit.functions, name, info);
                }
            }
            "class_definition" => {
                if let Some((name, info)) = parse_class(child, child, src) {
                    insert_unique(&mut unit.classes, name, info);
                }
            }
            "decorated_definition" => {
                let Some(definition) = child.child_by_field_name("definition") else {
                    continue;
                };
                match definition.kind() {
                    "function_definition" => {
                        if let Some((name, info)) = parse_function(definition, child, src) {
                            insert_unique(&mut unit.functions, name, info);
                        }
                    }
                    "class_definition" => {
                        if let Some((name, info)) = parse_class(definition, child, src) {
                            insert_unique(&mut unit.classes, name, info);
                        }
                    }
                    _ => unit.top_level.push(node_text(child, src).to_string()),
                }
            }
            "comment" => {}
            _ => unit.top_level.push(node_text(child, src).to_string()),
        }
    }

    Ok(unit)
}

/// Redefinitions (property setters, conditional defs) keep every body:
/// the first under `name`, later ones under `name#2`, `name#3`, ...
fn insert_unique<T>(map: &mut BTreeMap<String, T>, name: String, value: T) {
    if !map.contains_key(&name) {
        map.insert(name, value);
        return;
    }
    let mut n = 2;
    while map.contains_key(&format!("{}#{}", name, n)) {
        n += 1;
    }
    map.insert(format!("{}#{}", name, n), value);
}

#[inline]
fn node_text<'a>(node: tree_sitter::Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn decorators(outer: tree_sitter::Node, src: &[u8]) -> Vec<String> {
    if outer.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = outer.walk();
    outer
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "decorator")
        .map(|n| node_text(n, src).to_string())
        .collect()
}

/// `def_node` is the definition, `outer` the node whose text is the excerpt
/// (the decorated wrapper when present)
fn parse_function(
    def_node: tree_sitter::Node,
    outer: tree_sitter::Node,
    src: &[u8],
) -> Option<(String, FunctionInfo)> {
    let name = node_text(def_node.child_by_field_name("name")?, src).to_string();

    let parameters = def_node
        .child_by_field_name("parameters")
        .map(|params| {
            let mut cursor = params.walk();
            params
                .named_children(&mut cursor)
                .filter(|p| p.kind() != "comment")
                .map(|p| node_text(p, src).to_string())
                .filter(|p| p != "self" && p != "cls")
                .collect()
        })
        .unwrap_or_default();

    let return_type = def_node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, src).to_string());

    let is_async = node_text(def_node, src).starts_with("async");

    Some((
        name,
        FunctionInfo {
            parameters,
            return_type,
            decorators: decorators(outer, src),
            is_async,
            code: node_text(outer, src).to_string(),
        },
    ))
}

fn parse_class(
    def_node: tree_sitter::Node,
    outer: tree_sitter::Node,
    src: &[u8],
) -> Option<(String, ClassInfo)> {
    let name = node_text(def_node.child_by_field_name("name")?, src).to_string();

    let bases = def_node
        .child_by_field_name("superclasses")
        .map(|args| {
            let mut cursor = args.walk();
            args.named_children(&mut cursor)
                .map(|a| node_text(a, src).to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut info = ClassInfo {
        bases,
        decorators: decorators(outer, src),
        code: node_text(outer, src).to_string(),
        ..Default::default()
    };

    if let Some(body) = def_node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "function_definition" => {
                    if let Some((method, f)) = parse_function(member, member, src) {
                        insert_unique(&mut info.methods, method, f);
                    }
                }
                "decorated_definition" => {
                    if let Some(definition) = member.child_by_field_name("definition")
                        && definition.kind() == "function_definition"
                        && let Some((method, f)) = parse_function(definition, member, src)
                    {
                        insert_unique(&mut info.methods, method, f);
                    }
                }
                "expression_statement" => {
                    let mut inner = member.walk();
                    for expr in member.named_children(&mut inner) {
                        if expr.kind() == "assignment"
                            && let Some(left) = expr.child_by_field_name("left")
                        {
                            info.attributes.push(node_text(left, src).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Some((name, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os
from typing import List

LIMIT = 10

def load(path: str, strict=False) -> List[str]:
    return open(path).read().split()

@cache
async def fetch(url):
    pass

class Store(Base, Mixin):
    kind = "memory"

    def __init__(self, size):
        self.size = size

    @property
    def empty(self):
        return self.size == 0

if __name__ == "__main__":
    print(load("x"))
"#;

    #[test]
    fn test_categories_are_disjoint() {
        let unit = decompose("sample.py", SAMPLE).unwrap();

        assert_eq!(unit.imports, vec!["import os", "from typing import List"]);
        assert_eq!(
            unit.functions.keys().collect::<Vec<_>>(),
            vec!["fetch", "load"]
        );
        assert_eq!(unit.classes.keys().collect::<Vec<_>>(), vec!["Store"]);
        assert_eq!(unit.top_level.len(), 2);
        assert!(unit.top_level[0].starts_with("LIMIT"));
        assert!(unit.top_level[1].starts_with("if __name__"));

        // methods stay under their class, not among functions
        assert!(!unit.functions.contains_key("__init__"));
    }

    #[test]
    fn test_function_details() {
        let unit = decompose("sample.py", SAMPLE).unwrap();

        let load = &unit.functions["load"];
        assert_eq!(load.parameters, vec!["path: str", "strict=False"]);
        assert_eq!(load.return_type.as_deref(), Some("List[str]"));
        assert!(!load.is_async);

        let fetch = &unit.functions["fetch"];
        assert!(fetch.is_async);
        assert_eq!(fetch.decorators, vec!["@cache"]);
        assert!(fetch.code.starts_with("@cache"));
    }

    #[test]
    fn test_class_details() {
        let unit = decompose("sample.py", SAMPLE).unwrap();
        let store = &unit.classes["Store"];

        assert_eq!(store.bases, vec!["Base", "Mixin"]);
        assert_eq!(store.attributes, vec!["kind"]);
        assert_eq!(
            store.methods.keys().collect::<Vec<_>>(),
            vec!["__init__", "empty"]
        );
        assert_eq!(store.methods["__init__"].parameters, vec!["size"]);
    }

    #[test]
    fn test_redefinitions_keep_every_body() {
        let source = r#"class Temp:
    @property
    def x(self):
        return self._x

    @x.setter
    def x(self, value):
        self._x = value

def helper():
    return 1

def helper():
    return 2

def helper():
    return 3
"#;
        let unit = decompose("temp.py", source).unwrap();

        let methods = &unit.classes["Temp"].methods;
        assert_eq!(methods.keys().collect::<Vec<_>>(), vec!["x", "x#2"]);
        assert_eq!(methods["x"].decorators, vec!["@property"]);
        assert_eq!(methods["x#2"].decorators, vec!["@x.setter"]);
        assert_eq!(methods["x#2"].parameters, vec!["value"]);

        assert_eq!(
            unit.functions.keys().collect::<Vec<_>>(),
            vec!["helper", "helper#2", "helper#3"]
        );
        assert!(unit.functions["helper#3"].code.contains("return 3"));
    }

    #[test]
    fn test_empty_categories() {
        let unit = decompose("empty.py", "# nothing here\n").unwrap();
        assert!(unit.non_empty_categories().is_empty());

        let unit = decompose("script.py", "print('hi')\n").unwrap();
        assert_eq!(unit.non_empty_categories(), vec![StructuralCategory::TopLevel]);
    }
}
