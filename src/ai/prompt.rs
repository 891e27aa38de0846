//! Instruction Registry
//!
//! Every completion request names an instruction. The registry maps the
//! identifier to its system text and a user template with `{variable}`
//! placeholders, filled from the request's ordered variables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ResultSchema, StructuralCategory, StructuralResult};

/// Identifier of a prompt instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionId {
    /// Root-level file classified from its metadata
    RootFile,
    /// Folder that has nested folders
    ModuleWithSubmodules,
    /// Folder without nested folders
    ModuleWithoutSubmodules,
    /// Root-level file read with its earlier classification
    RootFileContent,
    /// File inside a folder read with the folder's context
    FileContent,
    PyFunctions,
    PyClasses,
    PyTopLevel,
}

impl InstructionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RootFile => "root_file",
            Self::ModuleWithSubmodules => "module_with_submodules",
            Self::ModuleWithoutSubmodules => "module_without_submodules",
            Self::RootFileContent => "root_file_content",
            Self::FileContent => "file_content",
            Self::PyFunctions => "py_functions",
            Self::PyClasses => "py_classes",
            Self::PyTopLevel => "py_top_level",
        }
    }

    pub fn instruction(&self) -> Instruction {
        match self {
            Self::RootFile => Instruction {
                system: SYSTEM_PROJECT,
                template: ROOT_FILE,
            },
            Self::ModuleWithSubmodules => Instruction {
                system: SYSTEM_PROJECT,
                template: MODULE_WITH_SUBMODULES,
            },
            Self::ModuleWithoutSubmodules => Instruction {
                system: SYSTEM_PROJECT,
                template: MODULE_WITHOUT_SUBMODULES,
            },
            Self::RootFileContent => Instruction {
                system: SYSTEM_FILES,
                template: ROOT_FILE_CONTENT,
            },
            Self::FileContent => Instruction {
                system: SYSTEM_FILES,
                template: FILE_CONTENT,
            },
            Self::PyFunctions => Instruction {
                system: SYSTEM_PYTHON,
                template: PY_FUNCTIONS,
            },
            Self::PyClasses => Instruction {
                system: SYSTEM_PYTHON,
                template: PY_CLASSES,
            },
            Self::PyTopLevel => Instruction {
                system: SYSTEM_PYTHON,
                template: PY_TOP_LEVEL,
            },
        }
    }
}

impl std::fmt::Display for InstructionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System text and user template of one instruction
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub system: &'static str,
    pub template: &'static str,
}

impl Instruction {
    /// Fill `{name}` placeholders in one scan of the template, so text
    /// inserted from a value is never scanned again. Strings are inserted
    /// raw, other values as compact JSON. Unknown placeholders are left as
    /// they are.
    pub fn render(&self, variables: &[(String, Value)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 1..];
            let name_len = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(tail.len());
            let name = &tail[..name_len];

            let value = if !name.is_empty() && tail[name_len..].starts_with('}') {
                variables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            } else {
                None
            };

            match value {
                Some(Value::String(s)) => {
                    out.push_str(s);
                    rest = &tail[name_len + 1..];
                }
                Some(other) => {
                    out.push_str(&other.to_string());
                    rest = &tail[name_len + 1..];
                }
                None => {
                    out.push('{');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

// =============================================================================
// Structural Category Dispatch
// =============================================================================

/// Instruction and result schema for one structural category
#[derive(Debug, Clone, Copy)]
pub struct CategoryRoute {
    pub instruction: InstructionId,
    pub schema: fn() -> Value,
}

pub fn category_route(category: StructuralCategory) -> CategoryRoute {
    match category {
        StructuralCategory::Functions => CategoryRoute {
            instruction: InstructionId::PyFunctions,
            schema: StructuralResult::schema,
        },
        StructuralCategory::Classes => CategoryRoute {
            instruction: InstructionId::PyClasses,
            schema: StructuralResult::schema,
        },
        StructuralCategory::TopLevel => CategoryRoute {
            instruction: InstructionId::PyTopLevel,
            schema: StructuralResult::schema,
        },
    }
}

// =============================================================================
// Templates
// =============================================================================

const SYSTEM_PROJECT: &str = "You analyze the layout of software projects and describe what each folder or file is for.";

const SYSTEM_FILES: &str =
    "You analyze files of software projects and summarize them for a README.";

const SYSTEM_PYTHON: &str =
    "You are an expert in Python who explains the structure and purpose of Python code.";

const ROOT_FILE: &str = "\
A file at the root of the project: name {filename}, extension {file_extension}, {num_lines} lines.

Return:
'Description': what this file is most likely for.
'Technologies': technologies or languages it relates to.
'Rating': from 1 to 10, how important the file is for a README.";

const MODULE_WITH_SUBMODULES: &str = "\
Folder {current_module} holds {num_files} files with extensions {extensions} and {num_lines} lines in total.
It contains these subfolders: {submodules}.
Technologies of the enclosing folder: {parent_technologies}

Return:
'Description': what this folder does within the project.
'Technologies': technologies or languages it uses.
'Rating': from 1 to 10, how important the folder is for a README.";

const MODULE_WITHOUT_SUBMODULES: &str = "\
Folder {current_module} holds {num_files} files with extensions {extensions} and {num_lines} lines in total.
It has no subfolders.
Technologies of the enclosing folder: {parent_technologies}

Return:
'Description': what this folder does within the project.
'Technologies': technologies or languages it uses.
'Rating': from 1 to 10, how important the folder is for a README.";

const ROOT_FILE_CONTENT: &str = "\
README sections: {readme_section}
Technologies already identified for this file: {technologies}
File {filename}, content or excerpt: {file_info}

Return:
'ReadmeSection': the README section this file belongs to, or None.
'Description': what this file does.
'CodeExtractions': a short snippet of its code, configuration or task.
'Technologies': technologies or languages it uses.";

const FILE_CONTENT: &str = "\
README sections: {readme_section}
Folder containing the file, with its place in the project: {non_module_file}
File {filename}, content or excerpt: {file_info}

Return:
'ReadmeSection': the README section this file belongs to, or None.
'Description': what this file does.
'CodeExtractions': a short snippet of its code, configuration or task.
'Technologies': technologies or languages it uses.";

const PY_FUNCTIONS: &str = "\
Functions of the Python file {filename}: {ast_analysis}

Return:
'Description': a concise description of each function.
'CodeExtractions': the key segments of each function with comments on what they do.";

const PY_CLASSES: &str = "\
Classes of the Python file {filename}, with their methods: {ast_analysis}

Return:
'Description': what each class is for and how it interacts with the rest of the code.
'CodeExtractions': the key segments of each class with comments on what they do.";

const PY_TOP_LEVEL: &str = "\
Top-level statements of the Python file {filename}, outside any function or class: {ast_analysis}

Return:
'Description': what this code does when the file runs or is imported.
'CodeExtractions': the key segments with comments on the program flow.";
