//! Render Profiles
//!
//! Per-language rendering configuration: scalar type mappings, containers,
//! identifier casing and keyword escaping.
//!
//! Key principle: the walker is profile-free. Only dialects consult a
//! profile, and only when turning a neutral `Field` into source text.

use serde::{Deserialize, Serialize};

use crate::tree::ValueType;

/// Supported target languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Java,
    Rust,
}

/// Casing convention for field identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    PascalCase,
    CamelCase,
    SnakeCase,
}

/// Scalar type mappings for inferred value types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMappings {
    pub boolean: String,
    pub integer: String,
    pub decimal: String,
    pub string: String,
}

/// Language-specific rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderProfile {
    pub language: Language,

    pub types: TypeMappings,

    /// Casing applied to field identifiers
    pub field_casing: Casing,

    /// Prefix used to escape identifiers that are keywords
    pub keyword_escape: String,
}

// =============================================================================
// Default Profiles
// =============================================================================

impl RenderProfile {
    pub fn go() -> Self {
        Self {
            language: Language::Go,
            types: TypeMappings {
                boolean: "bool".to_string(),
                integer: "int64".to_string(),
                decimal: "float64".to_string(),
                string: "string".to_string(),
            },
            field_casing: Casing::PascalCase,
            keyword_escape: "X".to_string(),
        }
    }

    /// JAXB binds boxed types so absent values stay `null`
    pub fn java() -> Self {
        Self {
            language: Language::Java,
            types: TypeMappings {
                boolean: "Boolean".to_string(),
                integer: "Long".to_string(),
                decimal: "Double".to_string(),
                string: "String".to_string(),
            },
            field_casing: Casing::CamelCase,
            keyword_escape: "_".to_string(),
        }
    }

    pub fn rust() -> Self {
        Self {
            language: Language::Rust,
            types: TypeMappings {
                boolean: "bool".to_string(),
                integer: "i64".to_string(),
                decimal: "f64".to_string(),
                string: "String".to_string(),
            },
            field_casing: Casing::SnakeCase,
            keyword_escape: "r#".to_string(),
        }
    }
}

// =============================================================================
// Render Helpers
// =============================================================================

impl RenderProfile {
    /// Escape a keyword if needed
    pub fn escape_keyword(&self, name: &str) -> String {
        let keywords = match self.language {
            Language::Go => GO_KEYWORDS,
            Language::Java => JAVA_KEYWORDS,
            Language::Rust => RUST_KEYWORDS,
        };

        if !keywords.contains(&name) {
            return name.to_string();
        }
        // `self`, `Self`, `super` and `crate` cannot be raw identifiers
        if self.language == Language::Rust && matches!(name, "self" | "Self" | "super" | "crate") {
            return format!("{}_", name);
        }
        format!("{}{}", self.keyword_escape, name)
    }

    /// Get the type string for an inferred scalar
    pub fn scalar_type(&self, value_type: ValueType) -> &str {
        match value_type.resolved() {
            ValueType::Boolean => &self.types.boolean,
            ValueType::Integer => &self.types.integer,
            ValueType::Decimal => &self.types.decimal,
            ValueType::String | ValueType::Unknown => &self.types.string,
        }
    }

    /// Wrap a type in the language's list container
    pub fn wrap_array(&self, type_str: &str) -> String {
        match self.language {
            Language::Go => format!("[]{}", type_str),
            Language::Java => format!("ArrayList<{}>", type_str),
            Language::Rust => format!("Vec<{}>", type_str),
        }
    }

    /// Wrap a type to make it optional
    pub fn wrap_optional(&self, type_str: &str) -> String {
        match self.language {
            Language::Go => format!("*{}", type_str),
            Language::Java => type_str.to_string(),
            Language::Rust => format!("Option<{}>", type_str),
        }
    }

    /// Field identifier for a neutral field name, cased and escaped
    pub fn field_ident(&self, name: &str) -> String {
        let cased = match self.field_casing {
            Casing::PascalCase => super::names::upper_first(name),
            Casing::CamelCase => super::names::lower_first(name),
            Casing::SnakeCase => super::names::to_snake_case(name),
        };
        // Go only exports identifiers starting with an upper-case letter
        let cased = if self.language == Language::Go && !cased.starts_with(|c: char| c.is_ascii_uppercase()) {
            format!("{}{}", self.keyword_escape, cased)
        } else {
            cased
        };
        self.escape_keyword(&cased)
    }
}

// =============================================================================
// Keywords
// =============================================================================

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else",
    "fallthrough", "for", "func", "go", "goto", "if", "import", "interface",
    "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "default", "do", "double", "else", "enum",
    "extends", "final", "finally", "float", "for", "goto", "if", "implements",
    "import", "instanceof", "int", "interface", "long", "native", "new",
    "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "true", "false", "null",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
    "super", "trait", "true", "type", "unsafe", "use", "where", "while",
    "async", "await", "dyn", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
];
