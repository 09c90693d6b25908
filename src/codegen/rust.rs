//! Rust Code Emitter
//!
//! Generates serde structs readable with `quick_xml::de`.
//!
//! Key constraints:
//! - This module ONLY receives Declarations + RenderProfile - no tree access
//! - Type names come from Declaration.type_name (already resolved)
//! - Attributes are renamed to `@name`, character data to `$text`

use super::template::{self, Scope};
use super::{
    Declaration, Dialect, EmitContext, Field, FieldKind, FieldType, GeneratedFile, GeneratedOutput, IdentSet,
    RenderProfile,
};
use crate::error::Result;

const FILE_TEMPLATE: &str = r#"//! Generated by xml-typegen from {{sources}} - DO NOT EDIT
//!
//! Deserialize with `quick_xml::de::from_str::<{{root_type}}>(xml)`.

use serde::{Deserialize, Serialize};

{{types}}"#;

/// Rust serde struct emitter
pub struct RustDialect {
    profile: RenderProfile,
    idents: IdentSet,
    output: String,
    type_count: usize,
}

impl Default for RustDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl RustDialect {
    pub fn new() -> Self {
        Self {
            profile: RenderProfile::rust(),
            idents: IdentSet::default(),
            output: String::new(),
            type_count: 0,
        }
    }

    fn serde_name(field: &Field) -> String {
        match field.kind {
            FieldKind::Attribute => format!("@{}", field.xml_name),
            FieldKind::Element => field.xml_name.to_string(),
            FieldKind::Text => "$text".to_string(),
        }
    }
}

impl Dialect for RustDialect {
    fn open_declaration(&mut self, decl: &Declaration) -> Result<()> {
        self.idents.clear();
        self.output.push_str(&format!("/// `<{}>` ({})\n", decl.xml_name, decl.key));
        self.output
            .push_str("#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]\n");
        self.output
            .push_str(&format!("#[serde(rename = \"{}\")]\n", decl.xml_name));
        self.output
            .push_str(&format!("pub struct {} {{\n", decl.type_name));
        Ok(())
    }

    fn emit_field(&mut self, _decl: &Declaration, field: &Field) -> Result<()> {
        let base = match &field.field_type {
            FieldType::Scalar(value_type) => self.profile.scalar_type(*value_type).to_string(),
            FieldType::Reference(type_name) => type_name.clone(),
        };

        // Repeated fields default to empty; everything else may be absent
        let (rust_type, attrs) = if field.repeated {
            (self.profile.wrap_array(&base), "default")
        } else {
            (
                self.profile.wrap_optional(&base),
                "default, skip_serializing_if = \"Option::is_none\"",
            )
        };

        self.output.push_str(&format!(
            "    #[serde(rename = \"{}\", {})]\n",
            Self::serde_name(field),
            attrs
        ));
        let ident = self.idents.claim(self.profile.field_ident(&field.name));
        self.output.push_str(&format!("    pub {}: {},\n", ident, rust_type));
        Ok(())
    }

    fn close_declaration(&mut self, _decl: &Declaration) -> Result<()> {
        self.output.push_str("}\n\n");
        self.type_count += 1;
        Ok(())
    }

    fn finish(&mut self, ctx: &EmitContext<'_>) -> Result<GeneratedOutput> {
        let root_type = ctx
            .root
            .as_ref()
            .map(|r| r.type_name.as_str())
            .unwrap_or_default();
        let scope = Scope::new()
            .with("sources", ctx.sources.join(", "))
            .with("root_type", root_type)
            .with("types", self.output.trim_end());
        let mut contents = template::render("rust-types", FILE_TEMPLATE, &scope)?;
        contents.push('\n');

        Ok(GeneratedOutput {
            files: vec![GeneratedFile {
                path: "types.rs".into(),
                contents,
            }],
            type_count: self.type_count,
            managed_dirs: Vec::new(),
        })
    }
}
