//! Java JAXB Emitter
//!
//! Annotation-bound dialect: one class per declaration under
//! `<package>/xml/`, a `Main` class that round-trips the sample file, a
//! `package-info.java` carrying `@XmlSchema`/`@XmlNs` when the root element
//! is namespaced, and a Maven `pom.xml`.

use std::path::PathBuf;

use super::template::{self, Scope};
use super::{
    Declaration, Dialect, EmitContext, Field, FieldKind, FieldType, GeneratedFile, GeneratedOutput, IdentSet,
    RenderProfile,
};
use crate::error::{Result, TypegenError};

const SOURCE_ROOT: &str = "src/main/java";

const CLASS_TEMPLATE: &str = r#"// Generated by xml-typegen on {{generated_at}}

package {{package}}.xml;

import java.util.ArrayList;
import javax.xml.bind.annotation.*;

{{body}}"#;

const MAIN_TEMPLATE: &str = r#"// Generated by xml-typegen on {{generated_at}}

package {{package}};

import {{package}}.xml.{{root_class}};

import java.io.File;
import javax.xml.bind.JAXBContext;
import javax.xml.bind.JAXBException;
import javax.xml.bind.Marshaller;
import javax.xml.bind.Unmarshaller;

public class Main {
    public static final String SOURCE_XML = "{{source_file}}";

    public static void main(String[] args) throws JAXBException {
        String filename = args.length > 0 ? args[0] : SOURCE_XML;
        JAXBContext context = JAXBContext.newInstance({{root_class}}.class);

        Unmarshaller unmarshaller = context.createUnmarshaller();
        {{root_class}} root = ({{root_class}}) unmarshaller.unmarshal(new File(filename));

        Marshaller marshaller = context.createMarshaller();
        marshaller.setProperty(Marshaller.JAXB_FORMATTED_OUTPUT, Boolean.TRUE);
        marshaller.marshal(root, System.out);
    }
}
"#;

const PACKAGE_INFO_TEMPLATE: &str = r#"@XmlSchema(
    namespace = "{{namespace}}",
    elementFormDefault = XmlNsForm.UNQUALIFIED,
    xmlns = {
{{#each prefixes}}        @XmlNs(prefix = "{{prefix}}", namespaceURI = "{{uri}}"),
{{/each}}    })
package {{package}}.xml;

import javax.xml.bind.annotation.XmlNs;
import javax.xml.bind.annotation.XmlNsForm;
import javax.xml.bind.annotation.XmlSchema;
"#;

const POM_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>

  <groupId>{{group}}</groupId>
  <artifactId>{{artifact}}</artifactId>
  <version>1.0-SNAPSHOT</version>
  <packaging>jar</packaging>

  <properties>
    <maven.compiler.source>1.8</maven.compiler.source>
    <maven.compiler.target>1.8</maven.compiler.target>
    <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
  </properties>

  <dependencies>
    <dependency>
      <groupId>javax.xml.bind</groupId>
      <artifactId>jaxb-api</artifactId>
      <version>2.3.1</version>
    </dependency>
    <dependency>
      <groupId>org.glassfish.jaxb</groupId>
      <artifactId>jaxb-runtime</artifactId>
      <version>2.3.9</version>
    </dependency>
  </dependencies>
</project>
"#;

/// One class awaiting its file header
#[derive(Debug)]
struct JavaClass {
    name: String,
    body: String,
}

/// JAXB class emitter
pub struct JavaDialect {
    profile: RenderProfile,
    idents: IdentSet,
    classes: Vec<JavaClass>,
    current: String,
}

impl Default for JavaDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaDialect {
    pub fn new() -> Self {
        Self {
            profile: RenderProfile::java(),
            idents: IdentSet::default(),
            classes: Vec::new(),
            current: String::new(),
        }
    }

    fn field_type(&self, field: &Field) -> String {
        let base = match &field.field_type {
            FieldType::Scalar(value_type) => self.profile.scalar_type(*value_type).to_string(),
            FieldType::Reference(type_name) => type_name.clone(),
        };
        if field.repeated {
            self.profile.wrap_array(&base)
        } else {
            base
        }
    }

    fn package_info(ctx: &EmitContext<'_>, package: &str) -> Result<Option<String>> {
        let Some(root) = ctx.tree.primary_root() else {
            return Ok(None);
        };
        let Some(namespace) = ctx.tree.namespaces().resolve(&root.name.prefix) else {
            return Ok(None);
        };

        let prefixes: Vec<Scope> = ctx
            .tree
            .attribute_index()
            .namespace_declarations(&root.key)
            .filter_map(|decl| decl.declared_prefix())
            .filter_map(|prefix| {
                ctx.tree.namespaces().resolve(prefix).map(|uri| {
                    Scope::new()
                        .with("prefix", prefix)
                        .with("uri", java_string_escape(uri))
                })
            })
            .collect();

        let mut scope = Scope::new()
            .with("namespace", java_string_escape(namespace))
            .with("package", package);
        scope.insert_list("prefixes", prefixes);
        template::render("java-package-info", PACKAGE_INFO_TEMPLATE, &scope).map(Some)
    }
}

impl Dialect for JavaDialect {
    fn open_declaration(&mut self, decl: &Declaration) -> Result<()> {
        self.current.clear();
        self.idents.clear();
        self.current.push_str(&format!(
            "@XmlRootElement({})\n",
            name_and_namespace(&decl.xml_name.local, decl.namespace.as_deref())
        ));
        self.current.push_str("@XmlAccessorType(XmlAccessType.FIELD)\n");
        self.current.push_str(&format!("public class {} {{\n", decl.type_name));
        Ok(())
    }

    fn emit_field(&mut self, decl: &Declaration, field: &Field) -> Result<()> {
        let annotation = match field.kind {
            FieldKind::Attribute => format!(
                "@XmlAttribute({})",
                name_and_namespace(&field.xml_name.local, field.namespace.as_deref())
            ),
            FieldKind::Element => format!(
                "@XmlElement({})",
                name_and_namespace(&field.xml_name.local, field.namespace.as_deref())
            ),
            // JAXB rejects @XmlValue on a class that also binds elements
            FieldKind::Text if decl.has_child_elements() => {
                self.current
                    .push_str("\n    // Character data mixed with child elements is not bound\n");
                return Ok(());
            }
            FieldKind::Text => "@XmlValue".to_string(),
        };
        let ident = self.idents.claim(self.profile.field_ident(&field.name));
        self.current.push_str(&format!(
            "\n    {}\n    public {} {};\n",
            annotation,
            self.field_type(field),
            ident
        ));
        Ok(())
    }

    fn close_declaration(&mut self, decl: &Declaration) -> Result<()> {
        self.current.push_str("}\n");
        self.classes.push(JavaClass {
            name: decl.type_name.clone(),
            body: std::mem::take(&mut self.current),
        });
        Ok(())
    }

    fn finish(&mut self, ctx: &EmitContext<'_>) -> Result<GeneratedOutput> {
        let package = ctx.config.java_package();
        let package_dir = PathBuf::from(SOURCE_ROOT).join(package.replace('.', "/"));
        let generated_at = ctx.generated_at.to_rfc3339();
        let mut files = Vec::with_capacity(self.classes.len() + 3);

        for class in &self.classes {
            let scope = Scope::new()
                .with("generated_at", generated_at.as_str())
                .with("package", package.as_str())
                .with("body", class.body.as_str());
            files.push(GeneratedFile {
                path: package_dir.join("xml").join(format!("{}.java", class.name)),
                contents: template::render("java-class", CLASS_TEMPLATE, &scope)?,
            });
        }

        let root = ctx.root.as_ref().ok_or(TypegenError::EmptySchema)?;
        let source_file = ctx.sources.first().map(String::as_str).unwrap_or_default();
        let scope = Scope::new()
            .with("generated_at", generated_at.as_str())
            .with("package", package.as_str())
            .with("root_class", root.type_name.as_str())
            .with("source_file", java_string_escape(source_file));
        files.push(GeneratedFile {
            path: package_dir.join("Main.java"),
            contents: template::render("java-main", MAIN_TEMPLATE, &scope)?,
        });

        if let Some(contents) = Self::package_info(ctx, &package)? {
            files.push(GeneratedFile {
                path: package_dir.join("xml").join("package-info.java"),
                contents,
            });
        }

        let scope = Scope::new()
            .with("group", ctx.config.output.java_package.as_str())
            .with("artifact", ctx.config.output.java_app.as_str());
        files.push(GeneratedFile {
            path: PathBuf::from("pom.xml"),
            contents: template::render("maven-pom", POM_TEMPLATE, &scope)?,
        });

        Ok(GeneratedOutput {
            files,
            type_count: self.classes.len(),
            managed_dirs: vec![package_dir.join("xml")],
        })
    }
}

fn name_and_namespace(local: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(uri) => format!(
            "name = \"{}\", namespace = \"{}\"",
            java_string_escape(local),
            java_string_escape(uri)
        ),
        None => format!("name = \"{}\"", java_string_escape(local)),
    }
}

fn java_string_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate_at;
    use crate::config::{GeneratorConfig, OutputDialect};
    use crate::extract::Extractor;
    use crate::tree::{FinalizedTree, IgnoreSet, SchemaTree, TypeInference};
    use chrono::{TimeZone, Utc};

    fn build(xml: &str) -> FinalizedTree {
        let mut tree = SchemaTree::with_settings(IgnoreSet::default(), TypeInference::new(true));
        Extractor::new(&mut tree).extract_str("sample.xml", xml).unwrap();
        tree.finalize()
    }

    fn generate(xml: &str) -> GeneratedOutput {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Java);
        config.inference.use_types = true;
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        generate_at(&build(xml), &config, &["/data/sample.xml".to_string()], at).unwrap()
    }

    const PKG_DIR: &str = "src/main/java/io/xmltypegen/jaxb";

    #[test]
    fn test_one_class_per_declaration() {
        let output = generate(r#"<a x="1"><b>hi</b><b>there</b></a>"#);
        assert_eq!(output.type_count, 2);

        let ca = output.file(&format!("{}/xml/Ca.java", PKG_DIR)).unwrap();
        assert!(ca.contents.contains("package io.xmltypegen.jaxb.xml;"));
        assert!(ca.contents.contains("@XmlRootElement(name = \"a\")"));
        assert!(ca.contents.contains("    @XmlAttribute(name = \"x\")\n    public Long attrX;\n"));
        assert!(ca.contents.contains("    @XmlElement(name = \"b\")\n    public ArrayList<Cb> cb;\n"));

        let cb = output.file(&format!("{}/xml/Cb.java", PKG_DIR)).unwrap();
        assert!(cb.contents.contains("    @XmlValue\n    public String text;\n"));
    }

    #[test]
    fn test_main_and_pom() {
        let output = generate("<a><b/></a>");
        let main = output.file(&format!("{}/Main.java", PKG_DIR)).unwrap();
        assert!(main.contents.contains("import io.xmltypegen.jaxb.xml.Ca;"));
        assert!(main.contents.contains("SOURCE_XML = \"/data/sample.xml\";"));
        assert!(main.contents.contains("JAXBContext.newInstance(Ca.class)"));

        let pom = output.file("pom.xml").unwrap();
        assert!(pom.contents.contains("<artifactId>jaxb</artifactId>"));
        assert!(output.file(&format!("{}/xml/package-info.java", PKG_DIR)).is_none());
    }

    #[test]
    fn test_package_info_for_namespaced_root() {
        let output = generate(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dc="urn:dc"><dc:title>x</dc:title></feed>"#,
        );
        let info = output
            .file(&format!("{}/xml/package-info.java", PKG_DIR))
            .unwrap();
        assert!(info.contents.contains("namespace = \"http://www.w3.org/2005/Atom\""));
        assert!(info.contents.contains("@XmlNs(prefix = \"\", namespaceURI = \"http://www.w3.org/2005/Atom\")"));
        assert!(info.contents.contains("@XmlNs(prefix = \"dc\", namespaceURI = \"urn:dc\")"));
        assert!(info.contents.contains("package io.xmltypegen.jaxb.xml;"));

        let feed = output.file(&format!("{}/xml/Cfeed.java", PKG_DIR)).unwrap();
        assert!(feed
            .contents
            .contains("@XmlRootElement(name = \"feed\", namespace = \"http://www.w3.org/2005/Atom\")"));
        assert!(feed
            .contents
            .contains("@XmlElement(name = \"title\", namespace = \"urn:dc\")"));
    }

    #[test]
    fn test_mixed_content_text_not_bound() {
        let output = generate("<p>Hello <em>big</em> world</p>");
        let p = output.file(&format!("{}/xml/Cp.java", PKG_DIR)).unwrap();
        assert!(!p.contents.contains("@XmlValue"));
        assert!(p.contents.contains("not bound"));
    }

    #[test]
    fn test_lower_cased_field_names_stay_unique() {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Java);
        config.naming.prefix = String::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let output = generate_at(&build("<a><B/><b/></a>"), &config, &[], at).unwrap();

        let a = output.file(&format!("{}/xml/a.java", PKG_DIR)).unwrap();
        assert!(a.contents.contains("    @XmlElement(name = \"B\")\n    public B b;\n"));
        assert!(a.contents.contains("    @XmlElement(name = \"b\")\n    public b b2;\n"));
    }

    #[test]
    fn test_class_directory_is_managed() {
        let output = generate("<a/>");
        assert_eq!(output.managed_dirs, vec![PathBuf::from(format!("{}/xml", PKG_DIR))]);
    }
}
