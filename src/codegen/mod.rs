//! Code Generation
//!
//! Turns a finalized schema tree into source files for one output dialect.
//!
//! Architecture:
//! - Walker: visits every reachable node once and projects it into a
//!   `Declaration` (ordering, flattening and naming happen here, once)
//! - Dialect: language-specific emitter that consumes Declarations
//! - EmitContext: read-only run information handed to `Dialect::finish`
//!
//! The key constraint: dialects never read the tree to decide structure.
//! Everything structural arrives pre-computed in a Declaration.

pub mod config;
pub mod go;
pub mod java;
pub mod names;
pub mod rust;
pub mod template;

pub use config::{Language, RenderProfile};
pub use names::NameResolver;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::{DeclarationOrder, GeneratorConfig, OutputDialect};
use crate::error::{Result, TypegenError};
use crate::tree::{ElementNode, FinalizedTree, NamespaceTable, NodeKey, QualifiedName, ValueType};

// =============================================================================
// Declaration
// =============================================================================

/// Where a field comes from in the XML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Attribute,
    Element,
    /// Character data of the element itself
    Text,
}

/// Field type: an inferred scalar or a reference to another declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ValueType),
    Reference(String),
}

/// One field of a declaration, in dialect-neutral form
#[derive(Debug, Clone)]
pub struct Field {
    /// Neutral identifier (first letter upper-cased); dialects re-case it
    pub name: String,
    /// XML name; empty for text fields
    pub xml_name: QualifiedName,
    /// Namespace URI bound to the XML prefix, when known
    pub namespace: Option<String>,
    /// Name used for JSON encodings
    pub json_name: String,
    pub kind: FieldKind,
    pub field_type: FieldType,
    pub repeated: bool,
    /// Longest sampled value in characters (scalars only)
    pub max_length: usize,
}

/// A pure projection of one node for the emitters.
///
/// It contains ONLY what a dialect needs - no tree access.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub key: NodeKey,
    pub type_name: String,
    pub xml_name: QualifiedName,
    pub namespace: Option<String>,
    pub is_root: bool,
    /// Attributes, then elements, then text
    pub fields: Vec<Field>,
}

impl Declaration {
    pub fn has_child_elements(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::Element)
    }

    pub fn text_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.kind == FieldKind::Text)
    }
}

/// Type name plus XML name of a declared node
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub type_name: String,
    pub xml_name: QualifiedName,
    pub namespace: Option<String>,
}

impl TypeRef {
    /// Namespace part of the name as a decoder reports it: the bound URI,
    /// else the raw prefix, else empty
    pub fn space(&self) -> &str {
        self.namespace.as_deref().unwrap_or(self.xml_name.prefix.as_str())
    }
}

/// Field identifiers already used in the declaration being emitted.
///
/// Distinct neutral names can collapse to one identifier once a dialect
/// re-cases them (`B`/`b`, `FooBar`/`Foo_bar`), so dialects claim their
/// final identifiers here and get a numbered variant on a clash.
#[derive(Debug, Default)]
pub struct IdentSet {
    seen: HashSet<String>,
}

impl IdentSet {
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn claim(&mut self, ident: String) -> String {
        if self.seen.insert(ident.clone()) {
            return ident;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", ident, n);
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

// =============================================================================
// Dialect
// =============================================================================

/// Read-only run information available when a dialect assembles its files
pub struct EmitContext<'a> {
    pub tree: &'a FinalizedTree,
    pub config: &'a GeneratorConfig,
    /// Display names of the scanned sources, in scan order
    pub sources: &'a [String],
    /// Every declaration emitted, in emission order
    pub declarations: &'a [Declaration],
    /// First-observed root
    pub root: Option<TypeRef>,
    /// Declared children of the roots (one level below the document element)
    pub first_level: Vec<TypeRef>,
    pub generated_at: DateTime<Utc>,
}

/// Language-specific emitter driven by the shared walker.
///
/// Traversal, dedup, ordering, flattening and naming are not a dialect's
/// business; it only renders what it is handed.
pub trait Dialect {
    fn open_declaration(&mut self, decl: &Declaration) -> Result<()>;

    fn emit_field(&mut self, decl: &Declaration, field: &Field) -> Result<()>;

    fn close_declaration(&mut self, decl: &Declaration) -> Result<()>;

    fn emit_declaration(&mut self, decl: &Declaration) -> Result<()> {
        self.open_declaration(decl)?;
        for field in &decl.fields {
            self.emit_field(decl, field)?;
        }
        self.close_declaration(decl)
    }

    /// Assemble the output files
    fn finish(&mut self, ctx: &EmitContext<'_>) -> Result<GeneratedOutput>;
}

// =============================================================================
// Generated Output
// =============================================================================

/// One file to write, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Output from code generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub files: Vec<GeneratedFile>,
    /// Number of declarations generated
    pub type_count: usize,
    /// Directories owned by this output: files in them that are not part of
    /// `files` are left over from earlier runs and get removed on write
    pub managed_dirs: Vec<PathBuf>,
}

impl GeneratedOutput {
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == PathBuf::from(path))
    }
}

// =============================================================================
// Walker
// =============================================================================

/// Shared traversal over a finalized tree
pub struct Walker<'a> {
    tree: &'a FinalizedTree,
    config: &'a GeneratorConfig,
    names: NameResolver,
    /// Nodes that get a declaration, in traversal order
    declared: Vec<&'a ElementNode>,
}

impl<'a> Walker<'a> {
    pub fn new(tree: &'a FinalizedTree, config: &'a GeneratorConfig) -> Self {
        let flatten = config.emission.flatten_strings;
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut declared = Vec::new();
        let mut stack: Vec<&ElementNode> = tree.root_nodes().collect();
        stack.reverse();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.key.clone()) {
                continue;
            }
            if !is_flattened(node, flatten) {
                declared.push(node);
            }
            let mut children: Vec<&ElementNode> = tree.children_of(node).collect();
            children.reverse();
            stack.extend(children);
        }

        let names = NameResolver::build(&config.naming, tree, declared.iter().copied());
        tracing::debug!(
            visited = visited.len(),
            declared = declared.len(),
            disambiguated = names.disambiguated_count(),
            "walker prepared"
        );

        Self {
            tree,
            config,
            names,
            declared,
        }
    }

    pub fn names(&self) -> &NameResolver {
        &self.names
    }

    /// Project every declared node, in the configured order
    pub fn declarations(&self) -> Result<Vec<Declaration>> {
        let mut nodes = self.declared.clone();
        match self.config.emission.ordering {
            DeclarationOrder::Alphabetical => nodes.sort_by(|a, b| a.key.cmp(&b.key)),
            DeclarationOrder::Discovery => nodes.sort_by_key(|n| n.discovery_index),
        }
        nodes.into_iter().map(|n| self.declaration(n)).collect()
    }

    /// Drive a dialect over every declaration; returns what was emitted
    pub fn walk(&self, dialect: &mut dyn Dialect) -> Result<Vec<Declaration>> {
        let declarations = self.declarations()?;
        for decl in &declarations {
            dialect.emit_declaration(decl)?;
        }
        Ok(declarations)
    }

    fn type_name(&self, key: &NodeKey) -> Result<String> {
        self.names
            .type_name(key)
            .map(str::to_string)
            .ok_or_else(|| TypegenError::template("walker", format!("no type name resolved for {}", key)))
    }

    fn declaration(&self, node: &ElementNode) -> Result<Declaration> {
        let namespaces = self.tree.namespaces();
        let ordering = self.config.emission.ordering;
        let mut fields = Vec::new();

        let mut attributes: Vec<_> = node.attributes.values().collect();
        if ordering == DeclarationOrder::Alphabetical {
            attributes.sort_by_key(|a| a.name.to_string());
        }
        for attr in attributes {
            fields.push(Field {
                name: self.names.attribute_field_name(&attr.name),
                xml_name: attr.name.clone(),
                namespace: attribute_namespace(namespaces, &attr.name),
                json_name: self.names.json_name(&attr.name),
                kind: FieldKind::Attribute,
                field_type: FieldType::Scalar(attr.value_type.resolved()),
                repeated: false,
                max_length: attr.max_length,
            });
        }

        let mut children: Vec<&ElementNode> = self.tree.children_of(node).collect();
        match ordering {
            DeclarationOrder::Alphabetical => children.sort_by(|a, b| a.key.cmp(&b.key)),
            DeclarationOrder::Discovery => children.sort_by_key(|c| c.discovery_index),
        }
        for child in children {
            let (name, field_type) = if is_flattened(child, self.config.emission.flatten_strings) {
                (
                    self.names.element_field_name(&child.name),
                    FieldType::Scalar(child.text_type.resolved()),
                )
            } else {
                let type_name = self.type_name(&child.key)?;
                (type_name.clone(), FieldType::Reference(type_name))
            };
            fields.push(Field {
                name,
                xml_name: child.name.clone(),
                namespace: element_namespace(namespaces, &child.name),
                json_name: self.names.json_name(&child.name),
                kind: FieldKind::Element,
                field_type,
                repeated: child.is_repeated(),
                max_length: child.max_text_length,
            });
        }

        if node.has_text() {
            fields.push(Field {
                name: "Text".to_string(),
                xml_name: QualifiedName::new("", ""),
                namespace: None,
                json_name: "text".to_string(),
                kind: FieldKind::Text,
                field_type: FieldType::Scalar(node.text_type.resolved()),
                repeated: false,
                max_length: node.max_text_length,
            });
        }

        dedup_field_names(&mut fields);

        Ok(Declaration {
            key: node.key.clone(),
            type_name: self.type_name(&node.key)?,
            xml_name: node.name.clone(),
            namespace: element_namespace(namespaces, &node.name),
            is_root: node.parent.is_none(),
            fields,
        })
    }

    fn type_ref(&self, node: &ElementNode) -> Result<TypeRef> {
        Ok(TypeRef {
            type_name: self.type_name(&node.key)?,
            xml_name: node.name.clone(),
            namespace: element_namespace(self.tree.namespaces(), &node.name),
        })
    }

    /// The first-observed root; outputs needing a single root use this one
    pub fn root_type(&self) -> Result<Option<TypeRef>> {
        self.tree.primary_root().map(|n| self.type_ref(n)).transpose()
    }

    /// Declared children of every root, in the configured order.
    ///
    /// Children sharing a namespace and local name appear once (the first in
    /// that order), since a streaming decoder cannot tell them apart.
    pub fn first_level_types(&self) -> Result<Vec<TypeRef>> {
        let flatten = self.config.emission.flatten_strings;
        let mut nodes: Vec<&ElementNode> = self
            .tree
            .root_nodes()
            .flat_map(|root| self.tree.children_of(root))
            .filter(|n| !is_flattened(n, flatten))
            .collect();
        match self.config.emission.ordering {
            DeclarationOrder::Alphabetical => nodes.sort_by(|a, b| a.key.cmp(&b.key)),
            DeclarationOrder::Discovery => nodes.sort_by_key(|n| n.discovery_index),
        }
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut refs = Vec::new();
        for node in nodes {
            let type_ref = self.type_ref(node)?;
            if seen.insert((type_ref.space().to_string(), type_ref.xml_name.local.clone())) {
                refs.push(type_ref);
            }
        }
        Ok(refs)
    }
}

/// A string-only leaf below some parent collapses into its parent when flattening
fn is_flattened(node: &ElementNode, flatten: bool) -> bool {
    flatten && node.parent.is_some() && node.is_string_only_leaf()
}

/// Elements without a prefix live in the default namespace, if one is declared
fn element_namespace(namespaces: &NamespaceTable, name: &QualifiedName) -> Option<String> {
    namespaces.resolve(&name.prefix).map(str::to_string)
}

/// Unprefixed attributes are in no namespace
fn attribute_namespace(namespaces: &NamespaceTable, name: &QualifiedName) -> Option<String> {
    if name.has_prefix() {
        namespaces.resolve(&name.prefix).map(str::to_string)
    } else {
        None
    }
}

fn dedup_field_names(fields: &mut [Field]) {
    let mut seen: HashSet<String> = HashSet::new();
    for field in fields.iter_mut() {
        if seen.insert(field.name.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}{}", field.name, n);
        while !seen.insert(candidate.clone()) {
            n += 1;
            candidate = format!("{}{}", field.name, n);
        }
        field.name = candidate;
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Build the dialect selected in the configuration
pub fn dialect_for(config: &GeneratorConfig) -> Result<Box<dyn Dialect>> {
    let selected = config
        .output
        .dialect
        .ok_or_else(|| TypegenError::Config("no output dialect selected".to_string()))?;
    Ok(match selected {
        OutputDialect::Go => Box::new(go::GoDialect::structs().configured(&config.output)?),
        OutputDialect::GoProgram => Box::new(go::GoDialect::program().configured(&config.output)?),
        OutputDialect::Java => Box::new(java::JavaDialect::new()),
        OutputDialect::Rust => Box::new(rust::RustDialect::new()),
    })
}

/// Generate code for a finalized tree
pub fn generate(tree: &FinalizedTree, config: &GeneratorConfig, sources: &[String]) -> Result<GeneratedOutput> {
    generate_at(tree, config, sources, Utc::now())
}

/// Generate code with a fixed timestamp (reproducible output)
pub fn generate_at(
    tree: &FinalizedTree,
    config: &GeneratorConfig,
    sources: &[String],
    generated_at: DateTime<Utc>,
) -> Result<GeneratedOutput> {
    if tree.is_empty() {
        return Err(TypegenError::EmptySchema);
    }
    let mut dialect = dialect_for(config)?;

    let walker = Walker::new(tree, config);
    let declarations = walker.walk(dialect.as_mut())?;
    let ctx = EmitContext {
        tree,
        config,
        sources,
        declarations: &declarations,
        root: walker.root_type()?,
        first_level: walker.first_level_types()?,
        generated_at,
    };

    let output = dialect.finish(&ctx)?;
    tracing::debug!(
        types = output.type_count,
        files = output.files.len(),
        "code generated"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::tree::{IgnoreSet, SchemaTree, TypeInference};

    fn build(docs: &[&str], use_types: bool) -> FinalizedTree {
        let mut tree = SchemaTree::with_settings(IgnoreSet::default(), TypeInference::new(use_types));
        let mut extractor = Extractor::new(&mut tree);
        for (i, doc) in docs.iter().enumerate() {
            extractor.extract_str(&format!("doc{}", i), doc).unwrap();
        }
        tree.finalize()
    }

    fn config(flatten: bool, ordering: DeclarationOrder) -> GeneratorConfig {
        let mut config = GeneratorConfig::default();
        config.emission.flatten_strings = flatten;
        config.emission.ordering = ordering;
        config.output.dialect = Some(OutputDialect::Go);
        config
    }

    /// Records the call sequence a dialect sees
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Dialect for Recorder {
        fn open_declaration(&mut self, decl: &Declaration) -> Result<()> {
            self.events.push(format!("open {}", decl.type_name));
            Ok(())
        }

        fn emit_field(&mut self, _decl: &Declaration, field: &Field) -> Result<()> {
            self.events.push(format!("field {}", field.name));
            Ok(())
        }

        fn close_declaration(&mut self, decl: &Declaration) -> Result<()> {
            self.events.push(format!("close {}", decl.type_name));
            Ok(())
        }

        fn finish(&mut self, _ctx: &EmitContext<'_>) -> Result<GeneratedOutput> {
            Ok(GeneratedOutput::default())
        }
    }

    #[test]
    fn test_walker_visits_each_node_once() {
        let tree = build(&["<a><b><c/></b><b><c/></b></a>"], false);
        let config = config(false, DeclarationOrder::Alphabetical);
        let mut recorder = Recorder::default();
        let decls = Walker::new(&tree, &config).walk(&mut recorder).unwrap();

        let keys: Vec<&str> = decls.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(recorder.events.first().unwrap(), "open Ca");
        assert_eq!(recorder.events.iter().filter(|e| e.starts_with("open")).count(), 3);
    }

    #[test]
    fn test_discovery_order() {
        let tree = build(&["<r><zeta/><alpha/></r>"], false);
        let config = config(false, DeclarationOrder::Discovery);
        let decls = Walker::new(&tree, &config).declarations().unwrap();
        let names: Vec<&str> = decls.iter().map(|d| d.type_name.as_str()).collect();
        assert_eq!(names, vec!["Cr", "Czeta", "Calpha"]);

        let field_names: Vec<&str> = decls[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(field_names, vec!["Czeta", "Calpha"]);
    }

    #[test]
    fn test_flattening_inlines_string_leaves() {
        let tree = build(&["<a><b>text</b><n>1</n><n>2</n></a>"], true);
        let decls = Walker::new(&tree, &config(true, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();

        assert_eq!(decls.len(), 1);
        let a = &decls[0];
        assert_eq!(a.fields.len(), 2);
        assert_eq!(a.fields[0].name, "B");
        assert_eq!(a.fields[0].field_type, FieldType::Scalar(ValueType::String));
        assert!(!a.fields[0].repeated);
        assert_eq!(a.fields[1].field_type, FieldType::Scalar(ValueType::Integer));
        assert!(a.fields[1].repeated);
    }

    #[test]
    fn test_without_flattening_leaves_get_declarations() {
        let tree = build(&["<a><b>text</b></a>"], true);
        let decls = Walker::new(&tree, &config(false, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].fields[0].field_type, FieldType::Reference("Cb".to_string()));
        assert_eq!(decls[1].text_field().unwrap().field_type, FieldType::Scalar(ValueType::String));
    }

    #[test]
    fn test_root_is_never_flattened() {
        let tree = build(&["<note>just text</note>"], false);
        let decls = Walker::new(&tree, &config(true, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();
        assert_eq!(decls.len(), 1);
        assert!(decls[0].is_root);
        assert!(decls[0].text_field().is_some());
    }

    #[test]
    fn test_field_order_attributes_elements_text() {
        let tree = build(&[r#"<a z="1" y="2">hi<c/><b/></a>"#], false);
        let decls = Walker::new(&tree, &config(false, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();
        let names: Vec<&str> = decls[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["AttrY", "AttrZ", "Cb", "Cc", "Text"]);
    }

    #[test]
    fn test_duplicate_field_names_get_counters() {
        let mut config = config(true, DeclarationOrder::Discovery);
        config.naming.attribute_prefix = String::new();
        let tree = build(&[r#"<a id="1"><id>x</id></a>"#], false);
        let decls = Walker::new(&tree, &config).declarations().unwrap();
        let names: Vec<&str> = decls[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Id2"]);
    }

    #[test]
    fn test_ident_set_numbers_clashes() {
        let mut idents = IdentSet::default();
        assert_eq!(idents.claim("cb".to_string()), "cb");
        assert_eq!(idents.claim("cb".to_string()), "cb2");
        assert_eq!(idents.claim("cb".to_string()), "cb3");
        idents.clear();
        assert_eq!(idents.claim("cb".to_string()), "cb");
    }

    #[test]
    fn test_first_level_collapses_same_expanded_name() {
        let tree = build(
            &[r#"<a xmlns:dc="urn:dc"><dc:title/><title/></a>"#, "<b><title/><item/></b>"],
            false,
        );
        let walker_config = config(false, DeclarationOrder::Discovery);
        let refs = Walker::new(&tree, &walker_config).first_level_types().unwrap();
        let names: Vec<(&str, &str)> = refs.iter().map(|r| (r.space(), r.xml_name.local.as_str())).collect();
        assert_eq!(names, vec![("urn:dc", "title"), ("", "title"), ("", "item")]);
    }

    #[test]
    fn test_max_length_carried_to_fields() {
        let tree = build(&[r#"<a code="abc"><b>hello</b></a>"#, r#"<a code="x"><b>hi</b></a>"#], false);
        let decls = Walker::new(&tree, &config(true, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();
        assert_eq!(decls[0].fields[0].max_length, 3);
        assert_eq!(decls[0].fields[1].max_length, 5);
    }

    #[test]
    fn test_namespaces_resolved_for_fields() {
        let tree = build(
            &[r#"<feed xmlns="urn:atom" xmlns:dc="urn:dc"><dc:title>x</dc:title></feed>"#],
            false,
        );
        let decls = Walker::new(&tree, &config(true, DeclarationOrder::Alphabetical))
            .declarations()
            .unwrap();
        assert_eq!(decls[0].namespace.as_deref(), Some("urn:atom"));
        assert_eq!(decls[0].fields[0].namespace.as_deref(), Some("urn:dc"));
    }

    #[test]
    fn test_empty_tree_is_an_error() {
        let tree = build(&[], false);
        let err = generate(&tree, &config(false, DeclarationOrder::Alphabetical), &[]).unwrap_err();
        assert!(matches!(err, TypegenError::EmptySchema));
    }
}
