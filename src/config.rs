//! Generator configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (xml-typegen.toml)
//! - Environment variables (XMLTYPEGEN_*)
//!
//! The loaded value is validated once and then passed by reference to the
//! schema tree and the emission walker; nothing reads configuration from
//! ambient state after that point.
//!
//! ## Example config file (xml-typegen.toml):
//! ```toml
//! [input]
//! ignore_tags = ["comment", "script"]
//! continue_on_error = true
//!
//! [inference]
//! use_types = true
//!
//! [naming]
//! prefix = "C"
//! attribute_prefix = "Attr"
//!
//! [emission]
//! ordering = "discovery"
//! flatten_strings = true
//!
//! [output]
//! dialect = "go"
//! java_package = "io.xmltypegen"
//! java_app = "jaxb"
//! length_tag_name = "validate"
//! length_tag_attribute = "max"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypegenError};
use crate::tree::IgnoreSet;

/// Main configuration for a generation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Source scanning settings
    #[serde(default)]
    pub input: InputConfig,

    /// Value type inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Type and field naming policy
    #[serde(default)]
    pub naming: NamingConfig,

    /// Declaration ordering and flattening
    #[serde(default)]
    pub emission: EmissionConfig,

    /// Output dialect and dialect-specific settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Tags excluded from the schema together with their subtrees
    #[serde(default)]
    pub ignore_tags: Vec<String>,

    /// Ignore every tag whose name starts with a lower-case letter
    #[serde(default)]
    pub ignore_lowercase_tags: bool,

    /// Keep the partial schema and move on when a source fails to read or decode
    #[serde(default)]
    pub continue_on_error: bool,

    /// Log progress every N elements
    #[serde(default)]
    pub progress_every: Option<u64>,
}

/// Type inference configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Infer boolean/integer/decimal types; when off everything is a string
    #[serde(default)]
    pub use_types: bool,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prefix for generated type names
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Suffix for generated type names
    #[serde(default)]
    pub suffix: String,

    /// Leave the first letter of tag names as observed instead of upper-casing it
    #[serde(default = "default_true")]
    pub keep_first_letter_case: bool,

    /// Marker prepended to attribute-derived field names
    #[serde(default = "default_attribute_prefix")]
    pub attribute_prefix: String,

    /// Fold the namespace prefix into element field names
    #[serde(default)]
    pub namespace_in_field_name: bool,
}

/// Emission configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Declaration order
    #[serde(default)]
    pub ordering: DeclarationOrder,

    /// Collapse text-only children without attributes into scalar fields
    #[serde(default)]
    pub flatten_strings: bool,
}

/// Order in which declarations are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationOrder {
    /// Sorted by path-qualified key
    #[default]
    Alphabetical,
    /// Sorted by the order elements were first seen
    Discovery,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Selected dialect
    #[serde(default)]
    pub dialect: Option<OutputDialect>,

    /// Base Java package
    #[serde(default = "default_java_package")]
    pub java_package: String,

    /// Java application name appended to the base package
    #[serde(default = "default_java_app")]
    pub java_app: String,

    /// Go package name for struct-only output
    #[serde(default = "default_go_package")]
    pub go_package: String,

    /// Template for one Go struct field line; see `codegen::go::FIELD_VARIABLES`
    #[serde(default)]
    pub go_field_template: Option<String>,

    /// Go struct tag carrying the longest observed value (`validate` in `validate:"max=12"`)
    #[serde(default)]
    pub length_tag_name: Option<String>,

    /// Key inside that tag (`max` in `validate:"max=12"`)
    #[serde(default)]
    pub length_tag_attribute: Option<String>,
}

/// Supported output dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDialect {
    /// Go structs with xml/json tags
    Go,
    /// Go structs wrapped in a conversion program
    GoProgram,
    /// Java classes with JAXB annotations
    Java,
    /// Rust structs with serde attributes
    Rust,
}

impl OutputDialect {
    /// Pick the single dialect switched on, if any.
    ///
    /// More than one selected dialect is a configuration error.
    pub fn select(flags: &[(bool, OutputDialect)]) -> Result<Option<OutputDialect>> {
        let selected: Vec<OutputDialect> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, dialect)| *dialect)
            .collect();
        match selected.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(TypegenError::Config(format!(
                "only one output dialect may be selected, got {:?}",
                many
            ))),
        }
    }
}

/// Go struct tag keys and values may not contain quotes, backquotes or spaces
fn is_tag_token(value: &str) -> bool {
    !value.is_empty() && !value.contains(['"', '`', ' ', ':'])
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "C".to_string()
}

fn default_attribute_prefix() -> String {
    "Attr".to_string()
}

fn default_java_package() -> String {
    "io.xmltypegen".to_string()
}

fn default_java_app() -> String {
    "jaxb".to_string()
}

fn default_go_package() -> String {
    "main".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: String::new(),
            keep_first_letter_case: true,
            attribute_prefix: default_attribute_prefix(),
            namespace_in_field_name: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            java_package: default_java_package(),
            java_app: default_java_app(),
            go_package: default_go_package(),
            go_field_template: None,
            length_tag_name: None,
            length_tag_attribute: None,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["xml-typegen.toml", ".xml-typegen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("io", "xmltypegen", "xml-typegen") {
            let xdg_config = config_dir.config_dir().join("xml-typegen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("XMLTYPEGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Check every switch before any scanning begins
    pub fn validate(&self) -> Result<()> {
        if self.output.dialect.is_none() {
            return Err(TypegenError::Config(
                "no output dialect selected (go, go-program, java or rust)".to_string(),
            ));
        }

        let naming = &self.naming;
        if let Some(first) = naming.prefix.chars().next() {
            if !(first.is_ascii_alphabetic() || first == '_') {
                return Err(TypegenError::Config(format!(
                    "type name prefix must start with a letter: {:?}",
                    naming.prefix
                )));
            }
        }
        for (what, value) in [
            ("type name prefix", &naming.prefix),
            ("type name suffix", &naming.suffix),
            ("attribute prefix", &naming.attribute_prefix),
        ] {
            if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(TypegenError::Config(format!(
                    "{} may only contain letters, digits and '_': {:?}",
                    what, value
                )));
            }
        }

        if self.output.dialect == Some(OutputDialect::Java) {
            let package = self.java_package();
            let valid = package.split('.').all(|segment| {
                let mut chars = segment.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
            if !valid {
                return Err(TypegenError::Config(format!(
                    "invalid Java package name: {}",
                    package
                )));
            }
        }

        let output = &self.output;
        match (&output.length_tag_name, &output.length_tag_attribute) {
            (Some(name), Some(attribute)) => {
                if !is_tag_token(name) || !is_tag_token(attribute) {
                    return Err(TypegenError::Config(format!(
                        "invalid max length tag: {}:\"{}=N\"",
                        name, attribute
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(TypegenError::Config(
                    "length_tag_name and length_tag_attribute must be set together".to_string(),
                ))
            }
        }
        if let Some(template) = &output.go_field_template {
            crate::codegen::go::check_field_template(template)?;
        }

        if self.input.progress_every == Some(0) {
            return Err(TypegenError::Config(
                "progress interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Ignore set built from the input section
    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(
            self.input
                .ignore_tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty()),
            self.input.ignore_lowercase_tags,
        )
    }

    /// Full Java package of the generated application
    pub fn java_package(&self) -> String {
        if self.output.java_app.is_empty() {
            self.output.java_package.clone()
        } else {
            format!("{}.{}", self.output.java_package, self.output.java_app)
        }
    }

    /// Parse a comma separated tag list (as given on the command line)
    pub fn parse_tag_list(tags: &str) -> Vec<String> {
        tags.split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.naming.prefix, "C");
        assert!(config.naming.keep_first_letter_case);
        assert_eq!(config.emission.ordering, DeclarationOrder::Alphabetical);
        assert!(!config.inference.use_types);
    }

    #[test]
    fn test_serialize_config() {
        let config = GeneratorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[naming]"));
        assert!(toml_str.contains("[emission]"));
    }

    #[test]
    fn test_missing_dialect_is_rejected() {
        let config = GeneratorConfig::default();
        assert!(matches!(config.validate(), Err(TypegenError::Config(_))));
    }

    #[test]
    fn test_select_dialect() {
        let none = OutputDialect::select(&[(false, OutputDialect::Go), (false, OutputDialect::Java)]);
        assert_eq!(none.unwrap(), None);

        let one = OutputDialect::select(&[(false, OutputDialect::Go), (true, OutputDialect::Java)]);
        assert_eq!(one.unwrap(), Some(OutputDialect::Java));

        let two = OutputDialect::select(&[(true, OutputDialect::Go), (true, OutputDialect::Java)]);
        assert!(matches!(two, Err(TypegenError::Config(_))));
    }

    #[test]
    fn test_prefix_validation() {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Go);
        assert!(config.validate().is_ok());

        config.naming.prefix = "9X".to_string();
        assert!(config.validate().is_err());

        config.naming.prefix = "X-".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_java_package_validation() {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Java);
        assert_eq!(config.java_package(), "io.xmltypegen.jaxb");
        assert!(config.validate().is_ok());

        config.output.java_app = "9bad".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_length_tag_needs_both_parts() {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Go);
        config.output.length_tag_name = Some("validate".to_string());
        assert!(matches!(config.validate(), Err(TypegenError::Config(_))));

        config.output.length_tag_attribute = Some("max".to_string());
        assert!(config.validate().is_ok());

        config.output.length_tag_attribute = Some("max len".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_template_checked_up_front() {
        let mut config = GeneratorConfig::default();
        config.output.dialect = Some(OutputDialect::Go);
        config.output.go_field_template = Some("{{name}} {{type}} {{nope}}".to_string());
        assert!(matches!(config.validate(), Err(TypegenError::Template { .. })));

        config.output.go_field_template = Some("{{name}} {{type}}".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            GeneratorConfig::parse_tag_list(" a, b ,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
