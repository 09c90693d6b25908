//! XML Typegen CLI
//!
//! Scans sample XML documents and writes Go, Java/JAXB or Rust bindings.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use xml_typegen::codegen::go;
use xml_typegen::{
    expand_paths, pipeline, DeclarationOrder, GeneratedOutput, GeneratorConfig, OutputDialect, SourceSpec,
};

/// Elements between progress lines with `-r`
const PROGRESS_EVERY: u64 = 50_000;

/// Java output lands here unless `-o` says otherwise
const DEFAULT_JAVA_DIR: &str = "java";

#[derive(Parser)]
#[command(name = "xml-typegen")]
#[command(about = "Infer a schema from sample XML and generate Go, Java/JAXB or Rust bindings")]
#[command(disable_help_flag = true)]
struct Cli {
    /// XML files (plain, .gz or .bz2) or directories to scan; URLs with -u
    sources: Vec<PathBuf>,

    /// Treat every source argument as an HTTP(S) URL
    #[arg(short = 'u', long)]
    url: bool,

    /// Write Go structs
    #[arg(short = 'G', long)]
    go: bool,

    /// Write a Go program converting the samples to JSON or XML
    #[arg(short = 'W', long)]
    go_program: bool,

    /// Write Java classes with JAXB annotations
    #[arg(short = 'J', long)]
    java: bool,

    /// Write Rust structs with serde attributes
    #[arg(short = 'R', long)]
    rust: bool,

    /// Infer bool/int/float types instead of treating every value as a string
    #[arg(short = 't', long)]
    use_type: bool,

    /// Order declarations by first appearance instead of alphabetically
    #[arg(short = 'X', long)]
    discovery_order: bool,

    /// Collapse text-only child elements into scalar fields
    #[arg(short = 'F', long)]
    flatten: bool,

    /// Keep going when a source cannot be read or decoded
    #[arg(short = 'I', long)]
    continue_on_error: bool,

    /// Keep the first letter of tag names as written (true) or upper-case it (false)
    #[arg(short = 'K', long, value_name = "BOOL")]
    keep_case: Option<bool>,

    /// Prefix for type names
    #[arg(short = 'e', long)]
    prefix: Option<String>,

    /// Suffix for type names
    #[arg(short = 's', long)]
    suffix: Option<String>,

    /// Prefix for attribute field names
    #[arg(short = 'a', long)]
    attribute_prefix: Option<String>,

    /// Fold namespace prefixes into field names
    #[arg(short = 'n', long)]
    namespace_in_names: bool,

    /// Tags to ignore (comma separated)
    #[arg(short = 'h', long)]
    ignore: Option<String>,

    /// Ignore tags starting with a lower-case letter
    #[arg(short = 'L', long)]
    ignore_lowercase: bool,

    /// Log progress while scanning
    #[arg(short = 'r', long)]
    progress: bool,

    /// Read XML from standard input
    #[arg(short = 'c', long)]
    stdin: bool,

    /// Field line template for Go structs (variables: name, type, xml_tag, json_tag, length_tag)
    #[arg(short = 'T', long, value_name = "TEMPLATE")]
    field_template: Option<String>,

    /// Check the Go field template and exit
    #[arg(short = 'm', long)]
    validate_template: bool,

    /// Go tag key for max-length annotations (needs -A)
    #[arg(short = 'N', long, value_name = "KEY")]
    length_tag_name: Option<String>,

    /// Attribute inside the max-length tag, as in `KEY:"ATTR=N"` (needs -N)
    #[arg(short = 'A', long, value_name = "ATTR")]
    length_tag_attribute: Option<String>,

    /// Java application name, appended to the Java package
    #[arg(short = 'k', long)]
    java_app: Option<String>,

    /// Output directory (single-file output goes to stdout when omitted)
    #[arg(short = 'o', long)]
    out_dir: Option<PathBuf>,

    /// Also write the inferred model as JSON ("-" for stdout)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Configuration file
    #[arg(long)]
    config: Option<String>,

    /// Write the effective configuration to a file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.progress {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = effective_config(&cli)?;

    if cli.validate_template {
        let source = config.output.go_field_template.as_deref().unwrap_or(go::FIELD_TEMPLATE);
        go::check_field_template(source).context("checking the Go field template")?;
        eprintln!("✅ Field template is valid");
        return Ok(());
    }

    if let Some(path) = &cli.write_config {
        config
            .save(&path.to_string_lossy())
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("✅ Configuration written to {}", path.display());
        return Ok(());
    }

    let mut specs = if cli.url {
        cli.sources
            .iter()
            .map(|url| SourceSpec::Url(url.to_string_lossy().into_owned()))
            .collect()
    } else {
        expand_paths(&cli.sources)
    };
    if cli.stdin {
        specs.push(SourceSpec::Stdin);
    }
    if specs.is_empty() {
        bail!("no XML sources given (pass files, directories or URLs with -u, or -c for stdin)");
    }

    let generation = pipeline::run(&config, specs)?;
    let summary = &generation.scan.summary;
    tracing::info!(
        scanned = summary.sources_scanned,
        failed = summary.sources_failed,
        types = generation.output.type_count,
        "generation complete"
    );

    if let Some(path) = &cli.model {
        let json = generation.scan.tree.model().to_json()?;
        if path.as_os_str() == "-" {
            println!("{}", json);
        } else {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        }
    }

    emit(&cli, &config, &generation.output)
}

/// Config file and environment first, then command-line switches on top
fn effective_config(cli: &Cli) -> anyhow::Result<GeneratorConfig> {
    let mut config = GeneratorConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let selected = OutputDialect::select(&[
        (cli.go, OutputDialect::Go),
        (cli.go_program, OutputDialect::GoProgram),
        (cli.java, OutputDialect::Java),
        (cli.rust, OutputDialect::Rust),
    ])?;
    if selected.is_some() {
        config.output.dialect = selected;
    }

    if cli.use_type {
        config.inference.use_types = true;
    }
    if cli.discovery_order {
        config.emission.ordering = DeclarationOrder::Discovery;
    }
    if cli.flatten {
        config.emission.flatten_strings = true;
    }
    if cli.continue_on_error {
        config.input.continue_on_error = true;
    }
    if let Some(keep) = cli.keep_case {
        config.naming.keep_first_letter_case = keep;
    }
    if let Some(prefix) = &cli.prefix {
        config.naming.prefix = prefix.clone();
    }
    if let Some(suffix) = &cli.suffix {
        config.naming.suffix = suffix.clone();
    }
    if let Some(attribute_prefix) = &cli.attribute_prefix {
        config.naming.attribute_prefix = attribute_prefix.clone();
    }
    if cli.namespace_in_names {
        config.naming.namespace_in_field_name = true;
    }
    if let Some(tags) = &cli.ignore {
        config.input.ignore_tags.extend(GeneratorConfig::parse_tag_list(tags));
    }
    if cli.ignore_lowercase {
        config.input.ignore_lowercase_tags = true;
    }
    if let Some(template) = &cli.field_template {
        config.output.go_field_template = Some(template.clone());
    }
    if let Some(name) = &cli.length_tag_name {
        config.output.length_tag_name = Some(name.clone());
    }
    if let Some(attribute) = &cli.length_tag_attribute {
        config.output.length_tag_attribute = Some(attribute.clone());
    }
    if let Some(app) = &cli.java_app {
        config.output.java_app = app.clone();
    }
    if cli.progress && config.input.progress_every.is_none() {
        config.input.progress_every = Some(PROGRESS_EVERY);
    }

    Ok(config)
}

fn emit(cli: &Cli, config: &GeneratorConfig, output: &GeneratedOutput) -> anyhow::Result<()> {
    let out_dir = match (&cli.out_dir, output.files.as_slice()) {
        (Some(dir), _) => dir.clone(),
        (None, [single]) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(single.contents.as_bytes())?;
            stdout.flush()?;
            return Ok(());
        }
        (None, _) if config.output.dialect == Some(OutputDialect::Java) => PathBuf::from(DEFAULT_JAVA_DIR),
        (None, _) => bail!("output has several files; choose a directory with -o"),
    };

    let written = pipeline::write_output(output, &out_dir)
        .with_context(|| format!("writing output to {}", out_dir.display()))?;
    eprintln!("✅ Wrote {} file(s) to {}", written.len(), out_dir.display());
    for path in &written {
        eprintln!("   {}", path.display());
    }
    Ok(())
}
