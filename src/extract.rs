//! XML Extraction
//!
//! Drives a quick-xml reader over one document and feeds every element
//! start, text run and end tag into the `SchemaTree`.
//!
//! The tree is updated as events arrive. When the decoder fails half way
//! through a document, everything observed before the failure stays in the
//! tree; whether the run continues is the caller's decision.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{Result, TypegenError};
use crate::tree::{ElementStart, InstanceSummary, NodeKey, QualifiedName, SchemaTree};

/// Counters for one extracted document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Elements read, including ignored ones
    pub elements: u64,
    /// Elements skipped through the ignore set
    pub ignored: u64,
}

/// One open element on the scan stack
#[derive(Debug, Default)]
struct Frame {
    /// `None` while inside an ignored subtree
    key: Option<NodeKey>,
    text: String,
    child_counts: HashMap<NodeKey, usize>,
}

/// Feeds decoder events from one or more documents into a schema tree
pub struct Extractor<'t> {
    tree: &'t mut SchemaTree,
    progress_every: Option<u64>,
    total_elements: u64,
}

impl<'t> Extractor<'t> {
    pub fn new(tree: &'t mut SchemaTree) -> Self {
        Self {
            tree,
            progress_every: None,
            total_elements: 0,
        }
    }

    /// Log a progress line every `every` elements
    pub fn with_progress(mut self, every: Option<u64>) -> Self {
        self.progress_every = every.filter(|n| *n > 0);
        self
    }

    /// Elements read across every document so far
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn extract_str(&mut self, source_name: &str, xml: &str) -> Result<ExtractStats> {
        self.extract(source_name, xml.as_bytes())
    }

    /// Scan one document
    pub fn extract<R: BufRead>(&mut self, source_name: &str, input: R) -> Result<ExtractStats> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut stats = ExtractStats::default();
        let mut stack: Vec<Frame> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let frame = self.open(&e, &stack, source_name, position, &mut stats)?;
                    stack.push(frame);
                }
                Ok(Event::Empty(e)) => {
                    let frame = self.open(&e, &stack, source_name, position, &mut stats)?;
                    self.close(frame, &mut stack);
                }
                Ok(Event::End(_)) => {
                    // quick-xml verifies the end name against the open start tag
                    if let Some(frame) = stack.pop() {
                        self.close(frame, &mut stack);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| decode_error(source_name, position, err))?;
                    if let Some(frame) = stack.last_mut() {
                        if frame.key.is_some() {
                            frame.text.push_str(&text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(frame) = stack.last_mut() {
                        if frame.key.is_some() {
                            frame.text.push_str(&String::from_utf8_lossy(&e));
                        }
                    }
                }
                Ok(Event::Eof) => {
                    if !stack.is_empty() {
                        return Err(decode_error(
                            source_name,
                            reader.buffer_position() as u64,
                            format!("unexpected end of document, {} element(s) still open", stack.len()),
                        ));
                    }
                    break;
                }
                Err(err) => {
                    return Err(decode_error(source_name, reader.buffer_position() as u64, err));
                }
                // Comments, processing instructions, declarations, doctype
                _ => {}
            }
            buf.clear();
        }

        tracing::debug!(
            source = source_name,
            elements = stats.elements,
            ignored = stats.ignored,
            nodes = self.tree.len(),
            "document extracted"
        );
        Ok(stats)
    }

    fn open(
        &mut self,
        e: &BytesStart<'_>,
        stack: &[Frame],
        source_name: &str,
        position: u64,
        stats: &mut ExtractStats,
    ) -> Result<Frame> {
        stats.elements += 1;
        self.total_elements += 1;
        if let Some(every) = self.progress_every {
            if self.total_elements % every == 0 {
                tracing::info!(
                    source = source_name,
                    elements = self.total_elements,
                    nodes = self.tree.len(),
                    "progress"
                );
            }
        }

        let parent = stack.last();
        if matches!(parent, Some(frame) if frame.key.is_none()) {
            stats.ignored += 1;
            return Ok(Frame::default());
        }

        let start = element_start(e).map_err(|msg| decode_error(source_name, position, msg))?;
        let key = self
            .tree
            .observe(parent.and_then(|frame| frame.key.as_ref()), &start);
        if key.is_none() {
            stats.ignored += 1;
        }
        Ok(Frame {
            key,
            ..Frame::default()
        })
    }

    fn close(&mut self, frame: Frame, stack: &mut [Frame]) {
        let Some(key) = frame.key else {
            return;
        };
        let text = frame.text.trim();
        let summary = InstanceSummary {
            text: (!text.is_empty()).then(|| text.to_string()),
            child_counts: frame.child_counts,
        };
        self.tree.complete(&key, &summary);

        if let Some(parent) = stack.last_mut() {
            *parent.child_counts.entry(key).or_insert(0) += 1;
        }
    }
}

/// Decode the name and attributes of a start tag
fn element_start(e: &BytesStart<'_>) -> std::result::Result<ElementStart, String> {
    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    if raw_name.is_empty() {
        return Err("element with an empty tag name".to_string());
    }
    let mut start = ElementStart::new(QualifiedName::parse(&raw_name));

    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let name = QualifiedName::parse(&String::from_utf8_lossy(attr.key.as_ref()));
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        start.attributes.push((name, value.into_owned()));
    }
    Ok(start)
}

fn decode_error(source_name: &str, position: u64, err: impl std::fmt::Display) -> TypegenError {
    TypegenError::Decode {
        source_name: source_name.to_string(),
        position,
        message: err.to_string(),
    }
}
