//! Parsing of maven-metadata.xml as described at
//!  https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html
//!
//! Only a handful of values are ever needed, so the document is parsed into a minimal element tree
//!  and queried by tag name rather than being mapped onto the full schema.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::RepoError;

#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(start: &BytesStart) -> Element {
        Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        }
    }

    fn text_content(&self) -> String {
        let mut result = self.text.clone();
        for child in &self.children {
            result.push_str(&child.text_content());
        }
        result
    }

    /// the last direct child with a given name
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().rev().find(|c| c.name == name)
    }

    /// all elements below this one with a given name, in document order
    fn descendants<'a>(&'a self, name: &str, result: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                result.push(child);
            }
            child.descendants(name, result);
        }
    }

    fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut result = Vec::new();
        self.descendants(name, &mut result);
        result
    }
}

/// The file name components of a snapshot's documentation artifact
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SnapshotFileDescriptor {
    /// from a matching `<snapshotVersion>` entry; `value` is the timestamped version
    Listed {
        value: String,
        classifier: Option<String>,
        extension: String,
    },
    /// synthesized from the `<snapshot>` element
    Timestamped {
        timestamp: String,
        build_number: String,
    },
}

#[derive(Debug, Clone)]
pub struct MetadataDocument {
    root: Element,
}

impl MetadataDocument {
    pub fn parse(data: &[u8]) -> Result<MetadataDocument, RepoError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| RepoError::MalformedMetadata(format!("not valid UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event()
                .map_err(|e| RepoError::MalformedMetadata(format!("at position {}: {}", reader.buffer_position(), e)))?;

            match event {
                Event::Start(start) => {
                    stack.push(Element::new(&start));
                }
                Event::Empty(start) => {
                    Self::attach(Element::new(&start), &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop()
                        .ok_or_else(|| RepoError::MalformedMetadata("unbalanced closing tag".to_string()))?;
                    Self::attach(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()
                        .map_err(|e| RepoError::MalformedMetadata(format!("at position {}: {}", reader.buffer_position(), e)))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => {
                    break;
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(RepoError::MalformedMetadata(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }

        match root {
            Some(root) => Ok(MetadataDocument { root }),
            None => Err(RepoError::MalformedMetadata("document has no root element".to_string())),
        }
    }

    fn attach(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) -> Result<(), RepoError> {
        match stack.last_mut() {
            Some(parent) => {
                parent.children.push(element);
                Ok(())
            }
            None => {
                if root.is_some() {
                    return Err(RepoError::MalformedMetadata("more than one root element".to_string()));
                }
                *root = Some(element);
                Ok(())
            }
        }
    }

    /// All `<version>` values without duplicates, in document order
    pub fn list_versions(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        for element in self.root.find_all("version") {
            let version = element.text_content();
            if !result.contains(&version) {
                result.push(version);
            }
        }
        result
    }

    /// The text of the only element with the given tag name, `None` if there is no such element.
    ///  More than one is an ambiguity that is reported rather than resolved.
    pub fn find_singleton(&self, tag_name: &str) -> Result<Option<String>, RepoError> {
        let elements = self.root.find_all(tag_name);
        match elements.len() {
            0 => Ok(None),
            1 => Ok(Some(elements[0].text_content())),
            n => Err(RepoError::MalformedMetadata(format!("found {} elements <{}>, expected at most one", n, tag_name))),
        }
    }

    /// Finds the file name components of a snapshot's jar with the given classifier.
    ///
    /// A `<snapshotVersion>` entry with matching classifier and extension 'jar' takes precedence,
    ///  the single `<snapshot>` element's timestamp and build number serve as a fallback.
    pub fn snapshot_file_descriptor(&self, classifier: Option<&str>) -> Option<SnapshotFileDescriptor> {
        for snapshot_version in self.root.find_all("snapshotVersion") {
            let entry_classifier = snapshot_version.child("classifier")
                .map(Element::text_content)
                .filter(|c| !c.is_empty());
            let extension = snapshot_version.child("extension").map(Element::text_content);
            let value = snapshot_version.child("value").map(Element::text_content);

            if let (Some(extension), Some(value)) = (extension, value) {
                if entry_classifier.as_deref() == classifier && extension == "jar" {
                    return Some(SnapshotFileDescriptor::Listed {
                        value,
                        classifier: entry_classifier,
                        extension,
                    });
                }
            }
        }

        let snapshots = self.root.find_all("snapshot");
        if snapshots.len() != 1 {
            return None;
        }
        let timestamp = snapshots[0].child("timestamp")?.text_content();
        let build_number = snapshots[0].child("buildNumber")?.text_content();
        Some(SnapshotFileDescriptor::Timestamped { timestamp, build_number })
    }
}
