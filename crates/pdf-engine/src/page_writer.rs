//! Single-page output documents with flattened line drawing.
//!
//! A page is deep-copied out of its source document into a fresh one-page
//! document. Line commands are then appended to the page content stream in
//! PDF page coordinates (origin bottom-left, Y up).

use crate::{inherited_attribute, media_box_size, PageSize, PdfEngineError, DEFAULT_PAGE_SIZE};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Keys a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// PDF line cap style (`J` operator operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    ProjectingSquare,
}

impl LineCap {
    fn operand(self) -> i64 {
        match self {
            LineCap::Butt => 0,
            LineCap::Round => 1,
            LineCap::ProjectingSquare => 2,
        }
    }
}

/// A straight line in PDF page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCommand {
    pub start: (f32, f32),
    pub end: (f32, f32),
    /// Unit-interval RGB channels.
    pub color: [f32; 3],
    pub thickness: f32,
    pub opacity: f32,
    pub cap: LineCap,
}

impl LineCommand {
    pub fn validate(&self) -> Result<(), PdfEngineError> {
        let coords = [self.start.0, self.start.1, self.end.0, self.end.1];
        if coords.iter().any(|value| !value.is_finite()) {
            return Err(PdfEngineError::InvalidCommand("non-finite coordinate".to_owned()));
        }
        if !self.thickness.is_finite() || self.thickness <= 0.0 {
            return Err(PdfEngineError::InvalidCommand(format!(
                "thickness must be positive, got {}",
                self.thickness
            )));
        }
        if self.color.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
            return Err(PdfEngineError::InvalidCommand("color channel outside [0, 1]".to_owned()));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PdfEngineError::InvalidCommand(format!(
                "opacity must be within [0, 1], got {}",
                self.opacity
            )));
        }
        Ok(())
    }
}

/// A fresh document holding a copy of exactly one source page.
pub struct SinglePageDocument {
    doc: Document,
    page_id: ObjectId,
    size: PageSize,
    operations: Vec<Operation>,
    opacity_states: Vec<(u32, String)>,
    line_count: usize,
}

impl SinglePageDocument {
    /// Copy page `page_number` (1-based) of `bytes` into a new document.
    pub fn extract(bytes: &[u8], page_number: u32) -> Result<Self, PdfEngineError> {
        let source = Document::load_mem(bytes)?;
        let pages = source.get_pages();
        let page_count = pages.len() as u32;

        let source_page_id = *pages
            .get(&page_number)
            .ok_or(PdfEngineError::PageOutOfRange { page: page_number, page_count })?;
        let size = media_box_size(&source, source_page_id).unwrap_or(DEFAULT_PAGE_SIZE);

        let mut doc = Document::with_version(source.version.as_str());
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let mut copier = GraphCopier::new(&source);
        // Back references to the page (e.g. an annotation's /P) land on the copy.
        copier.map.insert(source_page_id, page_id);

        let mut page_dict = Dictionary::new();
        for (key, value) in source.get_dictionary(source_page_id)?.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            page_dict.set(key.clone(), copier.copy(&mut doc, value));
        }
        for key in INHERITABLE_KEYS {
            if page_dict.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(&source, source_page_id, key) {
                let value = value.clone();
                page_dict.set(key.to_vec(), copier.copy(&mut doc, &value));
            }
        }
        page_dict.set("Parent", pages_id);

        doc.objects.insert(page_id, Object::Dictionary(page_dict));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        log::debug!(
            "copied page {page_number} ({} objects) into a single-page document",
            copier.map.len()
        );

        Ok(Self {
            doc,
            page_id,
            size,
            operations: Vec::new(),
            opacity_states: Vec::new(),
            line_count: 0,
        })
    }

    pub fn page_size(&self) -> PageSize {
        self.size
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Queue a line for the page content stream.
    pub fn draw_line(&mut self, command: &LineCommand) -> Result<(), PdfEngineError> {
        command.validate()?;

        let [r, g, b] = command.color;
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("RG", vec![r.into(), g.into(), b.into()]),
            Operation::new("w", vec![command.thickness.into()]),
            Operation::new("J", vec![command.cap.operand().into()]),
        ];
        if command.opacity < 1.0 {
            let name = self.opacity_state_name(command.opacity);
            ops.push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
        }
        ops.extend([
            Operation::new("m", vec![command.start.0.into(), command.start.1.into()]),
            Operation::new("l", vec![command.end.0.into(), command.end.1.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);

        self.operations.extend(ops);
        self.line_count += 1;
        Ok(())
    }

    /// Serialize the document, flushing queued lines into the page.
    pub fn to_bytes(mut self) -> Result<Vec<u8>, PdfEngineError> {
        self.flush()?;

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn opacity_state_name(&mut self, opacity: f32) -> String {
        // Keyed by per-mille so near-identical opacities share a state.
        let key = (opacity * 1000.0).round() as u32;
        if let Some((_, name)) = self.opacity_states.iter().find(|(existing, _)| *existing == key)
        {
            return name.clone();
        }
        let name = format!("GSAnnot{}", self.opacity_states.len());
        self.opacity_states.push((key, name.clone()));
        name
    }

    fn flush(&mut self) -> Result<(), PdfEngineError> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let mut overlay = vec![Operation::new("Q", vec![])];
        overlay.append(&mut self.operations);
        let overlay = Content { operations: overlay }.encode()?;
        let opening = Content { operations: vec![Operation::new("q", vec![])] }.encode()?;

        let opening_id = self.doc.add_object(Stream::new(dictionary! {}, opening));
        let overlay_id = self.doc.add_object(Stream::new(dictionary! {}, overlay));

        let mut contents = vec![Object::Reference(opening_id)];
        contents.extend(self.existing_contents()?);
        contents.push(Object::Reference(overlay_id));
        self.doc.get_dictionary_mut(self.page_id)?.set("Contents", contents);

        if !self.opacity_states.is_empty() {
            self.register_opacity_states()?;
        }

        Ok(())
    }

    /// Content stream references of the page, with an indirect array
    /// flattened into its items.
    fn existing_contents(&self) -> Result<Vec<Object>, PdfEngineError> {
        let page = self.doc.get_dictionary(self.page_id)?;
        Ok(match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }

    fn register_opacity_states(&mut self) -> Result<(), PdfEngineError> {
        let states: Vec<(Vec<u8>, Object)> = self
            .opacity_states
            .iter()
            .map(|(key, name)| {
                let alpha = *key as f32 / 1000.0;
                let state = dictionary! {
                    "Type" => "ExtGState",
                    "CA" => alpha,
                    "ca" => alpha,
                };
                (name.clone().into_bytes(), Object::Dictionary(state))
            })
            .collect();

        let resources_id = match self.doc.get_dictionary(self.page_id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        let resources = match resources_id {
            Some(id) => self.doc.get_dictionary_mut(id)?,
            None => {
                let page = self.doc.get_dictionary_mut(self.page_id)?;
                if !matches!(page.get(b"Resources"), Ok(Object::Dictionary(_))) {
                    page.set("Resources", Dictionary::new());
                }
                page.get_mut(b"Resources")?.as_dict_mut()?
            }
        };

        let ext_ref = match resources.get(b"ExtGState") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        let ext_states = match ext_ref {
            Some(id) => self.doc.get_dictionary_mut(id)?,
            None => {
                let resources = match resources_id {
                    Some(id) => self.doc.get_dictionary_mut(id)?,
                    None => self
                        .doc
                        .get_dictionary_mut(self.page_id)?
                        .get_mut(b"Resources")?
                        .as_dict_mut()?,
                };
                if !matches!(resources.get(b"ExtGState"), Ok(Object::Dictionary(_))) {
                    resources.set("ExtGState", Dictionary::new());
                }
                resources.get_mut(b"ExtGState")?.as_dict_mut()?
            }
        };

        for (name, state) in states {
            ext_states.set(name, state);
        }
        Ok(())
    }
}

/// Copies the object graph reachable from a page into another document.
struct GraphCopier<'a> {
    source: &'a Document,
    map: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> GraphCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self { source, map: BTreeMap::new() }
    }

    fn copy(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.copy(target, item)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(target, &stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy(target, value));
        }
        copied
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(mapped) = self.map.get(&id) {
            return *mapped;
        }

        let new_id = target.new_object_id();
        self.map.insert(id, new_id);

        let copied = match self.source.get_object(id) {
            Ok(object) => {
                let object = object.clone();
                self.copy(target, &object)
            }
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copied);
        new_id
    }
}
