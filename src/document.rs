//! PDF document access for signature inspection.
//!
//! The object model (cross-reference tables, object streams, filters) is read
//! with `lopdf`. On open, every signed signature field of the AcroForm is
//! turned into a fixed-shape [`SignatureField`]; the raw bytes and the
//! incremental-update history are kept alongside for the byte range and
//! revision checks.
//!
//! See ISO 32000-1:2008, Section 12.7 (Interactive Forms) and 12.8 (Digital
//! Signatures).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::signatures::{
    AnnotationFlags, FieldLock, LockAction, RevisionHistory, SignatureDictionary, SignatureField,
    TransformMethod, TransformReference, WidgetPlacement,
};

/// Maximum depth of the AcroForm field tree and of reference chains.
const MAX_DEPTH: usize = 32;

/// Everything the inspection pipeline needs from a document.
///
/// Implementations must be shareable across the worker threads that analyse
/// signatures in parallel.
pub trait SignatureSource: Sync {
    /// Raw document bytes.
    fn bytes(&self) -> &[u8];

    /// Signed signature fields, in AcroForm order.
    fn signature_fields(&self) -> &[SignatureField];

    /// Incremental-update history.
    fn revision_history(&self) -> &RevisionHistory;

    /// Look up a signature field by its fully qualified name.
    fn signature_field(&self, name: &str) -> Option<&SignatureField> {
        self.signature_fields().iter().find(|f| f.name == name)
    }
}

/// A PDF document opened for signature inspection.
pub struct PdfDocument {
    bytes: Bytes,
    fields: Vec<SignatureField>,
    history: RevisionHistory,
    page_count: usize,
    /// Signature fields that could not be read
    field_errors: Vec<Error>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.bytes.len())
            .field("signature_fields", &self.fields.len())
            .field("revisions", &self.history.len())
            .field("pages", &self.page_count)
            .finish()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use pdf_sigcheck::document::{PdfDocument, SignatureSource};
    /// let doc = PdfDocument::open("signed.pdf")?;
    /// for field in doc.signature_fields() {
    ///     println!("{}", field.name);
    /// }
    /// # Ok::<(), pdf_sigcheck::error::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::info!("Opened {} ({} bytes)", path.as_ref().display(), data.len());
        Self::from_bytes(data)
    }

    /// Open a PDF document held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let bytes: Bytes = data.into();
        let doc = Document::load_mem(&bytes)?;

        let history = RevisionHistory::scan(&bytes);
        let pages = PageIndex::build(&doc);
        let mut extractor = FieldExtractor {
            doc: &doc,
            pages: &pages,
            visited: HashSet::new(),
            fields: Vec::new(),
            errors: Vec::new(),
        };
        extractor.extract_fields()?;
        let FieldExtractor { fields, errors, .. } = extractor;

        log::debug!(
            "Found {} signed signature field(s), {} unreadable, {} revision(s)",
            fields.len(),
            errors.len(),
            history.len()
        );

        Ok(Self {
            bytes,
            fields,
            history,
            page_count: pages.page_count,
            field_errors: errors,
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Signature fields that were present but could not be read.
    pub fn field_errors(&self) -> &[Error] {
        &self.field_errors
    }
}

impl SignatureSource for PdfDocument {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn signature_fields(&self) -> &[SignatureField] {
        &self.fields
    }

    fn revision_history(&self) -> &RevisionHistory {
        &self.history
    }
}

/// Page numbers by page object and by annotation object.
struct PageIndex {
    page_count: usize,
    by_page: HashMap<ObjectId, u32>,
    by_annotation: HashMap<ObjectId, u32>,
}

impl PageIndex {
    fn build(doc: &Document) -> Self {
        let pages = doc.get_pages();
        let mut by_page = HashMap::with_capacity(pages.len());
        let mut by_annotation = HashMap::new();

        for (number, page_id) in &pages {
            by_page.insert(*page_id, *number);
            let annots = doc
                .get_object(*page_id)
                .ok()
                .and_then(|page| page.as_dict().ok())
                .and_then(|page| page.get(b"Annots").ok())
                .and_then(|annots| resolve(doc, annots))
                .and_then(|annots| annots.as_array().ok());
            for annot in annots.into_iter().flatten() {
                if let Object::Reference(id) = annot {
                    by_annotation.entry(*id).or_insert(*number);
                }
            }
        }

        Self {
            page_count: pages.len(),
            by_page,
            by_annotation,
        }
    }
}

/// Walks the AcroForm field tree collecting signed signature fields.
struct FieldExtractor<'a> {
    doc: &'a Document,
    pages: &'a PageIndex,
    visited: HashSet<ObjectId>,
    fields: Vec<SignatureField>,
    errors: Vec<Error>,
}

impl<'a> FieldExtractor<'a> {
    fn extract_fields(&mut self) -> Result<()> {
        let doc = self.doc;
        let catalog = doc.catalog()?;

        let Some(acroform) = catalog
            .get(b"AcroForm")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            log::debug!("Document has no AcroForm");
            return Ok(());
        };

        let Some(fields) = acroform
            .get(b"Fields")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
        else {
            log::debug!("AcroForm has no /Fields");
            return Ok(());
        };

        for field in fields {
            self.extract_field_recursive(field, "", None, 0);
        }
        Ok(())
    }

    /// Handles inherited /FT and dotted full names. Kids without /T are
    /// widgets of their parent, not fields.
    fn extract_field_recursive(
        &mut self,
        field_obj: &'a Object,
        parent_name: &str,
        inherited_type: Option<&'a [u8]>,
        depth: usize,
    ) {
        let doc = self.doc;
        if depth > MAX_DEPTH {
            log::warn!("AcroForm field tree deeper than {} levels, stopping", MAX_DEPTH);
            return;
        }
        let object_id = match field_obj {
            Object::Reference(id) => {
                if !self.visited.insert(*id) {
                    log::warn!("Field {:?} visited twice, skipping cycle", id);
                    return;
                }
                Some(*id)
            },
            _ => None,
        };
        let Some(field) = resolve(doc, field_obj).and_then(|obj| obj.as_dict().ok()) else {
            return;
        };

        let partial_name = text_entry(doc, field, b"T").unwrap_or_default();
        let full_name = if parent_name.is_empty() {
            partial_name
        } else if partial_name.is_empty() {
            parent_name.to_string()
        } else {
            format!("{}.{}", parent_name, partial_name)
        };

        let field_type = match field.get(b"FT").ok().and_then(|obj| resolve(doc, obj)) {
            Some(Object::Name(name)) => Some(name.as_slice()),
            _ => inherited_type,
        };

        let kids = field
            .get(b"Kids")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok());

        let mut widget_kids = Vec::new();
        for kid in kids.into_iter().flatten() {
            let is_field = resolve(doc, kid)
                .and_then(|obj| obj.as_dict().ok())
                .map(|dict| dict.has(b"T"))
                .unwrap_or(false);
            if is_field {
                self.extract_field_recursive(kid, &full_name, field_type, depth + 1);
            } else {
                widget_kids.push(kid);
            }
        }

        if field_type != Some(b"Sig".as_slice()) {
            return;
        }

        let Some(value) = field.get(b"V").ok() else {
            log::debug!("Signature field '{}' is unsigned", full_name);
            return;
        };

        let widget = if is_widget(field) {
            self.widget_placement(field, object_id)
        } else {
            widget_kids.iter().find_map(|kid| {
                let id = match kid {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                };
                resolve(doc, kid)
                    .and_then(|obj| obj.as_dict().ok())
                    .and_then(|dict| self.widget_placement(dict, id))
            })
        };

        match resolve(doc, value).and_then(|obj| obj.as_dict().ok()) {
            Some(dict) => match parse_signature_dictionary(doc, dict) {
                Ok(dictionary) => {
                    log::debug!(
                        "Signature field '{}' ({})",
                        full_name,
                        dictionary.raw_sub_filter.as_deref().unwrap_or("no /SubFilter")
                    );
                    self.fields.push(SignatureField {
                        name: full_name,
                        widget,
                        dictionary,
                    });
                },
                Err(reason) => {
                    log::warn!("Skipping signature field '{}': {}", full_name, reason);
                    self.errors.push(Error::InvalidSignatureField {
                        name: full_name,
                        reason,
                    });
                },
            },
            None => {
                log::warn!("Signature field '{}' has a /V that is not a dictionary", full_name);
                self.errors.push(Error::InvalidSignatureField {
                    name: full_name,
                    reason: "/V is not a dictionary".to_string(),
                });
            },
        }
    }

    fn widget_placement(
        &self,
        widget: &Dictionary,
        widget_id: Option<ObjectId>,
    ) -> Option<WidgetPlacement> {
        let rect = widget
            .get(b"Rect")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|values| {
                let numbers: Vec<f32> = values
                    .iter()
                    .filter_map(|v| resolve(self.doc, v).and_then(number))
                    .collect();
                match numbers.as_slice() {
                    [x0, y0, x1, y1] => Some(Rect::from_points(*x0, *y0, *x1, *y1)),
                    _ => None,
                }
            })?;

        let flags = widget
            .get(b"F")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_i64().ok())
            .and_then(|bits| u32::try_from(bits).ok())
            .map(AnnotationFlags::from_bits_truncate)
            .unwrap_or_else(AnnotationFlags::empty);

        let page = match widget.get(b"P") {
            Ok(Object::Reference(page_id)) => self.pages.by_page.get(page_id).copied(),
            _ => None,
        }
        .or_else(|| widget_id.and_then(|id| self.pages.by_annotation.get(&id).copied()));

        Some(WidgetPlacement { page, rect, flags })
    }
}

fn is_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Widget") || dict.has(b"Rect")
}

/// Read a signature value dictionary into a fixed-shape record.
///
/// Returns a reason string when the entries the verifier depends on are
/// missing or of the wrong type.
fn parse_signature_dictionary(
    doc: &Document,
    dict: &Dictionary,
) -> std::result::Result<SignatureDictionary, String> {
    let byte_range = match dict.get(b"ByteRange").ok().and_then(|obj| resolve(doc, obj)) {
        Some(Object::Array(values)) => values
            .iter()
            .map(|v| match resolve(doc, v) {
                Some(Object::Integer(n)) => Ok(*n),
                _ => Err("/ByteRange contains a non-integer".to_string()),
            })
            .collect::<std::result::Result<Vec<i64>, String>>()?,
        Some(_) => return Err("/ByteRange is not an array".to_string()),
        None => return Err("missing /ByteRange".to_string()),
    };

    let contents = match dict.get(b"Contents").ok().and_then(|obj| resolve(doc, obj)) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(_) => return Err("/Contents is not a string".to_string()),
        None => return Err("missing /Contents".to_string()),
    };

    let references = match dict.get(b"Reference").ok().and_then(|obj| resolve(doc, obj)) {
        Some(Object::Array(refs)) => refs
            .iter()
            .filter_map(|r| resolve(doc, r).and_then(|obj| obj.as_dict().ok()))
            .map(|r| parse_transform_reference(doc, r))
            .collect(),
        _ => Vec::new(),
    };

    Ok(SignatureDictionary {
        filter: name_entry(doc, dict, b"Filter"),
        raw_sub_filter: name_entry(doc, dict, b"SubFilter"),
        byte_range,
        contents,
        name: text_entry(doc, dict, b"Name"),
        signing_time: text_entry(doc, dict, b"M"),
        reason: text_entry(doc, dict, b"Reason"),
        location: text_entry(doc, dict, b"Location"),
        contact_info: text_entry(doc, dict, b"ContactInfo"),
        references,
    })
}

fn parse_transform_reference(doc: &Document, reference: &Dictionary) -> TransformReference {
    let method = name_entry(doc, reference, b"TransformMethod")
        .map(|name| TransformMethod::from_pdf_name(&name))
        .unwrap_or_else(|| TransformMethod::Other(String::new()));

    let params = reference
        .get(b"TransformParams")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    let permission_level = params
        .and_then(|p| p.get(b"P").ok())
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok());

    let lock = params.and_then(|p| {
        let action = name_entry(doc, p, b"Action")?;
        let Some(action) = LockAction::from_pdf_name(&action) else {
            log::warn!("Unknown FieldMDP action /{}", action);
            return None;
        };
        let fields = match p.get(b"Fields").ok().and_then(|obj| resolve(doc, obj)) {
            Some(Object::Array(names)) => names
                .iter()
                .filter_map(|n| match resolve(doc, n) {
                    Some(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Some(FieldLock { action, fields })
    });

    TransformReference {
        method,
        permission_level,
        lock,
    }
}

/// Follow a chain of indirect references.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            _ => return Some(current),
        }
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n as f32),
        _ => None,
    }
}

fn name_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok().and_then(|obj| resolve(doc, obj))? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok().and_then(|obj| resolve(doc, obj))? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Decode a PDF text string that may be UTF-16BE (with BOM), UTF-8 (with BOM)
/// or PDFDocEncoding.
///
/// PDFDocEncoding agrees with ISO Latin-1 outside 0x80..0xA0, which is all a
/// signature dictionary ever uses in practice.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(utf8).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
