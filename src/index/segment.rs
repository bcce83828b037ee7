use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use chrono::{DateTime, Utc};
use fst::map::StreamBuilder;
use fst::{IntoStreamer, Map, Streamer};
use regex::Regex;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{PropertyName, PropertyValue};
use crate::index::document::IndexDocument;
use crate::index::term::{self, encode_bool, encode_str, encode_value, field_end, field_prefix, term_key};
use crate::security::acl::Action;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Stored form of one property: the name travels with the values so a
/// mapper can rebuild the property without parsing the field key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProperty {
    pub name: PropertyName,
    pub values: Vec<PropertyValue>,
}

/// Which stored fields to read for a hit. URI, name and type are always read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    pub properties: PropertyFields,
    pub acl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyFields {
    All,
    None,
    Only(HashSet<String>), // Property field keys
}

impl FieldSet {
    pub fn all() -> Self {
        FieldSet {
            properties: PropertyFields::All,
            acl: true,
        }
    }

    pub fn identity_only() -> Self {
        FieldSet {
            properties: PropertyFields::None,
            acl: false,
        }
    }

    pub fn wants(&self, key: &str) -> bool {
        match key {
            term::STORED_URI | term::STORED_NAME | term::STORED_TYPE => true,
            term::STORED_ACL => self.acl,
            _ => match &self.properties {
                PropertyFields::All => true,
                PropertyFields::None => false,
                PropertyFields::Only(keys) => keys.contains(key),
            },
        }
    }
}

/// Undecoded stored fields of one document, restricted to a `FieldSet`.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub fields: Vec<(String, Vec<u8>)>,
}

impl RawDocument {
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

#[derive(Debug, Clone, Default)]
struct StoredDocument {
    fields: Vec<(String, Vec<u8>)>,
}

/// Immutable index segment.
pub struct Segment {
    id: SegmentId,
    doc_count: u32,
    created_at: DateTime<Utc>,
    terms: Map<Vec<u8>>,                               // term key -> postings ordinal
    postings: Vec<RoaringBitmap>,
    field_docs: HashMap<String, RoaringBitmap>,         // docs with any term in the field
    doc_values: HashMap<String, Vec<Option<Vec<u8>>>>,  // first encoded value per doc, for sorting
    stored: Vec<StoredDocument>,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn all_docs(&self) -> RoaringBitmap {
        let mut docs = RoaringBitmap::new();
        docs.insert_range(0..self.doc_count);
        docs
    }

    pub fn postings(&self, key: &[u8]) -> Option<&RoaringBitmap> {
        self.terms.get(key).map(|ord| &self.postings[ord as usize])
    }

    pub fn postings_at(&self, ordinal: u64) -> &RoaringBitmap {
        &self.postings[ordinal as usize]
    }

    pub fn doc_freq(&self, key: &[u8]) -> u64 {
        self.postings(key).map(RoaringBitmap::len).unwrap_or(0)
    }

    pub fn field_docs(&self, field: &str) -> Option<&RoaringBitmap> {
        self.field_docs.get(field)
    }

    pub fn doc_value(&self, field: &str, doc: u32) -> Option<&[u8]> {
        self.doc_values
            .get(field)?
            .get(doc as usize)?
            .as_deref()
    }

    /// Term dictionary entries of one field in byte order.
    pub fn field_terms(&self, field: &str) -> StreamBuilder<'_> {
        self.terms.range().ge(field_prefix(field)).lt(field_end(field))
    }

    pub fn union_range(&self, lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> RoaringBitmap {
        let mut builder = self.terms.range();
        builder = match lower {
            Bound::Included(key) => builder.ge(key),
            Bound::Excluded(key) => builder.gt(key),
            Bound::Unbounded => builder,
        };
        builder = match upper {
            Bound::Included(key) => builder.le(key),
            Bound::Excluded(key) => builder.lt(key),
            Bound::Unbounded => builder,
        };

        let mut docs = RoaringBitmap::new();
        let mut stream = builder.into_stream();
        while let Some((_, ordinal)) = stream.next() {
            docs |= &self.postings[ordinal as usize];
        }
        docs
    }

    /// Docs having a term in `field` that starts with the encoded `prefix`.
    pub fn union_prefix(&self, field: &str, prefix: &[u8]) -> RoaringBitmap {
        let start = term_key(field, prefix);
        let mut docs = RoaringBitmap::new();
        let mut stream = self.terms.range().ge(&start).lt(field_end(field)).into_stream();
        while let Some((key, ordinal)) = stream.next() {
            if !key.starts_with(&start) {
                break;
            }
            docs |= &self.postings[ordinal as usize];
        }
        docs
    }

    /// Docs having a string term in `field` matched by `pattern`.
    pub fn union_matching(&self, field: &str, pattern: &Regex) -> RoaringBitmap {
        let prefix_len = field.len() + 1;
        let mut docs = RoaringBitmap::new();
        let mut stream = self.field_terms(field).into_stream();
        while let Some((key, ordinal)) = stream.next() {
            if let Some(value) = term::decode_str(&key[prefix_len..]) {
                if pattern.is_match(value) {
                    docs |= &self.postings[ordinal as usize];
                }
            }
        }
        docs
    }

    /// Read only the requested stored fields of `doc`.
    pub fn load(&self, doc: u32, fields: &FieldSet) -> Result<RawDocument> {
        let stored = self.stored_document(doc)?;
        Ok(RawDocument {
            fields: stored
                .fields
                .iter()
                .filter(|(key, _)| fields.wants(key))
                .cloned()
                .collect(),
        })
    }

    /// String values of a field as originally stored, used to verify phrases.
    pub fn stored_strings(&self, doc: u32, field: &str) -> Result<Vec<String>> {
        let stored_key = match field {
            term::URI => term::STORED_URI,
            term::NAME => term::STORED_NAME,
            term::TYPE => term::STORED_TYPE,
            other => other,
        };
        let stored = self.stored_document(doc)?;
        let Some((_, bytes)) = stored.fields.iter().find(|(key, _)| key == stored_key) else {
            return Ok(Vec::new());
        };

        if stored_key.starts_with('_') {
            let value: String = bincode::deserialize(bytes)?;
            return Ok(vec![value]);
        }
        let property: StoredProperty = bincode::deserialize(bytes)?;
        Ok(property
            .values
            .into_iter()
            .filter_map(|v| match v {
                PropertyValue::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    fn stored_document(&self, doc: u32) -> Result<&StoredDocument> {
        self.stored.get(doc as usize).ok_or_else(|| {
            Error::new(
                ErrorKind::Internal,
                format!("doc {} out of range for segment {:?}", doc, self.id),
            )
        })
    }
}

/// Accumulates documents and freezes them into a `Segment`.
pub struct SegmentBuilder {
    tokenizer: StandardTokenizer,
    doc_count: u32,
    terms: BTreeMap<Vec<u8>, RoaringBitmap>,
    field_docs: HashMap<String, RoaringBitmap>,
    doc_values: HashMap<String, Vec<Option<Vec<u8>>>>,
    stored: Vec<StoredDocument>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        SegmentBuilder {
            tokenizer: StandardTokenizer::default(),
            doc_count: 0,
            terms: BTreeMap::new(),
            field_docs: HashMap::new(),
            doc_values: HashMap::new(),
            stored: Vec::new(),
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn add(&mut self, doc: &IndexDocument) -> Result<u32> {
        let id = self.doc_count;
        self.doc_count += 1;

        for (field, value) in [
            (term::URI, doc.uri()),
            (term::NAME, doc.name()),
            (term::TYPE, doc.resource_type()),
        ] {
            let encoded = encode_str(value);
            self.set_doc_value(id, field, &encoded);
            self.index_term(id, field, encoded);
        }
        self.index_text(id, term::NAME, doc.name());
        self.index_term(id, term::OWNER, encode_str(doc.owner()));
        self.index_term(id, term::PUBLISHED, encode_bool(doc.is_published()));
        self.index_term(
            id,
            term::UNPUBLISHED_COLLECTION,
            encode_bool(doc.is_in_unpublished_collection()),
        );

        // Read-processed grants make a resource listable as well
        for action in [Action::Read, Action::ReadProcessed] {
            for principal in doc.acl().principals(action) {
                self.index_term(id, term::ACL_READ, encode_str(&principal.qualified_name()));
            }
        }

        for (name, values) in doc.properties() {
            self.index_property(id, name, values);
        }

        let mut stored = StoredDocument::default();
        stored.fields.push((term::STORED_URI.to_string(), bincode::serialize(doc.uri())?));
        stored.fields.push((term::STORED_NAME.to_string(), bincode::serialize(doc.name())?));
        stored.fields.push((term::STORED_TYPE.to_string(), bincode::serialize(doc.resource_type())?));
        stored.fields.push((term::STORED_ACL.to_string(), bincode::serialize(doc.acl())?));
        for (name, values) in doc.properties() {
            let property = StoredProperty {
                name: name.clone(),
                values: values.clone(),
            };
            stored.fields.push((name.field_key(), bincode::serialize(&property)?));
        }
        self.stored.push(stored);

        Ok(id)
    }

    pub fn build(mut self) -> Result<Segment> {
        let terms = Map::from_iter(
            self.terms
                .keys()
                .enumerate()
                .map(|(ordinal, key)| (key.as_slice(), ordinal as u64)),
        )?;
        let postings: Vec<RoaringBitmap> = self.terms.into_values().collect();

        for column in self.doc_values.values_mut() {
            column.resize(self.doc_count as usize, None);
        }

        Ok(Segment {
            id: SegmentId::new(),
            doc_count: self.doc_count,
            created_at: Utc::now(),
            terms,
            postings,
            field_docs: self.field_docs,
            doc_values: self.doc_values,
            stored: self.stored,
        })
    }

    fn index_property(&mut self, doc: u32, name: &PropertyName, values: &[PropertyValue]) {
        let field = name.field_key();
        for value in values {
            let encoded = encode_value(value);
            self.set_doc_value(doc, &field, &encoded);
            self.index_term(doc, &field, encoded);

            match value {
                PropertyValue::String(text) => self.index_text(doc, &field, text),
                PropertyValue::Json(_) => {
                    for attribute in value.attribute_names() {
                        if let Some(scalar) = value.attribute(&attribute) {
                            let attribute_field = term::attribute_field(&field, &attribute);
                            let encoded = encode_value(&scalar);
                            self.set_doc_value(doc, &attribute_field, &encoded);
                            self.index_term(doc, &attribute_field, encoded);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn index_text(&mut self, doc: u32, field: &str, text: &str) {
        let text_field = term::text_field(field);
        for token in self.tokenizer.tokenize(text) {
            self.index_term(doc, &text_field, encode_str(&token.text));
        }
    }

    fn index_term(&mut self, doc: u32, field: &str, encoded: Vec<u8>) {
        self.terms.entry(term_key(field, &encoded)).or_default().insert(doc);
        self.field_docs.entry(field.to_string()).or_default().insert(doc);
    }

    // First value wins for multi-valued fields
    fn set_doc_value(&mut self, doc: u32, field: &str, encoded: &[u8]) {
        let column = self.doc_values.entry(field.to_string()).or_default();
        if column.len() <= doc as usize {
            column.resize(doc as usize + 1, None);
        }
        if column[doc as usize].is_none() {
            column[doc as usize] = Some(encoded.to_vec());
        }
    }
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
