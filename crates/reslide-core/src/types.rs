// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: element kinds, editable elements, and the per-image
// element arena that holds a whole decomposition tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bbox::BBox;
use crate::error::{ReslideError, Result};

/// Free-form per-element or per-image metadata (confidence, provider, OCR
/// detail, style). Ordered so serialized trees are stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Generate a fresh element id.
pub fn new_element_id() -> String {
    format!("el_{}", Uuid::new_v4().simple())
}

/// Generate a fresh image id.
pub fn new_image_id() -> String {
    format!("img_{}", Uuid::new_v4().simple())
}

/// The kind of a detected unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Text,
    Title,
    Paragraph,
    List,
    Header,
    Footer,
    Table,
    TableCell,
    Image,
    Figure,
    Chart,
    Diagram,
}

impl ElementType {
    pub const ALL: [ElementType; 12] = [
        Self::Text,
        Self::Title,
        Self::Paragraph,
        Self::List,
        Self::Header,
        Self::Footer,
        Self::Table,
        Self::TableCell,
        Self::Image,
        Self::Figure,
        Self::Chart,
        Self::Diagram,
    ];

    /// Wire name (`"table_cell"`, `"chart"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Title => "title",
            Self::Paragraph => "paragraph",
            Self::List => "list",
            Self::Header => "header",
            Self::Footer => "footer",
            Self::Table => "table",
            Self::TableCell => "table_cell",
            Self::Image => "image",
            Self::Figure => "figure",
            Self::Chart => "chart",
            Self::Diagram => "diagram",
        }
    }

    /// Parse a wire name or a common backend label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "text" | "plain_text" | "line" => Some(Self::Text),
            "title" | "heading" | "section_header" => Some(Self::Title),
            "paragraph" | "para" => Some(Self::Paragraph),
            "list" | "list_item" | "index" => Some(Self::List),
            "header" | "page_header" => Some(Self::Header),
            "footer" | "page_footer" | "page_number" => Some(Self::Footer),
            "table" => Some(Self::Table),
            "table_cell" | "cell" => Some(Self::TableCell),
            "image" | "picture" | "photo" => Some(Self::Image),
            "figure" => Some(Self::Figure),
            "chart" | "graph" | "plot" => Some(Self::Chart),
            "diagram" | "flowchart" => Some(Self::Diagram),
            _ => None,
        }
    }

    /// Rendered as an editable text box.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Title | Self::Paragraph | Self::List | Self::Header | Self::Footer
        )
    }

    /// Pictorial region whose pixels are kept as a raster.
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Image | Self::Figure | Self::Chart | Self::Diagram)
    }

    /// Eligible for recursive decomposition (subject to the size predicate).
    pub fn is_recursable(&self) -> bool {
        matches!(self, Self::Image | Self::Figure | Self::Chart | Self::Table)
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElementType {
    type Err = ReslideError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s).ok_or_else(|| ReslideError::Config(format!("unknown element type '{s}'")))
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Timeout, connection reset, overloaded backend: safe to retry.
    Transient,
    /// Bad request, undecodable payload, missing file: retrying cannot help.
    Permanent,
}

/// Index of an element inside its owning [`EditableImage`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementIndex(usize);

impl ElementIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// One detected unit of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableElement {
    pub id: String,
    pub element_type: ElementType,
    /// Box relative to the immediate parent image.
    pub bbox: BBox,
    /// Box relative to the root image.
    pub bbox_global: BBox,
    pub content: Option<String>,
    /// Cropped raster of just this element.
    pub image_path: Option<PathBuf>,
    /// Clean background of this element's region; set only when decomposed.
    pub inpainted_background_path: Option<PathBuf>,
    /// Owned sub-elements, empty unless decomposed.
    children: Vec<ElementIndex>,
    decomposed: bool,
    pub metadata: Metadata,
}

impl EditableElement {
    pub fn new(element_type: ElementType, bbox: BBox, bbox_global: BBox) -> Self {
        Self {
            id: new_element_id(),
            element_type,
            bbox,
            bbox_global,
            content: None,
            image_path: None,
            inpainted_background_path: None,
            children: Vec::new(),
            decomposed: false,
            metadata: Metadata::new(),
        }
    }

    pub fn children(&self) -> &[ElementIndex] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether recursive decomposition has already been attached.
    pub fn is_decomposed(&self) -> bool {
        self.decomposed
    }
}

/// One raster and its decomposition.
///
/// All elements of the tree rooted at this image, at any depth, live in a
/// single arena owned by the image. `elements` lists the top-level entries;
/// nested entries are reached through [`EditableElement::children`].
#[derive(Debug, Clone, PartialEq)]
pub struct EditableImage {
    pub id: String,
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    elements: Vec<ElementIndex>,
    pub clean_background_path: Option<PathBuf>,
    pub depth: u32,
    /// Lookup key of the element this image was cropped from.
    pub parent_id: Option<String>,
    pub metadata: Metadata,
    arena: Vec<EditableElement>,
}

impl EditableImage {
    pub fn new(image_path: impl Into<PathBuf>, width: u32, height: u32, depth: u32) -> Self {
        Self {
            id: new_image_id(),
            image_path: image_path.into(),
            width,
            height,
            elements: Vec::new(),
            clean_background_path: None,
            depth,
            parent_id: None,
            metadata: Metadata::new(),
            arena: Vec::new(),
        }
    }

    /// Append a top-level element and return its index.
    pub fn push_element(&mut self, element: EditableElement) -> ElementIndex {
        let idx = ElementIndex(self.arena.len());
        self.arena.push(element);
        self.elements.push(idx);
        idx
    }

    /// Top-level element indices in order.
    pub fn element_indices(&self) -> &[ElementIndex] {
        &self.elements
    }

    /// Top-level elements in order.
    pub fn elements(&self) -> impl Iterator<Item = &EditableElement> + '_ {
        self.elements.iter().map(|idx| &self.arena[idx.0])
    }

    pub fn element(&self, idx: ElementIndex) -> &EditableElement {
        &self.arena[idx.0]
    }

    pub fn element_mut(&mut self, idx: ElementIndex) -> &mut EditableElement {
        &mut self.arena[idx.0]
    }

    /// Children of `idx` in order.
    pub fn children_of(&self, idx: ElementIndex) -> impl Iterator<Item = &EditableElement> + '_ {
        self.arena[idx.0].children.iter().map(|c| &self.arena[c.0])
    }

    /// Look an element up by its id anywhere in the tree.
    pub fn find(&self, id: &str) -> Option<ElementIndex> {
        self.arena.iter().position(|e| e.id == id).map(ElementIndex)
    }

    /// Number of elements at every depth.
    pub fn total_elements(&self) -> usize {
        self.arena.len()
    }

    /// Attach the decomposition of the element at `idx`: `child`'s top-level
    /// elements become the element's children and its clean background
    /// becomes the element's inpainted background.
    ///
    /// An element can be decomposed once; a second attach is an error.
    pub fn attach_decomposition(&mut self, idx: ElementIndex, child: EditableImage) -> Result<()> {
        if self.arena[idx.0].decomposed {
            return Err(ReslideError::Recursion(format!(
                "element {} is already decomposed",
                self.arena[idx.0].id
            )));
        }

        let offset = self.arena.len();
        let EditableImage {
            elements: child_top,
            clean_background_path,
            arena: child_arena,
            ..
        } = child;

        self.arena.extend(child_arena.into_iter().map(|mut el| {
            for c in &mut el.children {
                c.0 += offset;
            }
            el
        }));

        let target = &mut self.arena[idx.0];
        target.children = child_top.into_iter().map(|c| ElementIndex(c.0 + offset)).collect();
        target.inpainted_background_path = clean_background_path;
        target.decomposed = true;
        Ok(())
    }

    /// Serialize into a plain owned tree.
    pub fn to_tree(&self) -> ImageTree {
        ImageTree {
            id: self.id.clone(),
            image_path: self.image_path.clone(),
            width: self.width,
            height: self.height,
            clean_background_path: self.clean_background_path.clone(),
            depth: self.depth,
            parent_id: self.parent_id.clone(),
            metadata: self.metadata.clone(),
            elements: self.elements.iter().map(|&idx| self.node(idx)).collect(),
        }
    }

    fn node(&self, idx: ElementIndex) -> ElementNode {
        let el = &self.arena[idx.0];
        ElementNode {
            id: el.id.clone(),
            element_type: el.element_type,
            bbox: el.bbox,
            bbox_global: el.bbox_global,
            content: el.content.clone(),
            image_path: el.image_path.clone(),
            inpainted_background_path: el.inpainted_background_path.clone(),
            metadata: el.metadata.clone(),
            children: el.children.iter().map(|&c| self.node(c)).collect(),
        }
    }

    /// Rebuild the arena form from a plain tree.
    pub fn from_tree(tree: ImageTree) -> Self {
        let mut image = EditableImage {
            id: tree.id,
            image_path: tree.image_path,
            width: tree.width,
            height: tree.height,
            elements: Vec::new(),
            clean_background_path: tree.clean_background_path,
            depth: tree.depth,
            parent_id: tree.parent_id,
            metadata: tree.metadata,
            arena: Vec::new(),
        };
        for node in tree.elements {
            let idx = image.insert_node(node);
            image.elements.push(idx);
        }
        image
    }

    fn insert_node(&mut self, node: ElementNode) -> ElementIndex {
        let idx = ElementIndex(self.arena.len());
        let decomposed = !node.children.is_empty() || node.inpainted_background_path.is_some();
        self.arena.push(EditableElement {
            id: node.id,
            element_type: node.element_type,
            bbox: node.bbox,
            bbox_global: node.bbox_global,
            content: node.content,
            image_path: node.image_path,
            inpainted_background_path: node.inpainted_background_path,
            children: Vec::new(),
            decomposed,
            metadata: node.metadata,
        });
        let children: Vec<ElementIndex> = node
            .children
            .into_iter()
            .map(|child| self.insert_node(child))
            .collect();
        self.arena[idx.0].children = children;
        idx
    }
}

/// Plain serializable form of an [`EditableImage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTree {
    pub id: String,
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_background_path: Option<PathBuf>,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub elements: Vec<ElementNode>,
}

/// Plain serializable form of an [`EditableElement`] and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub bbox: BBox,
    pub bbox_global: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inpainted_background_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}
