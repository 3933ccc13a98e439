//! Cross-producer aggregation of tool fragments.
//!
//! Groups are keyed by `(family, shape, normalized tool, direction)` in a
//! `BTreeMap`, so the finished catalog is ordered by key no matter what
//! order files were scanned in. Example lists are fixed-capacity and
//! append-only: the first examples that fit are kept.

use driftwatch_kernel::ProducerFamily;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CatalogError;
use crate::normalize::{Direction, normalize_field_name, normalize_tool_name};

/// Size limits for a catalog run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    pub max_examples_per_group: usize,
    pub max_examples_per_shape: usize,
    /// Newest files kept per family; `0` keeps all.
    pub max_files_per_family: usize,
    /// Examples whose raw event or raw payload is longer than this are
    /// counted but not kept.
    pub max_example_chars: usize,
    /// Text fields longer than this are not searched for tool calls.
    pub max_text_len: usize,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_examples_per_group: 3,
            max_examples_per_shape: 3,
            max_files_per_family: 200,
            max_example_chars: 800,
            max_text_len: 2000,
        }
    }
}

/// Fixed-capacity append-only list.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedList<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedList<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    /// Append if there is room. Returns whether the item was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for BoundedList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    pub family: ProducerFamily,
    pub source_file: String,
    pub event_index: Option<usize>,
    pub direction: Direction,
    pub tool_name: Option<String>,
    pub shape_signature: String,
    pub field_path: Option<String>,
    pub raw_event: String,
    pub raw_payload: Option<String>,
    pub parsed_payload: Option<Value>,
    pub parse_error: Option<String>,
}

impl Example {
    fn is_oversized(&self, max_chars: usize) -> bool {
        self.raw_event.chars().count() > max_chars
            || self
                .raw_payload
                .as_ref()
                .is_some_and(|payload| payload.chars().count() > max_chars)
    }
}

/// One tool fragment ready to be counted.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolBlock {
    pub family: ProducerFamily,
    pub tool_name: Option<String>,
    pub direction: Direction,
    pub shape_signature: String,
    pub fields: Vec<String>,
    pub example: Example,
}

/// Field order is sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub family: ProducerFamily,
    pub shape_signature: String,
    pub tool_name_normalized: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEventGroup {
    pub family: ProducerFamily,
    pub tool_name_normalized: String,
    pub tool_name_variants: BTreeSet<String>,
    pub shape_signature: String,
    pub direction: Direction,
    pub count: u64,
    pub parse_success: u64,
    pub parse_success_rate: f64,
    pub fields_seen: BTreeSet<String>,
    pub field_variants: BTreeMap<String, BTreeSet<String>>,
    pub examples: BoundedList<Example>,
}

impl ToolEventGroup {
    fn new(key: &GroupKey, max_examples: usize) -> Self {
        Self {
            family: key.family,
            tool_name_normalized: key.tool_name_normalized.clone(),
            tool_name_variants: BTreeSet::new(),
            shape_signature: key.shape_signature.clone(),
            direction: key.direction,
            count: 0,
            parse_success: 0,
            parse_success_rate: 0.0,
            fields_seen: BTreeSet::new(),
            field_variants: BTreeMap::new(),
            examples: BoundedList::new(max_examples),
        }
    }

    fn record_fields<'a>(&mut self, fields: impl IntoIterator<Item = &'a String>) {
        for field in fields.into_iter().filter(|field| !field.is_empty()) {
            let norm = normalize_field_name(field);
            self.fields_seen.insert(norm.clone());
            self.field_variants
                .entry(norm)
                .or_default()
                .insert(field.clone());
        }
    }

    fn refresh_rate(&mut self) {
        self.parse_success_rate = if self.count == 0 {
            0.0
        } else {
            let rate = self.parse_success as f64 / self.count as f64;
            (rate * 10_000.0).round() / 10_000.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeStats {
    pub shape_signature: String,
    pub count: u64,
    pub families: BTreeSet<ProducerFamily>,
    pub direction_counts: BTreeMap<Direction, u64>,
    pub examples: BoundedList<Example>,
}

impl ShapeStats {
    fn new(shape_signature: &str, max_examples: usize) -> Self {
        Self {
            shape_signature: shape_signature.to_string(),
            count: 0,
            families: BTreeSet::new(),
            direction_counts: BTreeMap::new(),
            examples: BoundedList::new(max_examples),
        }
    }
}

/// Accumulates tool blocks. One builder per family can run on its own
/// thread; [`CatalogBuilder::merge`] combines them.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    limits: CatalogLimits,
    groups: BTreeMap<GroupKey, ToolEventGroup>,
    shapes: BTreeMap<String, ShapeStats>,
    scan_roots: BTreeMap<ProducerFamily, BTreeSet<String>>,
    files_scanned: BTreeMap<ProducerFamily, u64>,
}

impl CatalogBuilder {
    pub fn new(limits: CatalogLimits) -> Self {
        Self {
            limits,
            groups: BTreeMap::new(),
            shapes: BTreeMap::new(),
            scan_roots: BTreeMap::new(),
            files_scanned: BTreeMap::new(),
        }
    }

    pub fn limits(&self) -> &CatalogLimits {
        &self.limits
    }

    /// Note that `root` was scanned for `family`, even if nothing was found.
    pub fn note_root(&mut self, family: ProducerFamily, root: impl Into<String>) {
        self.scan_roots.entry(family).or_default().insert(root.into());
    }

    pub fn note_file_scanned(&mut self, family: ProducerFamily) {
        *self.files_scanned.entry(family).or_insert(0) += 1;
    }

    pub fn add(&mut self, block: ToolBlock) {
        let key = GroupKey {
            family: block.family,
            shape_signature: block.shape_signature.clone(),
            tool_name_normalized: normalize_tool_name(block.tool_name.as_deref()),
            direction: block.direction,
        };
        let limits = self.limits;
        let keep_example = !block.example.is_oversized(limits.max_example_chars);

        let group = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| ToolEventGroup::new(&key, limits.max_examples_per_group));
        group.count += 1;
        if block.example.parsed_payload.is_some() {
            group.parse_success += 1;
        }
        if let Some(name) = block.tool_name.as_ref().filter(|name| !name.is_empty()) {
            group.tool_name_variants.insert(name.clone());
        }
        group.record_fields(&block.fields);
        group.refresh_rate();
        if keep_example && !group.examples.is_full() {
            group.examples.push(block.example.clone());
        }

        let shape = self
            .shapes
            .entry(block.shape_signature.clone())
            .or_insert_with(|| ShapeStats::new(&block.shape_signature, limits.max_examples_per_shape));
        shape.count += 1;
        shape.families.insert(block.family);
        *shape.direction_counts.entry(block.direction).or_insert(0) += 1;
        if keep_example {
            shape.examples.push(block.example);
        }
    }

    /// Fold `other` into `self`. Counts add and sets union; examples from
    /// `other` fill whatever capacity `self` has left.
    pub fn merge(&mut self, other: CatalogBuilder) {
        let limits = self.limits;
        for (key, incoming) in other.groups {
            let group = self
                .groups
                .entry(key.clone())
                .or_insert_with(|| ToolEventGroup::new(&key, limits.max_examples_per_group));
            group.count += incoming.count;
            group.parse_success += incoming.parse_success;
            group.tool_name_variants.extend(incoming.tool_name_variants);
            group.fields_seen.extend(incoming.fields_seen);
            for (norm, variants) in incoming.field_variants {
                group.field_variants.entry(norm).or_default().extend(variants);
            }
            for example in incoming.examples.items {
                group.examples.push(example);
            }
            group.refresh_rate();
        }
        for (signature, incoming) in other.shapes {
            let shape = self
                .shapes
                .entry(signature.clone())
                .or_insert_with(|| ShapeStats::new(&signature, limits.max_examples_per_shape));
            shape.count += incoming.count;
            shape.families.extend(incoming.families);
            for (direction, count) in incoming.direction_counts {
                *shape.direction_counts.entry(direction).or_insert(0) += count;
            }
            for example in incoming.examples.items {
                shape.examples.push(example);
            }
        }
        for (family, roots) in other.scan_roots {
            self.scan_roots.entry(family).or_default().extend(roots);
        }
        for (family, count) in other.files_scanned {
            *self.files_scanned.entry(family).or_insert(0) += count;
        }
    }

    pub fn finish(self, generated_at: impl Into<String>) -> Catalog {
        let groups: Vec<ToolEventGroup> = self.groups.into_values().collect();
        let shape_signatures: Vec<ShapeStats> = self.shapes.into_values().collect();
        let summary = CatalogSummary::from_parts(&groups, &shape_signatures);
        Catalog {
            generated_at: generated_at.into(),
            scan_roots: self
                .scan_roots
                .into_iter()
                .map(|(family, roots)| (family, roots.into_iter().collect()))
                .collect(),
            files_scanned: self.files_scanned,
            summary,
            groups,
            shape_signatures,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub total_tool_blocks: u64,
    pub family_counts: BTreeMap<ProducerFamily, u64>,
    pub direction_counts: BTreeMap<Direction, u64>,
    pub shape_counts: BTreeMap<String, u64>,
}

impl CatalogSummary {
    fn from_parts(groups: &[ToolEventGroup], shapes: &[ShapeStats]) -> Self {
        let mut summary = Self::default();
        for group in groups {
            summary.total_tool_blocks += group.count;
            *summary.family_counts.entry(group.family).or_insert(0) += group.count;
            *summary.direction_counts.entry(group.direction).or_insert(0) += group.count;
        }
        for shape in shapes {
            summary
                .shape_counts
                .insert(shape.shape_signature.clone(), shape.count);
        }
        summary
    }
}

/// The finished, immutable catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub generated_at: String,
    pub scan_roots: BTreeMap<ProducerFamily, Vec<String>>,
    pub files_scanned: BTreeMap<ProducerFamily, u64>,
    pub summary: CatalogSummary,
    /// Ordered by family, shape, normalized tool, direction.
    pub groups: Vec<ToolEventGroup>,
    /// Ordered by shape signature.
    pub shape_signatures: Vec<ShapeStats>,
}

impl Catalog {
    pub fn total_tool_blocks(&self) -> u64 {
        self.summary.total_tool_blocks
    }

    /// Fails when nothing at all was found.
    pub fn sanity_check(&self) -> Result<(), CatalogError> {
        if self.total_tool_blocks() == 0 {
            return Err(CatalogError::NoToolBlocks);
        }
        Ok(())
    }

    /// `(key, count)` for every group, for order-insensitive comparisons.
    pub fn group_counts(&self) -> Vec<(GroupKey, u64)> {
        self.groups
            .iter()
            .map(|group| {
                (
                    GroupKey {
                        family: group.family,
                        shape_signature: group.shape_signature.clone(),
                        tool_name_normalized: group.tool_name_normalized.clone(),
                        direction: group.direction,
                    },
                    group.count,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(family: ProducerFamily, tool: &str, raw_event: &str, parsed: bool) -> ToolBlock {
        ToolBlock {
            family,
            tool_name: Some(tool.to_string()),
            direction: Direction::Input,
            shape_signature: "jsonl:type=tool_call".to_string(),
            fields: vec!["toolName".to_string(), "tool_name".to_string()],
            example: Example {
                family,
                source_file: "s.jsonl".to_string(),
                event_index: Some(0),
                direction: Direction::Input,
                tool_name: Some(tool.to_string()),
                shape_signature: "jsonl:type=tool_call".to_string(),
                field_path: Some("type".to_string()),
                raw_event: raw_event.to_string(),
                raw_payload: None,
                parsed_payload: parsed.then(|| Value::Bool(true)),
                parse_error: None,
            },
        }
    }

    #[test]
    fn bounded_list_refuses_past_capacity() {
        let mut list = BoundedList::new(2);
        assert!(list.push(1));
        assert!(list.push(2));
        assert!(!list.push(3));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn variants_share_one_group() {
        let mut builder = CatalogBuilder::new(CatalogLimits::default());
        builder.add(block(ProducerFamily::Droid, "Read-File", "{}", true));
        builder.add(block(ProducerFamily::Droid, "readFile", "{}", false));
        let catalog = builder.finish("now");

        assert_eq!(catalog.groups.len(), 1);
        let group = &catalog.groups[0];
        assert_eq!(group.tool_name_normalized, "read_file");
        assert_eq!(group.count, 2);
        assert_eq!(group.parse_success_rate, 0.5);
        assert_eq!(group.tool_name_variants.len(), 2);
        assert_eq!(
            group.field_variants["tool_name"],
            BTreeSet::from(["toolName".to_string(), "tool_name".to_string()])
        );
    }

    #[test]
    fn oversized_examples_are_counted_not_kept() {
        let limits = CatalogLimits {
            max_example_chars: 10,
            ..CatalogLimits::default()
        };
        let mut builder = CatalogBuilder::new(limits);
        builder.add(block(ProducerFamily::Codex, "shell", "x".repeat(11).as_str(), true));
        let catalog = builder.finish("now");
        assert_eq!(catalog.groups[0].count, 1);
        assert!(catalog.groups[0].examples.is_empty());
        assert!(catalog.shape_signatures[0].examples.is_empty());
    }

    #[test]
    fn merge_adds_counts_and_caps_examples() {
        let limits = CatalogLimits {
            max_examples_per_group: 2,
            ..CatalogLimits::default()
        };
        let mut left = CatalogBuilder::new(limits);
        let mut right = CatalogBuilder::new(limits);
        left.add(block(ProducerFamily::Codex, "shell", "a", true));
        right.add(block(ProducerFamily::Codex, "shell", "b", true));
        right.add(block(ProducerFamily::Claude, "Bash", "c", true));
        right.add(block(ProducerFamily::Codex, "shell", "d", true));
        left.merge(right);
        let catalog = left.finish("now");

        assert_eq!(catalog.summary.total_tool_blocks, 4);
        assert_eq!(catalog.summary.family_counts[&ProducerFamily::Codex], 3);
        let codex = &catalog.groups[0];
        assert_eq!(codex.family, ProducerFamily::Codex);
        assert_eq!(codex.examples.len(), 2);
        assert_eq!(catalog.shape_signatures.len(), 1);
        assert_eq!(catalog.shape_signatures[0].families.len(), 2);
    }
}
