//! Deletion plan: discovered resources grouped by kind in dependency order

use crate::graph::{CycleError, DependencyGraph};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use stack_teardown_common::{ResourceDescriptor, ResourceKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// All resources of one kind, deleted before the next group starts
#[derive(Debug, Clone)]
pub struct DeletionGroup {
    pub kind: ResourceKind,
    /// Children before their in-group parents, then by id
    pub resources: Vec<ResourceDescriptor>,
    heights: Vec<usize>,
}

impl DeletionGroup {
    fn new(kind: ResourceKind, resources: Vec<ResourceDescriptor>) -> Self {
        let mut ranked: Vec<(usize, ResourceDescriptor)> =
            child_heights(&resources).into_iter().zip(resources).collect();
        ranked.sort_by(|(ha, a), (hb, b)| ha.cmp(hb).then_with(|| a.id.cmp(&b.id)));

        let (heights, resources) = ranked.into_iter().unzip();
        Self {
            kind,
            resources,
            heights,
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Batches that may run concurrently.
    ///
    /// Resources without a parent inside the group form a single wave; a
    /// resource whose parent is in the same group lands in an earlier wave
    /// than that parent.
    pub fn waves(&self) -> Vec<Vec<&ResourceDescriptor>> {
        let mut waves: Vec<Vec<&ResourceDescriptor>> = Vec::new();
        for (height, descriptor) in self.heights.iter().zip(&self.resources) {
            if waves.len() <= *height {
                waves.resize_with(height + 1, Vec::new);
            }
            waves[*height].push(descriptor);
        }
        waves.retain(|wave| !wave.is_empty());
        waves
    }
}

/// Longest chain of in-group descendants below each resource, by index
fn child_heights(resources: &[ResourceDescriptor]) -> Vec<usize> {
    let ids: HashSet<&str> = resources.iter().map(|d| d.id.as_str()).collect();
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for d in resources {
        if let Some(parent) = d.parent_id.as_deref().filter(|p| ids.contains(p)) {
            children.entry(parent).or_default().push(d.id.as_str());
        }
    }

    fn height<'a>(
        id: &'a str,
        children: &HashMap<&'a str, Vec<&'a str>>,
        memo: &mut HashMap<&'a str, usize>,
        visiting: &mut HashSet<&'a str>,
    ) -> usize {
        if let Some(h) = memo.get(id) {
            return *h;
        }
        // Parent links that loop back are ignored
        if !visiting.insert(id) {
            return 0;
        }
        let h = children
            .get(id)
            .map(|kids| {
                kids.iter()
                    .map(|kid| 1 + height(*kid, children, memo, visiting))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        visiting.remove(id);
        memo.insert(id, h);
        h
    }

    let mut memo = HashMap::new();
    let mut visiting = HashSet::new();
    resources
        .iter()
        .map(|d| height(d.id.as_str(), &children, &mut memo, &mut visiting))
        .collect()
}

/// Ordered deletion groups for one run
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    groups: Vec<DeletionGroup>,
}

impl DeletionPlan {
    /// Order discovered resources by the dependency graph.
    ///
    /// Kinds with nothing discovered produce no group.
    pub fn build(
        graph: &DependencyGraph,
        mut found: BTreeMap<ResourceKind, Vec<ResourceDescriptor>>,
    ) -> Result<Self, CycleError> {
        let order = graph.order_for(found.keys().copied())?;
        let groups = order
            .into_iter()
            .filter_map(|kind| found.remove(&kind).map(|r| DeletionGroup::new(kind, r)))
            .filter(|group| !group.is_empty())
            .collect();
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[DeletionGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.groups.iter().map(DeletionGroup::len).sum()
    }

    /// Every resource in execution order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.groups.iter().flat_map(|g| g.resources.iter())
    }

    /// Kinds in execution order
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.groups.iter().map(|g| g.kind).collect()
    }
}

impl fmt::Display for DeletionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Step"),
                Cell::new("Kind"),
                Cell::new("Id"),
                Cell::new("Name"),
                Cell::new("State"),
            ]);

        for (step, group) in self.groups.iter().enumerate() {
            for d in &group.resources {
                table.add_row(vec![
                    Cell::new(step + 1),
                    Cell::new(group.kind),
                    Cell::new(&d.id),
                    Cell::new(d.name.as_deref().unwrap_or("-")),
                    Cell::new(&d.state),
                ]);
            }
        }

        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceKind::*;

    fn found(items: Vec<ResourceDescriptor>) -> BTreeMap<ResourceKind, Vec<ResourceDescriptor>> {
        let mut map: BTreeMap<ResourceKind, Vec<ResourceDescriptor>> = BTreeMap::new();
        for d in items {
            map.entry(d.kind).or_default().push(d);
        }
        map
    }

    #[test]
    fn test_demo_stack_plan() {
        let plan = DeletionPlan::build(
            &DependencyGraph::standard(),
            found(vec![
                ResourceDescriptor::new(SecurityGroup, "sg-1"),
                ResourceDescriptor::new(Filesystem, "fs-1"),
                ResourceDescriptor::new(MountTarget, "fsmt-2").with_parent("fs-1"),
                ResourceDescriptor::new(MountTarget, "fsmt-1").with_parent("fs-1"),
                ResourceDescriptor::new(Instance, "i-2"),
                ResourceDescriptor::new(Instance, "i-1"),
            ]),
        )
        .unwrap();

        assert_eq!(
            plan.kinds(),
            vec![Instance, MountTarget, Filesystem, SecurityGroup]
        );
        let ids: Vec<_> = plan.resources().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["i-1", "i-2", "fsmt-1", "fsmt-2", "fs-1", "sg-1"]);
        assert_eq!(plan.resource_count(), 6);
        assert_eq!(plan.groups()[1].waves().len(), 1);
    }

    #[test]
    fn test_empty_discovery_is_empty_plan() {
        let plan = DeletionPlan::build(&DependencyGraph::standard(), BTreeMap::new()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.resource_count(), 0);
    }

    #[test]
    fn test_children_precede_parents_within_group() {
        let group = DeletionGroup::new(
            Role,
            vec![
                ResourceDescriptor::new(Role, "a-parent"),
                ResourceDescriptor::new(Role, "z-child").with_parent("a-parent"),
                ResourceDescriptor::new(Role, "m-grandchild").with_parent("z-child"),
                ResourceDescriptor::new(Role, "b-loner"),
            ],
        );
        let waves: Vec<Vec<&str>> = group
            .waves()
            .iter()
            .map(|w| w.iter().map(|d| d.id.as_str()).collect())
            .collect();
        assert_eq!(
            waves,
            vec![vec!["b-loner", "m-grandchild"], vec!["z-child"], vec!["a-parent"]]
        );
    }

    #[test]
    fn test_parent_loop_does_not_hang() {
        let group = DeletionGroup::new(
            Role,
            vec![
                ResourceDescriptor::new(Role, "a").with_parent("b"),
                ResourceDescriptor::new(Role, "b").with_parent("a"),
            ],
        );
        assert_eq!(group.len(), 2);
        assert_eq!(group.waves().iter().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn test_cycle_fails_plan() {
        let graph = DependencyGraph::standard().with_edge(Filesystem, MountTarget);
        let result = DeletionPlan::build(
            &graph,
            found(vec![ResourceDescriptor::new(Filesystem, "fs-1")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_table_lists_every_resource() {
        let plan = DeletionPlan::build(
            &DependencyGraph::standard(),
            found(vec![
                ResourceDescriptor::new(Instance, "i-1").with_name("demo-1-n8n"),
                ResourceDescriptor::new(KeyPair, "key-1"),
            ]),
        )
        .unwrap();
        let rendered = plan.to_string();
        assert!(rendered.contains("i-1"));
        assert!(rendered.contains("demo-1-n8n"));
        assert!(rendered.contains("key-pair"));
    }
}
