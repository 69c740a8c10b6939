//! Stack dependency graph.
//!
//! Built from one scan of every live stack. Two kinds of edge:
//!
//! - value links: a stack output whose (non-empty) value appears as another
//!   stack's parameter value. The producer `feeds` the consumer and the
//!   consumer `needs` the producer.
//! - nesting: a stack resource of the nested-stack type makes its physical
//!   id a child of the enclosing stack.
//!
//! A stack with any link is never torn down, so only the presence of an
//! edge matters to callers.

use std::collections::{BTreeMap, BTreeSet};

use cycler_core::resource_types;
use cycler_provider::{ProviderError, ProviderResult, StackApi, StackInfo, StackResource};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyNode {
    pub children: BTreeSet<String>,
    pub child_of: Option<String>,
    pub needs: BTreeSet<String>,
    pub feeds: BTreeSet<String>,
}

impl DependencyNode {
    /// True when this stack is nested in another or shares values with one.
    pub fn is_linked(&self) -> bool {
        self.child_of.is_some() || !self.needs.is_empty() || !self.feeds.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    /// Scan every live stack and its resources.
    pub fn build(api: &dyn StackApi) -> ProviderResult<Self> {
        let stacks = api.list_stacks()?;
        let mut resources = BTreeMap::new();
        for stack in &stacks {
            match api.list_resources(&stack.name) {
                Ok(list) => {
                    resources.insert(stack.name.clone(), list);
                }
                // Deleted between the listing and now.
                Err(ProviderError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        let graph = Self::from_parts(&stacks, &resources);
        debug!(stacks = graph.nodes.len(), "dependency graph built");
        Ok(graph)
    }

    pub fn from_parts(
        stacks: &[StackInfo],
        resources: &BTreeMap<String, Vec<StackResource>>,
    ) -> Self {
        let mut nodes: BTreeMap<String, DependencyNode> = stacks
            .iter()
            .map(|s| (s.name.clone(), DependencyNode::default()))
            .collect();

        let mut producers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut consumers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for stack in stacks {
            for value in stack.outputs.values().filter(|v| !v.is_empty()) {
                producers
                    .entry(value.as_str())
                    .or_default()
                    .insert(stack.name.as_str());
            }
            for value in stack.parameters.values().filter(|v| !v.is_empty()) {
                consumers
                    .entry(value.as_str())
                    .or_default()
                    .insert(stack.name.as_str());
            }
        }

        for (value, producing) in &producers {
            let Some(consuming) = consumers.get(value) else {
                continue;
            };
            for producer in producing {
                for consumer in consuming.iter().filter(|c| *c != producer) {
                    nodes
                        .entry(producer.to_string())
                        .or_default()
                        .feeds
                        .insert(consumer.to_string());
                    nodes
                        .entry(consumer.to_string())
                        .or_default()
                        .needs
                        .insert(producer.to_string());
                }
            }
        }

        for (parent, list) in resources {
            for child in list
                .iter()
                .filter(|r| r.resource_type == resource_types::STACK)
            {
                nodes
                    .entry(parent.clone())
                    .or_default()
                    .children
                    .insert(child.physical_id.clone());
                nodes.entry(child.physical_id.clone()).or_default().child_of = Some(parent.clone());
            }
        }

        Self { nodes }
    }

    pub fn node(&self, stack: &str) -> Option<&DependencyNode> {
        self.nodes.get(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> BTreeMap<String, String> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn stack(name: &str, parameters: &[(&str, &str)], outputs: &[(&str, &str)]) -> StackInfo {
        StackInfo {
            name: name.to_string(),
            status: "CREATE_COMPLETE".to_string(),
            parameters: pairs(parameters),
            outputs: pairs(outputs),
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn shared_value_links_producer_and_consumer() {
        let stacks = vec![
            stack("network", &[], &[("VpcId", "vpc-123")]),
            stack("app", &[("Vpc", "vpc-123")], &[]),
            stack("lonely", &[("Env", "uat")], &[]),
        ];
        let graph = DependencyGraph::from_parts(&stacks, &BTreeMap::new());

        let network = graph.node("network").unwrap();
        assert!(network.feeds.contains("app"));
        assert!(network.needs.is_empty());
        assert!(graph.node("app").unwrap().needs.contains("network"));
        assert!(!graph.node("lonely").unwrap().is_linked());
    }

    #[test]
    fn self_references_and_empty_values_are_ignored() {
        let stacks = vec![
            stack("a", &[("In", "x"), ("Blank", "")], &[("Out", "x"), ("None", "")]),
            stack("b", &[("Blank", "")], &[]),
        ];
        let graph = DependencyGraph::from_parts(&stacks, &BTreeMap::new());
        assert!(!graph.node("a").unwrap().is_linked());
        assert!(!graph.node("b").unwrap().is_linked());
    }

    #[test]
    fn links_are_deduplicated() {
        let stacks = vec![
            stack("p", &[], &[("A", "shared-1"), ("B", "shared-2")]),
            stack("c", &[("X", "shared-1"), ("Y", "shared-2")], &[]),
        ];
        let graph = DependencyGraph::from_parts(&stacks, &BTreeMap::new());
        assert_eq!(graph.node("p").unwrap().feeds.len(), 1);
        assert_eq!(graph.node("c").unwrap().needs.len(), 1);
    }

    #[test]
    fn nested_stacks_record_parent_and_children() {
        let stacks = vec![stack("outer", &[], &[]), stack("outer-db", &[], &[])];
        let resources = BTreeMap::from([(
            "outer".to_string(),
            vec![
                StackResource::new("Data", resource_types::STACK, "outer-db"),
                StackResource::new("Bucket", "AWS::S3::Bucket", "outer-bucket"),
            ],
        )]);
        let graph = DependencyGraph::from_parts(&stacks, &resources);

        let outer = graph.node("outer").unwrap();
        assert_eq!(outer.children.iter().collect::<Vec<_>>(), vec!["outer-db"]);
        assert!(outer.child_of.is_none());
        assert_eq!(graph.node("outer-db").unwrap().child_of.as_deref(), Some("outer"));
        assert!(graph.node("outer-db").unwrap().is_linked());
    }
}
