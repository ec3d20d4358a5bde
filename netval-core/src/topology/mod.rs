// netval-core/src/topology/mod.rs
// ============================================================================
// Module: Topology Assembler
// Description: Project devices and links to an annotated undirected graph.
// Purpose: Build the immutable graph one validation pass runs over.
// Dependencies: crate::model, crate::parser, petgraph
// ============================================================================

//! ## Overview
//! The assembler loads a project's devices and links into an in-memory
//! undirected graph annotated with VLAN sets, interface maps, and per-link
//! trunk allow-lists. Nodes insert in device-id lexical order and path
//! searches expand neighbors in sorted order, so path tie-breaks are
//! deterministic. The graph is immutable for the duration of one check pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use petgraph::Undirected;
use petgraph::graph::Graph;
use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::model::Device;
use crate::model::DeviceId;
use crate::model::DeviceRole;
use crate::model::DeviceVlan;
use crate::model::Interface;
use crate::model::Link;
use crate::model::LinkId;
use crate::model::LinkMedium;
use crate::parser::ParsedConfig;
use crate::parser::StaticRoute;

// ============================================================================
// SECTION: Graph Attributes
// ============================================================================

/// Node attributes for one device.
#[derive(Debug, Clone)]
pub struct DeviceNode {
    /// Device identifier.
    pub device_id: DeviceId,
    /// Configured hostname.
    pub hostname: String,
    /// Topology role.
    pub role: DeviceRole,
    /// Management IP address.
    pub management_ip: Option<String>,
    /// VLAN ids present in the device's VLAN database.
    pub vlans: BTreeSet<u16>,
    /// Interface map keyed by interface name.
    pub interfaces: BTreeMap<String, Interface>,
    /// Static routes recovered from the device's latest parsed snapshot.
    pub static_routes: Vec<StaticRoute>,
    /// True when the latest parsed snapshot declares a DHCP pool.
    pub has_dhcp_pool: bool,
}

/// Edge attributes for one link. Endpoints are ordered in storage but the
/// graph itself is undirected.
#[derive(Debug, Clone)]
pub struct LinkEdge {
    /// Link identifier.
    pub link_id: LinkId,
    /// Physical medium.
    pub medium: LinkMedium,
    /// First endpoint device.
    pub source_device: DeviceId,
    /// Interface name on the first endpoint.
    pub source_interface: String,
    /// Second endpoint device.
    pub target_device: DeviceId,
    /// Interface name on the second endpoint.
    pub target_interface: String,
    /// VLANs permitted across the link, sorted ascending.
    pub allow_list: Vec<u16>,
}

impl LinkEdge {
    /// Returns the interface name the edge uses on the given device.
    #[must_use]
    pub fn interface_on(&self, device: &DeviceId) -> Option<&str> {
        if &self.source_device == device {
            Some(&self.source_interface)
        } else if &self.target_device == device {
            Some(&self.target_interface)
        } else {
            None
        }
    }

    /// Returns the device on the other side of the edge.
    #[must_use]
    pub fn peer_of(&self, device: &DeviceId) -> Option<&DeviceId> {
        if &self.source_device == device {
            Some(&self.target_device)
        } else if &self.target_device == device {
            Some(&self.source_device)
        } else {
            None
        }
    }
}

// ============================================================================
// SECTION: Assembly Input
// ============================================================================

/// One snapshot of a project's topology, read in a single pass so concurrent
/// edits cannot race a running validation.
#[derive(Debug, Clone, Default)]
pub struct TopologyInput {
    /// Devices under the project.
    pub devices: Vec<Device>,
    /// All interfaces across those devices.
    pub interfaces: Vec<Interface>,
    /// All VLAN database rows across those devices.
    pub vlans: Vec<DeviceVlan>,
    /// Links under the project.
    pub links: Vec<Link>,
    /// Latest parsed configuration per device, when a snapshot exists.
    pub parsed: BTreeMap<DeviceId, ParsedConfig>,
}

/// Assembly errors.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A link references a device that is not part of the input.
    #[error("link {link} references unknown device {device}")]
    UnknownEndpoint {
        /// Offending link.
        link: LinkId,
        /// Missing device.
        device: DeviceId,
    },
}

// ============================================================================
// SECTION: Topology Graph
// ============================================================================

/// One hop along a computed path.
#[derive(Debug, Clone)]
pub struct PathHop {
    /// Device the hop leaves from.
    pub from: DeviceId,
    /// Device the hop arrives at.
    pub to: DeviceId,
    /// Edge traversed.
    pub edge: LinkEdge,
}

/// Immutable annotated topology graph for one validation pass.
pub struct TopologyGraph {
    /// Underlying undirected graph.
    graph: Graph<DeviceNode, LinkEdge, Undirected>,
    /// Device-id to node-index map in lexical order.
    index: BTreeMap<DeviceId, NodeIndex>,
}

impl TopologyGraph {
    /// Assembles the graph from one topology snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::UnknownEndpoint`] when a link references a
    /// device missing from the input.
    pub fn assemble(input: TopologyInput) -> Result<Self, AssemblyError> {
        let mut interfaces_by_device: BTreeMap<DeviceId, BTreeMap<String, Interface>> =
            BTreeMap::new();
        for interface in input.interfaces {
            interfaces_by_device
                .entry(interface.device_id.clone())
                .or_default()
                .insert(interface.name.clone(), interface);
        }
        let mut vlans_by_device: BTreeMap<DeviceId, BTreeSet<u16>> = BTreeMap::new();
        for vlan in input.vlans {
            vlans_by_device.entry(vlan.device_id.clone()).or_default().insert(vlan.vlan_id);
        }

        let mut graph = Graph::new_undirected();
        let mut index = BTreeMap::new();
        let mut devices = input.devices;
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        for device in devices {
            let parsed = input.parsed.get(&device.id);
            let node = DeviceNode {
                device_id: device.id.clone(),
                hostname: device.hostname.clone(),
                role: device.role,
                management_ip: device.management_ip.clone(),
                vlans: vlans_by_device.remove(&device.id).unwrap_or_default(),
                interfaces: interfaces_by_device.remove(&device.id).unwrap_or_default(),
                static_routes: parsed.map(|p| p.static_routes.clone()).unwrap_or_default(),
                has_dhcp_pool: parsed.is_some_and(|p| !p.dhcp_pools.is_empty()),
            };
            let node_index = graph.add_node(node);
            index.insert(device.id, node_index);
        }

        let mut links = input.links;
        links.sort_by(|a, b| a.id.cmp(&b.id));
        for link in links {
            let source = index.get(&link.source_device_id).copied().ok_or_else(|| {
                AssemblyError::UnknownEndpoint {
                    link: link.id.clone(),
                    device: link.source_device_id.clone(),
                }
            })?;
            let target = index.get(&link.target_device_id).copied().ok_or_else(|| {
                AssemblyError::UnknownEndpoint {
                    link: link.id.clone(),
                    device: link.target_device_id.clone(),
                }
            })?;
            let edge = LinkEdge {
                link_id: link.id,
                medium: link.medium,
                source_device: link.source_device_id,
                source_interface: link.source_interface,
                target_device: link.target_device_id,
                target_interface: link.target_interface,
                allow_list: link.vlan_allow_list,
            };
            graph.add_edge(source, target, edge);
        }

        Ok(Self {
            graph,
            index,
        })
    }

    /// Returns the number of devices in the graph.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns device ids in lexical order.
    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.index.keys()
    }

    /// Looks up a device node by id.
    #[must_use]
    pub fn node(&self, device: &DeviceId) -> Option<&DeviceNode> {
        self.index.get(device).map(|node_index| &self.graph[*node_index])
    }

    /// Returns device nodes in device-id lexical order.
    pub fn nodes(&self) -> impl Iterator<Item = &DeviceNode> {
        self.index.values().map(|node_index| &self.graph[*node_index])
    }

    /// Returns devices with the given role in device-id lexical order.
    pub fn nodes_with_role(&self, role: DeviceRole) -> impl Iterator<Item = &DeviceNode> {
        self.nodes().filter(move |node| node.role == role)
    }

    /// Returns all edges sorted by link id, each with both endpoint nodes.
    #[must_use]
    pub fn edges_sorted(&self) -> Vec<(&LinkEdge, &DeviceNode, &DeviceNode)> {
        let mut edges: Vec<&LinkEdge> =
            self.graph.edge_indices().map(|edge| &self.graph[edge]).collect();
        edges.sort_by(|a, b| a.link_id.cmp(&b.link_id));
        edges
            .into_iter()
            .filter_map(|edge| {
                let source = self.node(&edge.source_device)?;
                let target = self.node(&edge.target_device)?;
                Some((edge, source, target))
            })
            .collect()
    }

    /// Returns the edges incident to a device, sorted by link id.
    #[must_use]
    pub fn edges_of(&self, device: &DeviceId) -> Vec<&LinkEdge> {
        let Some(node_index) = self.index.get(device) else {
            return Vec::new();
        };
        use petgraph::visit::EdgeRef;
        let mut edges: Vec<&LinkEdge> =
            self.graph.edges(*node_index).map(|edge| edge.weight()).collect();
        edges.sort_by(|a, b| a.link_id.cmp(&b.link_id));
        edges
    }

    /// Computes the shortest path between two devices as a hop list.
    ///
    /// Breadth-first search expands neighbors in device-id lexical order, so
    /// equal-length path ties resolve deterministically.
    #[must_use]
    pub fn shortest_path(&self, from: &DeviceId, to: &DeviceId) -> Option<Vec<PathHop>> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;
        if start == goal {
            return Some(Vec::new());
        }
        let mut predecessor: BTreeMap<DeviceId, PathHop> = BTreeMap::new();
        let mut visited: BTreeSet<DeviceId> = BTreeSet::new();
        visited.insert(from.clone());
        let mut queue = VecDeque::new();
        queue.push_back(from.clone());
        while let Some(current) = queue.pop_front() {
            // Incident edges sorted by link id; peers visit in sorted order.
            let mut steps: Vec<(DeviceId, &LinkEdge)> = self
                .edges_of(&current)
                .into_iter()
                .filter_map(|edge| edge.peer_of(&current).map(|peer| (peer.clone(), edge)))
                .collect();
            steps.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.link_id.cmp(&b.1.link_id)));
            for (peer, edge) in steps {
                if visited.contains(&peer) {
                    continue;
                }
                visited.insert(peer.clone());
                predecessor.insert(
                    peer.clone(),
                    PathHop {
                        from: current.clone(),
                        to: peer.clone(),
                        edge: edge.clone(),
                    },
                );
                if &peer == to {
                    return Some(self.unwind_path(from, to, &predecessor));
                }
                queue.push_back(peer);
            }
        }
        None
    }

    /// Rebuilds the hop list from the predecessor map.
    fn unwind_path(
        &self,
        from: &DeviceId,
        to: &DeviceId,
        predecessor: &BTreeMap<DeviceId, PathHop>,
    ) -> Vec<PathHop> {
        let mut hops = Vec::new();
        let mut cursor = to.clone();
        while &cursor != from {
            let Some(hop) = predecessor.get(&cursor) else {
                break;
            };
            cursor = hop.from.clone();
            hops.push(hop.clone());
        }
        hops.reverse();
        hops
    }

    /// Returns true when any path connects the two devices.
    #[must_use]
    pub fn has_path(&self, from: &DeviceId, to: &DeviceId) -> bool {
        self.shortest_path(from, to).is_some()
    }

    /// Builds the dense reachability matrix keyed by hostname for all
    /// ordered device pairs.
    #[must_use]
    pub fn reachability_matrix(&self) -> BTreeMap<String, BTreeMap<String, bool>> {
        let mut matrix = BTreeMap::new();
        for source in self.nodes() {
            let mut row = BTreeMap::new();
            for destination in self.nodes() {
                let reachable = source.device_id == destination.device_id
                    || self.has_path(&source.device_id, &destination.device_id);
                row.insert(destination.hostname.clone(), reachable);
            }
            matrix.insert(source.hostname.clone(), row);
        }
        matrix
    }
}
