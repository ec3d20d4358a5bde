// netval-core/src/parser/mod.rs
// ============================================================================
// Module: IOS Configuration Parser
// Description: Running-configuration text to canonical device sub-model.
// Purpose: Normalize IOS-family configurations for validation and rendering.
// Dependencies: crate::model, crate::parser::ranges, serde
// ============================================================================

//! ## Overview
//! The parser converts a raw IOS-family running configuration into the
//! canonical device sub-model. Parsing never fails: unrecognized stanzas are
//! retained verbatim for display and recorded as warnings. Given identical
//! input bytes the output is byte-identical.

pub mod ranges;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::model::DuplexMode;
use crate::model::InterfaceMode;
use crate::model::PortState;
use crate::model::vlan_in_range;
use crate::parser::ranges::expand_vlan_ranges;

// ============================================================================
// SECTION: Parsed Sub-Model
// ============================================================================

/// One VLAN record from the device VLAN database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    /// 802.1Q VLAN id.
    pub id: u16,
    /// VLAN name, when configured.
    pub name: Option<String>,
}

/// One interface stanza in parse order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInterface {
    /// Interface name exactly as configured.
    pub name: String,
    /// Description line.
    pub description: Option<String>,
    /// Resolved switchport mode.
    pub mode: InterfaceMode,
    /// Access VLAN when in access mode.
    pub vlan_access: Option<u16>,
    /// Expanded trunk allow-list, sorted ascending.
    pub vlan_trunk_allowed: Vec<u16>,
    /// Explicit trunk native VLAN.
    pub vlan_native: Option<u16>,
    /// IPv4 address.
    pub ip_address: Option<String>,
    /// IPv4 network mask.
    pub ip_mask: Option<String>,
    /// Duplex setting.
    pub duplex: DuplexMode,
    /// DHCP relay helper addresses in configuration order.
    pub helper_addresses: Vec<String>,
    /// Administrative state; `shutdown` present means down.
    pub state: PortState,
    /// True when the interface is named `Vlan<N>` and carries an IP.
    pub is_svi: bool,
}

impl ParsedInterface {
    /// Creates an empty interface stanza with parser defaults.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            mode: InterfaceMode::Unknown,
            vlan_access: None,
            vlan_trunk_allowed: Vec::new(),
            vlan_native: None,
            ip_address: None,
            ip_mask: None,
            duplex: DuplexMode::Auto,
            helper_addresses: Vec::new(),
            state: PortState::Up,
            is_svi: false,
        }
    }

    /// Returns the SVI VLAN id for `Vlan<N>` interfaces carrying an IP.
    #[must_use]
    pub fn svi_vlan(&self) -> Option<u16> {
        if !self.is_svi {
            return None;
        }
        self.name.strip_prefix("Vlan").and_then(|rest| rest.parse::<u16>().ok())
    }
}

/// Summary of one routing-protocol stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingProtocol {
    /// Protocol keyword, for example `ospf`.
    pub protocol: String,
    /// Process or AS identifier, when present.
    pub process_id: Option<String>,
}

/// One `ip route` stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    /// Destination prefix.
    pub prefix: String,
    /// Destination mask.
    pub mask: String,
    /// Next-hop address.
    pub next_hop: String,
}

/// A named or numbered access list with its raw entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRecord {
    /// ACL name or number.
    pub name: String,
    /// Raw entry lines in configuration order.
    pub entries: Vec<String>,
}

/// Non-fatal parse warning attached to the produced sub-model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// One-based line number the warning refers to, when line-scoped.
    pub line: Option<usize>,
    /// Human-readable message.
    pub message: String,
}

/// Canonical device sub-model produced by the parser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedConfig {
    /// Configured hostname.
    pub hostname: Option<String>,
    /// Interfaces in configuration order.
    pub interfaces: Vec<ParsedInterface>,
    /// VLAN database records in configuration order.
    pub vlans: Vec<VlanRecord>,
    /// Routing protocols present.
    pub routing_protocols: Vec<RoutingProtocol>,
    /// Static-route stanzas.
    pub static_routes: Vec<StaticRoute>,
    /// Access lists.
    pub acls: Vec<AclRecord>,
    /// DHCP pool names.
    pub dhcp_pools: Vec<String>,
    /// Unrecognized stanzas retained verbatim for display.
    pub unrecognized: Vec<String>,
    /// Non-fatal warnings gathered during the parse.
    pub warnings: Vec<ParseWarning>,
}

impl ParsedConfig {
    /// Looks up an interface stanza by name.
    #[must_use]
    pub fn interface(&self, name: &str) -> Option<&ParsedInterface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }
}

// ============================================================================
// SECTION: Stored Sub-Model Conversion
// ============================================================================

impl ParsedInterface {
    /// Rebuilds an interface stanza from a stored interface row.
    #[must_use]
    pub fn from_interface(interface: &crate::model::Interface) -> Self {
        Self {
            name: interface.name.clone(),
            description: interface.description.clone(),
            mode: interface.mode,
            vlan_access: interface.vlan_access,
            vlan_trunk_allowed: interface.vlan_trunk_allowed.clone(),
            vlan_native: interface.vlan_native,
            ip_address: interface.ip_address.clone(),
            ip_mask: interface.ip_mask.clone(),
            duplex: interface.duplex,
            helper_addresses: interface.helper_addresses.clone(),
            state: interface.state,
            is_svi: interface.svi_vlan().is_some(),
        }
    }
}

/// Rebuilds a renderable sub-model from stored rows, for CLI generation.
#[must_use]
pub fn device_submodel(
    hostname: &str,
    interfaces: &[crate::model::Interface],
    vlans: &[crate::model::DeviceVlan],
) -> ParsedConfig {
    ParsedConfig {
        hostname: Some(hostname.to_string()),
        interfaces: interfaces.iter().map(ParsedInterface::from_interface).collect(),
        vlans: vlans
            .iter()
            .map(|vlan| VlanRecord {
                id: vlan.vlan_id,
                name: vlan.name.clone(),
            })
            .collect(),
        ..ParsedConfig::default()
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Parses a raw IOS-family running configuration.
///
/// Line endings are normalized to `\n` before parsing. The parser never
/// fails; unknown syntax is retained verbatim and recorded as a warning.
#[must_use]
pub fn parse_running_config(raw: &str) -> ParsedConfig {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = text.lines().collect();
    let mut config = ParsedConfig::default();
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('!') {
            index += 1;
            continue;
        }
        if line.starts_with(' ') {
            // Indented line outside any recognized stanza.
            config.unrecognized.push(trimmed.to_string());
            config.warnings.push(ParseWarning {
                line: Some(index + 1),
                message: format!("orphan continuation line '{}'", trimmed.trim()),
            });
            index += 1;
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        index = match tokens.as_slice() {
            ["hostname", name] => {
                config.hostname = Some((*name).to_string());
                index + 1
            }
            ["vlan", id] if id.chars().all(|ch| ch.is_ascii_digit()) => {
                parse_vlan_stanza(&lines, index, id, &mut config)
            }
            ["interface", name] => parse_interface_stanza(&lines, index, name, &mut config),
            ["router", protocol, rest @ ..] => {
                config.routing_protocols.push(RoutingProtocol {
                    protocol: (*protocol).to_string(),
                    process_id: rest.first().map(|token| (*token).to_string()),
                });
                skip_stanza_body(&lines, index + 1)
            }
            ["ip", "route", prefix, mask, next_hop, ..] => {
                config.static_routes.push(StaticRoute {
                    prefix: (*prefix).to_string(),
                    mask: (*mask).to_string(),
                    next_hop: (*next_hop).to_string(),
                });
                index + 1
            }
            ["ip", "access-list", _kind, name] => {
                parse_named_acl(&lines, index, name, &mut config)
            }
            ["access-list", number, ..] => {
                push_numbered_acl_entry(number, trimmed, &mut config);
                index + 1
            }
            ["ip", "dhcp", "pool", name] => {
                config.dhcp_pools.push((*name).to_string());
                skip_stanza_body(&lines, index + 1)
            }
            ["end"] => index + 1,
            _ => {
                let consumed = retain_unrecognized_stanza(&lines, index, &mut config);
                config.warnings.push(ParseWarning {
                    line: Some(index + 1),
                    message: format!("unrecognized stanza '{}'", trimmed.trim()),
                });
                consumed
            }
        };
    }
    config
}

/// Parses a `vlan <id>` stanza and its optional `name` body line.
fn parse_vlan_stanza(
    lines: &[&str],
    start: usize,
    id_token: &str,
    config: &mut ParsedConfig,
) -> usize {
    let mut name = None;
    let mut index = start + 1;
    while index < lines.len() && lines[index].starts_with(' ') {
        let body = lines[index].trim();
        if let Some(value) = body.strip_prefix("name ") {
            name = Some(value.trim().to_string());
        }
        index += 1;
    }
    match id_token.parse::<u16>() {
        Ok(id) if vlan_in_range(id) => config.vlans.push(VlanRecord {
            id,
            name,
        }),
        _ => config.warnings.push(ParseWarning {
            line: Some(start + 1),
            message: format!("vlan id {id_token} outside 1..4094 ignored"),
        }),
    }
    index
}

/// Parses an `interface <name>` stanza body.
fn parse_interface_stanza(
    lines: &[&str],
    start: usize,
    name: &str,
    config: &mut ParsedConfig,
) -> usize {
    let mut iface = ParsedInterface::named(name);
    let mut switchport_mode_set = false;
    let mut routed_forced = false;
    let mut index = start + 1;
    while index < lines.len() && lines[index].starts_with(' ') {
        let body = lines[index].trim();
        let tokens: Vec<&str> = body.split_whitespace().collect();
        match tokens.as_slice() {
            ["description", ..] => {
                iface.description = Some(body["description".len()..].trim().to_string());
            }
            ["switchport", "mode", "access"] => {
                iface.mode = InterfaceMode::Access;
                switchport_mode_set = true;
            }
            ["switchport", "mode", "trunk"] => {
                iface.mode = InterfaceMode::Trunk;
                switchport_mode_set = true;
            }
            ["switchport", "access", "vlan", vlan] => {
                set_access_vlan(&mut iface, vlan, index + 1, config);
            }
            ["switchport", "trunk", "native", "vlan", vlan] => {
                set_native_vlan(&mut iface, vlan, index + 1, config);
            }
            ["switchport", "trunk", "allowed", "vlan", rest @ ..] => {
                apply_allowed_vlans(&mut iface, rest, index + 1, config);
            }
            ["no", "switchport"] => {
                routed_forced = true;
            }
            ["ip", "address", address, mask] => {
                iface.ip_address = Some((*address).to_string());
                iface.ip_mask = Some((*mask).to_string());
            }
            ["no", "ip", "address"] => {
                iface.ip_address = None;
                iface.ip_mask = None;
            }
            ["ip", "helper-address", address] => {
                iface.helper_addresses.push((*address).to_string());
            }
            ["shutdown"] => {
                iface.state = PortState::Down;
            }
            ["no", "shutdown"] => {
                iface.state = PortState::Up;
            }
            ["duplex", value] => match DuplexMode::parse(value) {
                Some(duplex) => iface.duplex = duplex,
                None => config.warnings.push(ParseWarning {
                    line: Some(index + 1),
                    message: format!("unknown duplex value '{value}'"),
                }),
            }
            _ => {
                config.unrecognized.push(lines[index].trim_end().to_string());
                config.warnings.push(ParseWarning {
                    line: Some(index + 1),
                    message: format!("unrecognized interface line '{body}' on {name}"),
                });
            }
        }
        index += 1;
    }
    if (routed_forced || !switchport_mode_set) && iface.ip_address.is_some() {
        iface.mode = InterfaceMode::Routed;
    }
    iface.is_svi = iface.ip_address.is_some()
        && iface.name.strip_prefix("Vlan").is_some_and(|rest| rest.parse::<u16>().is_ok());
    config.interfaces.push(iface);
    index
}

/// Applies a `switchport access vlan` value with range clamping.
fn set_access_vlan(
    iface: &mut ParsedInterface,
    token: &str,
    line: usize,
    config: &mut ParsedConfig,
) {
    match token.parse::<u16>() {
        Ok(vlan) if vlan_in_range(vlan) => iface.vlan_access = Some(vlan),
        _ => config.warnings.push(ParseWarning {
            line: Some(line),
            message: format!("access vlan {token} outside 1..4094 ignored"),
        }),
    }
}

/// Applies a `switchport trunk native vlan` value with range clamping.
fn set_native_vlan(
    iface: &mut ParsedInterface,
    token: &str,
    line: usize,
    config: &mut ParsedConfig,
) {
    match token.parse::<u16>() {
        Ok(vlan) if vlan_in_range(vlan) => iface.vlan_native = Some(vlan),
        _ => config.warnings.push(ParseWarning {
            line: Some(line),
            message: format!("native vlan {token} outside 1..4094 ignored"),
        }),
    }
}

/// Applies a `switchport trunk allowed vlan` clause.
///
/// The keywords `add`, `remove`, `none`, and `all` are recognized; `all` and
/// `none` both yield the empty set, matching how downstream checks treat an
/// unrestricted trunk.
fn apply_allowed_vlans(
    iface: &mut ParsedInterface,
    rest: &[&str],
    line: usize,
    config: &mut ParsedConfig,
) {
    let mut warnings = Vec::new();
    match rest {
        ["none"] | ["all"] => iface.vlan_trunk_allowed.clear(),
        ["add", expression] => {
            let mut merged: std::collections::BTreeSet<u16> =
                iface.vlan_trunk_allowed.iter().copied().collect();
            merged.extend(expand_vlan_ranges(expression, &mut warnings));
            iface.vlan_trunk_allowed = merged.into_iter().collect();
        }
        ["remove", expression] => {
            let removed = expand_vlan_ranges(expression, &mut warnings);
            iface.vlan_trunk_allowed.retain(|vlan| !removed.contains(vlan));
        }
        [expression] => {
            iface.vlan_trunk_allowed =
                expand_vlan_ranges(expression, &mut warnings).into_iter().collect();
        }
        _ => warnings.push("malformed trunk allowed vlan clause".to_string()),
    }
    for message in warnings {
        config.warnings.push(ParseWarning {
            line: Some(line),
            message,
        });
    }
}

/// Parses a named ACL stanza body into raw entries.
fn parse_named_acl(lines: &[&str], start: usize, name: &str, config: &mut ParsedConfig) -> usize {
    let mut entries = Vec::new();
    let mut index = start + 1;
    while index < lines.len() && lines[index].starts_with(' ') {
        entries.push(lines[index].trim().to_string());
        index += 1;
    }
    config.acls.push(AclRecord {
        name: name.to_string(),
        entries,
    });
    index
}

/// Appends one numbered `access-list` line, grouping by number.
fn push_numbered_acl_entry(number: &str, line: &str, config: &mut ParsedConfig) {
    if let Some(record) = config.acls.iter_mut().find(|acl| acl.name == number) {
        record.entries.push(line.trim().to_string());
        return;
    }
    config.acls.push(AclRecord {
        name: number.to_string(),
        entries: vec![line.trim().to_string()],
    });
}

/// Skips a stanza body without recording it.
fn skip_stanza_body(lines: &[&str], mut index: usize) -> usize {
    while index < lines.len() && lines[index].starts_with(' ') {
        index += 1;
    }
    index
}

/// Retains an unrecognized stanza verbatim, header and body.
fn retain_unrecognized_stanza(lines: &[&str], start: usize, config: &mut ParsedConfig) -> usize {
    config.unrecognized.push(lines[start].trim_end().to_string());
    let mut index = start + 1;
    while index < lines.len() && lines[index].starts_with(' ') {
        config.unrecognized.push(lines[index].trim_end().to_string());
        index += 1;
    }
    index
}
