//! Guest networking rules for an instance spec.
//!
//! Interfaces under `domain.devices.interfaces` and networks under
//! `networks` pair up one-to-one by name. The binding method of each
//! interface must suit the network it is attached to and be enabled in the
//! cluster configuration.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;

use super::instance_spec::ARRAY_LEN_MAX;
use crate::config::{ClusterConfig, FeatureGate};
use crate::crd::{Binding, Interface, Network, Port, VirtualMachineInstanceSpec};
use crate::webhooks::cause::{Cause, FieldPath};

/// Guest NIC models libvirt can emulate.
const VALID_MODELS: [&str; 6] = ["e1000", "e1000e", "ne2k_pci", "pcnet", "rtl8139", "virtio"];

/// MAC address of the bridge inside the virt-launcher pod.
const RESERVED_MAC: &str = "02:00:00:00:00:00";

const INTERFACE_NAME_MESSAGE: &str = "Network interface name can only contain alphabetical \
     characters, numbers, dashes (-) or underscores (_)";

/// Link state requesting hot-unplug of an interface.
const STATE_ABSENT: &str = "absent";

/// DHCP option codes reserved for site-specific use.
const PRIVATE_OPTIONS: std::ops::RangeInclusive<i32> = 224..=254;

static INTERFACE_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

static PCI_ADDRESS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{4}:[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7]$").ok()
});

/// Run the networking rules rooted at `field`.
///
/// Breaks when a rule makes the rest of the spec meaningless to check: list
/// limits, several interfaces on the pod network, or duplicated DHCP options.
pub fn validate(
    field: &FieldPath,
    spec: &VirtualMachineInstanceSpec,
    config: &ClusterConfig,
) -> ControlFlow<Vec<Cause>, Vec<Cause>> {
    let interfaces = &spec.domain.devices.interfaces;
    let interfaces_path = field.child("domain").child("devices").child("interfaces");
    let networks_path = field.child("networks");

    if interfaces.len() > ARRAY_LEN_MAX {
        return ControlFlow::Break(vec![list_exceeds_limit(&interfaces_path)]);
    }
    if spec.networks.len() > ARRAY_LEN_MAX {
        return ControlFlow::Break(vec![list_exceeds_limit(&networks_path)]);
    }
    if pod_interface_count(spec) > 1 {
        let path = field.child("interfaces");
        return ControlFlow::Break(vec![Cause::duplicate(
            &path,
            format!("more than one interface is connected to a pod network in {path}"),
        )]);
    }

    let mut causes = validate_networks(&networks_path, &spec.networks);
    let mut networks: HashMap<&str, &Network> = HashMap::new();
    for network in &spec.networks {
        networks.entry(network.name.as_str()).or_insert(network);
    }
    let mut boot_orders: HashSet<i32> = spec
        .domain
        .devices
        .disks
        .iter()
        .filter_map(|d| d.boot_order)
        .filter(|order| *order > 0)
        .collect();
    let mut connected: HashSet<&str> = HashSet::new();
    let mut port_names: HashSet<&str> = HashSet::new();

    for (idx, iface) in interfaces.iter().enumerate() {
        let path = interfaces_path.index(idx);
        let network = networks.get(iface.name.as_str()).copied();

        if let Some(cause) = check_binding_basics(&path, iface, network, interfaces.len(), config) {
            causes.push(cause);
        }

        let name_path = path.child("name");
        if !connected.insert(iface.name.as_str()) {
            causes.push(Cause::duplicate(
                &name_path,
                "Only one interface can be connected to one specific network",
            ));
        }
        if !INTERFACE_NAME_RE.as_ref().is_some_and(|re| re.is_match(&iface.name)) {
            causes.push(Cause::invalid(
                &name_path,
                INTERFACE_NAME_MESSAGE,
            ));
        }

        if network.is_some_and(|n| n.pod.is_some()) {
            for (port_idx, port) in iface.ports.iter().enumerate() {
                let port_path = path.child("ports").index(port_idx);
                causes.extend(validate_port(&port_path, port, &mut port_names));
            }
        }

        if let Some(model) = iface.model.as_deref().filter(|m| !m.is_empty()) {
            if !VALID_MODELS.contains(&model) {
                causes.push(Cause::not_supported(
                    path.child("model"),
                    format!("interface {name_path} uses model {model} that is not supported."),
                ));
            }
        }

        if let Some(mac) = iface.mac_address.as_deref().filter(|m| !m.is_empty()) {
            let mac_path = path.child("macAddress");
            match mac_octets(mac) {
                None => causes.push(Cause::invalid(
                    &mac_path,
                    format!("interface {name_path} has malformed MAC address ({mac})."),
                )),
                Some(octets) if octets > 6 => causes.push(Cause::invalid(
                    &mac_path,
                    format!("interface {name_path} has MAC address ({mac}) that is too long."),
                )),
                Some(_) => {}
            }
        }

        if let Some(order) = iface.boot_order {
            let order_path = path.child("bootOrder");
            if order < 1 {
                causes.push(Cause::invalid(
                    &order_path,
                    format!("{path} must have a boot order > 0, if supplied"),
                ));
            } else if !boot_orders.insert(order) {
                causes.push(Cause::invalid(
                    &order_path,
                    format!("Boot order for {order_path} already set for a different device."),
                ));
            }
        }

        if let Some(pci) = iface.pci_address.as_deref().filter(|p| !p.is_empty()) {
            if !PCI_ADDRESS_RE.as_ref().is_some_and(|re| re.is_match(pci)) {
                causes.push(Cause::invalid(
                    path.child("pciAddress"),
                    format!("interface {name_path} has malformed PCI address ({pci})."),
                ));
            }
        }

        if let Some(dhcp) = iface.dhcp_options.as_ref() {
            let mut seen = HashSet::new();
            if dhcp.private_options.iter().any(|o| !seen.insert(o.option)) {
                causes.push(Cause::invalid(
                    field,
                    "Found Duplicates: you have provided duplicated DHCPPrivateOptions",
                ));
                return ControlFlow::Break(causes);
            }
            for option in &dhcp.private_options {
                if !PRIVATE_OPTIONS.contains(&option.option) {
                    causes.push(Cause::invalid(
                        field,
                        "provided DHCPPrivateOptions are out of range, must be in range 224 to 254",
                    ));
                }
            }
            let ntp_path = path.child("dhcpOptions").child("ntpServers");
            for (ntp_idx, server) in dhcp.ntp_servers.iter().enumerate() {
                if !is_ipv4(server) {
                    causes.push(Cause::invalid(
                        ntp_path.index(ntp_idx),
                        "NTP servers must be a list of valid IPv4 addresses.",
                    ));
                }
            }
        }
    }

    let mut network_names = HashSet::new();
    for (idx, network) in spec.networks.iter().enumerate() {
        let name_path = networks_path.index(idx).child("name");
        if !network_names.insert(network.name.as_str()) {
            causes.push(Cause::duplicate(
                &name_path,
                format!(
                    "Network with name {:?} already exists, every network must have a unique name",
                    network.name
                ),
            ));
        }
        if !connected.contains(network.name.as_str()) {
            causes.push(Cause::required(
                &name_path,
                format!("{name_path} '{}' not found.", network.name),
            ));
        }
    }

    causes.extend(validate_interface_states(&interfaces_path, spec));
    causes.extend(validate_binding_choice(&interfaces_path, interfaces));
    ControlFlow::Continue(causes)
}

fn list_exceeds_limit(path: &FieldPath) -> Cause {
    Cause::invalid(
        path,
        format!("{path} list exceeds the {ARRAY_LEN_MAX} element limit in length"),
    )
}

/// Number of pod networks with an interface attached.
fn pod_interface_count(spec: &VirtualMachineInstanceSpec) -> usize {
    spec.networks
        .iter()
        .filter(|n| n.pod.is_some())
        .filter(|n| spec.domain.devices.interfaces.iter().any(|i| i.name == n.name))
        .count()
}

fn validate_networks(path: &FieldPath, networks: &[Network]) -> Vec<Cause> {
    let mut causes = Vec::new();
    let mut pod_exists = false;
    let mut multus_defaults = 0;

    for (idx, network) in networks.iter().enumerate() {
        let network_path = path.index(idx);
        let mut types = 0;
        if network.pod.is_some() {
            types += 1;
            pod_exists = true;
        }
        if let Some(multus) = network.multus.as_ref() {
            types += 1;
            if multus.default {
                multus_defaults += 1;
            }
        }

        match types {
            0 => causes.push(Cause::required(&network_path, "should have a network type")),
            1 => {}
            _ => causes.push(Cause::required(&network_path, "should have only one network type")),
        }
        if network.multus.as_ref().is_some_and(|m| m.network_name.is_empty()) {
            causes.push(Cause::required(
                &network_path,
                "CNI delegating plugin must have a networkName",
            ));
        }
    }

    if multus_defaults > 1 {
        causes.push(Cause::invalid(path, "Multus CNI should only have one default network"));
    }
    if pod_exists && multus_defaults > 0 {
        causes.push(Cause::invalid(
            path,
            "Pod network cannot be defined when Multus default network is defined",
        ));
    }
    causes
}

/// First mismatch between an interface's binding, its network and the
/// cluster configuration.
fn check_binding_basics(
    path: &FieldPath,
    iface: &Interface,
    network: Option<&Network>,
    interface_count: usize,
    config: &ClusterConfig,
) -> Option<Cause> {
    let name_path = path.child("name");
    let Some(network) = network else {
        return Some(Cause::invalid(
            &name_path,
            format!("{name_path} '{}' not found.", iface.name),
        ));
    };
    let on_pod = network.pod.is_some();
    let reserved_mac = iface
        .mac_address
        .as_deref()
        .is_some_and(|mac| mac.eq_ignore_ascii_case(RESERVED_MAC));

    let message = if iface.slirp.is_some() && !on_pod {
        "Slirp interface only implemented with pod network"
    } else if iface.slirp.is_some() && !config.permit_slirp_interface {
        "Slirp interface is not enabled in kubevirt-config"
    } else if iface.masquerade.is_some() && !on_pod {
        "Masquerade interface only implemented with pod network"
    } else if iface.masquerade.is_some() && reserved_mac {
        return Some(Cause::invalid(
            path.child("macAddress"),
            "The requested MAC address is reserved for the in-pod bridge. \
             Please choose another one.",
        ));
    } else if iface.bridge.is_some() && on_pod && !config.permit_bridge_interface_on_pod_network {
        "Bridge on pod network configuration is not enabled under kubevirt-config"
    } else if iface.macvtap.is_some() && !config.is_enabled(FeatureGate::Macvtap) {
        "Macvtap feature gate is not enabled"
    } else if iface.macvtap.is_some() && network.multus.is_none() {
        "Macvtap interface only implemented with Multus network"
    } else if iface.passt.is_some() && !config.is_enabled(FeatureGate::Passt) {
        "Passt feature gate is not enabled"
    } else if iface.passt.is_some() && !on_pod {
        "Passt interface only implemented with pod network"
    } else if iface.passt.is_some() && interface_count > 1 {
        "Passt interface is only supported as the single interface of the VMI"
    } else if iface.binding.is_some() && !config.is_enabled(FeatureGate::NetworkBindingPlugins) {
        "Binding plugins feature gate is not enabled"
    } else {
        return None;
    };
    Some(Cause::invalid(&name_path, message))
}

fn validate_port<'a>(path: &FieldPath, port: &'a Port, names: &mut HashSet<&'a str>) -> Vec<Cause> {
    let mut causes = Vec::new();
    if port.port == 0 {
        causes.push(Cause::required(path, "Port field is mandatory."));
    }
    if !(0..=65535).contains(&port.port) {
        causes.push(Cause::invalid(path, "Port field must be in range 0 < x < 65536."));
    }
    if let Some(protocol) = port.protocol.as_deref().filter(|p| !p.is_empty()) {
        if protocol != "TCP" && protocol != "UDP" {
            causes.push(Cause::invalid(
                path.child("protocol"),
                "Unknown protocol, only TCP or UDP allowed",
            ));
        }
    }
    if let Some(name) = port.name.as_deref().filter(|n| !n.is_empty()) {
        let name_path = path.child("name");
        if !names.insert(name) {
            causes.push(Cause::duplicate(
                &name_path,
                format!("Duplicate name of the port: {name}"),
            ));
        }
        if !is_valid_port_name(name) {
            causes.push(Cause::invalid(
                &name_path,
                format!("Invalid name of the port: {name}"),
            ));
        }
    }
    causes
}

/// IANA service name: up to 15 lowercase alphanumerics or dashes, at least
/// one letter, no leading, trailing or doubled dash.
pub fn is_valid_port_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 15
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && name.chars().any(|c| c.is_ascii_lowercase())
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// Octet count of a hardware address in colon, dash or dotted notation.
/// Accepts EUI-48, EUI-64 and 20-octet InfiniBand addresses.
pub fn mac_octets(mac: &str) -> Option<usize> {
    let is_hex = |group: &str, width: usize| {
        group.len() == width && group.chars().all(|c| c.is_ascii_hexdigit())
    };
    let octets = if mac.contains('.') {
        let groups: Vec<&str> = mac.split('.').collect();
        groups.iter().all(|&g| is_hex(g, 4)).then_some(groups.len() * 2)?
    } else {
        let separator = if mac.contains(':') { ':' } else { '-' };
        let groups: Vec<&str> = mac.split(separator).collect();
        groups.iter().all(|&g| is_hex(g, 2)).then_some(groups.len())?
    };
    [6, 8, 20].contains(&octets).then_some(octets)
}

fn is_ipv4(server: &str) -> bool {
    match server.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => true,
        Ok(IpAddr::V6(v6)) => v6.to_ipv4_mapped().is_some(),
        Err(_) => false,
    }
}

/// Only bridge interfaces on secondary networks can be hot-unplugged.
fn validate_interface_states(path: &FieldPath, spec: &VirtualMachineInstanceSpec) -> Vec<Cause> {
    let mut causes = Vec::new();
    let default_network = spec.networks.iter().find(|n| n.is_default());

    for (idx, iface) in spec.domain.devices.interfaces.iter().enumerate() {
        let Some(state) = iface.state.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let state_path = path.index(idx).child("state");
        if state != STATE_ABSENT {
            causes.push(Cause::invalid(
                &state_path,
                format!("logical {} interface state value is unsupported: {state}", iface.name),
            ));
            continue;
        }
        if !iface.uses(Binding::Bridge) {
            causes.push(Cause::invalid(
                &state_path,
                format!(
                    "{:?} interface's state {state:?} is supported only for bridge binding",
                    iface.name
                ),
            ));
        }
        if default_network.is_some_and(|n| n.name == iface.name) {
            causes.push(Cause::invalid(
                &state_path,
                format!(
                    "{:?} interface's state {state:?} is not supported on default networks",
                    iface.name
                ),
            ));
        }
    }
    causes
}

/// At most one built-in binding method, and never alongside a plugin.
fn validate_binding_choice(path: &FieldPath, interfaces: &[Interface]) -> Vec<Cause> {
    let mut causes = Vec::new();
    for (idx, iface) in interfaces.iter().enumerate() {
        let methods: Vec<Binding> = iface.bindings();
        if methods.len() > 1 {
            causes.push(Cause::invalid(
                path.index(idx),
                format!("logical {} interface can only have one binding method", iface.name),
            ));
        }
        if !methods.is_empty() && iface.binding.is_some() {
            causes.push(Cause::invalid(
                path.index(idx),
                format!(
                    "logical {} interface cannot have both binding plugin and interface \
                     binding method",
                    iface.name
                ),
            ));
        }
    }
    causes
}
