//! Private/reserved address classification.

use serde::Serialize;
use std::net::Ipv4Addr;

/// Category of an IPv4 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressCategory {
    /// RFC 1918 10.0.0.0/8.
    ClassA,
    /// RFC 1918 172.16.0.0/12.
    ClassB,
    /// RFC 1918 192.168.0.0/16.
    ClassC,
    /// 127.0.0.0/8.
    Loopback,
    /// 169.254.0.0/16.
    LinkLocal,
    /// Publicly routable.
    Public,
}

/// Result of classifying a single IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressClassification {
    pub is_private: bool,
    pub category: AddressCategory,
    pub cidr_range: &'static str,
    pub usage_note: &'static str,
}

impl AddressClassification {
    fn public() -> Self {
        Self {
            is_private: false,
            category: AddressCategory::Public,
            cidr_range: "",
            usage_note: "Publicly routable address",
        }
    }
}

/// Classify an IPv4 address string into a private/reserved category.
///
/// Total function: malformed input is treated as public (format validation
/// is the caller's job). Ranges are tested in order and are mutually
/// exclusive, so exactly one category is ever selected.
pub fn classify(ip: &str) -> AddressClassification {
    let addr: Ipv4Addr = match ip.trim().parse() {
        Ok(addr) => addr,
        Err(_) => return AddressClassification::public(),
    };

    let [a, b, _, _] = addr.octets();

    if a == 10 {
        AddressClassification {
            is_private: true,
            category: AddressCategory::ClassA,
            cidr_range: "10.0.0.0/8",
            usage_note: "Private network (RFC 1918, class A)",
        }
    } else if a == 172 && (16..=31).contains(&b) {
        AddressClassification {
            is_private: true,
            category: AddressCategory::ClassB,
            cidr_range: "172.16.0.0/12",
            usage_note: "Private network (RFC 1918, class B)",
        }
    } else if a == 192 && b == 168 {
        AddressClassification {
            is_private: true,
            category: AddressCategory::ClassC,
            cidr_range: "192.168.0.0/16",
            usage_note: "Private network (RFC 1918, class C)",
        }
    } else if a == 127 {
        AddressClassification {
            is_private: true,
            category: AddressCategory::Loopback,
            cidr_range: "127.0.0.0/8",
            usage_note: "Loopback address",
        }
    } else if a == 169 && b == 254 {
        AddressClassification {
            is_private: true,
            category: AddressCategory::LinkLocal,
            cidr_range: "169.254.0.0/16",
            usage_note: "Link-local address (APIPA)",
        }
    } else {
        AddressClassification::public()
    }
}
